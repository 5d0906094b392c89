// Library surface of the blog, shared by the binary and the integration tests

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod slug;
pub mod state;
