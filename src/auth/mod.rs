pub mod external;
pub mod handlers;
pub mod local;
pub mod password;
pub mod session;

use crate::db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Username is already taken")]
    DuplicateUsername,

    #[error("External identity is already linked to another account")]
    DuplicateExternalIdentity,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
