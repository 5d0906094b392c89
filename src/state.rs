use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::auth::external::{IdentityProvider, OAuthStateStore};
use crate::auth::session::SessionStore;
use crate::config::Config;
use crate::db::accounts::{AccountStore, SqliteAccountStore};
use crate::db::posts::{PostStore, SqlitePostStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub posts: Arc<dyn PostStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: SessionStore,
    pub identity: Arc<dyn IdentityProvider>,
    pub oauth_states: Arc<Mutex<OAuthStateStore>>,
}

impl AppState {
    /// Wire the SQLite-backed stores around one pool.
    pub fn new(pool: DbPool, config: Config, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            posts: Arc::new(SqlitePostStore::new(pool.clone())),
            accounts: Arc::new(SqliteAccountStore::new(pool.clone())),
            sessions: SessionStore::new(pool),
            config,
            identity,
            oauth_states: Arc::new(Mutex::new(OAuthStateStore::new())),
        }
    }
}
