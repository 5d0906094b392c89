use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::auth::session::generate_token;
use crate::auth::AuthError;
use crate::config::GoogleConfig;
use crate::db::accounts::AccountStore;
use crate::db::models::UserAccount;
use crate::db::StoreError;

const STATE_TTL: Duration = Duration::from_secs(300);
const MAX_PENDING_STATES: usize = 1024;

/// What the identity provider tells us about the person who signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    /// Stable subject id assigned by the provider.
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Identity provider is not configured")]
    NotConfigured,

    #[error("HTTP error talking to identity provider: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity provider returned an unusable profile")]
    InvalidProfile,
}

/// An OAuth authorization-code provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start signing in, or `None` when the
    /// provider has no client credentials.
    fn authorize_url(&self, state: &str) -> Option<Url>;

    /// Trade the callback's authorization code for the signed-in profile.
    async fn exchange(&self, code: &str) -> Result<ExternalProfile, ProviderError>;
}

pub struct GoogleProvider {
    client: reqwest::Client,
    config: GoogleConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    name: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> Option<Url> {
        let (Some(client_id), Some(_), Some(redirect_url)) = (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
            self.config.redirect_url.as_deref(),
        ) else {
            return None;
        };

        match Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_url),
                ("response_type", "code"),
                ("scope", "profile"),
                ("state", state),
            ],
        ) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::error!("Invalid Google auth_url {:?}: {}", self.config.auth_url, e);
                None
            }
        }
    }

    async fn exchange(&self, code: &str) -> Result<ExternalProfile, ProviderError> {
        let (Some(client_id), Some(client_secret), Some(redirect_url)) = (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
            self.config.redirect_url.as_deref(),
        ) else {
            return Err(ProviderError::NotConfigured);
        };

        let token: TokenResponse = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let info: UserInfo = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if info.sub.trim().is_empty() {
            return Err(ProviderError::InvalidProfile);
        }

        Ok(ExternalProfile {
            id: info.sub,
            display_name: info.name.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Outstanding OAuth `state` values. Each one is single-use and expires
/// after five minutes. At most `MAX_PENDING_STATES` are held; issuing past
/// that evicts the oldest.
pub struct OAuthStateStore {
    states: HashMap<String, Instant>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Mint and remember a fresh state value.
    pub fn issue(&mut self) -> String {
        self.clear_stale();
        while self.states.len() >= MAX_PENDING_STATES {
            let Some(oldest) = self
                .states
                .iter()
                .min_by_key(|(_, issued)| **issued)
                .map(|(state, _)| state.clone())
            else {
                break;
            };
            self.states.remove(&oldest);
        }

        let state = generate_token();
        self.states.insert(state.clone(), Instant::now());
        state
    }

    /// Consume a state value. True only if it was issued here and is still fresh.
    pub fn take(&mut self, state: &str) -> bool {
        self.clear_stale();
        self.states.remove(state).is_some()
    }

    fn clear_stale(&mut self) {
        let now = Instant::now();
        self.states
            .retain(|_, issued| now.duration_since(*issued) < STATE_TTL);
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Return the account bound to `profile.id`, creating it on first sight.
/// Safe to repeat: a concurrent insert of the same id loses on the unique
/// constraint and re-reads the winner.
pub async fn find_or_create_external(
    accounts: &dyn AccountStore,
    profile: &ExternalProfile,
) -> Result<UserAccount, AuthError> {
    if profile.id.trim().is_empty() {
        return Err(AuthError::InvalidInput("External identity id is empty".into()));
    }

    if let Some(account) = accounts.find_by_external_id(&profile.id).await? {
        return Ok(account);
    }

    match accounts
        .create_external(&profile.id, profile.display_name.as_deref())
        .await
    {
        Ok(account) => {
            tracing::info!(account_id = %account.id, "Created account for external identity");
            Ok(account)
        }
        Err(StoreError::Conflict) => accounts
            .find_by_external_id(&profile.id)
            .await?
            .ok_or(AuthError::DuplicateExternalIdentity),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::accounts::SqliteAccountStore;
    use crate::state::DbPool;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteAccountStore, DbPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (SqliteAccountStore::new(pool.clone()), pool, temp_dir)
    }

    fn profile(id: &str) -> ExternalProfile {
        ExternalProfile {
            id: id.to_string(),
            display_name: Some("Ada Lovelace".to_string()),
        }
    }

    fn configured() -> GoogleConfig {
        GoogleConfig {
            client_id: Some("client-1".into()),
            client_secret: Some("shh".into()),
            redirect_url: Some("http://localhost:3000/auth/external/callback".into()),
            ..GoogleConfig::default()
        }
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let (store, pool, _temp) = create_test_store();

        let first = find_or_create_external(&store, &profile("google-42"))
            .await
            .unwrap();
        let second = find_or_create_external(&store, &profile("google-42"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.external_id(), Some("google-42"));

        let count: i64 = pool
            .get()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM accounts WHERE external_id = 'google-42'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn concurrent_first_logins_share_one_account() {
        let (store, _pool, _temp) = create_test_store();
        let store = std::sync::Arc::new(store);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    find_or_create_external(store.as_ref(), &profile("google-7"))
                        .await
                        .unwrap()
                        .id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn empty_external_id_is_rejected() {
        let (store, _pool, _temp) = create_test_store();
        let err = find_or_create_external(&store, &profile("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
    }

    #[test]
    fn unconfigured_google_has_no_authorize_url() {
        let provider = GoogleProvider::new(GoogleConfig::default());
        assert!(provider.authorize_url("state").is_none());
    }

    #[test]
    fn authorize_url_requests_profile_scope_only() {
        let provider = GoogleProvider::new(configured());
        let url = provider.authorize_url("xyz").unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["scope"], "profile");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-1");
    }

    #[tokio::test]
    async fn unconfigured_exchange_fails() {
        let provider = GoogleProvider::new(GoogleConfig::default());
        let err = provider.exchange("code").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));
    }

    #[test]
    fn state_store_values_are_single_use() {
        let mut store = OAuthStateStore::new();
        let state = store.issue();
        assert!(store.take(&state));
        assert!(!store.take(&state));
        assert!(!store.take("never-issued"));
    }

    #[test]
    fn stale_states_are_rejected() {
        let mut store = OAuthStateStore::new();
        let state = store.issue();
        let Some(long_ago) = Instant::now().checked_sub(STATE_TTL + Duration::from_secs(1)) else {
            return;
        };
        if let Some(issued) = store.states.get_mut(&state) {
            *issued = long_ago;
        }
        assert!(!store.take(&state));
    }

    #[test]
    fn pending_states_are_capped_by_evicting_the_oldest() {
        let mut store = OAuthStateStore::new();
        let first = store.issue();
        if let (Some(issued), Some(earlier)) = (
            store.states.get_mut(&first),
            Instant::now().checked_sub(Duration::from_secs(1)),
        ) {
            *issued = earlier;
        }

        let mut last = String::new();
        for _ in 0..MAX_PENDING_STATES {
            last = store.issue();
        }

        assert_eq!(store.states.len(), MAX_PENDING_STATES);
        assert!(!store.take(&first));
        assert!(store.take(&last));
    }
}
