use axum::http::{header, HeaderMap};
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::models::UserAccount;
use crate::db::{blocking, StoreError};
use crate::extractors::CurrentUser;
use crate::state::DbPool;

/// What a session row remembers about its account. Credentials never go in
/// here; the handful of fields is enough to render a page for the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl SessionPayload {
    pub fn from_account(account: &UserAccount) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            display_name: account.display_name.clone(),
        }
    }

    pub fn into_user(self) -> CurrentUser {
        CurrentUser {
            id: self.id,
            username: self.username,
            display_name: self.display_name,
        }
    }
}

/// Server-side session rows, addressed by the opaque token in the cookie.
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
}

impl SessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a session for `payload`. Returns the session token.
    pub async fn create(&self, payload: &SessionPayload, hours: u64) -> Result<String, StoreError> {
        let payload_json = serde_json::to_string(payload)?;
        let account_id = payload.id.clone();

        blocking(&self.pool, move |conn| {
            conn.execute(
                "DELETE FROM sessions WHERE expires_at <= datetime('now')",
                [],
            )?;

            let token = generate_token();
            let id = uuid::Uuid::now_v7().to_string();
            conn.execute(
                "INSERT INTO sessions (id, token, account_id, payload, expires_at) \
                 VALUES (?1, ?2, ?3, ?4, datetime('now', ?5))",
                params![id, token, account_id, payload_json, format!("+{} hours", hours)],
            )?;
            Ok(token)
        })
        .await
    }

    /// Payload of a live session, or `None` if the token is unknown or expired.
    pub async fn load(&self, token: &str) -> Result<Option<SessionPayload>, StoreError> {
        let token = token.to_string();
        let payload_json: Option<String> = blocking(&self.pool, move |conn| {
            let json = conn
                .query_row(
                    "SELECT payload FROM sessions \
                     WHERE token = ?1 AND expires_at > datetime('now')",
                    params![token],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(json)
        })
        .await?;

        Ok(payload_json.and_then(|json| match serde_json::from_str(&json) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!("Discarding unreadable session payload: {}", e);
                None
            }
        }))
    }

    /// Delete a session by token.
    pub async fn delete(&self, token: &str) -> Result<(), StoreError> {
        let token = token.to_string();
        blocking(&self.pool, move |conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(())
        })
        .await
    }
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

// -- Cookie helpers --

pub fn session_cookie(name: &str, token: &str, max_age_hours: u64, secure: bool) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        name,
        token,
        max_age_secs,
        secure_suffix(secure)
    )
}

pub fn clear_cookie(name: &str, path: &str, secure: bool) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path={}; Max-Age=0{}",
        name,
        path,
        secure_suffix(secure)
    )
}

pub fn secure_suffix(secure: bool) -> &'static str {
    if secure {
        "; Secure"
    } else {
        ""
    }
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}
