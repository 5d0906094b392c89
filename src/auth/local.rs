use crate::auth::{password, AuthError};
use crate::db::accounts::AccountStore;
use crate::db::models::UserAccount;
use crate::db::StoreError;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 32;
pub const PASSWORD_MIN_BYTES: usize = 8;
/// bcrypt ignores everything past 72 bytes.
pub const PASSWORD_MAX_BYTES: usize = 72;

/// Trim and check a requested username. Returns the form to store.
pub fn validate_username(raw: &str) -> Result<String, AuthError> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(AuthError::InvalidInput(format!(
            "Username must be {USERNAME_MIN_CHARS} to {USERNAME_MAX_CHARS} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(AuthError::InvalidInput(
            "Username may only contain letters, digits, '.', '_' and '-'".into(),
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(raw: &str) -> Result<(), AuthError> {
    if !(PASSWORD_MIN_BYTES..=PASSWORD_MAX_BYTES).contains(&raw.len()) {
        return Err(AuthError::InvalidInput(format!(
            "Password must be {PASSWORD_MIN_BYTES} to {PASSWORD_MAX_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Create an account with a bcrypt-hashed password.
pub async fn register_local(
    accounts: &dyn AccountStore,
    username: &str,
    raw_password: &str,
    cost: u32,
) -> Result<UserAccount, AuthError> {
    let username = validate_username(username)?;
    validate_password(raw_password)?;

    // Skip the hashing work for names that are obviously taken. The unique
    // constraint still decides races below.
    if accounts.find_by_username(&username).await?.is_some() {
        return Err(AuthError::DuplicateUsername);
    }

    let raw = raw_password.to_string();
    let hash = tokio::task::spawn_blocking(move || password::hash(&raw, cost)).await??;

    match accounts.create_local(&username, &hash).await {
        Ok(account) => {
            tracing::info!(account_id = %account.id, username = %username, "Registered local account");
            Ok(account)
        }
        Err(StoreError::Conflict) => Err(AuthError::DuplicateUsername),
        Err(e) => Err(e.into()),
    }
}

/// Check a username/password pair. Unknown users and wrong passwords fail
/// the same way and take the same bcrypt work.
pub async fn authenticate_local(
    accounts: &dyn AccountStore,
    username: &str,
    raw_password: &str,
    cost: u32,
) -> Result<UserAccount, AuthError> {
    let account = accounts.find_by_username(username.trim()).await?;
    let stored_hash = account
        .as_ref()
        .and_then(|a| a.password_hash())
        .map(str::to_string);

    let raw = raw_password.to_string();
    let verified = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => password::verify(&raw, &hash),
        None => {
            password::burn(&raw, cost);
            false
        }
    })
    .await?;

    match account {
        Some(account) if verified => Ok(account),
        _ => Err(AuthError::InvalidCredentials),
    }
}
