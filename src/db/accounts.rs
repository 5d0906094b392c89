use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Credential, UserAccount};
use crate::db::{blocking, StoreError};
use crate::state::DbPool;

/// Persistence for user accounts. Input validation happens in `auth`; this
/// layer only reports `StoreError::Conflict` when a username or external id
/// is already taken.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserAccount>, StoreError>;

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserAccount>, StoreError>;

    /// Usernames compare case-insensitively.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError>;

    async fn create_local(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserAccount, StoreError>;

    async fn create_external(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<UserAccount, StoreError>;
}

pub struct SqliteAccountStore {
    pool: DbPool,
}

impl SqliteAccountStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, username, password_hash, external_id, display_name, created_at";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<UserAccount> {
    let username: Option<String> = row.get(1)?;
    let password_hash: Option<String> = row.get(2)?;
    let external_id: Option<String> = row.get(3)?;

    let mut credentials = Vec::with_capacity(2);
    if let Some(password_hash) = password_hash {
        credentials.push(Credential::Local { password_hash });
    }
    if let Some(provider_id) = external_id {
        credentials.push(Credential::External { provider_id });
    }

    Ok(UserAccount {
        id: row.get(0)?,
        username,
        display_name: row.get(4)?,
        credentials,
        created_at: row.get(5)?,
    })
}

fn select_one(
    conn: &Connection,
    column: &str,
    value: &str,
) -> Result<Option<UserAccount>, StoreError> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = ?1"),
            params![value],
            account_from_row,
        )
        .optional()?;
    Ok(account)
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserAccount>, StoreError> {
        let id = id.to_string();
        blocking(&self.pool, move |conn| select_one(conn, "id", &id)).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserAccount>, StoreError> {
        let external_id = external_id.to_string();
        blocking(&self.pool, move |conn| {
            select_one(conn, "external_id", &external_id)
        })
        .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        let username = username.to_string();
        blocking(&self.pool, move |conn| select_one(conn, "username", &username)).await
    }

    async fn create_local(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserAccount, StoreError> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        blocking(&self.pool, move |conn| {
            let id = uuid::Uuid::now_v7().to_string();
            conn.execute(
                "INSERT INTO accounts (id, username, password_hash, display_name) \
                 VALUES (?1, ?2, ?3, ?2)",
                params![id, username, password_hash],
            )?;
            select_one(conn, "id", &id)?.ok_or(StoreError::Database(
                rusqlite::Error::QueryReturnedNoRows,
            ))
        })
        .await
    }

    async fn create_external(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<UserAccount, StoreError> {
        let external_id = external_id.to_string();
        let display_name = display_name.map(str::to_string);
        blocking(&self.pool, move |conn| {
            let id = uuid::Uuid::now_v7().to_string();
            conn.execute(
                "INSERT INTO accounts (id, external_id, display_name) VALUES (?1, ?2, ?3)",
                params![id, external_id, display_name],
            )?;
            select_one(conn, "id", &id)?.ok_or(StoreError::Database(
                rusqlite::Error::QueryReturnedNoRows,
            ))
        })
        .await
    }
}
