use async_trait::async_trait;
use rusqlite::{params, Connection, Row, TransactionBehavior};

use crate::db::models::{NewPost, Post};
use crate::db::{blocking, StoreError};
use crate::slug;
use crate::state::DbPool;

#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts in creation order.
    async fn list(&self) -> Result<Vec<Post>, StoreError>;

    /// Store a validated post, assigning its id and a unique slug.
    async fn create(&self, post: NewPost) -> Result<Post, StoreError>;
}

pub struct SqlitePostStore {
    pool: DbPool,
}

impl SqlitePostStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, title, body, slug, created_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        slug: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// First slug candidate for `title` that no stored post uses yet.
fn free_slug(conn: &Connection, title: &str) -> rusqlite::Result<String> {
    let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM posts WHERE slug = ?1)")?;
    let found = slug::candidates(title)
        .map(|candidate| {
            let taken: bool = stmt.query_row(params![candidate], |row| row.get(0))?;
            Ok::<_, rusqlite::Error>((!taken).then_some(candidate))
        })
        .find_map(Result::transpose);
    found.unwrap_or(Err(rusqlite::Error::QueryReturnedNoRows))
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn list(&self) -> Result<Vec<Post>, StoreError> {
        blocking(&self.pool, |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts ORDER BY rowid"))?;
            let posts = stmt
                .query_map([], post_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(posts)
        })
        .await
    }

    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        blocking(&self.pool, move |conn| {
            // Immediate so two writers cannot both claim the same free slug.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let slug = free_slug(&tx, post.title())?;
            let id = uuid::Uuid::now_v7().to_string();
            tx.execute(
                "INSERT INTO posts (id, title, body, slug) VALUES (?1, ?2, ?3, ?4)",
                params![id, post.title(), post.body(), slug],
            )?;
            let created = tx.query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id],
                post_from_row,
            )?;

            tx.commit()?;
            Ok(created)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    fn create_test_store() -> (SqlitePostStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (SqlitePostStore::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn list_is_empty_on_fresh_database() {
        let (store, _temp) = create_test_store();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_then_list_in_creation_order() {
        let (store, _temp) = create_test_store();

        let first = store
            .create(NewPost::new("First Post", "hello there").unwrap())
            .await
            .unwrap();
        store
            .create(NewPost::new("Second Post", "general kenobi").unwrap())
            .await
            .unwrap();

        assert_eq!(first.slug, "first-post");
        assert!(uuid::Uuid::parse_str(&first.id).is_ok());

        let titles: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["First Post", "Second Post"]);
    }

    #[tokio::test]
    async fn colliding_titles_get_numbered_slugs() {
        let (store, _temp) = create_test_store();

        let mut slugs = Vec::new();
        for title in ["Lorem Ipsum", "lorem ipsum", "LOREM--IPSUM"] {
            let post = store
                .create(NewPost::new(title, "body text").unwrap())
                .await
                .unwrap();
            slugs.push(post.slug);
        }

        assert_eq!(slugs, vec!["lorem-ipsum", "lorem-ipsum--2", "lorem-ipsum--3"]);

        let posts = store.list().await.unwrap();
        assert_eq!(slug::resolve("Lorem Ipsum", &posts).unwrap().title, "Lorem Ipsum");
        assert_eq!(slug::resolve("lorem-ipsum--3", &posts).unwrap().title, "LOREM--IPSUM");
    }

    #[tokio::test]
    async fn suffix_does_not_take_a_numbered_title_slug() {
        let (store, _temp) = create_test_store();

        let mut created = Vec::new();
        for (title, body) in [
            ("Lorem Ipsum", "the original"),
            ("Lorem Ipsum", "a duplicate"),
            ("Lorem Ipsum 2", "the sequel"),
        ] {
            created.push(store.create(NewPost::new(title, body).unwrap()).await.unwrap());
        }

        let slugs: Vec<&str> = created.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["lorem-ipsum", "lorem-ipsum--2", "lorem-ipsum-2"]);

        let posts = store.list().await.unwrap();
        assert_eq!(slug::resolve("lorem-ipsum-2", &posts).unwrap().body, "the sequel");
        assert_eq!(slug::resolve("lorem-ipsum--2", &posts).unwrap().body, "a duplicate");
        assert_eq!(slug::resolve("lorem-ipsum", &posts).unwrap().body, "the original");
    }

    #[tokio::test]
    async fn symbol_only_titles_get_numbered_fallback_slugs() {
        let (store, _temp) = create_test_store();
        let first = store
            .create(NewPost::new("???", "body text").unwrap())
            .await
            .unwrap();
        let second = store
            .create(NewPost::new("!!!", "body text").unwrap())
            .await
            .unwrap();
        assert_eq!(first.slug, "post--1");
        assert_eq!(second.slug, "post--2");
    }
}
