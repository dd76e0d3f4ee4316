use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};

/// Key the bookmarked URL list lives under.
pub const BOOKMARKS_KEY: &str = "newsdeskBookmarks";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not encode value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("bookmark URL must not be empty")]
    EmptyUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkOutcome {
    Added,
    AlreadyBookmarked,
}

impl BookmarkOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            BookmarkOutcome::Added => "Article bookmarked!",
            BookmarkOutcome::AlreadyBookmarked => "Article already bookmarked",
        }
    }
}

/// String key-value store backed by SQLite.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn bookmarks(&self) -> Result<Vec<String>, StoreError> {
        let raw = self.get(BOOKMARKS_KEY).await?;
        Ok(decode_bookmarks(raw.as_deref()))
    }

    /// Add `url` to the bookmark list unless it is already there.
    pub async fn bookmark_article(&self, url: &str) -> Result<BookmarkOutcome, StoreError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StoreError::EmptyUrl);
        }

        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(BOOKMARKS_KEY)
            .fetch_optional(&mut *tx)
            .await?;
        let mut bookmarks = decode_bookmarks(row.as_ref().map(|(value,)| value.as_str()));

        if bookmarks.iter().any(|b| b == url) {
            return Ok(BookmarkOutcome::AlreadyBookmarked);
        }

        bookmarks.push(url.to_string());
        let encoded = serde_json::to_string(&bookmarks)?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(BOOKMARKS_KEY)
        .bind(&encoded)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Bookmarked {}", url);
        Ok(BookmarkOutcome::Added)
    }
}

fn decode_bookmarks(raw: Option<&str>) -> Vec<String> {
    match raw {
        None => Vec::new(),
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!("Discarding unreadable bookmark list: {}", e);
            Vec::new()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    mod kv_tests {
        use super::*;

        #[tokio::test]
        async fn test_get_missing_key() {
            let db = create_test_db().await;
            assert_eq!(db.get("nothing").await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_set_then_get() {
            let db = create_test_db().await;
            db.set("theme", "dark").await.unwrap();
            assert_eq!(db.get("theme").await.unwrap().as_deref(), Some("dark"));
        }

        #[tokio::test]
        async fn test_set_overwrites() {
            let db = create_test_db().await;
            db.set("theme", "dark").await.unwrap();
            db.set("theme", "light").await.unwrap();
            assert_eq!(db.get("theme").await.unwrap().as_deref(), Some("light"));
        }

        #[tokio::test]
        async fn test_initialize_is_idempotent() {
            let db = create_test_db().await;
            db.set("k", "v").await.unwrap();
            db.initialize().await.unwrap();
            assert_eq!(db.get("k").await.unwrap().as_deref(), Some("v"));
        }
    }

    mod bookmark_tests {
        use super::*;

        #[tokio::test]
        async fn test_no_bookmarks_initially() {
            let db = create_test_db().await;
            assert!(db.bookmarks().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_bookmark_added() {
            let db = create_test_db().await;
            let outcome = db.bookmark_article("https://example.com/a").await.unwrap();

            assert_eq!(outcome, BookmarkOutcome::Added);
            assert_eq!(
                db.bookmarks().await.unwrap(),
                vec!["https://example.com/a".to_string()]
            );
        }

        #[tokio::test]
        async fn test_bookmark_twice_keeps_one_entry() {
            let db = create_test_db().await;
            db.bookmark_article("https://example.com/a").await.unwrap();
            let second = db.bookmark_article("https://example.com/a").await.unwrap();

            assert_eq!(second, BookmarkOutcome::AlreadyBookmarked);
            assert_eq!(db.bookmarks().await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_bookmarks_keep_insertion_order() {
            let db = create_test_db().await;
            for url in ["https://c.com", "https://a.com", "https://b.com"] {
                db.bookmark_article(url).await.unwrap();
            }
            assert_eq!(
                db.bookmarks().await.unwrap(),
                vec!["https://c.com", "https://a.com", "https://b.com"]
            );
        }

        #[tokio::test]
        async fn test_stored_as_json_array() {
            let db = create_test_db().await;
            db.bookmark_article("https://example.com/a").await.unwrap();
            assert_eq!(
                db.get(BOOKMARKS_KEY).await.unwrap().as_deref(),
                Some(r#"["https://example.com/a"]"#)
            );
        }

        #[tokio::test]
        async fn test_empty_url_rejected() {
            let db = create_test_db().await;
            let result = db.bookmark_article("   ").await;
            assert!(matches!(result, Err(StoreError::EmptyUrl)));
        }

        #[tokio::test]
        async fn test_corrupt_list_is_replaced() {
            let db = create_test_db().await;
            db.set(BOOKMARKS_KEY, "{ broken").await.unwrap();

            assert!(db.bookmarks().await.unwrap().is_empty());
            db.bookmark_article("https://example.com/a").await.unwrap();
            assert_eq!(db.bookmarks().await.unwrap().len(), 1);
        }

        #[test]
        fn test_outcome_messages() {
            assert_eq!(BookmarkOutcome::Added.message(), "Article bookmarked!");
            assert_eq!(
                BookmarkOutcome::AlreadyBookmarked.message(),
                "Article already bookmarked"
            );
        }
    }
}
