//! SQLite-backed session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tokobot_core::{error::StoreError, message::SessionBlob, shellexpand, traits::SessionStore};
use tracing::{debug, info};

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Durable session store: one row per client identity.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Connect to `url` (a `sqlite:` URL or a plain file path) and create the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let url = normalize_url(url)?;
        let in_memory = url.contains(":memory:");

        let opts = SqliteConnectOptions::from_str(&url)
            .map_err(|e| StoreError::Unavailable(format!("invalid store url: {e}")))?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            });

        // Every connection to `:memory:` is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(opts)
            .await
            .map_err(unavailable)?;

        Self::init_schema(&pool).await?;
        info!("Session store initialized at {url}");
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                client_id TEXT PRIMARY KEY,
                blob BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    /// When the session for `identity` was last saved.
    pub async fn last_saved(&self, identity: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT updated_at FROM sessions WHERE client_id = ?")
                .bind(identity)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        Ok(row.and_then(|(ts,)| {
            DateTime::parse_from_rfc3339(&ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }))
    }

    /// Close the pool. Later calls fail with `Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Accept `sqlite:` URLs as-is; turn paths into `sqlite:` URLs, creating the parent dir.
fn normalize_url(url: &str) -> Result<String, StoreError> {
    let url = url.trim();
    if url.starts_with("sqlite:") {
        return Ok(url.to_string());
    }

    let path = shellexpand(url);
    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
    }
    Ok(format!("sqlite:{path}"))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn save(&self, identity: &str, blob: &SessionBlob) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sessions (client_id, blob, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(client_id) DO UPDATE SET blob = excluded.blob, updated_at = excluded.updated_at",
        )
        .bind(identity)
        .bind(blob.as_bytes())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        debug!("saved session for {identity} ({} bytes)", blob.len());
        Ok(())
    }

    async fn extract(&self, identity: &str) -> Result<Option<SessionBlob>, StoreError> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT blob FROM sessions WHERE client_id = ?")
                .bind(identity)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(row.map(|(bytes,)| SessionBlob::new(bytes)))
    }

    async fn delete(&self, identity: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE client_id = ?")
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        debug!(
            "deleted session for {identity} ({} rows)",
            result.rows_affected()
        );
        Ok(())
    }

    async fn exists(&self, identity: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sessions WHERE client_id = ?")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn file_store(dir: &tempfile::TempDir) -> SqliteSessionStore {
        let path = dir.path().join("sessions.db");
        SqliteSessionStore::connect(path.to_str().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_then_extract_returns_same_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir).await;
        let blob = SessionBlob::new(vec![0, 1, 2, 255, 42]);

        store.save("tokobot", &blob).await.unwrap();
        let got = store.extract("tokobot").await.unwrap();
        assert_eq!(got, Some(blob));
    }

    #[tokio::test]
    async fn test_extract_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir).await;
        assert_eq!(store.extract("never-paired").await.unwrap(), None);
        assert!(!store.exists("never-paired").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir).await;
        store.save("id", &SessionBlob::new(b"old".to_vec())).await.unwrap();
        store.save("id", &SessionBlob::new(b"new".to_vec())).await.unwrap();
        store.save("id", &SessionBlob::new(b"new".to_vec())).await.unwrap();

        let got = store.extract("id").await.unwrap().unwrap();
        assert_eq!(got.as_bytes(), b"new");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir).await;
        store.save("id", &SessionBlob::new(b"x".to_vec())).await.unwrap();

        store.delete("id").await.unwrap();
        store.delete("id").await.unwrap();
        store.delete("unknown").await.unwrap();
        assert_eq!(store.extract("id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_identities_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir).await;
        store.save("a", &SessionBlob::new(b"aaa".to_vec())).await.unwrap();
        store.save("b", &SessionBlob::new(b"bbb".to_vec())).await.unwrap();
        store.delete("a").await.unwrap();

        assert_eq!(store.extract("a").await.unwrap(), None);
        assert_eq!(
            store.extract("b").await.unwrap().unwrap().as_bytes(),
            b"bbb"
        );
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = file_store(&dir).await;
            store.save("id", &SessionBlob::new(b"persisted".to_vec())).await.unwrap();
            store.close().await;
        }
        let reopened = file_store(&dir).await;
        assert_eq!(
            reopened.extract("id").await.unwrap().unwrap().as_bytes(),
            b"persisted"
        );
        assert!(reopened.last_saved("id").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir).await;
        store.close().await;

        let err = store
            .save("id", &SessionBlob::new(b"x".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.extract("id").await.is_err());
        assert!(store.delete("id").await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_url() {
        let store = SqliteSessionStore::connect("sqlite::memory:").await.unwrap();
        store.save("id", &SessionBlob::new(b"m".to_vec())).await.unwrap();
        assert!(store.exists("id").await.unwrap());
    }

    #[test]
    fn test_normalize_url_passthrough() {
        assert_eq!(
            normalize_url("sqlite:/var/lib/s.db").unwrap(),
            "sqlite:/var/lib/s.db"
        );
    }
}
