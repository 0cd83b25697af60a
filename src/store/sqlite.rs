use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;

use super::{Store, StoreError};
use crate::tracking::{Registration, ResourceId, StateUpdate, TrackedResource};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE,
        target_price REAL NOT NULL,
        last_price REAL NOT NULL DEFAULT 0,
        last_checked TEXT,
        alert_sent INTEGER NOT NULL DEFAULT 0
    )
"#;

const SELECT_ALL: &str =
    "SELECT id, url, target_price, last_price, last_checked, alert_sent FROM products ORDER BY id";
const SELECT_BY_URL: &str =
    "SELECT id, url, target_price, last_price, last_checked, alert_sent FROM products WHERE url = ?";
const SELECT_BY_ID: &str =
    "SELECT id, url, target_price, last_price, last_checked, alert_sent FROM products WHERE id = ?";

/// SQLite-backed store
///
/// Every write is committed before the call returns. The pool hands each
/// concurrent check its own connection; SQLite orders the single-row writes.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Unavailable(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        tracing::info!(path = %path.display(), "SQLite store opened");
        Ok(Self { pool })
    }

    /// Wait for in-flight queries and close every connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

fn resource_from_row(row: &SqliteRow) -> Result<TrackedResource, sqlx::Error> {
    Ok(TrackedResource {
        id: ResourceId(row.try_get::<i64, _>("id")? as u64),
        locator: row.try_get("url")?,
        threshold: row.try_get("target_price")?,
        last_value: row.try_get("last_price")?,
        last_checked_at: row.try_get("last_checked")?,
        alert_active: row.try_get("alert_sent")?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_all(&self) -> Result<Vec<TrackedResource>, StoreError> {
        let rows = sqlx::query(SELECT_ALL).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| resource_from_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn create_if_absent(
        &self,
        locator: &str,
        threshold: f64,
    ) -> Result<Registration, StoreError> {
        if !threshold.is_finite() {
            return Err(StoreError::InvalidThreshold(threshold));
        }

        // The UNIQUE url column turns a duplicate insert into a no-op
        let inserted =
            sqlx::query("INSERT OR IGNORE INTO products (url, target_price) VALUES (?, ?)")
                .bind(locator)
                .bind(threshold)
                .execute(&self.pool)
                .await?;

        let row = sqlx::query(SELECT_BY_URL)
            .bind(locator)
            .fetch_one(&self.pool)
            .await?;
        let resource = resource_from_row(&row)?;
        let created = inserted.rows_affected() == 1;

        if created {
            tracing::debug!(resource_id = %resource.id, locator = %locator, "Resource registered");
        }
        Ok(Registration { resource, created })
    }

    async fn update_state(&self, id: ResourceId, update: StateUpdate) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE products SET last_price = ?, last_checked = ?, alert_sent = ? WHERE id = ?",
        )
        .bind(update.value)
        .bind(update.checked_at)
        .bind(update.alert_active)
        .bind(id.0 as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> Result<Option<TrackedResource>, StoreError> {
        let row = sqlx::query(SELECT_BY_ID)
            .bind(id.0 as i64)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(resource_from_row)
            .transpose()
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    use crate::monitor::testing::{RecordingNotifier, ScriptedFetcher};
    use crate::monitor::CheckEngine;

    async fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("pricewatch.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let (_dir, store) = open_temp().await;

        let first = store.create_if_absent("https://a.example", 10.0).await.unwrap();
        let second = store.create_if_absent("https://a.example", 99.0).await.unwrap();
        let other = store.create_if_absent("https://b.example", 20.0).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert!(other.created);
        assert_eq!(second.resource.id, first.resource.id);
        assert_eq!(second.resource.threshold, 10.0);
        assert_eq!(first.resource.last_value, 0.0);
        assert!(first.resource.last_checked_at.is_none());
        assert!(!first.resource.alert_active);
        assert!(other.resource.id > first.resource.id);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_registration() {
        let (_dir, store) = open_temp().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .create_if_absent("https://same.example", 5.0)
                        .await
                        .unwrap()
                        .created
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_state_and_get() {
        let (_dir, store) = open_temp().await;
        let id = store
            .create_if_absent("https://a.example", 10.0)
            .await
            .unwrap()
            .resource
            .id;

        let now = Utc::now();
        store
            .update_state(
                id,
                StateUpdate {
                    value: 8.5,
                    checked_at: now,
                    alert_active: true,
                },
            )
            .await
            .unwrap();

        let r = store.get(id).await.unwrap().unwrap();
        assert_eq!(r.last_value, 8.5);
        assert_eq!(r.last_checked_at.map(|t| t.timestamp()), Some(now.timestamp()));
        assert!(r.alert_active);

        assert!(store.get(ResourceId(999)).await.unwrap().is_none());
        assert_eq!(store.list_all().await.unwrap(), vec![r]);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let (_dir, store) = open_temp().await;
        let result = store
            .update_state(
                ResourceId(42),
                StateUpdate {
                    value: 1.0,
                    checked_at: Utc::now(),
                    alert_active: false,
                },
            )
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(ResourceId(42)))));
    }

    #[tokio::test]
    async fn test_rejects_non_finite_threshold() {
        let (_dir, store) = open_temp().await;
        let result = store.create_if_absent("https://a.example", f64::INFINITY).await;
        assert!(matches!(result, Err(StoreError::InvalidThreshold(_))));
    }

    #[tokio::test]
    async fn test_active_alert_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricewatch.db");
        let locator = "https://shop.example/item";

        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.always(locator, 450.0);
        let notifier = Arc::new(RecordingNotifier::new());

        let store = Arc::new(SqliteStore::open(&path).await.unwrap());
        store.create_if_absent(locator, 500.0).await.unwrap();
        let engine = CheckEngine::new(store.clone(), fetcher.clone(), notifier.clone())
            .with_recipients(vec!["buyer@example.com".to_string()]);
        let resource = store.list_all().await.unwrap().remove(0);
        assert!(engine.check(&resource).await.is_updated());
        assert_eq!(notifier.count(), 1);

        // Nothing beyond the committed writes carries over
        drop(engine);
        store.close().await;
        drop(store);

        let store = Arc::new(SqliteStore::open(&path).await.unwrap());
        let restored = store.list_all().await.unwrap().remove(0);
        assert!(restored.alert_active);
        assert_eq!(restored.last_value, 450.0);

        let engine = CheckEngine::new(store.clone(), fetcher, notifier.clone())
            .with_recipients(vec!["buyer@example.com".to_string()]);
        assert!(engine.check(&restored).await.is_updated());
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricewatch.db");

        let store = SqliteStore::open(&path).await.unwrap();
        let a = store.create_if_absent("https://a.example", 1.0).await.unwrap();
        store.close().await;

        let store = SqliteStore::open(&path).await.unwrap();
        let b = store.create_if_absent("https://b.example", 1.0).await.unwrap();
        assert!(b.resource.id > a.resource.id);
    }
}
