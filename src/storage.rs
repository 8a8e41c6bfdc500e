//! Transactional relational persistence of ranked trend snapshots.
//!
//! Schema is three tables (`snapshots` -> `trends` -> `trend_items`) with
//! `ON DELETE CASCADE` so retention pruning is a single `DELETE` against
//! `snapshots`. Every `save()` runs in one transaction; a periodic `VACUUM`
//! runs in its own transaction every `vacuum_every` successful saves.

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::errors::StorageError;
use crate::model::Trend;

const INIT_SQL: &str = include_str!("../migrations/0001_init.sql");

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: String,
    pub retention: Option<ChronoDuration>,
    pub vacuum_every: u64,
}

impl StorageConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            retention: None,
            vacuum_every: 500,
        }
    }
}

pub struct SnapshotStore {
    pool: SqlitePool,
    config: StorageConfig,
    save_count: AtomicU64,
}

impl SnapshotStore {
    pub async fn open(config: StorageConfig) -> Result<Self, StorageError> {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        for statement in INIT_SQL.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self {
            pool,
            config,
            save_count: AtomicU64::new(0),
        })
    }

    /// Insert one snapshot row plus its trends and contributing items,
    /// atomically, then prune snapshots older than `retention` if configured.
    pub async fn save(&self, trends: &[Trend], generated_at: NaiveDateTime) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let generated_at_str = truncate_to_seconds(generated_at);
        let snapshot_id: i64 = sqlx::query_scalar(
            "INSERT INTO snapshots (generated_at) VALUES (?) RETURNING id",
        )
        .bind(&generated_at_str)
        .fetch_one(&mut *tx)
        .await?;

        for trend in trends {
            let trend_id: i64 = sqlx::query_scalar(
                "INSERT INTO trends (snapshot_id, keyword, score) VALUES (?, ?, ?) RETURNING id",
            )
            .bind(snapshot_id)
            .bind(&trend.keyword)
            .bind(trend.score)
            .fetch_one(&mut *tx)
            .await?;

            for item in &trend.items {
                sqlx::query(
                    "INSERT INTO trend_items (trend_id, title, url, published, summary) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(trend_id)
                .bind(&item.title)
                .bind(&item.url)
                .bind(truncate_to_seconds(item.published))
                .bind(&item.summary)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(retention) = self.config.retention {
            let threshold = truncate_to_seconds(generated_at - retention);
            sqlx::query("DELETE FROM snapshots WHERE generated_at < ?")
                .bind(threshold)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let count = self.save_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.vacuum_every > 0 && count % self.config.vacuum_every == 0 {
            self.vacuum().await?;
        }

        Ok(())
    }

    async fn vacuum(&self) -> Result<(), StorageError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn snapshot_count(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn truncate_to_seconds(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceItem;
    use chrono::NaiveDate;

    fn item(title: &str) -> SourceItem {
        SourceItem {
            id: title.to_string(),
            title: title.to_string(),
            url: "https://example.com".to_string(),
            published: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            summary: None,
            language: Some("en".to_string()),
        }
    }

    async fn temp_store(retention: Option<ChronoDuration>) -> SnapshotStore {
        let path = std::env::temp_dir().join(format!("trend_monitor_test_{}.sqlite", unique_suffix()));
        let mut config = StorageConfig::new(path.to_string_lossy().to_string());
        config.retention = retention;
        config.vacuum_every = 500;
        SnapshotStore::open(config).await.unwrap()
    }

    fn unique_suffix() -> String {
        format!("{:x}", std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos())
    }

    #[tokio::test]
    async fn save_persists_snapshot_trend_and_items() {
        let store = temp_store(None).await;
        let trends = vec![Trend {
            keyword: "run".to_string(),
            score: 1.6,
            items: vec![item("Run breaking news")],
        }];
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        store.save(&trends, now).await.unwrap();
        assert_eq!(store.snapshot_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn retention_prunes_older_snapshots() {
        let store = temp_store(Some(ChronoDuration::hours(1))).await;
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        store.save(&[], t0).await.unwrap();
        store.save(&[], t0 + ChronoDuration::minutes(30)).await.unwrap();
        store.save(&[], t0 + ChronoDuration::hours(2)).await.unwrap();
        assert_eq!(store.snapshot_count().await.unwrap(), 1);
    }
}
