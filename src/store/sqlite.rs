//! SQLite-backed upload record store.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, SqlitePool};
use tracing::{debug, info};

use super::{NewUploadRecord, UploadRecord, UploadRecordStore, UploadRecordUpdate};
use crate::upload::UploadStatus;
use crate::{FiledropError, Result};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    size INTEGER NOT NULL,
    mime_type TEXT,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    uploaded_at TEXT NOT NULL,
    url TEXT
)";

const SELECT_COLUMNS: &str =
    "SELECT id, name, size, mime_type, status, progress, uploaded_at, url FROM uploads";

/// Upload records persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (or create) a database file and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening upload database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory upload database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl UploadRecordStore for SqliteRecordStore {
    async fn create(&self, record: &NewUploadRecord) -> Result<UploadRecord> {
        record.validate()?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO uploads (name, size, mime_type, status, progress, uploaded_at, url)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&record.name)
        .bind(record.size as i64)
        .bind(&record.mime_type)
        .bind(record.status.as_str())
        .bind(i64::from(record.progress))
        .bind(Utc::now())
        .bind(&record.url)
        .fetch_one(&self.pool)
        .await?;

        debug!(id, name = %record.name, "created upload record");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| FiledropError::NotFound(format!("upload record {id}")))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<UploadRecord>> {
        let row: Option<UploadRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UploadRecord::try_from).transpose()
    }

    async fn update(&self, id: i64, update: &UploadRecordUpdate) -> Result<UploadRecord> {
        if !update.is_empty() {
            let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE uploads SET ");
            let mut separated = query.separated(", ");

            if let Some(status) = update.status {
                separated.push("status = ");
                separated.push_bind_unseparated(status.as_str());
            }

            if let Some(progress) = update.progress {
                separated.push("progress = ");
                separated.push_bind_unseparated(i64::from(progress));
            }

            if let Some(ref url) = update.url {
                separated.push("url = ");
                separated.push_bind_unseparated(url.clone());
            }

            query.push(" WHERE id = ");
            query.push_bind(id);

            let result = query.build().execute(&self.pool).await?;
            if result.rows_affected() == 0 {
                return Err(FiledropError::NotFound(format!("upload record {id}")));
            }
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| FiledropError::NotFound(format!("upload record {id}")))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM uploads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<UploadRecord>> {
        let rows: Vec<UploadRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} ORDER BY uploaded_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UploadRecord::try_from).collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM uploads")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 as usize)
    }
}

#[derive(sqlx::FromRow)]
struct UploadRow {
    id: i64,
    name: String,
    size: i64,
    mime_type: Option<String>,
    status: String,
    progress: i64,
    uploaded_at: DateTime<Utc>,
    url: Option<String>,
}

impl TryFrom<UploadRow> for UploadRecord {
    type Error = FiledropError;

    fn try_from(row: UploadRow) -> Result<Self> {
        let status: UploadStatus = row
            .status
            .parse()
            .map_err(|e: FiledropError| FiledropError::Database(e.to_string()))?;

        Ok(UploadRecord {
            id: row.id,
            name: row.name,
            size: row.size.max(0) as u64,
            mime_type: row.mime_type,
            status,
            progress: row.progress.clamp(0, 100) as u8,
            uploaded_at: row.uploaded_at,
            url: row.url,
        })
    }
}
