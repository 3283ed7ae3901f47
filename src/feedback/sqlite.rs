//! SQLite-based persistent storage for feedback records

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::store::{FeedbackBackend, FeedbackFilter};
use super::{FeedbackContext, FeedbackRecord};
use crate::error::{Error, Result};

/// SQLite feedback backend. One table, partitioned logically by `user_id`.
pub struct SqliteFeedbackBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFeedbackBackend {
    /// Open (or create) the database at the given path
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;
        debug!("Opened feedback database at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Database that lives only as long as this backend
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                feedback INTEGER NOT NULL,
                feedback_type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                context TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_feedback_user_time ON feedback(user_id, timestamp DESC);
        "#,
        )?;
        Ok(())
    }

    /// Total number of stored records across all users
    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM feedback", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FeedbackRecord> {
        let timestamp: String = row.get(5)?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        let context: String = row.get(6)?;
        let context: FeedbackContext = serde_json::from_str(&context)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

        Ok(FeedbackRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            query: row.get(2)?,
            response: row.get(3)?,
            helpful: row.get(4)?,
            context,
            timestamp,
        })
    }
}

#[async_trait]
impl FeedbackBackend for SqliteFeedbackBackend {
    async fn create(&self, record: &FeedbackRecord) -> Result<()> {
        let context = serde_json::to_string(&record.context).map_err(Error::storage)?;
        let conn = self.conn.lock().await;

        conn.execute(
            r#"INSERT INTO feedback
               (id, user_id, query, response, feedback, feedback_type, timestamp, context)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                record.id,
                record.user_id,
                record.query,
                record.response,
                record.helpful,
                record.feedback_type().as_str(),
                record.timestamp_string(),
                context,
            ],
        )?;

        Ok(())
    }

    async fn query(&self, filter: &FeedbackFilter, limit: usize) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(
            r#"SELECT id, user_id, query, response, feedback, timestamp, context
               FROM feedback
               WHERE user_id = ?1 AND (?2 IS NULL OR feedback = ?2)
               ORDER BY timestamp DESC, rowid DESC
               LIMIT ?3"#,
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![filter.user_id, filter.helpful, limit], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}
