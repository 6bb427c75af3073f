/// SQLite document container
///
/// Stores every document as JSON in a single `documents` table:
/// - `seq`: creation sequence, used for recency ordering (kept across replaces)
/// - `id` / `partition_key`: lookup keys (the container is partitioned by id)
/// - `doc_type`: the `type` discriminator, indexed for collection queries
/// - `etag`: version token, rotated on every write
///
/// Conditional replaces are a single `UPDATE ... WHERE etag = ?` statement, so a
/// write either commits with a new etag or changes nothing.

use super::{
    document_id, document_type, BackendError, DocumentBackend, DocumentQuery, SortOrder,
    VersionToken,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite-backed document container with a pooled connection
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (or create) a database file and make sure the schema exists
    pub async fn connect(path: &Path) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePool::connect_with(options).await?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Private in-memory database on a single connection
    ///
    /// The connection is never recycled; closing it would drop the database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Create the documents table and its indexes
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                partition_key TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                body JSON NOT NULL,
                etag TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(doc_type, seq)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool, BackendError> {
        let row = sqlx::query("SELECT 1 FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        Ok(row.is_some())
    }
}

/// Sort transient failures from everything else
fn classify(err: sqlx::Error) -> BackendError {
    match err {
        err @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
            BackendError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(ref db) if db.message().contains("database is locked") => {
            BackendError::Unavailable(err.to_string())
        }
        other => BackendError::Other(other.into()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn encode(doc: &Value) -> Result<String, BackendError> {
    serde_json::to_string(doc).map_err(|e| BackendError::Rejected(e.to_string()))
}

fn decode(body: &str) -> Result<Value, BackendError> {
    serde_json::from_str(body)
        .map_err(|e| BackendError::Other(anyhow::anyhow!("stored document is not JSON: {}", e)))
}

#[async_trait]
impl DocumentBackend for SqliteBackend {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn create(&self, doc: Value) -> Result<VersionToken, BackendError> {
        let id = document_id(&doc)?;
        let body = encode(&doc)?;
        let etag = VersionToken::fresh();

        let result = sqlx::query(
            "INSERT INTO documents (id, partition_key, doc_type, body, etag) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&id)
        .bind(document_type(&doc))
        .bind(&body)
        .bind(etag.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(etag),
            Err(e) if is_unique_violation(&e) => Err(BackendError::AlreadyExists { id }),
            Err(e) => Err(classify(e)),
        }
    }

    async fn upsert(&self, doc: Value) -> Result<VersionToken, BackendError> {
        let id = document_id(&doc)?;
        let body = encode(&doc)?;
        let etag = VersionToken::fresh();

        sqlx::query(
            r#"
            INSERT INTO documents (id, partition_key, doc_type, body, etag)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                doc_type = excluded.doc_type,
                body = excluded.body,
                etag = excluded.etag,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&id)
        .bind(&id)
        .bind(document_type(&doc))
        .bind(&body)
        .bind(etag.as_str())
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(etag)
    }

    async fn read(
        &self,
        partition_key: &str,
        id: &str,
    ) -> Result<(Value, VersionToken), BackendError> {
        let row = sqlx::query("SELECT body, etag FROM documents WHERE id = ? AND partition_key = ?")
            .bind(id)
            .bind(partition_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        match row {
            Some(row) => {
                let body: String = row.get("body");
                let etag: String = row.get("etag");
                Ok((decode(&body)?, VersionToken::from(etag)))
            }
            None => Err(BackendError::NotFound { id: id.to_string() }),
        }
    }

    async fn conditional_replace(
        &self,
        doc: Value,
        expected: &VersionToken,
    ) -> Result<VersionToken, BackendError> {
        let id = document_id(&doc)?;
        let body = encode(&doc)?;
        let etag = VersionToken::fresh();

        let result = sqlx::query(
            r#"
            UPDATE documents
            SET doc_type = ?, body = ?, etag = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND etag = ?
            "#,
        )
        .bind(document_type(&doc))
        .bind(&body)
        .bind(etag.as_str())
        .bind(&id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        if result.rows_affected() > 0 {
            return Ok(etag);
        }
        if self.exists(&id).await? {
            Err(BackendError::VersionConflict { id })
        } else {
            Err(BackendError::NotFound { id })
        }
    }

    async fn delete(&self, partition_key: &str, id: &str) -> Result<(), BackendError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ? AND partition_key = ?")
            .bind(id)
            .bind(partition_key)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Value>, BackendError> {
        let sql = match query.order {
            SortOrder::CreatedDesc => "SELECT body FROM documents WHERE doc_type = ? ORDER BY seq DESC",
            SortOrder::CreatedAsc => "SELECT body FROM documents WHERE doc_type = ? ORDER BY seq ASC",
        };
        let rows = sqlx::query(sql)
            .bind(&query.doc_type)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let body: String = row.get("body");
            docs.push(decode(&body)?);
        }
        Ok(docs)
    }
}
