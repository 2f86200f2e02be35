//! Log repository: append-only build output keyed by build id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kiln_core::{LogEntry, ResourceId};
use sqlx::PgPool;

use crate::DbResult;

#[derive(Debug, Clone, sqlx::FromRow)]
struct LogRow {
    build_id: uuid::Uuid,
    timestamp: DateTime<Utc>,
    line: String,
}

impl From<LogRow> for LogEntry {
    fn from(row: LogRow) -> Self {
        LogEntry {
            build_id: row.build_id.into(),
            timestamp: row.timestamp,
            line: row.line,
        }
    }
}

#[async_trait]
pub trait LogRepo: Send + Sync {
    /// Append a line timestamped now.
    async fn append(&self, build_id: ResourceId, line: &str) -> DbResult<()>;

    /// Append several lines at once (batch insert).
    async fn append_batch(&self, build_id: ResourceId, lines: &[String]) -> DbResult<()>;

    /// All lines of a build, oldest first.
    async fn list_for_build(&self, build_id: ResourceId) -> DbResult<Vec<LogEntry>>;

    /// Delete every line of a build, returning how many were removed.
    async fn delete_for_build(&self, build_id: ResourceId) -> DbResult<u64>;
}

/// PostgreSQL implementation of LogRepo.
pub struct PgLogRepo {
    pool: PgPool,
}

impl PgLogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepo for PgLogRepo {
    async fn append(&self, build_id: ResourceId, line: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO build_logs (id, build_id, timestamp, line)
            VALUES ($1, $2, NOW(), $3)
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(build_id.as_uuid())
        .bind(line)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_batch(&self, build_id: ResourceId, lines: &[String]) -> DbResult<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut query_builder =
            sqlx::QueryBuilder::new("INSERT INTO build_logs (id, build_id, timestamp, line) ");
        query_builder.push_values(lines.iter(), |mut b, line| {
            b.push_bind(uuid::Uuid::now_v7())
                .push_bind(*build_id.as_uuid())
                .push_bind(Utc::now())
                .push_bind(line);
        });

        query_builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn list_for_build(&self, build_id: ResourceId) -> DbResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT build_id, timestamp, line
            FROM build_logs
            WHERE build_id = $1
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(build_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LogEntry::from).collect())
    }

    async fn delete_for_build(&self, build_id: ResourceId) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM build_logs WHERE build_id = $1")
            .bind(build_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
