//! Build record repository.
//!
//! Plain create/read/delete. Claiming and releasing builds is the build
//! queue's job and lives in the scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kiln_core::{BuildInfo, BuildRecord, BuildStatus, NewBuild, ResourceId};
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// Database row for builds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BuildRow {
    pub id: uuid::Uuid,
    pub component_id: uuid::Uuid,
    pub branch_name: String,
    pub build_os: String,
    pub builder_name: Option<String>,
    pub scratch_location: Option<String>,
    pub build_status: String,
    pub lock_time: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub last_process_time: DateTime<Utc>,
    pub version: i64,
    pub created_date: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_date: DateTime<Utc>,
    pub last_modified_by: String,
}

impl TryFrom<BuildRow> for BuildRecord {
    type Error = DbError;

    fn try_from(row: BuildRow) -> Result<Self, Self::Error> {
        let build_status: BuildStatus = row
            .build_status
            .parse()
            .map_err(|e: kiln_core::Error| DbError::Corrupt(format!("build {}: {}", row.id, e)))?;

        Ok(BuildRecord {
            id: row.id.into(),
            component_id: row.component_id.into(),
            branch_name: row.branch_name,
            build_os: row.build_os,
            build_info: BuildInfo {
                builder_name: row.builder_name,
                scratch_location: row.scratch_location,
            },
            build_status,
            lock_time: row.lock_time,
            locked_by: row.locked_by,
            last_process_time: row.last_process_time,
            version: row.version,
            created_date: row.created_date,
            created_by: row.created_by,
            last_modified_date: row.last_modified_date,
            last_modified_by: row.last_modified_by,
        })
    }
}

#[async_trait]
pub trait BuildRepo: Send + Sync {
    /// Insert PENDING records, all or nothing.
    async fn create_many(&self, builds: Vec<NewBuild>) -> DbResult<Vec<BuildRecord>>;
    async fn get_by_id(&self, id: ResourceId) -> DbResult<BuildRecord>;
    async fn list_for_branch(
        &self,
        component_id: ResourceId,
        branch_name: &str,
    ) -> DbResult<Vec<BuildRecord>>;
    /// Delete a record if it still has `expected_version`.
    ///
    /// Fails with `WriteConflict` when the record changed since it was read.
    async fn delete(&self, id: ResourceId, expected_version: i64) -> DbResult<()>;
}

/// PostgreSQL implementation of BuildRepo.
pub struct PgBuildRepo {
    pool: PgPool,
}

impl PgBuildRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildRepo for PgBuildRepo {
    async fn create_many(&self, builds: Vec<NewBuild>) -> DbResult<Vec<BuildRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(builds.len());

        for new in builds {
            let row = sqlx::query_as::<_, BuildRow>(
                r#"
                INSERT INTO builds (
                    id, component_id, branch_name, build_os, build_status,
                    last_process_time, version, created_date, created_by,
                    last_modified_date, last_modified_by
                )
                VALUES ($1, $2, $3, $4, 'PENDING', NOW(), 0, NOW(), $5, NOW(), $5)
                RETURNING *
                "#,
            )
            .bind(uuid::Uuid::now_v7())
            .bind(new.component_id.as_uuid())
            .bind(&new.branch_name)
            .bind(&new.build_os)
            .bind(&new.created_by)
            .fetch_one(&mut *tx)
            .await?;
            created.push(BuildRecord::try_from(row)?);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_by_id(&self, id: ResourceId) -> DbResult<BuildRecord> {
        let row = sqlx::query_as::<_, BuildRow>("SELECT * FROM builds WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("build {}", id)))?;
        row.try_into()
    }

    async fn list_for_branch(
        &self,
        component_id: ResourceId,
        branch_name: &str,
    ) -> DbResult<Vec<BuildRecord>> {
        let rows = sqlx::query_as::<_, BuildRow>(
            r#"
            SELECT * FROM builds
            WHERE component_id = $1 AND branch_name = $2
            ORDER BY created_date DESC
            "#,
        )
        .bind(component_id.as_uuid())
        .bind(branch_name)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BuildRecord::try_from).collect()
    }

    async fn delete(&self, id: ResourceId, expected_version: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM builds WHERE id = $1 AND version = $2")
            .bind(id.as_uuid())
            .bind(expected_version)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM builds WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Err(DbError::WriteConflict(format!(
                "build {} changed since version {}",
                id, expected_version
            )))
        } else {
            Err(DbError::NotFound(format!("build {}", id)))
        }
    }
}
