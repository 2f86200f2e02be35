//! Build queue: exclusive, time-bounded claims on build records.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use kiln_core::{BuildInfo, BuildRecord, BuildStatus, ResourceId};
use kiln_db::{BuildRow, DbResult, MemoryBuildStore};
use sqlx::PgPool;
use std::sync::Arc;

/// Hands build records to workers with mutual exclusion.
///
/// `claim_next` is the only operation that must be linearizable across
/// workers. Every other operation touches a single record and is safe under
/// ordinary row-level isolation.
#[async_trait]
pub trait BuildQueue: Send + Sync {
    /// Atomically claim the eligible record with the oldest
    /// `last_process_time`.
    ///
    /// Eligible means non-terminal and either unlocked, or locked longer
    /// than `lock_timeout` ago and not IN_PROGRESS.
    async fn claim_next(
        &self,
        worker_id: &str,
        lock_timeout: Duration,
    ) -> DbResult<Option<BuildRecord>>;

    /// Clear the claim and leave the status as is.
    ///
    /// Returns `false` if the record no longer exists.
    async fn release(&self, id: ResourceId) -> DbResult<bool>;

    /// Clear the claim and set a new status.
    async fn release_with_status(&self, id: ResourceId, status: BuildStatus) -> DbResult<bool>;

    /// Attach executor metadata without touching the claim.
    async fn update_build_info(&self, id: ResourceId, info: &BuildInfo) -> DbResult<bool>;

    /// Operational recovery for an IN_PROGRESS build whose worker died:
    /// clear the claim and put it back to PENDING.
    ///
    /// `released_by` is recorded as the last modifier.
    /// Returns `false` unless the record exists and is IN_PROGRESS.
    async fn force_release(&self, id: ResourceId, released_by: &str) -> DbResult<bool>;
}

/// Build queue backed by PostgreSQL.
pub struct PgBuildQueue {
    pool: PgPool,
}

impl PgBuildQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn as_seconds(timeout: Duration) -> f64 {
    timeout.num_milliseconds() as f64 / 1000.0
}

#[async_trait]
impl BuildQueue for PgBuildQueue {
    /// Uses SKIP LOCKED so concurrent workers never wait on, or claim, the
    /// same row.
    async fn claim_next(
        &self,
        worker_id: &str,
        lock_timeout: Duration,
    ) -> DbResult<Option<BuildRecord>> {
        let row = sqlx::query_as::<_, BuildRow>(
            r#"
            UPDATE builds
            SET lock_time = NOW(),
                locked_by = $1,
                last_process_time = NOW(),
                version = version + 1,
                last_modified_date = NOW(),
                last_modified_by = $1
            WHERE id = (
                SELECT id FROM builds
                WHERE build_status NOT IN ('SUCCESS', 'FAILED')
                  AND (
                    lock_time IS NULL
                    OR (lock_time < NOW() - make_interval(secs => $2)
                        AND build_status <> 'IN_PROGRESS')
                  )
                ORDER BY last_process_time ASC, id ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(as_seconds(lock_timeout))
        .fetch_optional(&self.pool)
        .await?;

        row.map(BuildRecord::try_from).transpose()
    }

    async fn release(&self, id: ResourceId) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE builds
            SET lock_time = NULL,
                locked_by = NULL,
                last_process_time = NOW(),
                version = version + 1,
                last_modified_date = NOW(),
                last_modified_by = COALESCE(locked_by, last_modified_by)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_with_status(&self, id: ResourceId, status: BuildStatus) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE builds
            SET build_status = $2,
                lock_time = NULL,
                locked_by = NULL,
                last_process_time = NOW(),
                version = version + 1,
                last_modified_date = NOW(),
                last_modified_by = COALESCE(locked_by, last_modified_by)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_build_info(&self, id: ResourceId, info: &BuildInfo) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE builds
            SET builder_name = $2,
                scratch_location = $3,
                version = version + 1,
                last_modified_date = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&info.builder_name)
        .bind(&info.scratch_location)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn force_release(&self, id: ResourceId, released_by: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE builds
            SET build_status = 'PENDING',
                lock_time = NULL,
                locked_by = NULL,
                last_process_time = NOW(),
                version = version + 1,
                last_modified_date = NOW(),
                last_modified_by = $2
            WHERE id = $1 AND build_status = 'IN_PROGRESS'
            "#,
        )
        .bind(id.as_uuid())
        .bind(released_by)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Build queue over the in-memory build store.
///
/// Each operation runs under the store's lock, which makes the claim a
/// single atomic find-and-update.
pub struct MemoryBuildQueue {
    store: Arc<MemoryBuildStore>,
}

impl MemoryBuildQueue {
    pub fn new(store: Arc<MemoryBuildStore>) -> Self {
        Self { store }
    }

    async fn modify(
        &self,
        id: ResourceId,
        apply: impl FnOnce(&mut BuildRecord) -> bool + Send,
    ) -> bool {
        let mut builds = self.store.lock().await;
        match builds.get_mut(&id) {
            Some(build) => {
                if !apply(build) {
                    return false;
                }
                build.version += 1;
                build.last_modified_date = Utc::now();
                true
            }
            None => false,
        }
    }
}

fn unlock(build: &mut BuildRecord) {
    if let Some(owner) = build.locked_by.take() {
        build.last_modified_by = owner;
    }
    build.lock_time = None;
    build.last_process_time = Utc::now();
}

#[async_trait]
impl BuildQueue for MemoryBuildQueue {
    async fn claim_next(
        &self,
        worker_id: &str,
        lock_timeout: Duration,
    ) -> DbResult<Option<BuildRecord>> {
        let mut builds = self.store.lock().await;
        let now = Utc::now();

        let next = builds
            .values_mut()
            .filter(|b| b.is_claimable(now, lock_timeout))
            .min_by(|a, b| {
                a.last_process_time
                    .cmp(&b.last_process_time)
                    .then(a.id.cmp(&b.id))
            });

        Ok(next.map(|build| {
            build.lock_time = Some(now);
            build.locked_by = Some(worker_id.to_string());
            build.last_process_time = now;
            build.version += 1;
            build.last_modified_date = now;
            build.last_modified_by = worker_id.to_string();
            build.clone()
        }))
    }

    async fn release(&self, id: ResourceId) -> DbResult<bool> {
        Ok(self
            .modify(id, |build| {
                unlock(build);
                true
            })
            .await)
    }

    async fn release_with_status(&self, id: ResourceId, status: BuildStatus) -> DbResult<bool> {
        Ok(self
            .modify(id, |build| {
                unlock(build);
                build.build_status = status;
                true
            })
            .await)
    }

    async fn update_build_info(&self, id: ResourceId, info: &BuildInfo) -> DbResult<bool> {
        let info = info.clone();
        Ok(self
            .modify(id, move |build| {
                build.build_info = info;
                true
            })
            .await)
    }

    async fn force_release(&self, id: ResourceId, released_by: &str) -> DbResult<bool> {
        Ok(self
            .modify(id, |build| {
                if build.build_status != BuildStatus::InProgress {
                    return false;
                }
                build.locked_by = None;
                build.lock_time = None;
                build.build_status = BuildStatus::Pending;
                build.last_process_time = Utc::now();
                build.last_modified_by = released_by.to_string();
                true
            })
            .await)
    }
}
