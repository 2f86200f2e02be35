//! Build records: the build queue's unit of work.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, ResourceId};

/// Status of a build record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl BuildStatus {
    pub const TERMINAL: [BuildStatus; 2] = [BuildStatus::Success, BuildStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "PENDING",
            BuildStatus::InProgress => "IN_PROGRESS",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BuildStatus::Pending),
            "IN_PROGRESS" => Ok(BuildStatus::InProgress),
            "SUCCESS" => Ok(BuildStatus::Success),
            "FAILED" => Ok(BuildStatus::Failed),
            other => Err(Error::InvalidInput(format!("unknown build status: {}", other))),
        }
    }
}

/// Metadata assigned by the executor once a build pod exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub builder_name: Option<String>,
    pub scratch_location: Option<String>,
}

/// One scheduled attempt to build a component branch on one OS image.
///
/// `lock_time` and `locked_by` together form the claim token. Only the
/// worker holding an unexpired claim writes status or lock fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: ResourceId,
    pub component_id: ResourceId,
    pub branch_name: String,
    pub build_os: String,
    pub build_info: BuildInfo,
    pub build_status: BuildStatus,
    pub lock_time: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    /// Advanced on every claim and release; oldest is claimed first.
    pub last_process_time: DateTime<Utc>,
    pub version: i64,
    pub created_date: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_date: DateTime<Utc>,
    pub last_modified_by: String,
}

/// Fields supplied when a build is requested.
#[derive(Debug, Clone)]
pub struct NewBuild {
    pub component_id: ResourceId,
    pub branch_name: String,
    pub build_os: String,
    pub created_by: String,
}

impl BuildRecord {
    /// A fresh, unlocked PENDING record.
    pub fn pending(new: NewBuild) -> Self {
        let now = Utc::now();
        Self {
            id: ResourceId::new(),
            component_id: new.component_id,
            branch_name: new.branch_name,
            build_os: new.build_os,
            build_info: BuildInfo::default(),
            build_status: BuildStatus::Pending,
            lock_time: None,
            locked_by: None,
            last_process_time: now,
            version: 0,
            created_date: now,
            created_by: new.created_by.clone(),
            last_modified_date: now,
            last_modified_by: new.created_by,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_time.is_some()
    }

    /// Whether the build queue may hand this record to a worker at `now`.
    ///
    /// Terminal records are never eligible. An unlocked record is eligible.
    /// A locked record is eligible once its lock is older than
    /// `lock_timeout`, unless it is IN_PROGRESS: those are presumed to still
    /// be running and need an explicit force release.
    pub fn is_claimable(&self, now: DateTime<Utc>, lock_timeout: Duration) -> bool {
        if self.build_status.is_terminal() {
            return false;
        }
        match self.lock_time {
            None => true,
            Some(locked_at) => {
                locked_at < now - lock_timeout && self.build_status != BuildStatus::InProgress
            }
        }
    }
}

/// One line of build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub build_id: ResourceId,
    pub timestamp: DateTime<Utc>,
    pub line: String,
}
