//! Build scheduling for kiln.
//!
//! Builds are claimed from the queue with an atomic conditional update and
//! advanced one step per claim by the lifecycle. Uses PostgreSQL with
//! SKIP LOCKED for distributed claiming.

pub mod lifecycle;
pub mod queue;
pub mod worker;

pub use lifecycle::{BuildLifecycle, LifecycleSettings, Transition};
pub use queue::{BuildQueue, MemoryBuildQueue, PgBuildQueue};
pub use worker::{Worker, spawn_workers};
