//! Core domain types and traits for the kiln build service.
//!
//! This crate contains:
//! - Resource identifiers and error kinds
//! - Catalog types (components, command templates, execution pipelines)
//! - Build records and log entries
//! - The orchestration collaborator trait
//! - The bounded retry policy for optimistic-concurrency conflicts

pub mod build;
pub mod catalog;
pub mod component;
pub mod error;
pub mod id;
pub mod orchestration;
pub mod retry;
pub mod template;

pub use build::{BuildInfo, BuildRecord, BuildStatus, LogEntry, NewBuild};
pub use catalog::Catalog;
pub use component::{CommandTemplateInstance, Component, NewComponent};
pub use error::{Error, Result};
pub use id::ResourceId;
pub use retry::{RetryPolicy, Retryable};
pub use template::{CommandTemplate, ExecutionPipeline, NewCommandTemplate};
