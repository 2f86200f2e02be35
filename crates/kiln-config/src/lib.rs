//! KDL configuration parsing for kiln.
//!
//! This crate handles parsing of:
//! - System configuration (kiln.kdl)
//! - Catalog files declaring command templates and components by name

pub mod catalog;
pub mod error;
mod kdl_util;
pub mod system;

pub use catalog::{CatalogFile, parse_catalog};
pub use error::{ConfigError, ConfigResult};
pub use system::{
    DatabaseConfig, OrchestrationConfig, RetryConfig, SchedulerConfig, ServerConfig,
    SystemConfig, load_system_config, parse_system_config,
};
