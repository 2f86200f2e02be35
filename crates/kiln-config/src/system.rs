//! System configuration parsing.

use crate::kdl_util::{all_string_args, first_string_arg, first_u64_arg};
use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub orchestration: OrchestrationConfig,
    pub retry: RetryConfig,
    /// Catalog file seeded into the stores at startup.
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// No URL means the in-memory stores are used.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub lock_timeout: Duration,
    /// Number of independent claim loops.
    pub workers: usize,
    /// Worker identity prefix; generated when absent.
    pub worker_id: Option<String>,
    /// Artifact engine used to render the build payload.
    pub engine: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(60),
            workers: 1,
            worker_id: None,
            engine: "docker".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    pub namespace: String,
    pub builder_image: String,
    /// Command run in the builder container; empty uses the image entrypoint.
    pub builder_command: Vec<String>,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            namespace: "kiln-builds".to_string(),
            builder_image: "gcr.io/kaniko-project/executor:latest".to_string(),
            builder_command: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(50),
        }
    }
}

/// Parse system configuration from KDL text. Every field is optional.
pub fn parse_system_config(kdl: &str) -> ConfigResult<SystemConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = SystemConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "server" => {
                for child in children(node) {
                    if child.name().value() == "listen" {
                        config.server.listen = string_value(child, "server.listen")?;
                    }
                }
            }
            "database" => {
                for child in children(node) {
                    match child.name().value() {
                        "url" => config.database.url = Some(string_value(child, "database.url")?),
                        "max-connections" => {
                            if let Some(n) = first_u64_arg(child, "database.max-connections")? {
                                config.database.max_connections = narrow(n, "max-connections")?;
                            }
                        }
                        _ => {}
                    }
                }
            }
            "scheduler" => parse_scheduler(node, &mut config.scheduler)?,
            "orchestration" => {
                for child in children(node) {
                    match child.name().value() {
                        "namespace" => {
                            config.orchestration.namespace =
                                string_value(child, "orchestration.namespace")?
                        }
                        "builder-image" => {
                            config.orchestration.builder_image =
                                string_value(child, "orchestration.builder-image")?
                        }
                        "builder-command" => {
                            config.orchestration.builder_command = all_string_args(child)
                        }
                        _ => {}
                    }
                }
            }
            "retry" => {
                for child in children(node) {
                    match child.name().value() {
                        "max-attempts" => {
                            if let Some(n) = first_u64_arg(child, "retry.max-attempts")? {
                                config.retry.max_attempts = narrow(n, "max-attempts")?;
                            }
                        }
                        "delay-ms" => {
                            if let Some(ms) = first_u64_arg(child, "retry.delay-ms")? {
                                config.retry.delay = Duration::from_millis(ms);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "catalog" => {
                config.catalog = Some(PathBuf::from(string_value(node, "catalog")?));
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if config.scheduler.workers == 0 {
        return Err(ConfigError::InvalidValue {
            field: "scheduler.workers".to_string(),
            message: "at least one worker is required".to_string(),
        });
    }

    Ok(config)
}

/// Read and parse a system configuration file.
pub fn load_system_config(path: &Path) -> ConfigResult<SystemConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_system_config(&content)
}

fn parse_scheduler(node: &KdlNode, scheduler: &mut SchedulerConfig) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "poll-interval-ms" => {
                if let Some(ms) = first_u64_arg(child, "scheduler.poll-interval-ms")? {
                    scheduler.poll_interval = Duration::from_millis(ms);
                }
            }
            "lock-timeout-ms" => {
                if let Some(ms) = first_u64_arg(child, "scheduler.lock-timeout-ms")? {
                    scheduler.lock_timeout = Duration::from_millis(ms);
                }
            }
            "workers" => {
                if let Some(n) = first_u64_arg(child, "scheduler.workers")? {
                    scheduler.workers = narrow(n, "workers")?;
                }
            }
            "worker-id" => scheduler.worker_id = Some(string_value(child, "scheduler.worker-id")?),
            "engine" => scheduler.engine = string_value(child, "scheduler.engine")?,
            _ => {}
        }
    }
    Ok(())
}

fn children(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes())
}

fn string_value(node: &KdlNode, field: &str) -> ConfigResult<String> {
    first_string_arg(node).ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        message: "expected a string argument".to_string(),
    })
}

fn narrow<T: TryFrom<u64>>(value: u64, field: &str) -> ConfigResult<T> {
    T::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("{} is out of range", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_system_config("").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:3000");
        assert!(config.database.url.is_none());
        assert_eq!(config.scheduler.poll_interval, Duration::from_secs(5));
        assert_eq!(config.scheduler.lock_timeout, Duration::from_secs(60));
        assert_eq!(config.scheduler.engine, "docker");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            server {
                listen "127.0.0.1:8080"
            }
            database {
                url "postgres://kiln@localhost/kiln"
                max-connections 4
            }
            scheduler {
                poll-interval-ms 1000
                lock-timeout-ms 30000
                workers 3
                worker-id "node-a"
                engine "ssh"
            }
            orchestration {
                namespace "ci"
                builder-image "kiln/builder:1"
                builder-command "/bin/sh" "-c" "build"
            }
            retry {
                max-attempts 5
                delay-ms 10
            }
            catalog "catalog.kdl"
        "#;

        let config = parse_system_config(kdl).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://kiln@localhost/kiln")
        );
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.scheduler.poll_interval, Duration::from_secs(1));
        assert_eq!(config.scheduler.lock_timeout, Duration::from_secs(30));
        assert_eq!(config.scheduler.workers, 3);
        assert_eq!(config.scheduler.worker_id.as_deref(), Some("node-a"));
        assert_eq!(config.scheduler.engine, "ssh");
        assert_eq!(config.orchestration.namespace, "ci");
        assert_eq!(config.orchestration.builder_command, vec!["/bin/sh", "-c", "build"]);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_millis(10));
        assert_eq!(config.catalog, Some(PathBuf::from("catalog.kdl")));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = parse_system_config("scheduler { workers 0 }");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let result = parse_system_config("scheduler { lock-timeout-ms -5 }");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
