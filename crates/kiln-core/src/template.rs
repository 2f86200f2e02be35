//! Command templates and their execution pipelines.

use serde::{Deserialize, Serialize};

use crate::ResourceId;

/// A named, parameterized set of OS/architecture-scoped command pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub id: ResourceId,
    /// Unique name.
    pub name: String,
    /// Components whose commands must run before this template's.
    #[serde(default)]
    pub depend_on: Vec<ResourceId>,
    pub pipelines: Vec<ExecutionPipeline>,
}

/// One engine/OS/architecture-scoped ordered list of commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPipeline {
    /// Engine tag, e.g. "docker" or "ssh".
    pub engine: String,
    /// Applicable architectures; empty matches any architecture.
    #[serde(default)]
    pub architectures: Vec<String>,
    pub operating_systems: Vec<String>,
    /// Commands with `${name}` placeholders.
    pub commands: Vec<String>,
}

/// Fields accepted when creating a command template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCommandTemplate {
    pub name: String,
    #[serde(default)]
    pub depend_on: Vec<ResourceId>,
    #[serde(default)]
    pub pipelines: Vec<ExecutionPipeline>,
}

impl CommandTemplate {
    pub fn from_new(new: NewCommandTemplate) -> Self {
        Self {
            id: ResourceId::new(),
            name: new.name,
            depend_on: new.depend_on,
            pipelines: new.pipelines,
        }
    }
}

impl ExecutionPipeline {
    /// Whether this pipeline contributes commands for the given target.
    ///
    /// The OS must be listed. The architecture is only checked when one is
    /// requested and the pipeline restricts architectures at all.
    pub fn applies_to(&self, os: &str, arch: Option<&str>) -> bool {
        if !self.operating_systems.iter().any(|o| o == os) {
            return false;
        }
        match arch {
            Some(arch) if !self.architectures.is_empty() => {
                self.architectures.iter().any(|a| a == arch)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(os: &[&str], arch: &[&str]) -> ExecutionPipeline {
        ExecutionPipeline {
            engine: "docker".to_string(),
            architectures: arch.iter().map(|s| s.to_string()).collect(),
            operating_systems: os.iter().map(|s| s.to_string()).collect(),
            commands: vec!["true".to_string()],
        }
    }

    #[test]
    fn test_os_must_be_listed() {
        let p = pipeline(&["ubuntu", "debian"], &[]);
        assert!(p.applies_to("debian", None));
        assert!(!p.applies_to("alpine", None));
    }

    #[test]
    fn test_arch_filter() {
        let p = pipeline(&["ubuntu"], &["amd64"]);
        assert!(p.applies_to("ubuntu", Some("amd64")));
        assert!(!p.applies_to("ubuntu", Some("arm64")));
        assert!(p.applies_to("ubuntu", None));
    }

    #[test]
    fn test_empty_arch_list_matches_any() {
        let p = pipeline(&["ubuntu"], &[]);
        assert!(p.applies_to("ubuntu", Some("riscv64")));
    }
}
