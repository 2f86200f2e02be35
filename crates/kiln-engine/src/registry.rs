//! Engine registry: a fixed map from engine name to constructor.

use kiln_core::{Error, Result};

use crate::{AnsibleEngine, ArtifactEngine, DockerEngine, ShellEngine};

type EngineFactory = fn() -> Box<dyn ArtifactEngine>;

const ENGINES: &[(&str, EngineFactory)] = &[
    (DockerEngine::NAME, docker),
    (AnsibleEngine::NAME, ansible),
    (ShellEngine::NAME, shell),
];

fn docker() -> Box<dyn ArtifactEngine> {
    Box::new(DockerEngine::new())
}

fn ansible() -> Box<dyn ArtifactEngine> {
    Box::new(AnsibleEngine::new())
}

fn shell() -> Box<dyn ArtifactEngine> {
    Box::new(ShellEngine::new())
}

/// Looks up engines by name. Every lookup returns a fresh instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineRegistry;

impl EngineRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn ArtifactEngine>> {
        ENGINES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, factory)| factory())
            .ok_or_else(|| Error::NotFound(format!("engine '{}'", name)))
    }

    pub fn engine_names(&self) -> Vec<&'static str> {
        ENGINES.iter().map(|(name, _)| *name).collect()
    }

    /// Check that names are unique and that each factory builds the engine
    /// it is registered under. Run once at startup.
    pub fn validate(&self) -> Result<()> {
        for (i, (name, factory)) in ENGINES.iter().enumerate() {
            if ENGINES[..i].iter().any(|(n, _)| n == name) {
                return Err(Error::Unexpected(format!(
                    "engine '{}' registered twice",
                    name
                )));
            }
            let built = factory().name();
            if built != *name {
                return Err(Error::Unexpected(format!(
                    "engine registered as '{}' reports name '{}'",
                    name, built
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::wget_fixture;
    use crate::spec_keys;

    #[test]
    fn test_registered_names() {
        let registry = EngineRegistry::new();
        assert_eq!(registry.engine_names(), vec!["docker", "ansible", "ssh"]);
        registry.validate().unwrap();
    }

    #[test]
    fn test_unknown_engine() {
        let err = EngineRegistry::new().create("packer").err().unwrap();
        assert_eq!(err.code(), 1001);
    }

    #[test]
    fn test_fresh_instance_per_lookup() {
        let registry = EngineRegistry::new();
        let fixture = wget_fixture();
        let mut first = registry.create("docker").unwrap();
        first.add_catalog(fixture.catalog);
        first.add_target(fixture.wget);

        let second = registry.create("docker").unwrap();
        assert!(second.state().targets.is_empty());
    }

    #[test]
    fn test_render_through_registry() {
        let fixture = wget_fixture();
        let mut engine = EngineRegistry::new().create("docker").unwrap();
        engine.add_catalog(fixture.catalog);
        engine.add_target(fixture.wget);
        engine.add_builder_spec(spec_keys::OS_TYPE, "ubuntu");

        let output = engine.build().unwrap();
        let from = output.find("FROM ubuntu:latest").unwrap();
        let update = output.find("apt-get update").unwrap();
        let install = output.find("apt-get install -y wget").unwrap();
        assert!(from < update && update < install);
        assert_eq!(engine.file_name(), "Dockerfile");
    }
}
