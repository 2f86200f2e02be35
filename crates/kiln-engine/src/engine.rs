//! The artifact engine trait and the state every engine accumulates.

use kiln_core::{Catalog, CommandTemplate, Component, Error, ResourceId, Result};
use std::collections::BTreeMap;
use tracing::debug;

use crate::resolve::{PipelineFilter, ResolvedCommand, resolve_commands};

/// Well-known build-spec keys.
pub mod spec_keys {
    /// Target operating system; also the base image for container builds.
    pub const OS_TYPE: &str = "osType";
    /// Target architecture. Optional for every engine.
    pub const ARCH: &str = "arch";
    /// Host a playbook is bound to.
    pub const HOST: &str = "host";
    pub const REMOTE_USER: &str = "remoteUser";
    pub const BECOME: &str = "become";
}

/// Components, catalog and build spec accumulated by an engine.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub targets: Vec<ResourceId>,
    pub catalog: Catalog,
    pub spec: BTreeMap<String, String>,
}

impl EngineState {
    pub fn spec_value(&self, key: &str) -> Option<&str> {
        self.spec.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.spec_value(key)
            .ok_or_else(|| Error::missing_spec_key(key))
    }

    /// Names of the target components, in the order they were added.
    pub fn target_names(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter_map(|id| self.catalog.component(id).ok())
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A renderer from resolved commands to a build artifact.
///
/// Engines are single-use builders: state accumulates across the `add_*`
/// calls, so create a fresh engine for every artifact.
pub trait ArtifactEngine: Send {
    /// Name the engine is registered under.
    fn name(&self) -> &'static str;

    /// File name the artifact is delivered as.
    fn file_name(&self) -> &'static str;

    /// Spec keys that must be present before `build` can run.
    fn required_keys(&self) -> &'static [&'static str];

    /// Pipeline engine tag this renderer restricts itself to, if any.
    fn pipeline_engine(&self) -> Option<&'static str> {
        None
    }

    fn state(&self) -> &EngineState;

    fn state_mut(&mut self) -> &mut EngineState;

    /// Turn the resolved command list into the artifact text.
    fn render(&self, commands: &[ResolvedCommand]) -> Result<String>;

    /// Add a component as a build target.
    fn add_component(&mut self, component: Component) {
        let state = self.state_mut();
        state.targets.push(component.id);
        state.catalog.insert_component(component);
    }

    /// Make a component available for dependency resolution without
    /// targeting it.
    fn add_dependency(&mut self, component: Component) {
        self.state_mut().catalog.insert_component(component);
    }

    fn add_template(&mut self, template: CommandTemplate) {
        self.state_mut().catalog.insert_template(template);
    }

    fn add_catalog(&mut self, catalog: Catalog) {
        self.state_mut().catalog.merge(catalog);
    }

    /// Target a component already present in the catalog.
    fn add_target(&mut self, id: ResourceId) {
        self.state_mut().targets.push(id);
    }

    fn add_builder_spec(&mut self, key: &str, value: &str) {
        self.state_mut()
            .spec
            .insert(key.to_string(), value.to_string());
    }

    /// Resolve the accumulated targets and render the artifact.
    ///
    /// Pure with respect to the accumulated state: calling it twice yields
    /// the same text.
    fn build(&self) -> Result<String> {
        let state = self.state();
        for key in self.required_keys() {
            state.require(key)?;
        }
        if state.targets.is_empty() {
            return Err(Error::InvalidInput(
                "at least one component is required".to_string(),
            ));
        }

        let filter = PipelineFilter {
            os: state.require(spec_keys::OS_TYPE)?,
            arch: state.spec_value(spec_keys::ARCH),
            engine: self.pipeline_engine(),
        };
        let commands = resolve_commands(&state.catalog, &state.targets, &filter)?;
        debug!(
            engine = self.name(),
            targets = state.targets.len(),
            commands = commands.len(),
            "Resolved commands"
        );
        self.render(&commands)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::DockerEngine;

    #[test]
    fn test_missing_required_key() {
        let fixture = wget_fixture();
        let mut engine = DockerEngine::new();
        engine.add_catalog(fixture.catalog);
        engine.add_target(fixture.wget);

        let err = engine.build().unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
        assert!(err.to_string().contains("osType"));
    }

    #[test]
    fn test_no_targets() {
        let mut engine = DockerEngine::new();
        engine.add_builder_spec(spec_keys::OS_TYPE, "ubuntu");
        assert!(matches!(engine.build(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_add_component_targets_it() {
        let fixture = wget_fixture();
        let component = fixture.catalog.component(&fixture.wget).unwrap().clone();
        let mut engine = DockerEngine::new();
        engine.add_catalog(fixture.catalog);
        engine.add_component(component);
        assert_eq!(engine.state().target_names(), vec!["WgetTool"]);
    }
}
