//! Remote-shell script renderer.

use kiln_core::Result;

use crate::engine::{ArtifactEngine, EngineState, spec_keys};
use crate::resolve::ResolvedCommand;

/// Renders the commands of `ssh`-tagged pipelines as a newline-joined script.
#[derive(Debug, Default)]
pub struct ShellEngine {
    state: EngineState,
}

impl ShellEngine {
    pub const NAME: &'static str = "ssh";

    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactEngine for ShellEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn file_name(&self) -> &'static str {
        "build.sh"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &[spec_keys::OS_TYPE]
    }

    fn pipeline_engine(&self) -> Option<&'static str> {
        Some(Self::NAME)
    }

    fn state(&self) -> &EngineState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    fn render(&self, commands: &[ResolvedCommand]) -> Result<String> {
        Ok(commands
            .iter()
            .map(|c| c.command.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
