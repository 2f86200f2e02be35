//! Container build script renderer.

use kiln_core::Result;

use crate::engine::{ArtifactEngine, EngineState, spec_keys};
use crate::resolve::ResolvedCommand;

/// Renders a Dockerfile: `FROM <osType>:latest`, then one `RUN` per command.
/// Multi-line commands continue the same `RUN` with trailing backslashes.
#[derive(Debug, Default)]
pub struct DockerEngine {
    state: EngineState,
}

impl DockerEngine {
    pub const NAME: &'static str = "docker";

    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactEngine for DockerEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn file_name(&self) -> &'static str {
        "Dockerfile"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &[spec_keys::OS_TYPE]
    }

    fn state(&self) -> &EngineState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    fn render(&self, commands: &[ResolvedCommand]) -> Result<String> {
        let os = self.state.require(spec_keys::OS_TYPE)?;
        let mut out = format!("FROM {}:latest\n", os);
        for command in commands {
            let lines: Vec<&str> = command
                .command
                .lines()
                .map(|line| line.trim_end().trim_end_matches('\\').trim_end())
                .filter(|line| !line.is_empty())
                .collect();
            if lines.is_empty() {
                continue;
            }
            out.push_str("RUN ");
            out.push_str(&lines.join(" \\\n    "));
            out.push('\n');
        }
        Ok(out)
    }
}
