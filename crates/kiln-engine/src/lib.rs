//! Artifact engines for kiln.
//!
//! An engine takes target components, the catalog they draw on and a
//! build spec (OS, architecture, host, ...) and renders a build artifact:
//! - `docker`: a container build script
//! - `ansible`: a configuration-management playbook
//! - `ssh`: a flat shell script for remote execution

pub mod ansible;
pub mod docker;
pub mod engine;
pub mod registry;
pub mod resolve;
pub mod shell;
pub mod substitute;

pub use ansible::AnsibleEngine;
pub use docker::DockerEngine;
pub use engine::{ArtifactEngine, EngineState, spec_keys};
pub use registry::EngineRegistry;
pub use resolve::{PipelineFilter, ResolvedCommand, resolve_commands};
pub use shell::ShellEngine;
