//! Container orchestration backends for kiln.
//!
//! Provides orchestrator implementations for running build pods:
//! - Kubernetes (production)

pub mod kubernetes;

pub use kiln_core::orchestration::{Orchestrator, PodHandle, PodSpec};
pub use kubernetes::KubernetesOrchestrator;
