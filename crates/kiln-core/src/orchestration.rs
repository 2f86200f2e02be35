//! Orchestration collaborator trait.
//!
//! Orchestrators run build pods on a container platform (Kubernetes in
//! production). The scheduler only needs to make sure a namespace exists,
//! start a pod and tear it down again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Result;

/// Specification for a build pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSpec {
    /// Pod name, unique within the namespace.
    pub name: String,
    /// Container image of the builder.
    pub image: String,
    /// Command to run; the image entrypoint is used when empty.
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

/// Handle to a pod that was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodHandle {
    pub namespace: String,
    pub name: String,
}

/// Trait for container orchestration backends.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Name of this orchestrator.
    fn name(&self) -> &'static str;

    /// Create the namespace if it does not exist yet.
    async fn ensure_namespace(&self, namespace: &str) -> Result<()>;

    /// Start a pod and return once the platform accepted it.
    async fn spin_up_pod(&self, namespace: &str, spec: PodSpec) -> Result<PodHandle>;

    /// Delete a pod. Deleting a pod that is already gone is not an error.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;
}
