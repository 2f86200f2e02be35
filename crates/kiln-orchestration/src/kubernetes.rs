//! Kubernetes orchestrator implementation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, EnvVar, Namespace, Pod, PodSpec as K8sPodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kiln_core::orchestration::{Orchestrator, PodHandle, PodSpec};
use kiln_core::{Error, Result};
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::{debug, info};

const MANAGED_BY: (&str, &str) = ("app.kubernetes.io/managed-by", "kiln");

/// Runs build pods on a Kubernetes cluster.
pub struct KubernetesOrchestrator {
    client: Client,
}

impl KubernetesOrchestrator {
    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn new() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::Unexpected(format!("kubernetes client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn execution_error(action: &str, err: kube::Error) -> Error {
    Error::ExecutionFailed(format!("{}: {}", action, err))
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == code)
}

/// Translate a build pod spec into a single-container pod that never
/// restarts.
fn to_pod(namespace: &str, spec: PodSpec) -> Pod {
    let mut labels = spec.labels;
    labels.insert(MANAGED_BY.0.to_string(), MANAGED_BY.1.to_string());

    let env: Vec<EnvVar> = spec
        .env
        .into_iter()
        .map(|(name, value)| EnvVar {
            name,
            value: Some(value),
            ..Default::default()
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(spec.name),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(K8sPodSpec {
            restart_policy: Some("Never".to_string()),
            containers: vec![Container {
                name: "builder".to_string(),
                image: Some(spec.image),
                command: (!spec.command.is_empty()).then_some(spec.command),
                env: (!env.is_empty()).then_some(env),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl Orchestrator for KubernetesOrchestrator {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());

        if namespaces.get(namespace).await.is_ok() {
            return Ok(());
        }

        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY.0.to_string(),
                    MANAGED_BY.1.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        };

        match namespaces.create(&PostParams::default(), &ns).await {
            Ok(_) => {
                info!(namespace, "Created namespace");
                Ok(())
            }
            // Another worker created it first
            Err(e) if is_status(&e, 409) => Ok(()),
            Err(e) => Err(execution_error("create namespace", e)),
        }
    }

    async fn spin_up_pod(&self, namespace: &str, spec: PodSpec) -> Result<PodHandle> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let name = spec.name.clone();

        pods.create(&PostParams::default(), &to_pod(namespace, spec))
            .await
            .map_err(|e| execution_error("create pod", e))?;

        info!(namespace, pod = %name, "Created build pod");
        Ok(PodHandle {
            namespace: namespace.to_string(),
            name,
        })
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        match pods.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                debug!(namespace, pod = name, "Deleted build pod");
                Ok(())
            }
            Err(e) if is_status(&e, 404) => Ok(()),
            Err(e) => Err(execution_error("delete pod", e)),
        }
    }
}
