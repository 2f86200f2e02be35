//! Build lifecycle state machine.
//!
//! ```text
//! PENDING      -> IN_PROGRESS     claim, mark in progress, release
//! IN_PROGRESS  -> SUCCESS|FAILED  claim, dispatch the build pod, release
//! SUCCESS      -> (terminal)
//! FAILED       -> (terminal)
//! ```
//!
//! Every tick claims at most one build and advances it by one step, so a
//! worker that dies mid-step leaves nothing but a stale lock behind.

use chrono::Duration;
use kiln_core::orchestration::{Orchestrator, PodHandle, PodSpec};
use kiln_core::{BuildInfo, BuildRecord, BuildStatus, Error, ResourceId, Result};
use kiln_db::{ComponentRepo, LogRepo, TemplateRepo, load_closure};
use kiln_engine::{EngineRegistry, spec_keys};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::queue::BuildQueue;

/// Knobs for dispatching builds.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub lock_timeout: Duration,
    /// Artifact engine the build payload is rendered with.
    pub engine: String,
    pub namespace: String,
    pub builder_image: String,
    pub builder_command: Vec<String>,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::seconds(60),
            engine: "docker".to_string(),
            namespace: "kiln-builds".to_string(),
            builder_image: "gcr.io/kaniko-project/executor:latest".to_string(),
            builder_command: Vec::new(),
        }
    }
}

/// What a tick did to the build it claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// PENDING became IN_PROGRESS.
    Started(ResourceId),
    /// IN_PROGRESS was dispatched and reached a terminal status.
    Finished(ResourceId, BuildStatus),
    /// The claimed build was already terminal, or was deleted while claimed.
    Unchanged(ResourceId),
}

/// Drives claimed builds through their states.
pub struct BuildLifecycle {
    queue: Arc<dyn BuildQueue>,
    components: Arc<dyn ComponentRepo>,
    templates: Arc<dyn TemplateRepo>,
    logs: Arc<dyn LogRepo>,
    orchestrator: Arc<dyn Orchestrator>,
    engines: EngineRegistry,
    settings: LifecycleSettings,
}

impl BuildLifecycle {
    pub fn new(
        queue: Arc<dyn BuildQueue>,
        components: Arc<dyn ComponentRepo>,
        templates: Arc<dyn TemplateRepo>,
        logs: Arc<dyn LogRepo>,
        orchestrator: Arc<dyn Orchestrator>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            queue,
            components,
            templates,
            logs,
            orchestrator,
            engines: EngineRegistry::new(),
            settings,
        }
    }

    /// Claim one build and advance it.
    ///
    /// Failures while advancing a claimed build mark it FAILED and are not
    /// returned. Errors come only from the queue itself.
    pub async fn tick(&self, worker_id: &str) -> Result<Option<Transition>> {
        let Some(build) = self
            .queue
            .claim_next(worker_id, self.settings.lock_timeout)
            .await?
        else {
            return Ok(None);
        };

        debug!(build_id = %build.id, status = %build.build_status, worker_id, "Claimed build");

        let transition = match build.build_status {
            BuildStatus::Pending => {
                if !self.release(build.id, Some(BuildStatus::InProgress)).await? {
                    return Ok(Some(Transition::Unchanged(build.id)));
                }
                info!(build_id = %build.id, "Build started");
                Transition::Started(build.id)
            }
            BuildStatus::InProgress => {
                let failure = self.dispatch(&build).await.err();
                let status = match &failure {
                    None => BuildStatus::Success,
                    Some(e) => {
                        error!(build_id = %build.id, error = %e, "Build failed");
                        BuildStatus::Failed
                    }
                };
                if !self.release(build.id, Some(status)).await? {
                    return Ok(Some(Transition::Unchanged(build.id)));
                }
                if let Some(e) = failure {
                    if let Err(log_err) = self
                        .logs
                        .append(build.id, &format!("Build failed: {}", e))
                        .await
                    {
                        warn!(build_id = %build.id, error = %log_err, "Failed to record build failure");
                    }
                }
                info!(build_id = %build.id, %status, "Build finished");
                Transition::Finished(build.id, status)
            }
            BuildStatus::Success | BuildStatus::Failed => {
                self.release(build.id, None).await?;
                Transition::Unchanged(build.id)
            }
        };

        Ok(Some(transition))
    }

    /// Returns `false` if the record was deleted while claimed.
    async fn release(&self, id: ResourceId, status: Option<BuildStatus>) -> Result<bool> {
        let released = match status {
            Some(status) => self.queue.release_with_status(id, status).await?,
            None => self.queue.release(id).await?,
        };
        if !released {
            warn!(build_id = %id, "Build vanished before release");
        }
        Ok(released)
    }

    /// Render the build payload and start the builder pod.
    async fn dispatch(&self, build: &BuildRecord) -> Result<()> {
        let component = self.components.get_by_id(build.component_id).await?;
        let repository = component.repository_url.clone().ok_or_else(|| {
            Error::PreconditionFailed(format!(
                "component '{}' has no repository URL",
                component.name
            ))
        })?;

        let catalog =
            load_closure(self.components.as_ref(), self.templates.as_ref(), &[component.id])
                .await?;
        let mut engine = self.engines.create(&self.settings.engine)?;
        engine.add_catalog(catalog);
        engine.add_target(component.id);
        engine.add_builder_spec(spec_keys::OS_TYPE, &build.build_os);
        let artifact = engine.build()?;

        let namespace = &self.settings.namespace;
        self.orchestrator.ensure_namespace(namespace).await?;

        let spec = PodSpec {
            name: format!("kiln-build-{}", build.id.simple()),
            image: self.settings.builder_image.clone(),
            command: self.settings.builder_command.clone(),
            env: BTreeMap::from([
                ("KILN_ARTIFACT".to_string(), artifact),
                ("KILN_ARTIFACT_FILE".to_string(), engine.file_name().to_string()),
                ("KILN_REPOSITORY".to_string(), repository),
                ("KILN_BRANCH".to_string(), build.branch_name.clone()),
                ("KILN_BUILD_OS".to_string(), build.build_os.clone()),
            ]),
            labels: BTreeMap::from([("kiln/build".to_string(), build.id.simple())]),
        };
        let handle = self.orchestrator.spin_up_pod(namespace, spec).await?;

        let lines = [
            format!("Rendered {} with engine {}", engine.file_name(), engine.name()),
            format!("Started pod {}/{}", handle.namespace, handle.name),
        ];
        if let Err(e) = self.record_dispatch(build.id, &handle, &lines).await {
            if let Err(delete_err) = self
                .orchestrator
                .delete_pod(&handle.namespace, &handle.name)
                .await
            {
                warn!(build_id = %build.id, pod = %handle.name, error = %delete_err, "Failed to delete orphaned pod");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn record_dispatch(
        &self,
        id: ResourceId,
        handle: &PodHandle,
        lines: &[String],
    ) -> Result<()> {
        let info = BuildInfo {
            builder_name: Some(handle.name.clone()),
            scratch_location: Some(format!("/workspace/{}", id)),
        };
        if !self.queue.update_build_info(id, &info).await? {
            return Err(Error::NotFound(format!("build {}", id)));
        }
        self.logs.append_batch(id, lines).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryBuildQueue;
    use async_trait::async_trait;
    use kiln_db::{DbError, DbResult};
    use kiln_core::{
        CommandTemplate, CommandTemplateInstance, Component, ExecutionPipeline,
        NewCommandTemplate, NewComponent, NewBuild,
    };
    use kiln_db::{BuildRepo, MemoryBuildStore, MemoryCatalogStore, MemoryLogStore};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOrchestrator {
        pods: Mutex<Vec<(String, PodSpec)>>,
        deleted: Mutex<Vec<String>>,
        fail: bool,
        /// Wipe this store when a pod starts, as if the build was deleted.
        vanish: Option<Arc<MemoryBuildStore>>,
    }

    #[async_trait]
    impl Orchestrator for RecordingOrchestrator {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn ensure_namespace(&self, _namespace: &str) -> Result<()> {
            Ok(())
        }

        async fn spin_up_pod(&self, namespace: &str, spec: PodSpec) -> Result<PodHandle> {
            if self.fail {
                return Err(Error::ExecutionFailed("cluster unavailable".to_string()));
            }
            let handle = PodHandle {
                namespace: namespace.to_string(),
                name: spec.name.clone(),
            };
            self.pods.lock().unwrap().push((namespace.to_string(), spec));
            if let Some(store) = &self.vanish {
                store.lock().await.clear();
            }
            Ok(handle)
        }

        async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    struct Harness {
        builds: Arc<MemoryBuildStore>,
        catalog: Arc<MemoryCatalogStore>,
        logs: Arc<MemoryLogStore>,
        orchestrator: Arc<RecordingOrchestrator>,
        lifecycle: BuildLifecycle,
    }

    fn harness(fail: bool) -> Harness {
        harness_with(fail, false)
    }

    fn harness_with(fail: bool, vanish: bool) -> Harness {
        let builds = Arc::new(MemoryBuildStore::new());
        let catalog = Arc::new(MemoryCatalogStore::new());
        let logs = Arc::new(MemoryLogStore::new());
        let orchestrator = Arc::new(RecordingOrchestrator {
            fail,
            vanish: vanish.then(|| builds.clone()),
            ..Default::default()
        });
        let lifecycle = BuildLifecycle::new(
            Arc::new(MemoryBuildQueue::new(builds.clone())),
            catalog.clone(),
            catalog.clone(),
            logs.clone(),
            orchestrator.clone(),
            LifecycleSettings::default(),
        );
        Harness {
            builds,
            catalog,
            logs,
            orchestrator,
            lifecycle,
        }
    }

    impl Harness {
        async fn wget(&self, repository: Option<&str>) -> Component {
            let template = CommandTemplate::from_new(NewCommandTemplate {
                name: "install_package".to_string(),
                depend_on: vec![],
                pipelines: vec![ExecutionPipeline {
                    engine: "docker".to_string(),
                    architectures: vec![],
                    operating_systems: vec!["ubuntu".to_string()],
                    commands: vec!["apt-get install -y ${package_name}".to_string()],
                }],
            });
            let template = TemplateRepo::create(self.catalog.as_ref(), template)
                .await
                .unwrap();
            let component = Component::from_new(NewComponent {
                name: "WgetTool".to_string(),
                repository_url: repository.map(str::to_string),
                build_os: vec!["ubuntu".to_string()],
                branches: vec!["main".to_string()],
                template_instances: vec![CommandTemplateInstance {
                    template_id: template.id,
                    parameters: BTreeMap::from([(
                        "package_name".to_string(),
                        "wget".to_string(),
                    )]),
                }],
                owned_templates: vec![],
            });
            ComponentRepo::create(self.catalog.as_ref(), component)
                .await
                .unwrap()
        }

        async fn request(&self, component_id: ResourceId) -> ResourceId {
            self.builds
                .create_many(vec![NewBuild {
                    component_id,
                    branch_name: "main".to_string(),
                    build_os: "ubuntu".to_string(),
                    created_by: "test".to_string(),
                }])
                .await
                .unwrap()[0]
                .id
        }

        async fn status(&self, id: ResourceId) -> BuildStatus {
            self.builds.get_by_id(id).await.unwrap().build_status
        }
    }

    #[tokio::test]
    async fn test_pending_build_runs_to_success() {
        let h = harness(false);
        let wget = h.wget(Some("https://example.com/wget.git")).await;
        let id = h.request(wget.id).await;

        let first = h.lifecycle.tick("w").await.unwrap();
        assert_eq!(first, Some(Transition::Started(id)));
        assert_eq!(h.status(id).await, BuildStatus::InProgress);

        let second = h.lifecycle.tick("w").await.unwrap();
        assert_eq!(second, Some(Transition::Finished(id, BuildStatus::Success)));

        let build = h.builds.get_by_id(id).await.unwrap();
        assert_eq!(build.build_status, BuildStatus::Success);
        assert!(build.lock_time.is_none());
        let pod_name = format!("kiln-build-{}", id.simple());
        assert_eq!(build.build_info.builder_name.as_deref(), Some(pod_name.as_str()));

        let pods = h.orchestrator.pods.lock().unwrap();
        assert_eq!(pods.len(), 1);
        let (namespace, spec) = &pods[0];
        assert_eq!(namespace, "kiln-builds");
        let artifact = &spec.env["KILN_ARTIFACT"];
        assert!(artifact.starts_with("FROM ubuntu:latest"));
        assert!(artifact.contains("RUN apt-get install -y wget"));
        assert_eq!(spec.env["KILN_BRANCH"], "main");
        drop(pods);

        assert_eq!(h.logs.list_for_build(id).await.unwrap().len(), 2);
        assert_eq!(h.lifecycle.tick("w").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_component_fails_build() {
        let h = harness(false);
        let id = h.request(ResourceId::new()).await;

        h.lifecycle.tick("w").await.unwrap();
        let finished = h.lifecycle.tick("w").await.unwrap();
        assert_eq!(finished, Some(Transition::Finished(id, BuildStatus::Failed)));
        assert_eq!(h.status(id).await, BuildStatus::Failed);

        let logs = h.logs.list_for_build(id).await.unwrap();
        assert!(logs[0].line.starts_with("Build failed"));
    }

    #[tokio::test]
    async fn test_missing_repository_fails_build() {
        let h = harness(false);
        let wget = h.wget(None).await;
        let id = h.request(wget.id).await;

        h.lifecycle.tick("w").await.unwrap();
        h.lifecycle.tick("w").await.unwrap();
        assert_eq!(h.status(id).await, BuildStatus::Failed);
        assert!(h.orchestrator.pods.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_executor_failure_fails_build() {
        let h = harness(true);
        let wget = h.wget(Some("https://example.com/wget.git")).await;
        let id = h.request(wget.id).await;

        h.lifecycle.tick("w").await.unwrap();
        let finished = h.lifecycle.tick("w").await.unwrap();
        assert_eq!(finished, Some(Transition::Finished(id, BuildStatus::Failed)));
    }

    #[tokio::test]
    async fn test_pod_is_deleted_when_build_vanishes() {
        let h = harness_with(false, true);
        let wget = h.wget(Some("https://example.com/wget.git")).await;
        let id = h.request(wget.id).await;

        h.lifecycle.tick("w").await.unwrap();
        let finished = h.lifecycle.tick("w").await.unwrap();
        assert_eq!(finished, Some(Transition::Unchanged(id)));

        let deleted = h.orchestrator.deleted.lock().unwrap();
        assert_eq!(*deleted, vec![format!("kiln-build-{}", id.simple())]);
    }

    #[tokio::test]
    async fn test_vanished_build_leaves_no_logs() {
        let h = harness_with(false, true);
        let wget = h.wget(Some("https://example.com/wget.git")).await;
        let id = h.request(wget.id).await;

        h.lifecycle.tick("w").await.unwrap();
        h.lifecycle.tick("w").await.unwrap();

        assert!(matches!(
            h.builds.get_by_id(id).await,
            Err(DbError::NotFound(_))
        ));
        assert!(h.logs.list_for_build(id).await.unwrap().is_empty());
    }

    /// Deletes the record just before every status release.
    struct DeletingQueue {
        store: Arc<MemoryBuildStore>,
        inner: MemoryBuildQueue,
    }

    #[async_trait]
    impl BuildQueue for DeletingQueue {
        async fn claim_next(
            &self,
            worker_id: &str,
            lock_timeout: Duration,
        ) -> DbResult<Option<BuildRecord>> {
            self.inner.claim_next(worker_id, lock_timeout).await
        }

        async fn release(&self, id: ResourceId) -> DbResult<bool> {
            self.inner.release(id).await
        }

        async fn release_with_status(&self, id: ResourceId, status: BuildStatus) -> DbResult<bool> {
            self.store.lock().await.remove(&id);
            self.inner.release_with_status(id, status).await
        }

        async fn update_build_info(&self, id: ResourceId, info: &BuildInfo) -> DbResult<bool> {
            self.inner.update_build_info(id, info).await
        }

        async fn force_release(&self, id: ResourceId, released_by: &str) -> DbResult<bool> {
            self.inner.force_release(id, released_by).await
        }
    }

    #[tokio::test]
    async fn test_deleted_pending_build_is_not_started() {
        let builds = Arc::new(MemoryBuildStore::new());
        let catalog = Arc::new(MemoryCatalogStore::new());
        let logs = Arc::new(MemoryLogStore::new());
        let queue = DeletingQueue {
            store: builds.clone(),
            inner: MemoryBuildQueue::new(builds.clone()),
        };
        let lifecycle = BuildLifecycle::new(
            Arc::new(queue),
            catalog.clone(),
            catalog,
            logs.clone(),
            Arc::new(RecordingOrchestrator::default()),
            LifecycleSettings::default(),
        );
        let id = builds
            .create_many(vec![NewBuild {
                component_id: ResourceId::new(),
                branch_name: "main".to_string(),
                build_os: "ubuntu".to_string(),
                created_by: "test".to_string(),
            }])
            .await
            .unwrap()[0]
            .id;

        let transition = lifecycle.tick("w").await.unwrap();
        assert_eq!(transition, Some(Transition::Unchanged(id)));
        assert!(logs.list_for_build(id).await.unwrap().is_empty());
        assert_eq!(lifecycle.tick("w").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_terminal_build_is_left_alone() {
        let h = harness(false);
        let mut done = BuildRecord::pending(NewBuild {
            component_id: ResourceId::new(),
            branch_name: "main".to_string(),
            build_os: "ubuntu".to_string(),
            created_by: "test".to_string(),
        });
        done.build_status = BuildStatus::Success;
        h.builds.insert(done).await;

        assert_eq!(h.lifecycle.tick("w").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let h = harness(false);
        assert_eq!(h.lifecycle.tick("w").await.unwrap(), None);
    }
}
