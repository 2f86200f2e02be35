//! In-memory implementations of the repository traits.
//!
//! Used when no database is configured and by tests. Each store keeps its
//! records behind one async mutex, so every operation is atomic with respect
//! to the others, like a single conditional update against PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use kiln_core::{BuildRecord, CommandTemplate, Component, LogEntry, NewBuild, ResourceId};
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::{BuildRepo, ComponentRepo, DbError, DbResult, LogRepo, TemplateRepo};

/// Build records held in memory.
#[derive(Debug, Default)]
pub struct MemoryBuildStore {
    builds: Mutex<HashMap<ResourceId, BuildRecord>>,
}

impl MemoryBuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to the records, for queue implementations and for
    /// tests that need to plant records in a specific state.
    pub async fn lock(&self) -> MutexGuard<'_, HashMap<ResourceId, BuildRecord>> {
        self.builds.lock().await
    }

    pub async fn insert(&self, build: BuildRecord) {
        self.builds.lock().await.insert(build.id, build);
    }
}

#[async_trait]
impl BuildRepo for MemoryBuildStore {
    async fn create_many(&self, builds: Vec<NewBuild>) -> DbResult<Vec<BuildRecord>> {
        let mut records = self.builds.lock().await;
        let created: Vec<BuildRecord> = builds.into_iter().map(BuildRecord::pending).collect();
        for build in &created {
            records.insert(build.id, build.clone());
        }
        Ok(created)
    }

    async fn get_by_id(&self, id: ResourceId) -> DbResult<BuildRecord> {
        self.builds
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("build {}", id)))
    }

    async fn list_for_branch(
        &self,
        component_id: ResourceId,
        branch_name: &str,
    ) -> DbResult<Vec<BuildRecord>> {
        let mut builds: Vec<BuildRecord> = self
            .builds
            .lock()
            .await
            .values()
            .filter(|b| b.component_id == component_id && b.branch_name == branch_name)
            .cloned()
            .collect();
        builds.sort_by(|a, b| b.created_date.cmp(&a.created_date).then(b.id.cmp(&a.id)));
        Ok(builds)
    }

    async fn delete(&self, id: ResourceId, expected_version: i64) -> DbResult<()> {
        let mut records = self.builds.lock().await;
        match records.get(&id) {
            None => Err(DbError::NotFound(format!("build {}", id))),
            Some(build) if build.version != expected_version => Err(DbError::WriteConflict(
                format!("build {} changed since version {}", id, expected_version),
            )),
            Some(_) => {
                records.remove(&id);
                Ok(())
            }
        }
    }
}

/// Log lines held in memory.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogRepo for MemoryLogStore {
    async fn append(&self, build_id: ResourceId, line: &str) -> DbResult<()> {
        self.entries.lock().await.push(LogEntry {
            build_id,
            timestamp: Utc::now(),
            line: line.to_string(),
        });
        Ok(())
    }

    async fn append_batch(&self, build_id: ResourceId, lines: &[String]) -> DbResult<()> {
        let now = Utc::now();
        self.entries
            .lock()
            .await
            .extend(lines.iter().map(|line| LogEntry {
                build_id,
                timestamp: now,
                line: line.clone(),
            }));
        Ok(())
    }

    async fn list_for_build(&self, build_id: ResourceId) -> DbResult<Vec<LogEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|e| e.build_id == build_id)
            .cloned()
            .collect())
    }

    async fn delete_for_build(&self, build_id: ResourceId) -> DbResult<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.build_id != build_id);
        Ok((before - entries.len()) as u64)
    }
}

/// Components and command templates held in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    components: Mutex<HashMap<ResourceId, Component>>,
    templates: Mutex<HashMap<ResourceId, CommandTemplate>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComponentRepo for MemoryCatalogStore {
    async fn create(&self, component: Component) -> DbResult<Component> {
        let mut components = self.components.lock().await;
        if components.values().any(|c| c.name == component.name) {
            return Err(DbError::Duplicate(format!("component '{}'", component.name)));
        }
        components.insert(component.id, component.clone());
        Ok(component)
    }

    async fn get_by_id(&self, id: ResourceId) -> DbResult<Component> {
        self.components
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("component {}", id)))
    }

    async fn get_by_name(&self, name: &str) -> DbResult<Component> {
        self.components
            .lock()
            .await
            .values()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("component '{}'", name)))
    }

    async fn exists_by_name(&self, name: &str) -> DbResult<bool> {
        Ok(self
            .components
            .lock()
            .await
            .values()
            .any(|c| c.name == name))
    }

    async fn list(&self) -> DbResult<Vec<Component>> {
        let mut components: Vec<Component> =
            self.components.lock().await.values().cloned().collect();
        components.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(components)
    }

    async fn delete(&self, id: ResourceId) -> DbResult<()> {
        self.components
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("component {}", id)))
    }
}

#[async_trait]
impl TemplateRepo for MemoryCatalogStore {
    async fn create(&self, template: CommandTemplate) -> DbResult<CommandTemplate> {
        let mut templates = self.templates.lock().await;
        if templates.values().any(|t| t.name == template.name) {
            return Err(DbError::Duplicate(format!(
                "command template '{}'",
                template.name
            )));
        }
        templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_by_id(&self, id: ResourceId) -> DbResult<CommandTemplate> {
        self.templates
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("command template {}", id)))
    }

    async fn get_by_name(&self, name: &str) -> DbResult<CommandTemplate> {
        self.templates
            .lock()
            .await
            .values()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("command template '{}'", name)))
    }

    async fn exists_by_name(&self, name: &str) -> DbResult<bool> {
        Ok(self.templates.lock().await.values().any(|t| t.name == name))
    }

    async fn list(&self) -> DbResult<Vec<CommandTemplate>> {
        let mut templates: Vec<CommandTemplate> =
            self.templates.lock().await.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::component::NewComponent;

    fn new_build(component_id: ResourceId, os: &str) -> NewBuild {
        NewBuild {
            component_id,
            branch_name: "main".to_string(),
            build_os: os.to_string(),
            created_by: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_versioned_delete() {
        let store = MemoryBuildStore::new();
        let component = ResourceId::new();
        let created = store
            .create_many(vec![new_build(component, "ubuntu")])
            .await
            .unwrap();
        let build = &created[0];

        store.lock().await.get_mut(&build.id).unwrap().version += 1;

        let stale = store.delete(build.id, build.version).await;
        assert!(matches!(stale, Err(DbError::WriteConflict(_))));

        store.delete(build.id, build.version + 1).await.unwrap();
        assert!(matches!(
            store.delete(build.id, build.version + 1).await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_branch_filters() {
        let store = MemoryBuildStore::new();
        let component = ResourceId::new();
        store
            .create_many(vec![new_build(component, "ubuntu"), new_build(component, "debian")])
            .await
            .unwrap();
        store
            .create_many(vec![new_build(ResourceId::new(), "ubuntu")])
            .await
            .unwrap();

        let builds = store.list_for_branch(component, "main").await.unwrap();
        assert_eq!(builds.len(), 2);
        assert!(store.list_for_branch(component, "dev").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_delete_only_touches_one_build() {
        let logs = MemoryLogStore::new();
        let a = ResourceId::new();
        let b = ResourceId::new();
        logs.append(a, "one").await.unwrap();
        logs.append_batch(a, &["two".to_string(), "three".to_string()])
            .await
            .unwrap();
        logs.append(b, "other").await.unwrap();

        assert_eq!(logs.delete_for_build(a).await.unwrap(), 3);
        assert!(logs.list_for_build(a).await.unwrap().is_empty());
        assert_eq!(logs.list_for_build(b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_component_name() {
        let store = MemoryCatalogStore::new();
        let new = NewComponent {
            name: "wget".to_string(),
            ..Default::default()
        };
        ComponentRepo::create(&store, Component::from_new(new.clone()))
            .await
            .unwrap();
        let err = ComponentRepo::create(&store, Component::from_new(new))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));
        assert!(ComponentRepo::exists_by_name(&store, "wget").await.unwrap());
    }
}
