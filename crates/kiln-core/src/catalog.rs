//! In-memory snapshot of the part of the catalog a build needs.

use std::collections::HashMap;

use crate::{CommandTemplate, Component, Error, ResourceId, Result};

/// Components and command templates keyed by id.
///
/// Artifact engines resolve dependency graphs against a catalog instead of
/// reaching into storage, which keeps rendering a pure function.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    components: HashMap<ResourceId, Component>,
    templates: HashMap<ResourceId, CommandTemplate>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_component(&mut self, component: Component) {
        self.components.insert(component.id, component);
    }

    pub fn insert_template(&mut self, template: CommandTemplate) {
        self.templates.insert(template.id, template);
    }

    /// Add everything from `other`, replacing entries with the same id.
    pub fn merge(&mut self, other: Catalog) {
        self.components.extend(other.components);
        self.templates.extend(other.templates);
    }

    pub fn component(&self, id: &ResourceId) -> Result<&Component> {
        self.components
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("component {}", id)))
    }

    pub fn template(&self, id: &ResourceId) -> Result<&CommandTemplate> {
        self.templates
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("command template {}", id)))
    }

    pub fn contains_component(&self, id: &ResourceId) -> bool {
        self.components.contains_key(id)
    }

    pub fn contains_template(&self, id: &ResourceId) -> bool {
        self.templates.contains_key(id)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn templates(&self) -> impl Iterator<Item = &CommandTemplate> {
        self.templates.values()
    }
}
