//! Component and command template management.

use kiln_config::CatalogFile;
use kiln_core::{
    CommandTemplate, Component, Error, NewCommandTemplate, NewComponent, ResourceId, Result,
};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::AppState;

pub async fn create_component(state: &AppState, new: NewComponent) -> Result<Component> {
    if new.name.trim().is_empty() {
        return Err(Error::InvalidInput("component name is required".to_string()));
    }
    if state.components.exists_by_name(&new.name).await? {
        return Err(Error::Conflict(format!("component '{}' already exists", new.name)));
    }

    let referenced = new
        .owned_templates
        .iter()
        .chain(new.template_instances.iter().map(|i| &i.template_id));
    for template_id in referenced {
        state.templates.get_by_id(*template_id).await?;
    }

    let component = state.components.create(Component::from_new(new)).await?;
    info!(component = %component.name, id = %component.id, "Created component");
    Ok(component)
}

pub async fn delete_component(state: &AppState, name: &str) -> Result<()> {
    let component = state.components.get_by_name(name).await?;
    state.components.delete(component.id).await?;
    info!(component = %name, "Deleted component");
    Ok(())
}

pub async fn create_template(state: &AppState, new: NewCommandTemplate) -> Result<CommandTemplate> {
    if new.name.trim().is_empty() {
        return Err(Error::InvalidInput("template name is required".to_string()));
    }
    if let Some(pipeline) = new.pipelines.iter().find(|p| p.operating_systems.is_empty()) {
        return Err(Error::InvalidInput(format!(
            "pipeline for engine '{}' lists no operating system",
            pipeline.engine
        )));
    }
    if state.templates.exists_by_name(&new.name).await? {
        return Err(Error::Conflict(format!(
            "command template '{}' already exists",
            new.name
        )));
    }
    for component_id in &new.depend_on {
        state.components.get_by_id(*component_id).await?;
    }

    let template = state.templates.create(CommandTemplate::from_new(new)).await?;
    info!(template = %template.name, id = %template.id, "Created command template");
    Ok(template)
}

/// Load a catalog file into the stores.
///
/// Entries whose name already exists are kept as stored, and references
/// to them from new entries are pointed at the stored ids. Returns the
/// number of templates and components created.
pub async fn seed(state: &AppState, file: CatalogFile) -> Result<(usize, usize)> {
    let mut template_ids: HashMap<ResourceId, ResourceId> = HashMap::new();
    let mut component_ids: HashMap<ResourceId, ResourceId> = HashMap::new();

    for template in &file.templates {
        if state.templates.exists_by_name(&template.name).await? {
            let stored = state.templates.get_by_name(&template.name).await?;
            template_ids.insert(template.id, stored.id);
        }
    }
    for component in &file.components {
        if state.components.exists_by_name(&component.name).await? {
            let stored = state.components.get_by_name(&component.name).await?;
            component_ids.insert(component.id, stored.id);
        }
    }

    let remap = |ids: &HashMap<ResourceId, ResourceId>, id: ResourceId| {
        ids.get(&id).copied().unwrap_or(id)
    };

    let mut created = (0, 0);
    for mut template in file.templates {
        if template_ids.contains_key(&template.id) {
            debug!(template = %template.name, "Template already stored");
            continue;
        }
        for dep in template.depend_on.iter_mut() {
            *dep = remap(&component_ids, *dep);
        }
        state.templates.create(template).await?;
        created.0 += 1;
    }
    for mut component in file.components {
        if component_ids.contains_key(&component.id) {
            debug!(component = %component.name, "Component already stored");
            continue;
        }
        for owned in component.owned_templates.iter_mut() {
            *owned = remap(&template_ids, *owned);
        }
        for instance in component.template_instances.iter_mut() {
            instance.template_id = remap(&template_ids, instance.template_id);
        }
        state.components.create(component).await?;
        created.1 += 1;
    }

    info!(templates = created.0, components = created.1, "Seeded catalog");
    Ok(created)
}
