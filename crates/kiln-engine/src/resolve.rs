//! Dependency resolution: from target components to an ordered command list.

use kiln_core::{Catalog, CommandTemplate, Component, ResourceId, Result};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::substitute::substitute;

/// Selects which execution pipelines of a template contribute commands.
#[derive(Debug, Clone, Copy)]
pub struct PipelineFilter<'a> {
    pub os: &'a str,
    pub arch: Option<&'a str>,
    /// When set, only pipelines tagged with this engine are used.
    pub engine: Option<&'a str>,
}

impl PipelineFilter<'_> {
    fn accepts(&self, pipeline: &kiln_core::ExecutionPipeline) -> bool {
        if let Some(engine) = self.engine {
            if pipeline.engine != engine {
                return false;
            }
        }
        pipeline.applies_to(self.os, self.arch)
    }
}

/// One command ready to be emitted by a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub component: String,
    pub template: String,
    pub command: String,
}

enum Step {
    /// Visit a component: schedule its dependencies, then its own commands.
    Enter(ResourceId),
    /// All dependencies are done; emit this component's commands.
    Emit(ResourceId),
}

/// Walk the dependency graph depth-first from `targets` and collect the
/// commands of every reachable component, dependencies first.
///
/// A component's dependencies are the `depend_on` components of the
/// templates it owns and the templates it instantiates. Each component is
/// visited once: a component reachable along several paths contributes its
/// commands once, and a cycle is broken silently at the second visit.
pub fn resolve_commands(
    catalog: &Catalog,
    targets: &[ResourceId],
    filter: &PipelineFilter<'_>,
) -> Result<Vec<ResolvedCommand>> {
    let mut visited: HashSet<ResourceId> = HashSet::new();
    let mut stack: Vec<Step> = targets.iter().rev().map(|id| Step::Enter(*id)).collect();
    let mut commands = Vec::new();

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(id) => {
                if !visited.insert(id) {
                    debug!(component = %id, "Component already visited, skipping");
                    continue;
                }
                let component = catalog.component(&id)?;
                stack.push(Step::Emit(id));
                let dependencies = dependencies_of(catalog, component)?;
                stack.extend(dependencies.into_iter().rev().map(Step::Enter));
            }
            Step::Emit(id) => {
                let component = catalog.component(&id)?;
                emit_component(catalog, component, filter, &mut commands)?;
            }
        }
    }

    Ok(commands)
}

fn dependencies_of(catalog: &Catalog, component: &Component) -> Result<Vec<ResourceId>> {
    let mut dependencies = Vec::new();
    for template_id in component.template_ids() {
        dependencies.extend(catalog.template(&template_id)?.depend_on.iter().copied());
    }
    Ok(dependencies)
}

fn emit_component(
    catalog: &Catalog,
    component: &Component,
    filter: &PipelineFilter<'_>,
    out: &mut Vec<ResolvedCommand>,
) -> Result<()> {
    let no_params = BTreeMap::new();
    for template_id in &component.owned_templates {
        let template = catalog.template(template_id)?;
        emit_template(component, template, &no_params, filter, out);
    }
    for instance in &component.template_instances {
        let template = catalog.template(&instance.template_id)?;
        emit_template(component, template, &instance.parameters, filter, out);
    }
    Ok(())
}

fn emit_template(
    component: &Component,
    template: &CommandTemplate,
    params: &BTreeMap<String, String>,
    filter: &PipelineFilter<'_>,
    out: &mut Vec<ResolvedCommand>,
) {
    for pipeline in template.pipelines.iter().filter(|p| filter.accepts(p)) {
        out.extend(pipeline.commands.iter().map(|command| ResolvedCommand {
            component: component.name.clone(),
            template: template.name.clone(),
            command: substitute(command, params),
        }));
    }
}
