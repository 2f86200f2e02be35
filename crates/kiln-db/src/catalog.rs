//! Loads the part of the catalog reachable from a set of components.

use kiln_core::{Catalog, ResourceId};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use crate::{ComponentRepo, DbResult, TemplateRepo};

/// Fetch `roots`, every template they reference and every component those
/// templates depend on, transitively.
///
/// Each component and template is fetched once, so dependency cycles end
/// the walk instead of looping. A dangling reference is `NotFound`.
pub async fn load_closure(
    components: &dyn ComponentRepo,
    templates: &dyn TemplateRepo,
    roots: &[ResourceId],
) -> DbResult<Catalog> {
    let mut catalog = Catalog::new();
    let mut seen: HashSet<ResourceId> = HashSet::new();
    let mut queue: VecDeque<ResourceId> = roots.iter().copied().collect();

    while let Some(component_id) = queue.pop_front() {
        if !seen.insert(component_id) {
            continue;
        }
        let component = components.get_by_id(component_id).await?;

        for template_id in component.template_ids() {
            if catalog.contains_template(&template_id) {
                continue;
            }
            let template = templates.get_by_id(template_id).await?;
            queue.extend(template.depend_on.iter().copied());
            catalog.insert_template(template);
        }

        catalog.insert_component(component);
    }

    debug!(roots = roots.len(), components = seen.len(), "Loaded catalog closure");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DbError, MemoryCatalogStore};
    use kiln_core::component::NewComponent;
    use kiln_core::template::NewCommandTemplate;
    use kiln_core::{CommandTemplate, CommandTemplateInstance, Component};

    async fn component(
        store: &MemoryCatalogStore,
        name: &str,
        owned: Vec<ResourceId>,
        uses: Vec<ResourceId>,
    ) -> Component {
        let new = NewComponent {
            name: name.to_string(),
            owned_templates: owned,
            template_instances: uses
                .into_iter()
                .map(|template_id| CommandTemplateInstance {
                    template_id,
                    parameters: Default::default(),
                })
                .collect(),
            ..Default::default()
        };
        ComponentRepo::create(store, Component::from_new(new))
            .await
            .unwrap()
    }

    async fn template(
        store: &MemoryCatalogStore,
        name: &str,
        depend_on: Vec<ResourceId>,
    ) -> CommandTemplate {
        let new = NewCommandTemplate {
            name: name.to_string(),
            depend_on,
            pipelines: vec![],
        };
        TemplateRepo::create(store, CommandTemplate::from_new(new))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_closure_follows_template_dependencies() {
        let store = MemoryCatalogStore::new();
        let update = template(&store, "update", vec![]).await;
        let base = component(&store, "base", vec![update.id], vec![]).await;
        let install = template(&store, "install", vec![base.id]).await;
        let tool = component(&store, "tool", vec![], vec![install.id]).await;
        let unrelated = component(&store, "unrelated", vec![], vec![]).await;

        let catalog = load_closure(&store, &store, &[tool.id]).await.unwrap();
        assert!(catalog.contains_component(&tool.id));
        assert!(catalog.contains_component(&base.id));
        assert!(!catalog.contains_component(&unrelated.id));
        assert!(catalog.contains_template(&install.id));
        assert!(catalog.contains_template(&update.id));
    }

    #[tokio::test]
    async fn test_closure_terminates_on_cycles() {
        let store = MemoryCatalogStore::new();
        // a uses ta, ta depends on b; b uses tb, tb depends on a.
        let a_id = ResourceId::new();
        let b_id = ResourceId::new();
        let ta = template(&store, "ta", vec![b_id]).await;
        let tb = template(&store, "tb", vec![a_id]).await;
        let mut a = Component::from_new(NewComponent {
            name: "a".to_string(),
            owned_templates: vec![ta.id],
            ..Default::default()
        });
        a.id = a_id;
        let mut b = Component::from_new(NewComponent {
            name: "b".to_string(),
            owned_templates: vec![tb.id],
            ..Default::default()
        });
        b.id = b_id;
        ComponentRepo::create(&store, a).await.unwrap();
        ComponentRepo::create(&store, b).await.unwrap();

        let catalog = load_closure(&store, &store, &[a_id]).await.unwrap();
        assert_eq!(catalog.components().count(), 2);
        assert_eq!(catalog.templates().count(), 2);
    }

    #[tokio::test]
    async fn test_dangling_template_reference() {
        let store = MemoryCatalogStore::new();
        let tool = component(&store, "tool", vec![ResourceId::new()], vec![]).await;
        let err = load_closure(&store, &store, &[tool.id]).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}
