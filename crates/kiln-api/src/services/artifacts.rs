//! Artifact generation for stored components.

use kiln_core::{Error, ResourceId, Result};
use kiln_db::load_closure;
use std::collections::BTreeMap;
use tracing::debug;

use crate::AppState;

/// A rendered artifact and the file name it should be delivered as.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: &'static str,
    pub content: String,
}

/// Render `components` with a fresh instance of engine `engine_name`.
pub async fn generate(
    state: &AppState,
    engine_name: &str,
    components: &[ResourceId],
    spec: &BTreeMap<String, String>,
) -> Result<Artifact> {
    let mut engine = state.engines.create(engine_name)?;
    if components.is_empty() {
        return Err(Error::InvalidInput(
            "at least one componentId is required".to_string(),
        ));
    }

    let catalog = load_closure(state.components.as_ref(), state.templates.as_ref(), components)
        .await?;
    engine.add_catalog(catalog);
    for id in components {
        engine.add_target(*id);
    }
    for (key, value) in spec {
        engine.add_builder_spec(key, value);
    }

    let content = engine.build()?;
    debug!(engine = engine_name, bytes = content.len(), "Generated artifact");
    Ok(Artifact {
        file_name: engine.file_name(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::seed;
    use kiln_config::parse_catalog;

    const WGET: &str = r#"
        template "update_package_manager" {
            pipeline {
                os "ubuntu"
                run "apt-get update"
            }
        }
        template "install_package" {
            depends-on "install_component"
            pipeline {
                os "ubuntu"
                run "apt-get install -y ${package_name}"
            }
        }
        component "install_component" {
            owns "update_package_manager"
        }
        component "WgetTool" {
            repository "https://example.com/wget.git"
            build-os "ubuntu"
            branch "main"
            use "install_package" {
                package_name "wget"
            }
        }
    "#;

    async fn wget_state() -> (AppState, ResourceId) {
        let state = AppState::in_memory();
        seed(&state, parse_catalog(WGET).unwrap()).await.unwrap();
        let wget = state.components.get_by_name("WgetTool").await.unwrap();
        (state, wget.id)
    }

    fn spec(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_generate_ansible() {
        let (state, wget) = wget_state().await;
        let artifact = generate(
            &state,
            "ansible",
            &[wget],
            &spec(&[("osType", "ubuntu"), ("host", "192.168.1.1")]),
        )
        .await
        .unwrap();

        assert_eq!(artifact.file_name, "playbook.yml");
        let hosts = artifact.content.find("hosts: 192.168.1.1").unwrap();
        let update = artifact.content.find("apt-get update").unwrap();
        let install = artifact.content.find("apt-get install -y wget").unwrap();
        assert!(hosts < update && update < install);
    }

    #[tokio::test]
    async fn test_unknown_engine() {
        let (state, wget) = wget_state().await;
        let err = generate(&state, "packer", &[wget], &spec(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_component() {
        let (state, _) = wget_state().await;
        let err = generate(
            &state,
            "docker",
            &[ResourceId::new()],
            &spec(&[("osType", "ubuntu")]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
