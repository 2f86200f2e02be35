//! Catalog files: command templates and components declared by name.
//!
//! ```kdl
//! template "install_package" {
//!     depends-on "install_component"
//!     pipeline engine="docker" {
//!         os "ubuntu" "debian"
//!         arch "amd64"
//!         run "apt-get install -y ${package_name}"
//!     }
//! }
//!
//! component "WgetTool" {
//!     repository "https://example.com/wget.git"
//!     build-os "ubuntu"
//!     branch "main"
//!     use "install_package" {
//!         package_name "wget"
//!     }
//! }
//! ```
//!
//! Names are resolved to freshly generated ids at load time.

use crate::kdl_util::{all_string_args, required_string_arg, string_prop, string_props_except};
use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use kiln_core::component::NewComponent;
use kiln_core::template::NewCommandTemplate;
use kiln_core::{
    Catalog, CommandTemplate, CommandTemplateInstance, Component, ExecutionPipeline, ResourceId,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const DEFAULT_PIPELINE_ENGINE: &str = "docker";

/// Templates and components loaded from a catalog file, in file order.
#[derive(Debug, Clone, Default)]
pub struct CatalogFile {
    pub templates: Vec<CommandTemplate>,
    pub components: Vec<Component>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        parse_catalog(&content)
    }

    pub fn component_by_name(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn into_catalog(self) -> Catalog {
        let mut catalog = Catalog::new();
        for template in self.templates {
            catalog.insert_template(template);
        }
        for component in self.components {
            catalog.insert_component(component);
        }
        catalog
    }
}

/// Parse a catalog from KDL text.
pub fn parse_catalog(kdl: &str) -> ConfigResult<CatalogFile> {
    let doc: KdlDocument = kdl.parse()?;

    // First pass: assign ids so references may point forward.
    let mut template_ids: HashMap<String, ResourceId> = HashMap::new();
    let mut component_ids: HashMap<String, ResourceId> = HashMap::new();
    for node in doc.nodes() {
        let (ids, kind) = match node.name().value() {
            "template" => (&mut template_ids, "template"),
            "component" => (&mut component_ids, "component"),
            _ => continue,
        };
        let name = required_string_arg(node, &format!("{} name", kind))?;
        if ids.insert(name.clone(), ResourceId::new()).is_some() {
            return Err(ConfigError::Duplicate(format!("{} '{}'", kind, name)));
        }
    }

    let mut file = CatalogFile::default();
    for node in doc.nodes() {
        match node.name().value() {
            "template" => file
                .templates
                .push(parse_template(node, &template_ids, &component_ids)?),
            "component" => file
                .components
                .push(parse_component(node, &template_ids, &component_ids)?),
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(file)
}

fn parse_template(
    node: &KdlNode,
    template_ids: &HashMap<String, ResourceId>,
    component_ids: &HashMap<String, ResourceId>,
) -> ConfigResult<CommandTemplate> {
    let name = required_string_arg(node, "template name")?;
    let mut new = NewCommandTemplate {
        name: name.clone(),
        ..Default::default()
    };

    for child in child_nodes(node) {
        match child.name().value() {
            "depends-on" => {
                for dep in all_string_args(child) {
                    new.depend_on
                        .push(lookup(component_ids, &dep, "component", &name)?);
                }
            }
            "pipeline" => new.pipelines.push(parse_pipeline(child, &name)?),
            _ => {}
        }
    }

    let mut template = CommandTemplate::from_new(new);
    template.id = template_ids[&name];
    Ok(template)
}

fn parse_pipeline(node: &KdlNode, template: &str) -> ConfigResult<ExecutionPipeline> {
    let mut pipeline = ExecutionPipeline {
        engine: string_prop(node, "engine").unwrap_or_else(|| DEFAULT_PIPELINE_ENGINE.to_string()),
        architectures: Vec::new(),
        operating_systems: Vec::new(),
        commands: Vec::new(),
    };

    for child in child_nodes(node) {
        match child.name().value() {
            "os" => pipeline.operating_systems.extend(all_string_args(child)),
            "arch" => pipeline.architectures.extend(all_string_args(child)),
            "run" => pipeline.commands.extend(all_string_args(child)),
            _ => {}
        }
    }

    if pipeline.operating_systems.is_empty() {
        return Err(ConfigError::MissingField(format!(
            "os for a pipeline of template '{}'",
            template
        )));
    }

    Ok(pipeline)
}

fn parse_component(
    node: &KdlNode,
    template_ids: &HashMap<String, ResourceId>,
    component_ids: &HashMap<String, ResourceId>,
) -> ConfigResult<Component> {
    let name = required_string_arg(node, "component name")?;
    let mut new = NewComponent {
        name: name.clone(),
        ..Default::default()
    };

    for child in child_nodes(node) {
        match child.name().value() {
            "repository" => new.repository_url = Some(required_string_arg(child, "repository")?),
            "build-os" => new.build_os.extend(all_string_args(child)),
            "branch" => new.branches.extend(all_string_args(child)),
            "owns" => {
                for owned in all_string_args(child) {
                    new.owned_templates
                        .push(lookup(template_ids, &owned, "template", &name)?);
                }
            }
            "use" => {
                let template = required_string_arg(child, "template name in use")?;
                let template_id = lookup(template_ids, &template, "template", &name)?;
                let mut parameters: BTreeMap<String, String> =
                    string_props_except(child, &[]).into_iter().collect();
                for param in child_nodes(child) {
                    let value = required_string_arg(
                        param,
                        &format!("value of parameter '{}'", param.name().value()),
                    )?;
                    parameters.insert(param.name().value().to_string(), value);
                }
                new.template_instances.push(CommandTemplateInstance {
                    template_id,
                    parameters,
                });
            }
            _ => {}
        }
    }

    let mut component = Component::from_new(new);
    component.id = component_ids[&name];
    Ok(component)
}

fn child_nodes(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes())
}

fn lookup(
    ids: &HashMap<String, ResourceId>,
    name: &str,
    kind: &str,
    referrer: &str,
) -> ConfigResult<ResourceId> {
    ids.get(name).copied().ok_or_else(|| {
        ConfigError::InvalidReference(format!(
            "'{}' references unknown {} '{}'",
            referrer, kind, name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGET: &str = r#"
        template "update_package_manager" {
            pipeline engine="docker" {
                os "ubuntu"
                run "apt-get update"
            }
        }

        template "install_package" {
            depends-on "install_component"
            pipeline {
                os "ubuntu" "debian"
                arch "amd64" "arm64"
                run "apt-get install -y ${package_name}"
            }
        }

        component "install_component" {
            owns "update_package_manager"
        }

        component "WgetTool" {
            repository "https://example.com/wget.git"
            build-os "ubuntu" "debian"
            branch "main"
            use "install_package" {
                package_name "wget"
            }
        }
    "#;

    #[test]
    fn test_parse_catalog_resolves_names() {
        let file = parse_catalog(WGET).unwrap();
        assert_eq!(file.templates.len(), 2);
        assert_eq!(file.components.len(), 2);

        let installer = file.component_by_name("install_component").unwrap();
        let wget = file.component_by_name("WgetTool").unwrap();
        let install_package = &file.templates[1];
        let update = &file.templates[0];

        assert_eq!(install_package.depend_on, vec![installer.id]);
        assert_eq!(installer.owned_templates, vec![update.id]);
        assert_eq!(wget.template_instances.len(), 1);
        assert_eq!(wget.template_instances[0].template_id, install_package.id);
        assert_eq!(
            wget.template_instances[0].parameters.get("package_name"),
            Some(&"wget".to_string())
        );
        assert_eq!(wget.build_os, vec!["ubuntu", "debian"]);
        assert_eq!(
            wget.repository_url.as_deref(),
            Some("https://example.com/wget.git")
        );
    }

    #[test]
    fn test_pipeline_defaults_to_docker_engine() {
        let file = parse_catalog(WGET).unwrap();
        let pipeline = &file.templates[1].pipelines[0];
        assert_eq!(pipeline.engine, "docker");
        assert_eq!(pipeline.architectures, vec!["amd64", "arm64"]);
    }

    #[test]
    fn test_parameters_as_properties() {
        let kdl = r#"
            template "t" {
                pipeline engine="ssh" {
                    os "ubuntu"
                    run "echo ${greeting}"
                }
            }
            component "c" {
                use "t" greeting="hello"
            }
        "#;
        let file = parse_catalog(kdl).unwrap();
        let params = &file.components[0].template_instances[0].parameters;
        assert_eq!(params.get("greeting"), Some(&"hello".to_string()));
    }

    #[test]
    fn test_unknown_template_reference() {
        let kdl = r#"
            component "c" {
                use "missing"
            }
        "#;
        assert!(matches!(
            parse_catalog(kdl),
            Err(ConfigError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_duplicate_component_name() {
        let kdl = r#"
            component "c"
            component "c"
        "#;
        assert!(matches!(parse_catalog(kdl), Err(ConfigError::Duplicate(_))));
    }

    #[test]
    fn test_pipeline_requires_os() {
        let kdl = r#"
            template "t" {
                pipeline {
                    run "true"
                }
            }
        "#;
        assert!(matches!(
            parse_catalog(kdl),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_into_catalog() {
        let file = parse_catalog(WGET).unwrap();
        let wget_id = file.component_by_name("WgetTool").unwrap().id;
        let catalog = file.into_catalog();
        assert_eq!(catalog.component(&wget_id).unwrap().name, "WgetTool");
    }
}
