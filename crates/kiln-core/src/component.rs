//! Components: buildable units with branches and build recipes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ResourceId;

/// A buildable unit in the catalog.
///
/// Components are created and updated through the API; the scheduler only
/// reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ResourceId,
    /// Unique name.
    pub name: String,
    /// Source repository the build pod checks out.
    pub repository_url: Option<String>,
    /// OS images a build is requested for, one build record each.
    pub build_os: Vec<String>,
    pub branches: Vec<String>,
    /// Templates this component executes, with their parameters.
    pub template_instances: Vec<CommandTemplateInstance>,
    /// Templates this component owns outright (no parameters).
    pub owned_templates: Vec<ResourceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reference to a command template together with the values for its
/// `${name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplateInstance {
    pub template_id: ResourceId,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Fields accepted when creating a component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComponent {
    pub name: String,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub build_os: Vec<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub template_instances: Vec<CommandTemplateInstance>,
    #[serde(default)]
    pub owned_templates: Vec<ResourceId>,
}

impl Component {
    pub fn from_new(new: NewComponent) -> Self {
        let now = Utc::now();
        Self {
            id: ResourceId::new(),
            name: new.name,
            repository_url: new.repository_url,
            build_os: new.build_os,
            branches: new.branches,
            template_instances: new.template_instances,
            owned_templates: new.owned_templates,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }

    /// Every template id this component reaches directly, owned first.
    pub fn template_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.owned_templates
            .iter()
            .copied()
            .chain(self.template_instances.iter().map(|i| i.template_id))
    }
}
