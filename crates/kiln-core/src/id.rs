//! Resource identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier shared by components, command templates and builds.
///
/// Backed by UUIDv7, so ids created later sort after ids created earlier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct ResourceId(Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Lowercase hex without hyphens, safe for DNS-1123 resource names.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ResourceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ResourceId> for Uuid {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl std::str::FromStr for ResourceId {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidInput(format!("invalid id '{}': {}", s, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_through_parse() {
        let id = ResourceId::new();
        let parsed: ResourceId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<ResourceId>().unwrap_err();
        assert_eq!(err.code(), 1006);
    }

    #[test]
    fn test_simple_form_has_no_hyphens() {
        let id = ResourceId::new();
        assert_eq!(id.simple().len(), 32);
        assert!(!id.simple().contains('-'));
    }
}
