//! Helpers for extracting values from KDL nodes.

use kdl::KdlNode;

use crate::{ConfigError, ConfigResult};

pub(crate) fn first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

pub(crate) fn all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

pub(crate) fn string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// Named string properties other than `skip`, in declaration order.
pub(crate) fn string_props_except(node: &KdlNode, skip: &[&str]) -> Vec<(String, String)> {
    node.entries()
        .iter()
        .filter_map(|e| {
            let name = e.name()?.value();
            if skip.contains(&name) {
                return None;
            }
            let value = e.value().as_string()?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

pub(crate) fn required_string_arg(node: &KdlNode, what: &str) -> ConfigResult<String> {
    first_string_arg(node).ok_or_else(|| ConfigError::MissingField(what.to_string()))
}

/// First positional integer argument, rejected when negative.
pub(crate) fn first_u64_arg(node: &KdlNode, field: &str) -> ConfigResult<Option<u64>> {
    let Some(value) = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
    else {
        return Ok(None);
    };
    let int = value.as_integer().ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("expected an integer, got {}", value),
    })?;
    u64::try_from(int)
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a non-negative integer, got {}", int),
        })
}
