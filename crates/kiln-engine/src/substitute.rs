//! `${name}` parameter substitution.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^{}]+)\}").expect("parameter pattern is valid"));

/// Replace every `${name}` whose name is in `params`.
///
/// Single pass: values are inserted literally and never re-scanned.
/// Placeholders without a value are left intact.
pub fn substitute(command: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return command.to_string();
    }
    PARAM_REGEX
        .replace_all(command, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
