//! Configuration-management playbook renderer.
//!
//! Emits a single-play YAML playbook. Task names and shell commands are
//! written as JSON strings, which YAML accepts as double-quoted scalars.

use kiln_core::{Error, Result};
use std::fmt::Write;

use crate::engine::{ArtifactEngine, EngineState, spec_keys};
use crate::resolve::ResolvedCommand;

#[derive(Debug, Default)]
pub struct AnsibleEngine {
    state: EngineState,
}

impl AnsibleEngine {
    pub const NAME: &'static str = "ansible";

    pub fn new() -> Self {
        Self::default()
    }

    fn become_flag(&self) -> Result<bool> {
        match self.state.spec_value(spec_keys::BECOME) {
            None => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("true") || v == "yes" => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") || v == "no" => Ok(false),
            Some(v) => Err(Error::InvalidSpec(format!(
                "build-spec key '{}' must be true or false, got '{}'",
                spec_keys::BECOME,
                v
            ))),
        }
    }
}

/// Words YAML 1.1 resolves to booleans or null.
const RESERVED_WORDS: &[&str] = &[
    "y", "yes", "n", "no", "true", "false", "on", "off", "null", "~",
];

/// Plain YAML scalar when it can only be read as a string, quoted otherwise.
fn scalar(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/'))
        && !value.starts_with(['-', '.'])
        && !RESERVED_WORDS.iter().any(|w| value.eq_ignore_ascii_case(w))
        && !is_numeric(value);
    if plain {
        value.to_string()
    } else {
        quoted(value)
    }
}

fn is_numeric(value: &str) -> bool {
    let digits = value.replace('_', "");
    let lower = digits.to_ascii_lowercase();
    digits.parse::<f64>().is_ok()
        || lower.strip_prefix("0x").is_some_and(|hex| i64::from_str_radix(hex, 16).is_ok())
        || lower.strip_prefix("0o").is_some_and(|oct| i64::from_str_radix(oct, 8).is_ok())
}

fn quoted(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

impl ArtifactEngine for AnsibleEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn file_name(&self) -> &'static str {
        "playbook.yml"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &[spec_keys::OS_TYPE, spec_keys::HOST]
    }

    fn state(&self) -> &EngineState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    fn render(&self, commands: &[ResolvedCommand]) -> Result<String> {
        let host = self.state.require(spec_keys::HOST)?;
        let become_root = self.become_flag()?;
        let title = format!("Build {}", self.state.target_names().join(", "));

        // Writing into a String cannot fail.
        let mut out = String::from("---\n");
        let _ = writeln!(out, "- name: {}", quoted(&title));
        let _ = writeln!(out, "  hosts: {}", scalar(host));
        let _ = writeln!(out, "  become: {}", become_root);
        if let Some(user) = self.state.spec_value(spec_keys::REMOTE_USER) {
            let _ = writeln!(out, "  remote_user: {}", scalar(user));
        }

        if commands.is_empty() {
            out.push_str("  tasks: []\n");
            return Ok(out);
        }

        out.push_str("  tasks:\n");
        for command in commands {
            let name = format!("{} / {}", command.component, command.template);
            let _ = writeln!(out, "    - name: {}", quoted(&name));
            let _ = writeln!(out, "      shell: {}", quoted(&command.command));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::wget_fixture;

    fn wget_engine() -> AnsibleEngine {
        let fixture = wget_fixture();
        let mut engine = AnsibleEngine::new();
        engine.add_catalog(fixture.catalog);
        engine.add_target(fixture.wget);
        engine.add_builder_spec(spec_keys::OS_TYPE, "ubuntu");
        engine.add_builder_spec(spec_keys::HOST, "192.168.1.1");
        engine
    }

    #[test]
    fn test_wget_playbook() {
        let output = wget_engine().build().unwrap();
        let hosts = output.find("hosts: 192.168.1.1").unwrap();
        let update = output.find("apt-get update").unwrap();
        let install = output.find("apt-get install -y wget").unwrap();
        assert!(hosts < update && update < install);
        assert!(output.contains("- name: \"Build WgetTool\""));
        assert!(output.contains("become: true"));
        assert!(!output.contains("remote_user"));
    }

    #[test]
    fn test_host_is_required() {
        let fixture = wget_fixture();
        let mut engine = AnsibleEngine::new();
        engine.add_catalog(fixture.catalog);
        engine.add_target(fixture.wget);
        engine.add_builder_spec(spec_keys::OS_TYPE, "ubuntu");

        let err = engine.build().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_remote_user_and_become() {
        let mut engine = wget_engine();
        engine.add_builder_spec(spec_keys::REMOTE_USER, "deploy");
        engine.add_builder_spec(spec_keys::BECOME, "false");
        let output = engine.build().unwrap();
        assert!(output.contains("  remote_user: deploy\n"));
        assert!(output.contains("  become: false\n"));
    }

    #[test]
    fn test_invalid_become() {
        let mut engine = wget_engine();
        engine.add_builder_spec(spec_keys::BECOME, "maybe");
        assert!(matches!(engine.build(), Err(Error::InvalidSpec(_))));
    }

    #[test]
    fn test_empty_task_list() {
        let mut engine = wget_engine();
        engine.add_builder_spec(spec_keys::OS_TYPE, "alpine");
        assert!(engine.build().unwrap().ends_with("  tasks: []\n"));
    }

    #[test]
    fn test_commands_are_quoted() {
        assert_eq!(quoted("echo \"hi\": yes"), r#""echo \"hi\": yes""#);
        assert_eq!(scalar("all"), "all");
        assert_eq!(scalar("web servers"), "\"web servers\"");
        assert_eq!(scalar("192.168.1.1"), "192.168.1.1");
        assert_eq!(scalar("build-01.local"), "build-01.local");
        for typed in ["null", "Yes", "off", "~", "8080", "1.5", "1_000", "0x1F", "-1", ".inf"] {
            assert_eq!(scalar(typed), quoted(typed), "{typed}");
        }
    }

    #[test]
    fn test_yaml_keywords_stay_strings() {
        let mut engine = wget_engine();
        engine.add_builder_spec(spec_keys::HOST, "null");
        engine.add_builder_spec(spec_keys::REMOTE_USER, "yes");
        let output = engine.build().unwrap();
        assert!(output.contains("  hosts: \"null\"\n"));
        assert!(output.contains("  remote_user: \"yes\"\n"));
    }
}
