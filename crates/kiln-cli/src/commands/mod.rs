//! CLI command implementations.

pub mod builds;

use anyhow::{Context, Result, bail};
use kiln_config::{CatalogFile, parse_catalog};
use kiln_engine::EngineRegistry;
use std::path::Path;

/// Parse a `key=value` build spec entry.
pub fn parse_spec_entry(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn engines() {
    for name in EngineRegistry::new().engine_names() {
        println!("{}", name);
    }
}

/// Render `components` from an already parsed catalog. Returns the
/// artifact's file name and text.
pub fn render(
    file: CatalogFile,
    engine_name: &str,
    components: &[String],
    spec: Vec<(String, String)>,
) -> Result<(&'static str, String)> {
    let ids = components
        .iter()
        .map(|name| {
            file.component_by_name(name)
                .map(|c| c.id)
                .with_context(|| format!("component '{}' is not in the catalog", name))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut engine = EngineRegistry::new().create(engine_name)?;
    engine.add_catalog(file.into_catalog());
    for id in ids {
        engine.add_target(id);
    }
    for (key, value) in &spec {
        engine.add_builder_spec(key, value);
    }

    let artifact = engine.build()?;
    Ok((engine.file_name(), artifact))
}

pub fn generate(
    catalog: &Path,
    engine_name: &str,
    components: &[String],
    spec: Vec<(String, String)>,
    output: Option<&Path>,
) -> Result<()> {
    let file = CatalogFile::load(catalog)
        .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
    let (file_name, artifact) = render(file, engine_name, components, spec)?;

    match output {
        Some(path) => {
            std::fs::write(path, &artifact)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} to {}", file_name, path.display());
        }
        None => print!("{}", artifact),
    }
    Ok(())
}

pub fn validate(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match parse_catalog(&content) {
        Ok(file) => {
            println!(
                "Catalog is valid: {} templates, {} components",
                file.templates.len(),
                file.components.len()
            );
            Ok(())
        }
        Err(e) => bail!("Catalog error: {}", e),
    }
}
