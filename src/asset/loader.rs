use std::fs;
use std::path::Path;

use anyhow::{Context as AnyhowContext, Result};
use tracing::{info, warn};

use crate::asset::BlueprintDocument;
use crate::runtime::blueprint::Blueprint;
use crate::runtime::registry::NodeRegistry;

/// On-disk encoding of a blueprint document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.json` files are JSON; anything else is read as YAML.
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }

    pub fn parse(self, text: &str) -> Result<BlueprintDocument> {
        let document = match self {
            DocumentFormat::Yaml => serde_yaml::from_str(text).context("invalid blueprint YAML")?,
            DocumentFormat::Json => serde_json::from_str(text).context("invalid blueprint JSON")?,
        };
        Ok(document)
    }

    pub fn render(self, document: &BlueprintDocument) -> Result<String> {
        let text = match self {
            DocumentFormat::Yaml => serde_yaml::to_string(document)?,
            DocumentFormat::Json => serde_json::to_string_pretty(document)?,
        };
        Ok(text)
    }
}

pub fn load_document(path: &Path) -> Result<BlueprintDocument> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    DocumentFormat::of(path)
        .parse(&text)
        .with_context(|| format!("cannot parse {}", path.display()))
}

pub fn load_blueprint(path: &Path, registry: &NodeRegistry) -> Result<Blueprint> {
    let blueprint = build(load_document(path)?, registry)
        .with_context(|| format!("cannot build blueprint from {}", path.display()))?;
    info!(blueprint = blueprint.id(), nodes = blueprint.node_count(), path = %path.display(), "blueprint loaded");
    Ok(blueprint)
}

pub fn blueprint_from_str(text: &str, format: DocumentFormat, registry: &NodeRegistry) -> Result<Blueprint> {
    build(format.parse(text)?, registry)
}

/// Writes the blueprint in the format its extension names.
pub fn save_blueprint(blueprint: &Blueprint, path: &Path) -> Result<()> {
    let text = DocumentFormat::of(path)
        .render(&blueprint.to_document())
        .with_context(|| format!("cannot encode blueprint '{}'", blueprint.id()))?;
    fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

fn build(document: BlueprintDocument, registry: &NodeRegistry) -> Result<Blueprint> {
    let (blueprint, report) = Blueprint::from_document(document, registry)?;
    for pruned in &report.removed {
        warn!(
            blueprint = blueprint.id(),
            link = %pruned.id,
            owner = %pruned.owner,
            field = %pruned.field,
            target = %pruned.target_node,
            target_field = %pruned.target_field,
            "link dropped while loading"
        );
    }
    Ok(blueprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(DocumentFormat::of(Path::new("a/graph.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::of(Path::new("graph.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::of(Path::new("graph.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::of(Path::new("graph")), DocumentFormat::Yaml);
    }
}
