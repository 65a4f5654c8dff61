use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::nodes::common::{EndDefinition, PropertyDefinition, RootDefinition};
use crate::nodes::dialogue::{ChoiceDefinition, DialogueDefinition};
use crate::nodes::flow::{BranchDefinition, SubgraphDefinition};
use crate::runtime::node::{Node, NodeDefinition};

/// Node kinds known to the loader, by name.
#[derive(Default)]
pub struct NodeRegistry {
    definitions: HashMap<String, Box<dyn NodeDefinition>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in node kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RootDefinition));
        registry.register(Box::new(EndDefinition));
        registry.register(Box::new(PropertyDefinition));
        registry.register(Box::new(DialogueDefinition));
        registry.register(Box::new(ChoiceDefinition));
        registry.register(Box::new(BranchDefinition));
        registry.register(Box::new(SubgraphDefinition));
        registry
    }

    /// Adds a definition, replacing any previous one with the same name.
    pub fn register(&mut self, definition: Box<dyn NodeDefinition>) {
        debug!(kind = definition.name(), "node definition registered");
        self.definitions.insert(definition.name().to_string(), definition);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.definitions.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Validates `params` and builds a node of `kind`.
    pub fn prepare(&self, kind: &str, params: Value) -> GraphResult<Box<dyn Node>> {
        let definition = self
            .definitions
            .get(kind)
            .ok_or_else(|| GraphError::UnknownNodeKind(kind.to_string()))?;
        definition
            .validate(&params)
            .and_then(|_| definition.prepare(params))
            .map_err(|e| GraphError::Document(format!("cannot prepare '{}' node: {:#}", kind, e)))
    }
}
