use serde_json::Value;

use crate::error::{GraphError, GraphResult};
use crate::nodes::common::{EndNode, PropertyNode, RootNode};
use crate::nodes::dialogue::{ChoiceNode, DialogueNode};
use crate::nodes::flow::{BranchNode, SubgraphNode};
use crate::runtime::blueprint::{Blueprint, NodeId};
use crate::runtime::node::Node;
use crate::runtime::port::ValueType;

/// Fluent construction of a blueprint by node label.
///
/// Every call is applied immediately; the first failure is remembered and
/// returned by `build`, later calls become no-ops.
pub struct BlueprintBuilder {
    blueprint: Blueprint,
    root: Option<String>,
    error: Option<GraphError>,
}

impl BlueprintBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            blueprint: Blueprint::new(id, id),
            root: None,
            error: None,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        let id = self.blueprint.id().to_string();
        if self.error.is_none() && self.blueprint.node_count() == 0 {
            self.blueprint = Blueprint::new(&id, name);
        } else if self.error.is_none() {
            self.error = Some(GraphError::Document("name must be set before nodes are added".to_string()));
        }
        self
    }

    fn apply(mut self, op: impl FnOnce(&mut Blueprint) -> GraphResult<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = op(&mut self.blueprint) {
                self.error = Some(e);
            }
        }
        self
    }

    fn id_of(blueprint: &Blueprint, label: &str) -> GraphResult<NodeId> {
        blueprint
            .node_id(label)
            .ok_or_else(|| GraphError::LabelNotFound(label.to_string()))
    }

    /// Adds any node under `label`.
    pub fn node(self, label: &str, node: impl Node + 'static) -> Self {
        self.apply(|bp| bp.add_node(label, Box::new(node)).map(|_| ()))
    }

    /// Adds a root node and makes it the entry point.
    pub fn root(mut self, label: &str) -> Self {
        self.root = Some(label.to_string());
        self.node(label, RootNode)
    }

    pub fn end(self, label: &str) -> Self {
        self.node(label, EndNode)
    }

    pub fn dialogue(self, label: &str, speaker: &str, text: &str) -> Self {
        self.node(label, DialogueNode::new(speaker, text))
    }

    pub fn choice<S: AsRef<str>>(self, label: &str, options: &[S]) -> Self {
        self.node(label, ChoiceNode::new(options))
    }

    pub fn branch(self, label: &str, condition: Option<&str>) -> Self {
        match BranchNode::new(condition) {
            Ok(node) => self.node(label, node),
            Err(e) => {
                let message = format!("branch '{}': {:#}", label, e);
                self.apply(|_| Err(GraphError::Document(message)))
            }
        }
    }

    pub fn subgraph(self, label: &str) -> Self {
        self.node(label, SubgraphNode)
    }

    pub fn property(self, label: &str, value_type: ValueType, value: impl Into<Value>) -> Self {
        self.node(label, PropertyNode::new(value_type, value.into()))
    }

    /// Connects two ports by node label and field.
    pub fn connect(self, from: &str, from_field: &str, to: &str, to_field: &str) -> Self {
        self.apply(|bp| {
            let (a, b) = (Self::id_of(bp, from)?, Self::id_of(bp, to)?);
            bp.connect(a, from_field, b, to_field).map(|_| ())
        })
    }

    /// Flow edge from `from.next` to `to.enter`.
    pub fn flow(self, from: &str, to: &str) -> Self {
        self.connect(from, "next", to, "enter")
    }

    /// Flow edge from option `index` of a choice node to `to.enter`.
    pub fn connect_choice(self, from: &str, index: usize, to: &str) -> Self {
        self.apply(|bp| {
            let (a, b) = (Self::id_of(bp, from)?, Self::id_of(bp, to)?);
            bp.connect_indexed(a, "choices", Some(index), b, "enter", None).map(|_| ())
        })
    }

    pub fn connect_if(self, from: &str, to: &str) -> Self {
        self.connect(from, "true", to, "enter")
    }

    pub fn connect_else(self, from: &str, to: &str) -> Self {
        self.connect(from, "false", to, "enter")
    }

    pub fn build(self) -> GraphResult<Blueprint> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut blueprint = self.blueprint;
        if let Some(label) = self.root {
            let root = Self::id_of(&blueprint, &label)?;
            blueprint.set_root(root)?;
        }
        Ok(blueprint)
    }
}
