use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use crate::runtime::blueprint::NodeId;
use crate::runtime::context::Context;
use crate::runtime::node::{Node, NodeDefinition};
use crate::runtime::port::{PortDescriptor, ValueType};
use crate::runtime::syscall::Syscall;

// --- ROOT NODE ---

/// Entry point of a blueprint.
#[derive(Debug, Default)]
pub struct RootNode;

pub struct RootDefinition;

impl NodeDefinition for RootDefinition {
    fn name(&self) -> &str {
        "root"
    }
    fn prepare(&self, _params: Value) -> Result<Box<dyn Node>> {
        Ok(Box::new(RootNode))
    }
}

impl Node for RootNode {
    fn kind(&self) -> &str {
        "root"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::flow_out("next")]
    }

    fn evaluate(&self, ctx: &Context<'_>, _syscall: &mut dyn Syscall) -> Result<Option<NodeId>> {
        Ok(ctx.next_node("next"))
    }
}

// --- END NODE ---

#[derive(Debug, Default)]
pub struct EndNode;

pub struct EndDefinition;

impl NodeDefinition for EndDefinition {
    fn name(&self) -> &str {
        "end"
    }
    fn prepare(&self, _params: Value) -> Result<Box<dyn Node>> {
        Ok(Box::new(EndNode))
    }
}

impl Node for EndNode {
    fn kind(&self) -> &str {
        "end"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::flow_in("enter")]
    }

    fn evaluate(&self, _ctx: &Context<'_>, _syscall: &mut dyn Syscall) -> Result<Option<NodeId>> {
        Ok(None)
    }
}

// --- PROPERTY NODE ---

/// Holds a value other nodes read through links. Never on the flow path.
#[derive(Debug)]
pub struct PropertyNode {
    value_type: ValueType,
    value: Value,
}

impl PropertyNode {
    pub fn new(value_type: ValueType, value: Value) -> Self {
        Self { value_type, value }
    }
}

pub struct PropertyDefinition;

impl NodeDefinition for PropertyDefinition {
    fn name(&self) -> &str {
        "property"
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if let Some(ty) = params.get("type") {
            let ty: ValueType = serde_json::from_value(ty.clone())?;
            let value = params.get("value").unwrap_or(&Value::Null);
            if !ty.admits(value) {
                return Err(anyhow!("property value {} is not a {}", value, ty));
            }
        }
        Ok(())
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Node>> {
        let value_type = match params.get("type") {
            Some(ty) => serde_json::from_value(ty.clone())?,
            None => ValueType::Any,
        };
        let value = params.get("value").cloned().unwrap_or(Value::Null);
        Ok(Box::new(PropertyNode { value_type, value }))
    }
}

impl Node for PropertyNode {
    fn kind(&self) -> &str {
        "property"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::output("value", self.value_type.clone()).with_default(self.value.clone())]
    }

    fn params(&self) -> Value {
        json!({ "type": self.value_type, "value": self.value })
    }

    fn evaluate(&self, _ctx: &Context<'_>, _syscall: &mut dyn Syscall) -> Result<Option<NodeId>> {
        Ok(None)
    }
}
