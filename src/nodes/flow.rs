use anyhow::Result;
use evalexpr::{ContextWithMutableVariables, DefaultNumericTypes, HashMapContext, Node as EvalNode, build_operator_tree};
use serde_json::{Value, json};
use tracing::warn;

use crate::runtime::blueprint::NodeId;
use crate::runtime::context::Context;
use crate::runtime::node::{Node, NodeDefinition};
use crate::runtime::port::{PortDescriptor, ValueType};
use crate::runtime::syscall::Syscall;

fn to_eval_value(value: &Value) -> Option<evalexpr::Value> {
    match value {
        Value::String(s) => Some(evalexpr::Value::String(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(evalexpr::Value::Int(i))
            } else {
                n.as_f64().map(evalexpr::Value::Float)
            }
        }
        Value::Bool(b) => Some(evalexpr::Value::Boolean(*b)),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// --- BRANCH NODE ---

#[derive(Debug)]
struct Condition {
    tree: EvalNode,
    raw: String,
}

/// Two-way branch on its `value` input.
///
/// With a `condition` expression the value is bound as `value` and the
/// expression decides; without one the value's truthiness does.
#[derive(Debug)]
pub struct BranchNode {
    condition: Option<Condition>,
}

impl BranchNode {
    pub fn new(condition: Option<&str>) -> Result<Self> {
        let condition = match condition {
            Some(raw) => {
                let clean = raw.replace("${", "").replace('}', "");
                Some(Condition {
                    tree: build_operator_tree(&clean)?,
                    raw: clean,
                })
            }
            None => None,
        };
        Ok(Self { condition })
    }
}

pub struct BranchDefinition;

impl NodeDefinition for BranchDefinition {
    fn name(&self) -> &str {
        "branch"
    }

    fn validate(&self, params: &Value) -> Result<()> {
        if let Some(cond) = params.get("condition").and_then(|v| v.as_str()) {
            build_operator_tree::<DefaultNumericTypes>(&cond.replace("${", "").replace('}', ""))?;
        }
        Ok(())
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Node>> {
        let condition = params.get("condition").and_then(|v| v.as_str());
        Ok(Box::new(BranchNode::new(condition)?))
    }
}

impl Node for BranchNode {
    fn kind(&self) -> &str {
        "branch"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::flow_in("enter"),
            PortDescriptor::input("value", ValueType::Any),
            PortDescriptor::flow_out("true"),
            PortDescriptor::flow_out("false"),
        ]
    }

    fn params(&self) -> Value {
        match &self.condition {
            Some(c) => json!({ "condition": c.raw }),
            None => json!({}),
        }
    }

    fn evaluate(&self, ctx: &Context<'_>, _syscall: &mut dyn Syscall) -> Result<Option<NodeId>> {
        let value = ctx.input_value("value").unwrap_or(Value::Null);

        let passed = match &self.condition {
            Some(condition) => {
                let mut eval_ctx = HashMapContext::<DefaultNumericTypes>::new();
                if let Some(ev) = to_eval_value(&value) {
                    let _ = eval_ctx.set_value("value".to_string(), ev);
                }
                condition
                    .tree
                    .eval_boolean_with_context(&eval_ctx)
                    .unwrap_or_else(|e| {
                        warn!(node = %ctx.node_id(), condition = %condition.raw, error = %e, "branch condition failed, taking false");
                        false
                    })
            }
            None => truthy(&value),
        };

        Ok(ctx.next_node(if passed { "true" } else { "false" }))
    }
}

// --- SUBGRAPH NODE ---

/// Call boundary: runs `body` to its dead end, then returns to `next`.
#[derive(Debug, Default)]
pub struct SubgraphNode;

pub struct SubgraphDefinition;

impl NodeDefinition for SubgraphDefinition {
    fn name(&self) -> &str {
        "subgraph"
    }
    fn prepare(&self, _params: Value) -> Result<Box<dyn Node>> {
        Ok(Box::new(SubgraphNode))
    }
}

impl Node for SubgraphNode {
    fn kind(&self) -> &str {
        "subgraph"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::flow_in("enter"),
            PortDescriptor::flow_out("body"),
            PortDescriptor::flow_out("next"),
        ]
    }

    fn evaluate(&self, ctx: &Context<'_>, syscall: &mut dyn Syscall) -> Result<Option<NodeId>> {
        let next = ctx.next_node("next");
        match ctx.next_node("body") {
            Some(body) => {
                if let Some(next) = next {
                    syscall.push_continuation(next)?;
                }
                Ok(Some(body))
            }
            None => Ok(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_value_shape() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(2)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&Value::Null));
    }

    #[test]
    fn condition_placeholders_are_stripped() {
        let node = BranchNode::new(Some("${value} > 10")).expect("valid expression");
        assert_eq!(node.params(), json!({ "condition": "value > 10" }));
    }

    #[test]
    fn invalid_condition_is_rejected() {
        assert!(BranchDefinition.validate(&json!({ "condition": "value >" })).is_err());
    }
}
