use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::runtime::blueprint::NodeId;
use crate::runtime::context::Context;
use crate::runtime::node::{Node, NodeDefinition};
use crate::runtime::port::{PortDescriptor, ValueType};
use crate::runtime::syscall::Syscall;

fn as_text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

// --- DIALOGUE NODE ---

/// Displays one line. Speaker and text may come from linked property nodes.
#[derive(Debug, Clone)]
pub struct DialogueNode {
    speaker: String,
    text: String,
}

impl DialogueNode {
    pub fn new(speaker: &str, text: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            text: text.to_string(),
        }
    }
}

pub struct DialogueDefinition;

impl NodeDefinition for DialogueDefinition {
    fn name(&self) -> &str {
        "dialogue"
    }

    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("text") {
            None | Some(Value::String(_)) => Ok(()),
            Some(other) => Err(anyhow!("dialogue text must be a string, got {}", other)),
        }
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Node>> {
        let speaker = params.get("speaker").and_then(|v| v.as_str()).unwrap_or_default();
        let text = params.get("text").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(Box::new(DialogueNode::new(speaker, text)))
    }
}

impl Node for DialogueNode {
    fn kind(&self) -> &str {
        "dialogue"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::flow_in("enter"),
            PortDescriptor::input("speaker", ValueType::String).with_default(self.speaker.as_str()),
            PortDescriptor::input("text", ValueType::String).with_default(self.text.as_str()),
            PortDescriptor::output("line", ValueType::String),
            PortDescriptor::output("visits", ValueType::Int).with_default(0),
            PortDescriptor::flow_out("next"),
        ]
    }

    fn params(&self) -> Value {
        json!({ "speaker": self.speaker, "text": self.text })
    }

    fn evaluate(&self, ctx: &Context<'_>, _syscall: &mut dyn Syscall) -> Result<Option<NodeId>> {
        let speaker = as_text(ctx.input_value("speaker"));
        let text = as_text(ctx.input_value("text"));
        let line = if speaker.is_empty() {
            text
        } else {
            format!("{}: {}", speaker, text)
        };

        let visits = ctx.local_as::<i64>("visits").unwrap_or(0) + 1;
        ctx.set_local_value("visits", visits)?;
        ctx.set_local_value("line", line.as_str())?;
        info!(instance = %ctx.instance(), node = %ctx.node_id(), visits, "{}", line);

        Ok(ctx.next_node("next"))
    }
}

// --- CHOICE NODE ---

/// Branches on a host-provided selection, then resumes at `then`.
///
/// The host writes the chosen index into the `selected` input of its
/// instance before stepping. The selected branch runs until it dead-ends,
/// after which the evaluator pops back to `then`.
#[derive(Debug, Clone)]
pub struct ChoiceNode {
    options: Vec<String>,
}

impl ChoiceNode {
    pub fn new<S: AsRef<str>>(options: &[S]) -> Self {
        Self {
            options: options.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

pub struct ChoiceDefinition;

impl NodeDefinition for ChoiceDefinition {
    fn name(&self) -> &str {
        "choice"
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Node>> {
        let options: Vec<String> = match params.get("options") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Vec::new(),
        };
        Ok(Box::new(ChoiceNode { options }))
    }
}

impl Node for ChoiceNode {
    fn kind(&self) -> &str {
        "choice"
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        let labels = self.options.iter().map(|o| json!(o)).collect();
        vec![
            PortDescriptor::flow_in("enter"),
            PortDescriptor::input("selected", ValueType::Int),
            PortDescriptor::output("choices", ValueType::Flow).single().dynamic(labels),
            PortDescriptor::output("picked", ValueType::String),
            PortDescriptor::flow_out("then"),
        ]
    }

    fn params(&self) -> Value {
        json!({ "options": self.options })
    }

    fn evaluate(&self, ctx: &Context<'_>, syscall: &mut dyn Syscall) -> Result<Option<NodeId>> {
        let selected = ctx.local_as::<usize>("selected");
        ctx.set_local_value("selected", Value::Null)?;
        let then = ctx.next_node("then");

        let Some(index) = selected else {
            warn!(instance = %ctx.instance(), node = %ctx.node_id(), "no choice selected, continuing");
            return Ok(then);
        };
        ctx.set_local_value("picked", as_text(ctx.sub_value("choices", index)))?;

        match ctx.sub_port_target("choices", index) {
            Some(target) => {
                if let Some(then) = then {
                    syscall.push_continuation(then)?;
                }
                Ok(Some(target))
            }
            None => {
                warn!(instance = %ctx.instance(), node = %ctx.node_id(), index, "choice has no branch, continuing");
                Ok(then)
            }
        }
    }
}
