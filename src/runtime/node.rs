use std::fmt::Debug;

use anyhow::Result;
use serde_json::Value;

use crate::runtime::blueprint::NodeId;
use crate::runtime::context::Context;
use crate::runtime::port::PortDescriptor;
use crate::runtime::syscall::Syscall;

/// Runtime node interface.
///
/// A node is shared by every instance of its blueprint, so it holds no
/// per-execution state itself; everything mutable lives in its ports and is
/// reached through the `Context`.
pub trait Node: Send + Sync + Debug {
    /// Registry name of this node kind.
    fn kind(&self) -> &str;

    /// Declared ports. Called when the node is added and on structural resync,
    /// never during evaluation.
    fn ports(&self) -> Vec<PortDescriptor>;

    /// Authoring parameters, written back into documents.
    fn params(&self) -> Value {
        Value::Null
    }

    /// Runs the node for `ctx.instance()` and returns the next node to visit.
    fn evaluate(&self, ctx: &Context<'_>, syscall: &mut dyn Syscall) -> Result<Option<NodeId>>;
}

/// Node factory, used to rebuild nodes from documents.
pub trait NodeDefinition: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Node>>;
}
