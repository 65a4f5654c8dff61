use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{GraphError, GraphResult};
use crate::runtime::blueprint::{Blueprint, NodeId, PortAddr};
use crate::runtime::context::Context;
use crate::runtime::pool::InstanceId;
use crate::runtime::port::{PortStorage, ValueType};

struct Lease {
    blueprint: Arc<Blueprint>,
    instance: InstanceId,
    generation: u64,
}

impl Drop for Lease {
    fn drop(&mut self) {
        // release_instance logs the failure itself
        let _ = self.blueprint.release_instance(self.instance, self.generation);
    }
}

/// Handle to one running instantiation of a blueprint.
///
/// Cheap to clone; the instance id goes back to the blueprint's pool when
/// the last clone is dropped. Only `Blueprint::create_virtual_graph` mints
/// one, since id validity depends on the blueprint's allocator.
#[derive(Clone)]
pub struct VirtualGraph {
    lease: Arc<Lease>,
}

impl VirtualGraph {
    pub(crate) fn new(blueprint: Arc<Blueprint>, instance: InstanceId, generation: u64) -> Self {
        Self {
            lease: Arc::new(Lease {
                blueprint,
                instance,
                generation,
            }),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.lease.instance
    }

    pub fn blueprint(&self) -> &Arc<Blueprint> {
        &self.lease.blueprint
    }

    /// Number of live clones of this handle.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.lease)
    }

    /// Evaluation context of `node` for this instance.
    pub fn context(&self, node: NodeId) -> Context<'_> {
        Context::new(self.blueprint(), self.id(), node)
    }

    /// Resets every port of this instance back to its declared default.
    pub fn reinitialize(&self) {
        self.blueprint().initialize_id(self.id());
    }

    /// Drops this handle; the id is released once no clone remains.
    pub fn release(self) {}

    fn addr(&self, node: NodeId, field: &str, index: Option<usize>) -> GraphResult<PortAddr> {
        let blueprint = self.blueprint();
        let port = blueprint.port(node, field)?;
        if matches!(port.storage(), PortStorage::Flow) {
            return Err(GraphError::TypeMismatch {
                from: ValueType::Any,
                to: ValueType::Flow,
            });
        }
        Blueprint::check_index(node, port, index)?;
        blueprint.locate(node, field).ok_or_else(|| GraphError::PortNotFound {
            node,
            field: field.to_string(),
        })
    }

    pub fn value_at(&self, node: NodeId, field: &str, index: Option<usize>) -> GraphResult<Value> {
        let addr = self.addr(node, field, index)?;
        self.blueprint()
            .read_value(addr, index, self.id())
            .ok_or_else(|| GraphError::PortNotFound {
                node,
                field: field.to_string(),
            })
    }

    pub fn value(&self, node: NodeId, field: &str) -> GraphResult<Value> {
        self.value_at(node, field, None)
    }

    pub fn sub_value(&self, node: NodeId, field: &str, index: usize) -> GraphResult<Value> {
        self.value_at(node, field, Some(index))
    }

    /// Typed read; a stored value of another shape is a `TypeMismatch`.
    pub fn value_as<T: DeserializeOwned>(&self, node: NodeId, field: &str) -> GraphResult<T> {
        let value = self.value(node, field)?;
        let from = ValueType::of(&value);
        serde_json::from_value(value).map_err(|_| GraphError::TypeMismatch {
            from,
            to: self
                .blueprint()
                .port(node, field)
                .map(|p| p.value_type().clone())
                .unwrap_or(ValueType::Any),
        })
    }

    pub fn set_value_at(&self, node: NodeId, field: &str, index: Option<usize>, value: impl Into<Value>) -> GraphResult<()> {
        let addr = self.addr(node, field, index)?;
        self.blueprint().write_value(addr, index, self.id(), value.into())
    }

    pub fn set_value(&self, node: NodeId, field: &str, value: impl Into<Value>) -> GraphResult<()> {
        self.set_value_at(node, field, None, value)
    }

    pub fn set_sub_value(&self, node: NodeId, field: &str, index: usize, value: impl Into<Value>) -> GraphResult<()> {
        self.set_value_at(node, field, Some(index), value)
    }

    /// This instance's values of every sub-port of a port, in order.
    pub fn values(&self, node: NodeId, field: &str) -> GraphResult<Vec<Option<Value>>> {
        Ok(self.blueprint().port(node, field)?.values_for(self.id()))
    }
}

impl PartialEq for VirtualGraph {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.blueprint(), other.blueprint()) && self.id() == other.id()
    }
}

impl fmt::Debug for VirtualGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualGraph")
            .field("blueprint", &self.blueprint().id())
            .field("instance", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::nodes::common::PropertyNode;

    #[test]
    fn stale_lease_does_not_free_a_recycled_id() {
        let mut bp = Blueprint::new("stale-lease", "stale-lease");
        let prop = bp.add_node("count", Box::new(PropertyNode::new(ValueType::Int, json!(0)))).unwrap();
        let bp = Arc::new(bp);

        let first = bp.create_virtual_graph();
        let id = first.id();

        // 1. The id is freed while the first lease still holds it, then handed out again
        bp.release_instance(id, first.lease.generation).unwrap();
        let second = bp.create_virtual_graph();
        assert_eq!(second.id(), id);
        second.set_value(prop, "value", 7).unwrap();

        // 2. Dropping the first handle leaves the new owner alone
        drop(first);
        assert!(bp.is_live(id));
        assert_eq!(second.value(prop, "value").unwrap(), json!(7));

        // 3. The next instance gets a fresh id
        let third = bp.create_virtual_graph();
        assert_ne!(third.id(), second.id());
        assert_eq!(bp.pool().live_count(), 2);
    }
}
