use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{GraphError, GraphResult};
use crate::runtime::blueprint::{Blueprint, NodeId, PortAddr};
use crate::runtime::link::Link;
use crate::runtime::pool::InstanceId;
use crate::runtime::port::Port;

/// Execution context for one node evaluation.
///
/// Carries the instance id explicitly, so every port access made through it
/// reads and writes that instance's values. Nothing is stored globally, and
/// evaluators over the same blueprint may run on different threads.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    blueprint: &'a Blueprint,
    instance: InstanceId,
    node: NodeId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(blueprint: &'a Blueprint, instance: InstanceId, node: NodeId) -> Self {
        Self {
            blueprint,
            instance,
            node,
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn blueprint(&self) -> &'a Blueprint {
        self.blueprint
    }

    pub fn port(&self, field: &str) -> Option<&'a Port> {
        self.blueprint.node(self.node)?.port(field)
    }

    fn addr(&self, field: &str) -> GraphResult<PortAddr> {
        self.blueprint
            .locate(self.node, field)
            .ok_or_else(|| GraphError::PortNotFound {
                node: self.node,
                field: field.to_string(),
            })
    }

    // --- topology ---

    /// Target of the first link on `field` that still resolves.
    pub fn next_node(&self, field: &str) -> Option<NodeId> {
        self.targets(field).into_iter().next()
    }

    /// Targets of every resolvable link on `field`, in link order.
    pub fn targets(&self, field: &str) -> Vec<NodeId> {
        let Some(port) = self.port(field) else {
            return Vec::new();
        };
        port.links()
            .iter()
            .filter(|link| self.resolves(link))
            .map(Link::target_node)
            .collect()
    }

    /// Target of sub-port `index` of a dynamic port.
    pub fn sub_port_target(&self, field: &str, index: usize) -> Option<NodeId> {
        self.port(field)?
            .links_at(index)
            .find(|link| self.resolves(link))
            .map(Link::target_node)
    }

    pub fn sub_port_count(&self, field: &str) -> usize {
        self.port(field).and_then(Port::sub_port_count).unwrap_or(0)
    }

    fn resolves(&self, link: &Link) -> bool {
        let bound = link.resolve(self.blueprint).is_some();
        if !bound {
            warn!(node = %self.node, link = %link.id(), target_field = link.target_field(), "skipping dangling link");
        }
        bound
    }

    // --- local values ---

    pub fn local_value(&self, field: &str) -> Option<Value> {
        let addr = self.blueprint.locate(self.node, field)?;
        self.blueprint.read_value(addr, None, self.instance)
    }

    pub fn local_as<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        let value = self.local_value(field)?;
        serde_json::from_value(value).ok()
    }

    pub fn set_local_value(&self, field: &str, value: impl Into<Value>) -> GraphResult<()> {
        let addr = self.addr(field)?;
        self.blueprint.write_value(addr, None, self.instance, value.into())
    }

    pub fn sub_value(&self, field: &str, index: usize) -> Option<Value> {
        let addr = self.blueprint.locate(self.node, field)?;
        self.blueprint.read_value(addr, Some(index), self.instance)
    }

    pub fn set_sub_value(&self, field: &str, index: usize, value: impl Into<Value>) -> GraphResult<()> {
        let addr = self.addr(field)?;
        self.blueprint
            .write_value(addr, Some(index), self.instance, value.into())
    }

    // --- remote values ---

    /// Value on the far end of `link` for this instance, or `None` when the
    /// link is dangling or the stored value does not deserialize as `T`.
    pub fn try_get_value<T: DeserializeOwned>(&self, link: &Link) -> Option<T> {
        let addr = link.resolve(self.blueprint)?;
        let value = self
            .blueprint
            .read_value(addr, link.target_index(), self.instance)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(node = %self.node, link = %link.id(), error = %e, "linked value has another type");
                None
            }
        }
    }

    /// Like `try_get_value`, for links whose type is guaranteed by the
    /// connection rules. A mismatch is logged and yields `T::default()`.
    pub fn get_value_as<T: DeserializeOwned + Default>(&self, link: &Link) -> T {
        let Some(addr) = link.resolve(self.blueprint) else {
            warn!(node = %self.node, link = %link.id(), "dangling link read, using default");
            return T::default();
        };
        let Some(value) = self
            .blueprint
            .read_value(addr, link.target_index(), self.instance)
        else {
            warn!(node = %self.node, link = %link.id(), "linked port has no value, using default");
            return T::default();
        };
        serde_json::from_value(value).unwrap_or_else(|e| {
            error!(node = %self.node, link = %link.id(), error = %e, "linked value breaks the connection type, using default");
            T::default()
        })
    }

    /// Value feeding an input: the first resolvable link's remote value when
    /// linked, otherwise this instance's own value of the port.
    pub fn input_value(&self, field: &str) -> Option<Value> {
        let port = self.port(field)?;
        match port.links().iter().find(|link| self.resolves(link)) {
            Some(link) => self.try_get_value(link),
            None => self.local_value(field),
        }
    }

    pub fn input<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        serde_json::from_value(self.input_value(field)?).ok()
    }
}
