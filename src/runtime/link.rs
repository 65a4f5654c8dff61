use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::runtime::blueprint::{Blueprint, NodeId, PortAddr};
use crate::runtime::port::ValueType;

/// One half of a connection, stored on the port it leaves from.
///
/// A connection between two ports is two `Link` records, one per port, which
/// name each other through `peer`. Links are looked up by `id`, never by
/// object identity, so a link rebuilt from a document is the same link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    id: Uuid,
    peer: Uuid,
    target_node: NodeId,
    target_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_index: Option<usize>,
    value_type: ValueType,
    #[serde(skip)]
    bound: OnceLock<Option<PortAddr>>,
}

impl Link {
    pub(crate) fn new(
        id: Uuid,
        peer: Uuid,
        target_node: NodeId,
        target_field: &str,
        target_index: Option<usize>,
        local_index: Option<usize>,
        value_type: ValueType,
    ) -> Self {
        Self {
            id,
            peer,
            target_node,
            target_field: target_field.to_string(),
            target_index,
            local_index,
            value_type,
            bound: OnceLock::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> Uuid {
        self.peer
    }

    pub fn target_node(&self) -> NodeId {
        self.target_node
    }

    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// Sub-port on the remote dynamic port.
    pub fn target_index(&self) -> Option<usize> {
        self.target_index
    }

    /// Sub-port on the owning dynamic port.
    pub fn local_index(&self) -> Option<usize> {
        self.local_index
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Binds the remote port on first call and returns the cached address after.
    ///
    /// `None` means the link is dangling: the target node or field is gone,
    /// its type no longer fits, or the sub-port index is out of range.
    pub fn resolve(&self, blueprint: &Blueprint) -> Option<PortAddr> {
        *self.bound.get_or_init(|| {
            let addr = blueprint.locate(self.target_node, &self.target_field)?;
            let port = blueprint.port_at(addr)?;
            let fits = self.value_type.is_compatible_with(port.value_type())
                || port.value_type().is_compatible_with(&self.value_type);
            (fits && port.accepts_index(self.target_index)).then_some(addr)
        })
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get().is_some()
    }

    pub(crate) fn unbind(&mut self) {
        self.bound = OnceLock::new();
    }

    pub(crate) fn set_target_index(&mut self, index: Option<usize>) {
        self.target_index = index;
        self.unbind();
    }

    pub(crate) fn set_local_index(&mut self, index: Option<usize>) {
        self.local_index = index;
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.peer == other.peer
            && self.target_node == other.target_node
            && self.target_field == other.target_field
            && self.target_index == other.target_index
            && self.local_index == other.local_index
            && self.value_type == other.value_type
    }
}
