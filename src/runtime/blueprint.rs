use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{GraphError, GraphResult};
use crate::runtime::link::Link;
use crate::runtime::node::Node;
use crate::runtime::pool::{InstanceId, InstancePool};
use crate::runtime::port::{Arity, Capacity, Port, PortDescriptor, PortDirection, PortStorage, ValueType};
use crate::runtime::value::ValueSlot;
use crate::runtime::virtual_graph::VirtualGraph;

/// Stable identity of a node inside one blueprint (its arena index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Address of a port: owning node plus position in its port list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortAddr {
    pub node: NodeId,
    pub port: usize,
}

/// Address of a link inside a port's link list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkAddr {
    pub port: PortAddr,
    pub link: usize,
}

/// A node together with its ports.
#[derive(Debug)]
pub struct NodeEntry {
    id: NodeId,
    label: String,
    node: Box<dyn Node>,
    ports: Vec<Port>,
    /// Set by `replace_node`; the next resync takes defaults from the new declaration.
    redeclared: bool,
}

impl NodeEntry {
    fn new(id: NodeId, label: &str, node: Box<dyn Node>) -> Self {
        let ports = node.ports().into_iter().map(Port::from_descriptor).collect();
        Self {
            id,
            label: label.to_string(),
            node,
            ports,
            redeclared: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &str {
        self.node.kind()
    }

    pub fn node(&self) -> &dyn Node {
        self.node.as_ref()
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, field: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.field() == field)
    }

    pub fn port_index(&self, field: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.field() == field)
    }
}

/// A link removed by a structural resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunedLink {
    pub id: Uuid,
    pub owner: NodeId,
    pub field: String,
    pub target_node: NodeId,
    pub target_field: String,
}

impl PrunedLink {
    fn new(owner: NodeId, field: &str, link: &Link) -> Self {
        Self {
            id: link.id(),
            owner,
            field: field.to_string(),
            target_node: link.target_node(),
            target_field: link.target_field().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<PrunedLink>,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.removed.len()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.removed.iter().any(|p| p.id == id)
    }

    pub fn merge(&mut self, other: PruneReport) {
        self.removed.extend(other.removed);
    }
}

/// Graph template shared by every running instance.
///
/// Owns all nodes, their ports and links, and the allocator for instance ids.
/// Topology is edited through `&mut self`; once wrapped in an `Arc` and
/// instantiated, only the per-instance value tables change.
#[derive(Debug)]
pub struct Blueprint {
    id: String,
    name: String,
    root: Option<NodeId>,
    nodes: Vec<Option<NodeEntry>>,
    labels: HashMap<String, NodeId>,
    pool: InstancePool,
    link_cache: OnceLock<Vec<LinkAddr>>,
}

impl Blueprint {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            root: None,
            nodes: Vec::new(),
            labels: HashMap::new(),
            pool: InstancePool::new(),
            link_cache: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, node: NodeId) -> GraphResult<()> {
        self.node(node).ok_or(GraphError::NodeNotFound(node))?;
        self.root = Some(node);
        Ok(())
    }

    // --- nodes ---

    pub fn add_node(&mut self, label: &str, node: Box<dyn Node>) -> GraphResult<NodeId> {
        let id = NodeId(self.nodes.len() as u32);
        self.insert_node(id, label, node)?;
        Ok(id)
    }

    /// Places a node at a fixed id. Used when rebuilding from a document.
    pub(crate) fn insert_node(&mut self, id: NodeId, label: &str, node: Box<dyn Node>) -> GraphResult<()> {
        if self.labels.contains_key(label) {
            return Err(GraphError::DuplicateLabel(label.to_string()));
        }
        let index = id.0 as usize;
        if index >= self.nodes.len() {
            self.nodes.resize_with(index + 1, || None);
        }
        if self.nodes[index].is_some() {
            return Err(GraphError::Document(format!("node id {} used twice", id)));
        }
        let entry = NodeEntry::new(id, label, node);
        for instance in self.pool.live() {
            entry.ports.iter().for_each(|port| port.reset(instance));
        }
        debug!(blueprint = %self.id, node = %id, kind = entry.kind(), label, "node added");
        self.nodes[index] = Some(entry);
        self.labels.insert(label.to_string(), id);
        self.invalidate();
        Ok(())
    }

    /// Removes a node and every link pointing at it.
    pub fn remove_node(&mut self, id: NodeId) -> GraphResult<Box<dyn Node>> {
        let entry = self
            .nodes
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(GraphError::NodeNotFound(id))?;
        for peer in entry.ports.iter().flat_map(|p| p.links.iter().map(Link::peer)) {
            self.remove_link(peer);
        }
        self.labels.remove(&entry.label);
        if self.root == Some(id) {
            self.root = None;
        }
        self.invalidate();
        debug!(blueprint = %self.id, node = %id, "node removed");
        Ok(entry.node)
    }

    /// Swaps a node's implementation. Ports are rebuilt by the next `resync`.
    pub fn replace_node(&mut self, id: NodeId, node: Box<dyn Node>) -> GraphResult<Box<dyn Node>> {
        let entry = self.node_mut(id)?;
        let old = std::mem::replace(&mut entry.node, node);
        entry.redeclared = true;
        self.invalidate();
        Ok(old)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut NodeEntry> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(id))
    }

    pub fn node_id(&self, label: &str) -> Option<NodeId> {
        self.labels.get(label).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeEntry> {
        self.nodes.iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    // --- ports ---

    pub fn locate(&self, node: NodeId, field: &str) -> Option<PortAddr> {
        let port = self.node(node)?.port_index(field)?;
        Some(PortAddr { node, port })
    }

    pub fn port_at(&self, addr: PortAddr) -> Option<&Port> {
        self.node(addr.node)?.ports.get(addr.port)
    }

    fn port_at_mut(&mut self, addr: PortAddr) -> GraphResult<&mut Port> {
        self.node_mut(addr.node)?
            .ports
            .get_mut(addr.port)
            .ok_or_else(|| GraphError::PortNotFound {
                node: addr.node,
                field: format!("#{}", addr.port),
            })
    }

    pub fn port(&self, node: NodeId, field: &str) -> GraphResult<&Port> {
        let entry = self.node(node).ok_or(GraphError::NodeNotFound(node))?;
        entry.port(field).ok_or_else(|| GraphError::PortNotFound {
            node,
            field: field.to_string(),
        })
    }

    fn require_port(&self, node: NodeId, field: &str) -> GraphResult<PortAddr> {
        self.port(node, field)?;
        self.locate(node, field).ok_or_else(|| GraphError::PortNotFound {
            node,
            field: field.to_string(),
        })
    }

    pub(crate) fn check_index(node: NodeId, port: &Port, index: Option<usize>) -> GraphResult<()> {
        match (port.sub_port_count(), index) {
            (Some(_), None) => Err(GraphError::SubPortRequired {
                node,
                field: port.field().to_string(),
            }),
            (Some(len), Some(i)) if i >= len => Err(GraphError::SubPortOutOfRange {
                node,
                field: port.field().to_string(),
                index: i,
                len,
            }),
            (None, Some(_)) => Err(GraphError::NotDynamic {
                node,
                field: port.field().to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn slot_of<'p>(node: NodeId, port: &'p Port, index: Option<usize>, value: &Value) -> GraphResult<&'p ValueSlot> {
        if matches!(port.storage(), PortStorage::Flow) {
            return Err(GraphError::TypeMismatch {
                from: ValueType::of(value),
                to: ValueType::Flow,
            });
        }
        Self::check_index(node, port, index)?;
        // sub-ports of dynamic flow ports carry labels of any shape
        if !port.value_type().is_flow() && !port.value_type().admits(value) {
            return Err(GraphError::TypeMismatch {
                from: ValueType::of(value),
                to: port.value_type().clone(),
            });
        }
        port.slot(index).ok_or_else(|| GraphError::PortNotFound {
            node,
            field: port.field().to_string(),
        })
    }

    /// Changes the declared default of a fixed port (or one sub-port).
    pub fn set_default_at(&mut self, node: NodeId, field: &str, index: Option<usize>, value: Value) -> GraphResult<()> {
        let addr = self.require_port(node, field)?;
        let port = self.port_at_mut(addr)?;
        Self::slot_of(node, port, index, &value)?;
        if let Some(slot) = port.slot_mut(index) {
            slot.set_default(value);
        }
        Ok(())
    }

    pub fn set_default(&mut self, node: NodeId, field: &str, value: Value) -> GraphResult<()> {
        self.set_default_at(node, field, None, value)
    }

    /// Appends a sub-port to a dynamic port and initialises it for every live instance.
    pub fn add_sub_port(&mut self, node: NodeId, field: &str, default: Value) -> GraphResult<usize> {
        let addr = self.require_port(node, field)?;
        let live = self.pool.live();
        let port = self.port_at_mut(addr)?;
        let PortStorage::Dynamic(slots) = &mut port.storage else {
            return Err(GraphError::NotDynamic {
                node,
                field: field.to_string(),
            });
        };
        let slot = ValueSlot::new(default);
        live.iter().for_each(|instance| slot.reset(*instance));
        slots.push(slot);
        Ok(slots.len() - 1)
    }

    /// Removes one sub-port, its values and its links (both halves), and
    /// shifts the indices of later sub-ports on both ends of their links.
    pub fn remove_sub_port(&mut self, node: NodeId, field: &str, index: usize) -> GraphResult<Vec<Uuid>> {
        let addr = self.require_port(node, field)?;
        let port = self.port_at_mut(addr)?;
        let len = port.sub_port_count().ok_or_else(|| GraphError::NotDynamic {
            node,
            field: field.to_string(),
        })?;
        if index >= len {
            return Err(GraphError::SubPortOutOfRange {
                node,
                field: field.to_string(),
                index,
                len,
            });
        }

        let mut removed = Vec::new();
        port.links.retain(|link| {
            if link.local_index() == Some(index) {
                removed.push((link.id(), link.peer()));
                false
            } else {
                true
            }
        });
        let mut shifted = Vec::new();
        for link in port.links.iter_mut() {
            match link.local_index() {
                Some(i) if i > index => {
                    link.set_local_index(Some(i - 1));
                    shifted.push(link.peer());
                }
                _ => {}
            }
        }
        if let PortStorage::Dynamic(slots) = &mut port.storage {
            slots.remove(index);
        }

        for (_, peer) in &removed {
            self.remove_link(*peer);
        }
        for peer in shifted {
            if let Some(link) = self.link_mut(peer) {
                let target = link.target_index().map(|i| i - 1);
                link.set_target_index(target);
            }
        }
        self.invalidate();
        Ok(removed.into_iter().map(|(id, _)| id).collect())
    }

    // --- links ---

    /// Links an output port to an input port. Returns the GUID of the
    /// output-side link.
    pub fn connect(&mut self, from: NodeId, from_field: &str, to: NodeId, to_field: &str) -> GraphResult<Uuid> {
        self.connect_indexed(from, from_field, None, to, to_field, None)
    }

    /// Like `connect`, addressing sub-ports of dynamic ports.
    ///
    /// Fails without touching the graph if a port is missing, the direction
    /// is not output to input, either side is at capacity, or the value types
    /// are incompatible.
    pub fn connect_indexed(
        &mut self,
        from: NodeId,
        from_field: &str,
        from_index: Option<usize>,
        to: NodeId,
        to_field: &str,
        to_index: Option<usize>,
    ) -> GraphResult<Uuid> {
        let from_addr = self.require_port(from, from_field)?;
        let to_addr = self.require_port(to, to_field)?;
        let source = self.port(from, from_field)?;
        let target = self.port(to, to_field)?;

        if source.direction() != PortDirection::Output || target.direction() != PortDirection::Input {
            return Err(GraphError::DirectionMismatch {
                from: source.direction(),
                to: target.direction(),
            });
        }
        Self::check_index(from, source, from_index)?;
        Self::check_index(to, target, to_index)?;
        if !source.has_room(from_index) {
            return Err(GraphError::CapacityExceeded {
                node: from,
                field: from_field.to_string(),
            });
        }
        if !target.has_room(to_index) {
            return Err(GraphError::CapacityExceeded {
                node: to,
                field: to_field.to_string(),
            });
        }
        if !source.value_type().is_compatible_with(target.value_type()) {
            return Err(GraphError::TypeMismatch {
                from: source.value_type().clone(),
                to: target.value_type().clone(),
            });
        }

        let (out_id, in_id) = (Uuid::new_v4(), Uuid::new_v4());
        let out_link = Link::new(out_id, in_id, to, to_field, to_index, from_index, source.value_type().clone());
        let in_link = Link::new(in_id, out_id, from, from_field, from_index, to_index, target.value_type().clone());
        self.port_at_mut(from_addr)?.links.push(out_link);
        self.port_at_mut(to_addr)?.links.push(in_link);
        self.invalidate();

        debug!(blueprint = %self.id, link = %out_id, %from, from_field, %to, to_field, "ports linked");
        Ok(out_id)
    }

    /// Removes a link and its peer, looked up by GUID.
    pub fn disconnect(&mut self, id: Uuid) -> GraphResult<()> {
        let peer = self
            .find_link(id)
            .map(|(_, link)| link.peer())
            .ok_or(GraphError::LinkNotFound(id))?;
        self.remove_link(id);
        self.remove_link(peer);
        self.invalidate();
        debug!(blueprint = %self.id, link = %id, "link removed");
        Ok(())
    }

    pub fn find_link(&self, id: Uuid) -> Option<(LinkAddr, &Link)> {
        self.nodes().find_map(|entry| {
            entry.ports.iter().enumerate().find_map(|(p, port)| {
                port.links.iter().enumerate().find(|(_, l)| l.id() == id).map(|(l, link)| {
                    let addr = LinkAddr {
                        port: PortAddr { node: entry.id, port: p },
                        link: l,
                    };
                    (addr, link)
                })
            })
        })
    }

    pub fn link_at(&self, addr: LinkAddr) -> Option<&Link> {
        self.port_at(addr.port)?.links.get(addr.link)
    }

    fn link_mut(&mut self, id: Uuid) -> Option<&mut Link> {
        self.nodes
            .iter_mut()
            .flatten()
            .flat_map(|entry| entry.ports.iter_mut())
            .flat_map(|port| port.links.iter_mut())
            .find(|link| link.id() == id)
    }

    fn remove_link(&mut self, id: Uuid) -> Option<Link> {
        for port in self.nodes.iter_mut().flatten().flat_map(|e| e.ports.iter_mut()) {
            if let Some(pos) = port.links.iter().position(|l| l.id() == id) {
                return Some(port.links.remove(pos));
            }
        }
        None
    }

    /// Restores a link record verbatim. Used by document loading; `resync`
    /// afterwards drops anything that does not fit.
    pub(crate) fn restore_link(&mut self, node: NodeId, field: &str, link: Link) -> GraphResult<()> {
        let addr = self.require_port(node, field)?;
        self.port_at_mut(addr)?.links.push(link);
        self.invalidate();
        Ok(())
    }

    pub(crate) fn restore_sub_ports(&mut self, node: NodeId, field: &str, defaults: Vec<Value>) -> GraphResult<()> {
        let addr = self.require_port(node, field)?;
        let port = self.port_at_mut(addr)?;
        match &mut port.storage {
            PortStorage::Dynamic(slots) => {
                *slots = defaults.into_iter().map(ValueSlot::new).collect();
                Ok(())
            }
            _ => Err(GraphError::NotDynamic {
                node,
                field: field.to_string(),
            }),
        }
    }

    fn invalidate(&mut self) {
        self.link_cache = OnceLock::new();
        for entry in self.nodes.iter_mut().flatten() {
            entry.ports.iter_mut().for_each(Port::unbind_links);
        }
    }

    /// Rebuilds every node's ports from its current declaration and prunes
    /// links that no longer resolve.
    ///
    /// A port survives when field, direction, type and arity kind are
    /// unchanged; it then keeps its links and current values. On nodes swapped
    /// by `replace_node` a surviving port also takes the new declared defaults
    /// and sub-port list; elsewhere edited defaults are kept. Links on dropped ports,
    /// links whose target or peer is gone, and links beyond a single-capacity
    /// limit are removed, both halves at once.
    pub fn resync(&mut self) -> PruneReport {
        let live = self.pool.live();
        let mut report = PruneReport::default();

        for entry in self.nodes.iter_mut().flatten() {
            let refresh = std::mem::take(&mut entry.redeclared);
            let mut old = std::mem::take(&mut entry.ports);
            let mut ports = Vec::with_capacity(old.len());
            for descriptor in entry.node.ports() {
                let kept = old
                    .iter()
                    .position(|p| Self::same_shape(p, &descriptor))
                    .map(|i| old.remove(i));
                let port = match kept {
                    Some(mut port) => {
                        port.set_capacity(descriptor.capacity);
                        if refresh {
                            port.redeclare(&descriptor, &live);
                        }
                        port
                    }
                    None => {
                        let port = Port::from_descriptor(descriptor);
                        live.iter().for_each(|instance| port.reset(*instance));
                        port
                    }
                };
                ports.push(port);
            }
            for port in old {
                for link in &port.links {
                    report.removed.push(PrunedLink::new(entry.id, port.field(), link));
                }
            }
            entry.ports = ports;
        }
        self.invalidate();

        let known: HashSet<Uuid> = self
            .nodes()
            .flat_map(|e| e.ports.iter())
            .flat_map(|p| p.links.iter().map(Link::id))
            .collect();
        let mut doomed: HashSet<Uuid> = HashSet::new();
        for entry in self.nodes() {
            for port in &entry.ports {
                let mut used: HashSet<Option<usize>> = HashSet::new();
                for link in &port.links {
                    let fits = known.contains(&link.peer())
                        && port.accepts_index(link.local_index())
                        && link.resolve(self).is_some();
                    let over = port.capacity() == Capacity::Single && !used.insert(link.local_index());
                    if !fits || over {
                        doomed.insert(link.id());
                        doomed.insert(link.peer());
                    }
                }
            }
        }

        for entry in self.nodes.iter_mut().flatten() {
            let owner = entry.id;
            for port in entry.ports.iter_mut() {
                let field = port.field().to_string();
                port.links.retain(|link| {
                    if doomed.contains(&link.id()) {
                        warn!(link = %link.id(), %owner, field = %field, target = %link.target_node(), target_field = link.target_field(), "pruning dangling link");
                        report.removed.push(PrunedLink::new(owner, &field, link));
                        false
                    } else {
                        true
                    }
                });
            }
        }
        self.invalidate();

        if !report.is_empty() {
            info!(blueprint = %self.id, pruned = report.len(), "structural resync pruned links");
        }
        report
    }

    fn same_shape(port: &Port, descriptor: &PortDescriptor) -> bool {
        let arity_matches = match (&descriptor.arity, port.storage()) {
            (Arity::Dynamic(_), PortStorage::Dynamic(_)) => true,
            (Arity::Fixed, PortStorage::Flow) | (Arity::Fixed, PortStorage::Fixed(_)) => true,
            _ => false,
        };
        port.field() == descriptor.field
            && port.direction() == descriptor.direction
            && *port.value_type() == descriptor.value_type
            && arity_matches
    }

    // --- instances ---

    /// Flat list of every link, built once and reused until the topology changes.
    pub fn precache(&self) -> &[LinkAddr] {
        self.link_cache.get_or_init(|| {
            let mut addrs = Vec::new();
            for entry in self.nodes() {
                for (p, port) in entry.ports.iter().enumerate() {
                    for l in 0..port.links.len() {
                        addrs.push(LinkAddr {
                            port: PortAddr { node: entry.id, port: p },
                            link: l,
                        });
                    }
                }
            }
            debug!(blueprint = %self.id, links = addrs.len(), "link list precached");
            addrs
        })
    }

    pub fn is_precached(&self) -> bool {
        self.link_cache.get().is_some()
    }

    /// Binds every link and resets every value table for `instance`.
    pub(crate) fn initialize_id(&self, instance: InstanceId) {
        for addr in self.precache() {
            if let Some(link) = self.link_at(*addr) {
                if link.resolve(self).is_none() {
                    warn!(blueprint = %self.id, %instance, link = %link.id(), target = %link.target_node(), target_field = link.target_field(), "dangling link ignored");
                }
            }
        }
        for port in self.nodes().flat_map(|e| e.ports.iter()) {
            port.reset(instance);
        }
    }

    /// Allocates (or recycles) an instance id and initialises it eagerly.
    pub fn create_virtual_graph(self: &Arc<Self>) -> VirtualGraph {
        let (instance, generation) = self.pool.acquire();
        self.initialize_id(instance);
        debug!(blueprint = %self.id, %instance, "virtual graph created");
        VirtualGraph::new(Arc::clone(self), instance, generation)
    }

    /// Returns an instance id to the free list and drops its values.
    ///
    /// Only the lease of a `VirtualGraph` calls this; `generation` must be the
    /// one the id was acquired with, so a stale release cannot free an id that
    /// was handed out again.
    pub(crate) fn release_instance(&self, instance: InstanceId, generation: u64) -> GraphResult<()> {
        if let Err(e) = self.pool.release(instance, generation) {
            warn!(blueprint = %self.id, %instance, generation, "stale or repeated release ignored");
            return Err(e);
        }
        for port in self.nodes().flat_map(|e| e.ports.iter()) {
            port.forget(instance);
        }
        debug!(blueprint = %self.id, %instance, "virtual graph released");
        Ok(())
    }

    /// Read-only view of the id allocator.
    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn live_instances(&self) -> Vec<InstanceId> {
        self.pool.live()
    }

    pub fn is_live(&self, instance: InstanceId) -> bool {
        self.pool.is_live(instance)
    }

    // --- values ---

    /// Current value of a port (or sub-port) for one instance.
    pub fn read_value(&self, addr: PortAddr, index: Option<usize>, instance: InstanceId) -> Option<Value> {
        let slot = self.port_at(addr)?.slot(index)?;
        Some(slot.read(instance, &self.pool))
    }

    pub fn write_value(&self, addr: PortAddr, index: Option<usize>, instance: InstanceId, value: Value) -> GraphResult<()> {
        let port = self.port_at(addr).ok_or(GraphError::NodeNotFound(addr.node))?;
        let slot = Self::slot_of(addr.node, port, index, &value)?;
        if slot.write(instance, value, &self.pool) {
            Ok(())
        } else {
            Err(GraphError::UnknownInstance(instance))
        }
    }
}
