use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runtime::blueprint::NodeId;
use crate::runtime::link::Link;
use crate::runtime::pool::InstanceId;
use crate::runtime::value::ValueSlot;

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

/// How many links a port (or each sub-port of a dynamic port) may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capacity {
    Single,
    Multi,
}

/// Declared payload type of a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Accepts anything and connects to anything.
    Any,
    /// Control flow only, no payload.
    Flow,
    Bool,
    Int,
    Float,
    String,
    List,
    Object,
    /// User-defined type, compatible only with the same name (or `Any`).
    Named(String),
}

impl ValueType {
    /// Connection rule between an output of type `self` and an input of type `other`.
    pub fn is_compatible_with(&self, other: &ValueType) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (ValueType::Any, _) | (_, ValueType::Any) => true,
            (ValueType::Int, ValueType::Float) => true,
            _ => false,
        }
    }

    /// Best-effort type of a JSON payload.
    pub fn of(value: &Value) -> ValueType {
        match value {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(n) if n.is_f64() => ValueType::Float,
            Value::Number(_) => ValueType::Int,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::List,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Whether `value` may be stored in a port of this type. `null` always fits.
    pub fn admits(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            ValueType::Any | ValueType::Named(_) => true,
            ValueType::Flow => false,
            ValueType::Bool => value.is_boolean(),
            ValueType::Int => value.is_i64() || value.is_u64(),
            ValueType::Float => value.is_number(),
            ValueType::String => value.is_string(),
            ValueType::List => value.is_array(),
            ValueType::Object => value.is_object(),
        }
    }

    pub fn is_flow(&self) -> bool {
        matches!(self, ValueType::Flow)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => f.write_str("any"),
            ValueType::Flow => f.write_str("flow"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int => f.write_str("int"),
            ValueType::Float => f.write_str("float"),
            ValueType::String => f.write_str("string"),
            ValueType::List => f.write_str("list"),
            ValueType::Object => f.write_str("object"),
            ValueType::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Fixed ports have one value slot; dynamic ports start with one slot per default.
#[derive(Debug, Clone, PartialEq)]
pub enum Arity {
    Fixed,
    Dynamic(Vec<Value>),
}

/// Declaration of one port field, produced by `Node::ports`.
///
/// Defaults follow the usual editor conventions: flow inputs and value outputs
/// accept many links, flow outputs and value inputs accept one.
#[derive(Debug, Clone, PartialEq)]
pub struct PortDescriptor {
    pub field: String,
    pub direction: PortDirection,
    pub capacity: Capacity,
    pub value_type: ValueType,
    pub default: Value,
    pub arity: Arity,
}

impl PortDescriptor {
    fn new(field: &str, direction: PortDirection, capacity: Capacity, value_type: ValueType) -> Self {
        Self {
            field: field.to_string(),
            direction,
            capacity,
            value_type,
            default: Value::Null,
            arity: Arity::Fixed,
        }
    }

    pub fn flow_in(field: &str) -> Self {
        Self::new(field, PortDirection::Input, Capacity::Multi, ValueType::Flow)
    }

    pub fn flow_out(field: &str) -> Self {
        Self::new(field, PortDirection::Output, Capacity::Single, ValueType::Flow)
    }

    pub fn input(field: &str, value_type: ValueType) -> Self {
        Self::new(field, PortDirection::Input, Capacity::Single, value_type)
    }

    pub fn output(field: &str, value_type: ValueType) -> Self {
        Self::new(field, PortDirection::Output, Capacity::Multi, value_type)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn single(mut self) -> Self {
        self.capacity = Capacity::Single;
        self
    }

    pub fn multi(mut self) -> Self {
        self.capacity = Capacity::Multi;
        self
    }

    /// Turns the port into a resizable list of sub-ports, one per default.
    pub fn dynamic(mut self, defaults: Vec<Value>) -> Self {
        self.arity = Arity::Dynamic(defaults);
        self
    }
}

/// Per-port value storage.
#[derive(Debug, Clone)]
pub enum PortStorage {
    /// Flow ports carry no payload.
    Flow,
    Fixed(ValueSlot),
    Dynamic(Vec<ValueSlot>),
}

/// A typed connection point on a node.
#[derive(Debug, Clone)]
pub struct Port {
    field: String,
    direction: PortDirection,
    capacity: Capacity,
    value_type: ValueType,
    pub(crate) links: Vec<Link>,
    pub(crate) storage: PortStorage,
}

impl Port {
    pub fn from_descriptor(descriptor: PortDescriptor) -> Self {
        let storage = match descriptor.arity {
            Arity::Dynamic(defaults) => {
                PortStorage::Dynamic(defaults.into_iter().map(ValueSlot::new).collect())
            }
            Arity::Fixed if descriptor.value_type.is_flow() => PortStorage::Flow,
            Arity::Fixed => PortStorage::Fixed(ValueSlot::new(descriptor.default)),
        };
        Self {
            field: descriptor.field,
            direction: descriptor.direction,
            capacity: descriptor.capacity,
            value_type: descriptor.value_type,
            links: Vec::new(),
            storage,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub(crate) fn set_capacity(&mut self, capacity: Capacity) {
        self.capacity = capacity;
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Links in insertion order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_linked(&self) -> bool {
        !self.links.is_empty()
    }

    pub fn has_multiple_links(&self) -> bool {
        self.links.len() > 1
    }

    pub fn first_link(&self) -> Option<&Link> {
        self.links.first()
    }

    pub fn first_node(&self) -> Option<NodeId> {
        self.first_link().map(|link| link.target_node())
    }

    /// Links leaving sub-port `index` of a dynamic port.
    pub fn links_at(&self, index: usize) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(move |link| link.local_index() == Some(index))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.storage, PortStorage::Dynamic(_))
    }

    pub fn sub_port_count(&self) -> Option<usize> {
        match &self.storage {
            PortStorage::Dynamic(slots) => Some(slots.len()),
            _ => None,
        }
    }

    pub fn storage(&self) -> &PortStorage {
        &self.storage
    }

    /// Value slot addressed by an optional sub-port index.
    pub fn slot(&self, index: Option<usize>) -> Option<&ValueSlot> {
        match (&self.storage, index) {
            (PortStorage::Fixed(slot), None) => Some(slot),
            (PortStorage::Dynamic(slots), Some(i)) => slots.get(i),
            _ => None,
        }
    }

    pub(crate) fn slot_mut(&mut self, index: Option<usize>) -> Option<&mut ValueSlot> {
        match (&mut self.storage, index) {
            (PortStorage::Fixed(slot), None) => Some(slot),
            (PortStorage::Dynamic(slots), Some(i)) => slots.get_mut(i),
            _ => None,
        }
    }

    /// Whether a link addressed at `index` is a valid sub-port reference for this port.
    pub fn accepts_index(&self, index: Option<usize>) -> bool {
        match (&self.storage, index) {
            (PortStorage::Dynamic(slots), Some(i)) => i < slots.len(),
            (PortStorage::Dynamic(_), None) => false,
            (_, None) => true,
            (_, Some(_)) => false,
        }
    }

    /// Whether one more link fits at `index` without breaking the capacity rule.
    pub fn has_room(&self, index: Option<usize>) -> bool {
        match self.capacity {
            Capacity::Multi => true,
            Capacity::Single => match index {
                Some(i) => self.links_at(i).next().is_none(),
                None => self.links.is_empty(),
            },
        }
    }

    /// Resets every slot of this port for `instance` to its default.
    pub fn reset(&self, instance: InstanceId) {
        match &self.storage {
            PortStorage::Flow => {}
            PortStorage::Fixed(slot) => slot.reset(instance),
            PortStorage::Dynamic(slots) => slots.iter().for_each(|slot| slot.reset(instance)),
        }
    }

    pub(crate) fn forget(&self, instance: InstanceId) {
        match &self.storage {
            PortStorage::Flow => {}
            PortStorage::Fixed(slot) => slot.forget(instance),
            PortStorage::Dynamic(slots) => slots.iter().for_each(|slot| slot.forget(instance)),
        }
    }

    /// Per-instance value list of a dynamic port, in sub-port order.
    pub fn values_for(&self, instance: InstanceId) -> Vec<Option<Value>> {
        match &self.storage {
            PortStorage::Flow => Vec::new(),
            PortStorage::Fixed(slot) => vec![slot.get(instance)],
            PortStorage::Dynamic(slots) => slots.iter().map(|slot| slot.get(instance)).collect(),
        }
    }

    /// Takes defaults (and the sub-port list of a dynamic port) from a new
    /// declaration of the same shape. Sub-ports past the new length are
    /// dropped; added ones are initialised for every instance in `live`.
    pub(crate) fn redeclare(&mut self, descriptor: &PortDescriptor, live: &[InstanceId]) {
        match (&mut self.storage, &descriptor.arity) {
            (PortStorage::Fixed(slot), Arity::Fixed) => slot.set_default(descriptor.default.clone()),
            (PortStorage::Dynamic(slots), Arity::Dynamic(defaults)) => {
                slots.truncate(defaults.len());
                for (slot, default) in slots.iter_mut().zip(defaults) {
                    slot.set_default(default.clone());
                }
                for default in defaults.iter().skip(slots.len()) {
                    let slot = ValueSlot::new(default.clone());
                    live.iter().for_each(|instance| slot.reset(*instance));
                    slots.push(slot);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn unbind_links(&mut self) {
        self.links.iter_mut().for_each(Link::unbind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn any_connects_to_everything() {
        assert!(ValueType::Any.is_compatible_with(&ValueType::Flow));
        assert!(ValueType::Named("Quest".into()).is_compatible_with(&ValueType::Any));
        assert!(ValueType::Int.is_compatible_with(&ValueType::Float));
        assert!(!ValueType::Float.is_compatible_with(&ValueType::Int));
        assert!(!ValueType::Named("Quest".into()).is_compatible_with(&ValueType::Named("Item".into())));
    }

    #[test]
    fn admits_checks_payload_shape() {
        assert!(ValueType::Int.admits(&json!(3)));
        assert!(!ValueType::Int.admits(&json!(3.5)));
        assert!(ValueType::Float.admits(&json!(3)));
        assert!(ValueType::String.admits(&Value::Null));
        assert!(!ValueType::Bool.admits(&json!("yes")));
    }

    #[test]
    fn single_capacity_dynamic_port_counts_per_sub_port() {
        let port = Port::from_descriptor(
            PortDescriptor::output("choices", ValueType::Flow)
                .single()
                .dynamic(vec![json!("a"), json!("b")]),
        );
        assert_eq!(port.sub_port_count(), Some(2));
        assert!(port.has_room(Some(0)));
        assert!(port.accepts_index(Some(1)));
        assert!(!port.accepts_index(Some(2)));
        assert!(!port.accepts_index(None));
    }

    #[test]
    fn flow_ports_have_no_storage() {
        let port = Port::from_descriptor(PortDescriptor::flow_out("next"));
        assert!(matches!(port.storage(), PortStorage::Flow));
        assert!(port.slot(None).is_none());
    }
}
