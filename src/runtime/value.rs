use dashmap::DashMap;
use serde_json::Value;
use tracing::{error, warn};

use crate::runtime::pool::{InstanceId, InstancePool};

/// Virtualized value of one port (or one sub-port).
///
/// The declared default is shared; every running instance gets its own
/// current value keyed by instance id, so one node can be live in many
/// executions at once.
#[derive(Debug, Clone)]
pub struct ValueSlot {
    default: Value,
    values: DashMap<InstanceId, Value>,
}

impl ValueSlot {
    pub fn new(default: Value) -> Self {
        Self {
            default,
            values: DashMap::new(),
        }
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub(crate) fn set_default(&mut self, default: Value) {
        self.default = default;
    }

    /// (Re)initialises this instance's value to the default.
    pub fn reset(&self, instance: InstanceId) {
        self.values.insert(instance, self.default.clone());
    }

    pub fn contains(&self, instance: InstanceId) -> bool {
        self.values.contains_key(&instance)
    }

    /// Raw lookup with no healing.
    pub fn get(&self, instance: InstanceId) -> Option<Value> {
        self.values.get(&instance).map(|v| v.value().clone())
    }

    pub(crate) fn forget(&self, instance: InstanceId) {
        self.values.remove(&instance);
    }

    /// Reads the instance value, healing a missing entry once.
    ///
    /// A miss for a live instance means the slot was created after the
    /// instance was initialised; it is reset and read again. A miss for an
    /// instance the pool does not know is a caller bug: it is logged and the
    /// default is returned without touching the table.
    pub fn read(&self, instance: InstanceId, pool: &InstancePool) -> Value {
        if let Some(value) = self.get(instance) {
            return value;
        }
        if !pool.is_live(instance) {
            error!(%instance, "read for an instance that is not allocated, returning default");
            return self.default.clone();
        }
        warn!(%instance, "value slot missing for live instance, resetting");
        self.reset(instance);
        match self.get(instance) {
            Some(value) => value,
            None => {
                error!(%instance, "value slot still missing after reset, returning default");
                self.default.clone()
            }
        }
    }

    /// Writes the instance value. Refuses (and returns `false`) for an
    /// instance the pool does not know, so unrelated instances stay intact.
    pub fn write(&self, instance: InstanceId, value: Value, pool: &InstancePool) -> bool {
        if !pool.is_live(instance) {
            error!(%instance, "write for an instance that is not allocated, ignored");
            return false;
        }
        self.values.insert(instance, value);
        true
    }

    pub fn instance_count(&self) -> usize {
        self.values.len()
    }
}
