use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// Key of one running instantiation of a blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct PoolState {
    high_water: u32,
    next_generation: u64,
    free: Vec<InstanceId>,
    /// Live ids and the generation of the lease holding each.
    live: BTreeMap<InstanceId, u64>,
}

/// Allocator for instance ids: a high-water counter plus a LIFO free list.
///
/// Reuse is bounded by peak concurrency rather than by how many instances
/// were ever created. Every acquisition gets a fresh generation, and a
/// release must present the generation it was handed; a stale or repeated
/// release is rejected and never frees an id a newer holder owns.
#[derive(Debug, Default)]
pub struct InstancePool {
    state: Mutex<PoolState>,
}

impl InstancePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn acquire(&self) -> (InstanceId, u64) {
        let mut state = self.lock();
        let id = match state.free.pop() {
            Some(id) => id,
            None => {
                state.high_water += 1;
                InstanceId(state.high_water)
            }
        };
        state.next_generation += 1;
        let generation = state.next_generation;
        state.live.insert(id, generation);
        (id, generation)
    }

    pub(crate) fn release(&self, id: InstanceId, generation: u64) -> GraphResult<()> {
        let mut state = self.lock();
        if state.live.get(&id) != Some(&generation) {
            return Err(GraphError::DoubleRelease(id));
        }
        state.live.remove(&id);
        state.free.push(id);
        Ok(())
    }

    pub fn is_live(&self, id: InstanceId) -> bool {
        self.lock().live.contains_key(&id)
    }

    /// Live ids in ascending order.
    pub fn live(&self) -> Vec<InstanceId> {
        self.lock().live.keys().copied().collect()
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Highest id ever handed out.
    pub fn high_water(&self) -> u32 {
        self.lock().high_water
    }
}
