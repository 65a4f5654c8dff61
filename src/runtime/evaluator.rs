use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{GraphError, GraphResult};
use crate::runtime::blueprint::{Blueprint, NodeId};
use crate::runtime::pool::InstanceId;
use crate::runtime::syscall::Syscall;
use crate::runtime::virtual_graph::VirtualGraph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Maximum number of pending resume points.
    pub continuation_limit: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            continuation_limit: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorState {
    /// No virtual graph allocated yet.
    Idle,
    /// Inside `step`.
    Running,
    /// Waiting for the host; the node is the one the next `step` evaluates.
    Suspended(NodeId),
    /// Dead end reached with an empty continuation stack.
    Finished,
}

struct StepSyscall<'a> {
    stack: &'a mut Vec<NodeId>,
    limit: usize,
}

impl Syscall for StepSyscall<'_> {
    fn push_continuation(&mut self, node: NodeId) -> GraphResult<()> {
        if self.stack.len() >= self.limit {
            return Err(GraphError::ContinuationOverflow(self.limit));
        }
        self.stack.push(node);
        Ok(())
    }

    fn continuation_depth(&self) -> usize {
        self.stack.len()
    }
}

/// Resumable cursor over one virtual graph.
///
/// The host calls `step` whenever it wants the graph to advance (a frame
/// tick, a key press); the evaluator never blocks and never schedules on its
/// own.
#[derive(Debug)]
pub struct Evaluator {
    blueprint: Arc<Blueprint>,
    config: EvaluatorConfig,
    graph: Option<VirtualGraph>,
    current: Option<NodeId>,
    next: Option<NodeId>,
    previous: Option<NodeId>,
    continuations: Vec<NodeId>,
    state: EvaluatorState,
}

impl Evaluator {
    pub fn new(blueprint: Arc<Blueprint>) -> Self {
        Self::with_config(blueprint, EvaluatorConfig::default())
    }

    pub fn with_config(blueprint: Arc<Blueprint>, config: EvaluatorConfig) -> Self {
        Self {
            blueprint,
            config,
            graph: None,
            current: None,
            next: None,
            previous: None,
            continuations: Vec::new(),
            state: EvaluatorState::Idle,
        }
    }

    /// Allocates a virtual graph and parks the cursor on the root.
    ///
    /// Calling it again releases the previous graph first, so its id is the
    /// one handed back.
    pub fn initialize(&mut self) -> GraphResult<()> {
        let root = self
            .blueprint
            .root()
            .ok_or_else(|| GraphError::MissingRoot(self.blueprint.id().to_string()))?;
        self.graph = None;
        let graph = self.blueprint.create_virtual_graph();
        debug!(blueprint = %self.blueprint.id(), instance = %graph.id(), %root, "evaluator initialized");
        self.graph = Some(graph);
        self.park(root);
        Ok(())
    }

    fn park(&mut self, root: NodeId) {
        self.current = Some(root);
        self.next = None;
        self.previous = None;
        self.continuations.clear();
        self.state = EvaluatorState::Suspended(root);
    }

    /// Evaluates one node and returns the node the following step will visit.
    ///
    /// `Ok(None)` is the normal end of the graph; calling `step` again after
    /// that is a no-op. A failing node leaves the cursor where it was.
    pub fn step(&mut self) -> GraphResult<Option<NodeId>> {
        match self.state {
            EvaluatorState::Idle => return Err(GraphError::NotInitialized),
            EvaluatorState::Finished => return Ok(None),
            EvaluatorState::Running | EvaluatorState::Suspended(_) => {}
        }
        let Some(graph) = self.graph.as_ref() else {
            return Err(GraphError::NotInitialized);
        };
        let instance = graph.id();

        if let Some(next) = self.next {
            self.current = Some(next);
        }
        let Some(current) = self.current else {
            self.state = EvaluatorState::Finished;
            return Ok(None);
        };

        self.state = EvaluatorState::Running;
        let outcome = match self.blueprint.node(current) {
            Some(entry) => {
                let ctx = graph.context(current);
                let mut syscall = StepSyscall {
                    stack: &mut self.continuations,
                    limit: self.config.continuation_limit,
                };
                entry.node().evaluate(&ctx, &mut syscall)
            }
            None => {
                warn!(%instance, node = %current, "cursor points at a missing node, treating as dead end");
                Ok(None)
            }
        };

        let mut candidate = match outcome {
            Ok(candidate) => candidate,
            Err(source) => {
                self.state = EvaluatorState::Suspended(current);
                error!(%instance, node = %current, error = %source, "node evaluation failed");
                return Err(GraphError::Evaluation {
                    node: current,
                    instance,
                    source,
                });
            }
        };
        if candidate.is_none() {
            candidate = self.continuations.pop();
            if let Some(resume) = candidate {
                debug!(%instance, node = %resume, "resuming continuation");
            }
        }

        self.previous = Some(current);
        self.next = candidate;
        self.state = match candidate {
            Some(node) => EvaluatorState::Suspended(node),
            None => EvaluatorState::Finished,
        };
        debug!(%instance, exited = %current, entered = ?candidate, "step");
        Ok(candidate)
    }

    /// Moves the cursor back to the root without touching port values.
    ///
    /// Per-instance values written so far persist; use
    /// `reinitialize_values` to reset them as well.
    pub fn reset(&mut self) -> GraphResult<()> {
        if self.graph.is_none() {
            return Err(GraphError::NotInitialized);
        }
        let root = self
            .blueprint
            .root()
            .ok_or_else(|| GraphError::MissingRoot(self.blueprint.id().to_string()))?;
        self.park(root);
        Ok(())
    }

    /// Resets every port value of this evaluator's instance to its default.
    pub fn reinitialize_values(&self) -> GraphResult<()> {
        let graph = self.graph.as_ref().ok_or(GraphError::NotInitialized)?;
        graph.reinitialize();
        Ok(())
    }

    /// Releases the virtual graph and returns to `Idle`.
    pub fn release(&mut self) {
        self.graph = None;
        self.current = None;
        self.next = None;
        self.previous = None;
        self.continuations.clear();
        self.state = EvaluatorState::Idle;
    }

    pub fn blueprint(&self) -> &Arc<Blueprint> {
        &self.blueprint
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn graph(&self) -> Option<&VirtualGraph> {
        self.graph.as_ref()
    }

    pub fn instance(&self) -> Option<InstanceId> {
        self.graph.as_ref().map(VirtualGraph::id)
    }

    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == EvaluatorState::Finished
    }

    /// Node under the cursor. Before the first step this is the root; after
    /// `step` returns it is the node that step just evaluated and exited.
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn previous(&self) -> Option<NodeId> {
        self.previous
    }

    pub fn continuation_depth(&self) -> usize {
        self.continuations.len()
    }

    /// Pending resume points, bottom of the stack first.
    pub fn continuations(&self) -> &[NodeId] {
        &self.continuations
    }
}
