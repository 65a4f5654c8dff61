use crate::error::GraphResult;
use crate::runtime::blueprint::NodeId;

/// Scheduling interface handed to a node while it evaluates.
pub trait Syscall {
    /// Resume at `node` once the branch the current node returns dead-ends.
    fn push_continuation(&mut self, node: NodeId) -> GraphResult<()>;

    /// Number of pending resume points.
    fn continuation_depth(&self) -> usize;
}
