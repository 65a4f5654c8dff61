use thiserror::Error;
use uuid::Uuid;

use crate::runtime::blueprint::NodeId;
use crate::runtime::pool::InstanceId;
use crate::runtime::port::{PortDirection, ValueType};

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Errors raised by structural edits and by the evaluator.
///
/// Ordinary graph-shape conditions (unlinked ports, empty branches) are not
/// errors: evaluation simply yields `None`.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("node label '{0}' not found")]
    LabelNotFound(String),

    #[error("node label '{0}' already used")]
    DuplicateLabel(String),

    #[error("port '{field}' not found on node {node}")]
    PortNotFound { node: NodeId, field: String },

    #[error("cannot link {from:?} port to {to:?} port")]
    DirectionMismatch { from: PortDirection, to: PortDirection },

    #[error("port '{field}' on node {node} is at capacity")]
    CapacityExceeded { node: NodeId, field: String },

    #[error("incompatible value types: {from} -> {to}")]
    TypeMismatch { from: ValueType, to: ValueType },

    #[error("link {0} not found")]
    LinkNotFound(Uuid),

    #[error("sub-port {index} out of range for '{field}' on node {node} (len {len})")]
    SubPortOutOfRange {
        node: NodeId,
        field: String,
        index: usize,
        len: usize,
    },

    #[error("port '{field}' on node {node} is dynamic, a sub-port index is required")]
    SubPortRequired { node: NodeId, field: String },

    #[error("port '{field}' on node {node} is not a dynamic port")]
    NotDynamic { node: NodeId, field: String },

    #[error("blueprint '{0}' has no root node")]
    MissingRoot(String),

    #[error("instance {0} is not live under this lease (released twice or recycled)")]
    DoubleRelease(InstanceId),

    #[error("instance {0} is not allocated by this blueprint")]
    UnknownInstance(InstanceId),

    #[error("evaluator has no virtual graph, call initialize first")]
    NotInitialized,

    #[error("unknown node kind '{0}'")]
    UnknownNodeKind(String),

    #[error("continuation stack exceeded limit of {0}")]
    ContinuationOverflow(usize),

    #[error("node {node} failed on instance {instance}: {source}")]
    Evaluation {
        node: NodeId,
        instance: InstanceId,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid blueprint document: {0}")]
    Document(String),
}
