pub mod asset;
pub mod dsl;
pub mod error;
pub mod nodes;
pub mod runtime;

pub use error::{GraphError, GraphResult};
pub use runtime::blueprint::{Blueprint, NodeId};
pub use runtime::evaluator::{Evaluator, EvaluatorConfig, EvaluatorState};
pub use runtime::pool::InstanceId;
pub use runtime::virtual_graph::VirtualGraph;
