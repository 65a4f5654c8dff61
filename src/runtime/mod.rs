pub mod blueprint;
pub mod context;
pub mod evaluator;
pub mod link;
pub mod node;
pub mod pool;
pub mod port;
pub mod registry;
pub mod syscall;
pub mod value;
pub mod virtual_graph;
