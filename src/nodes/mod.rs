pub mod common;
pub mod dialogue;
pub mod flow;
