pub mod consts;
pub mod edge;
pub mod executors;
mod graph;
pub mod node;
pub mod variables;

pub use graph::{Workflow, validate};
