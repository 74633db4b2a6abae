//! Request handlers for graph persistence.

mod batch;
mod graph;

pub use batch::*;
pub use graph::*;
