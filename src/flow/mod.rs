//! Derived flow artifacts: the call graph and per-variable data flow.

mod call_graph;
mod data_flow;

pub use call_graph::{CallGraph, CallGraphEdge, CallGraphNode};
pub use data_flow::{data_flows, DataFlow, FlowKind, FlowTarget};
