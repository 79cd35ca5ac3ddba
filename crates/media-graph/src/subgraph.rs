//! Pluggable subgraphs: pre-linked chains attachable to the graph as a unit.

use crate::graph::{NodeId, PortId};

/// A self-contained chain of nodes whose internal links are already in
/// place, exposing at most one unconnected input port and one unconnected
/// output port.
///
/// A `Subgraph` is a bookkeeping value; the nodes it names live in the
/// [`crate::Graph`]. Cloning it clones the bookkeeping, not the nodes.
#[derive(Debug, Clone)]
pub struct Subgraph {
    nodes: Vec<NodeId>,
    input: Option<PortId>,
    output: Option<PortId>,
}

impl Subgraph {
    /// Describe a chain by its member nodes and exposed ports.
    ///
    /// Members are listed upstream-first; teardown stops and removes them in
    /// reverse order.
    #[must_use]
    pub fn new(nodes: Vec<NodeId>, input: Option<PortId>, output: Option<PortId>) -> Self {
        Self {
            nodes,
            input,
            output,
        }
    }

    /// Member nodes, upstream-first.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The exposed, initially unconnected input port.
    #[must_use]
    pub fn input(&self) -> Option<PortId> {
        self.input
    }

    /// The exposed, initially unconnected output port.
    #[must_use]
    pub fn output(&self) -> Option<PortId> {
        self.output
    }
}
