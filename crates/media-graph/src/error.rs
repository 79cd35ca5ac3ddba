//! Graph engine error types.

use crate::format::MediaFormat;
use crate::graph::{NodeId, PortDirection, PortId};
use thiserror::Error;

/// Errors produced by structural operations on a [`crate::Graph`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// No catalog entry for the requested element kind.
    #[error("unknown element kind: {0}")]
    UnknownKind(String),

    /// The node is not part of this graph.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The port is not part of this graph.
    #[error("port not found: {0}")]
    PortNotFound(PortId),

    /// Structural change attempted while the graph is driving data.
    #[error("structural change rejected: graph is running")]
    MutationWhileRunning,

    /// Link negotiation rejected the format pairing.
    #[error("format mismatch: {src} -> {sink}")]
    FormatMismatch { src: MediaFormat, sink: MediaFormat },

    /// A link must pair a source port with a sink port.
    #[error("invalid link: {src} and {sink} are not a source/sink pair")]
    InvalidLink { src: PortId, sink: PortId },

    /// The port is already linked.
    #[error("port busy: {0}")]
    PortBusy(PortId),

    /// The two ports are not linked to each other.
    #[error("ports not linked: {src} -> {sink}")]
    NotLinked { src: PortId, sink: PortId },

    /// The node has no static port in the requested direction.
    #[error("node {node} has no static {direction} port")]
    NoStaticPort {
        node: NodeId,
        direction: PortDirection,
    },

    /// The node's kind has no dynamic pad template in the requested direction.
    #[error("node {node} has no dynamic {direction} pad template")]
    NoPadTemplate {
        node: NodeId,
        direction: PortDirection,
    },

    /// Only dynamically requested ports can be released.
    #[error("port {0} is static and cannot be released")]
    StaticPortRelease(PortId),

    /// The node must be stopped before removal.
    #[error("node {0} is still active")]
    NodeActive(NodeId),

    /// The node still has linked ports.
    #[error("node {0} still has linked ports")]
    NodeLinked(NodeId),
}
