//! Structural bookkeeping engine for the Parley media pipeline.
//!
//! This crate owns the *topology* of a running media graph: which nodes
//! exist, which ports they expose, what is linked to what, and whether the
//! graph is currently driving data. It deliberately does not move media:
//! scheduling, buffering and clocking belong to the element implementations
//! behind the catalog, not to this crate.
//!
//! The one hard rule the engine enforces is the mutation discipline:
//! structural changes (adding or removing nodes, linking or unlinking ports,
//! requesting or releasing dynamic pads) are rejected while the graph is
//! running. Callers bracket every edit with [`Graph::pause`] and
//! [`Graph::resume`]; driving data through a half-edited graph corrupts
//! buffers in the element layer, so the engine refuses to let it happen.
//!
//! Every accepted operation is recorded in an operation journal
//! ([`Graph::journal`]) for diagnostics and test assertions.

#![warn(clippy::pedantic)]

pub mod element;
pub mod error;
pub mod format;
pub mod graph;
pub mod subgraph;

pub use error::GraphError;
pub use format::MediaFormat;
pub use graph::{Graph, GraphOp, NodeId, NodeState, PortDirection, PortId};
pub use subgraph::Subgraph;
