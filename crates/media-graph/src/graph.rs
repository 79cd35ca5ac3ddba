//! The graph engine: nodes, ports, links, run state, operation journal.

use crate::element::{self, ElementSpec};
use crate::error::GraphError;
use crate::format::MediaFormat;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Opaque node identifier, unique within one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Opaque port identifier, unique within one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PortId(u64);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Direction of a port, from the owning node's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    /// Produces data.
    Source,
    /// Accepts data.
    Sink,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Source => f.write_str("source"),
            PortDirection::Sink => f.write_str("sink"),
        }
    }
}

/// Run state of a node.
///
/// Nodes are active from creation; a node must be stopped before it may be
/// removed, or the element layer leaks its resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Active,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Paused,
}

/// One accepted structural operation, in acceptance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOp {
    Pause,
    Resume,
    AddNode(NodeId),
    StopNode(NodeId),
    RemoveNode(NodeId),
    Link(PortId, PortId),
    Unlink(PortId, PortId),
    RequestPort(NodeId, PortId),
    ReleasePort(PortId),
}

#[derive(Debug)]
struct PortSlot {
    node: NodeId,
    direction: PortDirection,
    format: MediaFormat,
    peer: Option<PortId>,
    dynamic: bool,
}

#[derive(Debug)]
struct NodeSlot {
    kind: &'static str,
    state: NodeState,
    properties: HashMap<String, String>,
    static_sink: Option<PortId>,
    static_src: Option<PortId>,
    dynamic_ports: Vec<PortId>,
}

/// The processing graph.
///
/// A new graph starts paused; callers resume it once the primary topology is
/// in place. All structural mutation requires the graph to be paused.
#[derive(Debug)]
pub struct Graph {
    run_state: RunState,
    nodes: HashMap<NodeId, NodeSlot>,
    ports: HashMap<PortId, PortSlot>,
    journal: Vec<GraphOp>,
    next_node: u64,
    next_port: u64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty, paused graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_state: RunState::Paused,
            nodes: HashMap::new(),
            ports: HashMap::new(),
            journal: Vec::new(),
            next_node: 0,
            next_port: 0,
        }
    }

    /// Whether the graph is currently driving data.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Halt data flow. No-op when already paused.
    pub fn pause(&mut self) {
        if self.run_state == RunState::Running {
            self.run_state = RunState::Paused;
            self.journal.push(GraphOp::Pause);
            debug!(target: "media_graph", "graph paused");
        }
    }

    /// Restart data flow. No-op when already running.
    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused {
            self.run_state = RunState::Running;
            self.journal.push(GraphOp::Resume);
            debug!(target: "media_graph", "graph running");
        }
    }

    fn require_paused(&self) -> Result<(), GraphError> {
        if self.is_running() {
            return Err(GraphError::MutationWhileRunning);
        }
        Ok(())
    }

    /// Construct an element by catalog name and add it to the graph.
    ///
    /// The node starts active, with its static ports allocated.
    ///
    /// # Errors
    ///
    /// `UnknownKind` when the catalog has no such element;
    /// `MutationWhileRunning` outside a pause bracket.
    pub fn create_node(&mut self, kind: &str) -> Result<NodeId, GraphError> {
        self.require_paused()?;
        let spec: &ElementSpec = element::spec_for(kind)
            .ok_or_else(|| GraphError::UnknownKind(kind.to_string()))?;

        let node = NodeId(self.next_node);
        self.next_node += 1;

        let static_sink = spec
            .static_sink
            .map(|format| self.alloc_port(node, PortDirection::Sink, format, false));
        let static_src = spec
            .static_src
            .map(|format| self.alloc_port(node, PortDirection::Source, format, false));

        self.nodes.insert(
            node,
            NodeSlot {
                kind: spec.kind,
                state: NodeState::Active,
                properties: HashMap::new(),
                static_sink,
                static_src,
                dynamic_ports: Vec::new(),
            },
        );
        self.journal.push(GraphOp::AddNode(node));
        debug!(target: "media_graph", %node, kind, "node added");
        Ok(node)
    }

    fn alloc_port(
        &mut self,
        node: NodeId,
        direction: PortDirection,
        format: MediaFormat,
        dynamic: bool,
    ) -> PortId {
        let port = PortId(self.next_port);
        self.next_port += 1;
        self.ports.insert(
            port,
            PortSlot {
                node,
                direction,
                format,
                peer: None,
                dynamic,
            },
        );
        port
    }

    /// Set an element property (e.g. `host`/`port` on a network output).
    ///
    /// # Errors
    ///
    /// `NodeNotFound` when the node is not part of this graph.
    pub fn set_property(
        &mut self,
        node: NodeId,
        key: &str,
        value: &str,
    ) -> Result<(), GraphError> {
        let slot = self
            .nodes
            .get_mut(&node)
            .ok_or(GraphError::NodeNotFound(node))?;
        slot.properties.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Read back an element property.
    #[must_use]
    pub fn property(&self, node: NodeId, key: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|slot| slot.properties.get(key))
            .map(String::as_str)
    }

    /// The catalog kind of a node.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` when the node is not part of this graph.
    pub fn kind(&self, node: NodeId) -> Result<&'static str, GraphError> {
        self.nodes
            .get(&node)
            .map(|slot| slot.kind)
            .ok_or(GraphError::NodeNotFound(node))
    }

    #[must_use]
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The node's static port in the given direction.
    ///
    /// # Errors
    ///
    /// `NodeNotFound`, or `NoStaticPort` when the kind has none.
    pub fn static_port(
        &self,
        node: NodeId,
        direction: PortDirection,
    ) -> Result<PortId, GraphError> {
        let slot = self
            .nodes
            .get(&node)
            .ok_or(GraphError::NodeNotFound(node))?;
        let port = match direction {
            PortDirection::Sink => slot.static_sink,
            PortDirection::Source => slot.static_src,
        };
        port.ok_or(GraphError::NoStaticPort { node, direction })
    }

    /// Request a dynamic port from the node's pad template.
    ///
    /// # Errors
    ///
    /// `MutationWhileRunning`, `NodeNotFound`, or `NoPadTemplate` when the
    /// kind has no dynamic template in that direction.
    pub fn request_port(
        &mut self,
        node: NodeId,
        direction: PortDirection,
    ) -> Result<PortId, GraphError> {
        self.require_paused()?;
        let kind = self.kind(node)?;
        let spec = element::spec_for(kind).ok_or(GraphError::NodeNotFound(node))?;
        let format = match direction {
            PortDirection::Sink => spec.dynamic_sink,
            PortDirection::Source => spec.dynamic_src,
        }
        .ok_or(GraphError::NoPadTemplate { node, direction })?;

        let port = self.alloc_port(node, direction, format, true);
        if let Some(slot) = self.nodes.get_mut(&node) {
            slot.dynamic_ports.push(port);
        }
        self.journal.push(GraphOp::RequestPort(node, port));
        debug!(target: "media_graph", %node, %port, %direction, "dynamic port requested");
        Ok(port)
    }

    /// Release a dynamic port back to its node.
    ///
    /// # Errors
    ///
    /// `MutationWhileRunning`, `PortNotFound`, `StaticPortRelease` for
    /// static ports, or `PortBusy` when the port is still linked.
    pub fn release_port(&mut self, port: PortId) -> Result<(), GraphError> {
        self.require_paused()?;
        let slot = self.ports.get(&port).ok_or(GraphError::PortNotFound(port))?;
        if !slot.dynamic {
            return Err(GraphError::StaticPortRelease(port));
        }
        if slot.peer.is_some() {
            return Err(GraphError::PortBusy(port));
        }
        let node = slot.node;
        self.ports.remove(&port);
        if let Some(owner) = self.nodes.get_mut(&node) {
            owner.dynamic_ports.retain(|p| *p != port);
        }
        self.journal.push(GraphOp::ReleasePort(port));
        debug!(target: "media_graph", %node, %port, "dynamic port released");
        Ok(())
    }

    /// Link a source port to a sink port.
    ///
    /// # Errors
    ///
    /// `MutationWhileRunning`, `PortNotFound`, `InvalidLink` when the pair
    /// is not source->sink, `PortBusy` when either end is already linked, or
    /// `FormatMismatch` when negotiation rejects the pairing.
    pub fn link(&mut self, src: PortId, sink: PortId) -> Result<(), GraphError> {
        self.require_paused()?;
        let src_slot = self.ports.get(&src).ok_or(GraphError::PortNotFound(src))?;
        let sink_slot = self.ports.get(&sink).ok_or(GraphError::PortNotFound(sink))?;

        if src_slot.direction != PortDirection::Source
            || sink_slot.direction != PortDirection::Sink
        {
            return Err(GraphError::InvalidLink { src, sink });
        }
        if src_slot.peer.is_some() {
            return Err(GraphError::PortBusy(src));
        }
        if sink_slot.peer.is_some() {
            return Err(GraphError::PortBusy(sink));
        }
        if src_slot.format != sink_slot.format {
            return Err(GraphError::FormatMismatch {
                src: src_slot.format,
                sink: sink_slot.format,
            });
        }

        if let Some(slot) = self.ports.get_mut(&src) {
            slot.peer = Some(sink);
        }
        if let Some(slot) = self.ports.get_mut(&sink) {
            slot.peer = Some(src);
        }
        self.journal.push(GraphOp::Link(src, sink));
        debug!(target: "media_graph", %src, %sink, "ports linked");
        Ok(())
    }

    /// Unlink a previously linked source/sink pair.
    ///
    /// # Errors
    ///
    /// `MutationWhileRunning`, `PortNotFound`, or `NotLinked` when the two
    /// ports are not linked to each other.
    pub fn unlink(&mut self, src: PortId, sink: PortId) -> Result<(), GraphError> {
        self.require_paused()?;
        let src_peer = self
            .ports
            .get(&src)
            .ok_or(GraphError::PortNotFound(src))?
            .peer;
        if !self.ports.contains_key(&sink) {
            return Err(GraphError::PortNotFound(sink));
        }
        if src_peer != Some(sink) {
            return Err(GraphError::NotLinked { src, sink });
        }

        if let Some(slot) = self.ports.get_mut(&src) {
            slot.peer = None;
        }
        if let Some(slot) = self.ports.get_mut(&sink) {
            slot.peer = None;
        }
        self.journal.push(GraphOp::Unlink(src, sink));
        debug!(target: "media_graph", %src, %sink, "ports unlinked");
        Ok(())
    }

    /// The port currently linked to `port`, if any.
    ///
    /// # Errors
    ///
    /// `PortNotFound` when the port is not part of this graph.
    pub fn port_peer(&self, port: PortId) -> Result<Option<PortId>, GraphError> {
        self.ports
            .get(&port)
            .map(|slot| slot.peer)
            .ok_or(GraphError::PortNotFound(port))
    }

    /// The node owning `port`.
    ///
    /// # Errors
    ///
    /// `PortNotFound` when the port is not part of this graph.
    pub fn port_node(&self, port: PortId) -> Result<NodeId, GraphError> {
        self.ports
            .get(&port)
            .map(|slot| slot.node)
            .ok_or(GraphError::PortNotFound(port))
    }

    /// Move a node to the terminal stopped state. Idempotent.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` when the node is not part of this graph.
    pub fn stop_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        let slot = self
            .nodes
            .get_mut(&node)
            .ok_or(GraphError::NodeNotFound(node))?;
        if slot.state == NodeState::Active {
            slot.state = NodeState::Stopped;
            self.journal.push(GraphOp::StopNode(node));
            debug!(target: "media_graph", %node, "node stopped");
        }
        Ok(())
    }

    /// Remove a stopped, fully unlinked node and all its ports.
    ///
    /// # Errors
    ///
    /// `MutationWhileRunning`, `NodeNotFound`, `NodeActive` when the node
    /// was not stopped first, or `NodeLinked` when any port is still linked.
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.require_paused()?;
        let slot = self
            .nodes
            .get(&node)
            .ok_or(GraphError::NodeNotFound(node))?;
        if slot.state != NodeState::Stopped {
            return Err(GraphError::NodeActive(node));
        }
        let owned: Vec<PortId> = slot
            .static_sink
            .into_iter()
            .chain(slot.static_src)
            .chain(slot.dynamic_ports.iter().copied())
            .collect();
        if owned
            .iter()
            .any(|p| self.ports.get(p).is_some_and(|s| s.peer.is_some()))
        {
            return Err(GraphError::NodeLinked(node));
        }

        for port in owned {
            self.ports.remove(&port);
        }
        self.nodes.remove(&node);
        self.journal.push(GraphOp::RemoveNode(node));
        debug!(target: "media_graph", %node, "node removed");
        Ok(())
    }

    /// The journal of accepted structural operations, oldest first.
    #[must_use]
    pub fn journal(&self) -> &[GraphOp] {
        &self.journal
    }

    /// Drain and return the journal.
    pub fn take_journal(&mut self) -> Vec<GraphOp> {
        std::mem::take(&mut self.journal)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::element;

    #[test]
    fn test_new_graph_is_paused_and_empty() {
        let graph = Graph::new();
        assert!(!graph.is_running());
        assert_eq!(graph.node_count(), 0);
        assert!(graph.journal().is_empty());
    }

    #[test]
    fn test_create_node_unknown_kind() {
        let mut graph = Graph::new();
        let err = graph.create_node("video-scaler").unwrap_err();
        assert_eq!(err, GraphError::UnknownKind("video-scaler".to_string()));
    }

    #[test]
    fn test_mutation_rejected_while_running() {
        let mut graph = Graph::new();
        let queue = graph.create_node(element::JITTER_QUEUE).unwrap();
        graph.resume();

        assert_eq!(
            graph.create_node(element::RTP_DEPAY).unwrap_err(),
            GraphError::MutationWhileRunning
        );
        assert_eq!(
            graph.remove_node(queue).unwrap_err(),
            GraphError::MutationWhileRunning
        );
        assert_eq!(
            graph.request_port(queue, PortDirection::Source).unwrap_err(),
            GraphError::MutationWhileRunning
        );
    }

    #[test]
    fn test_link_and_unlink() {
        let mut graph = Graph::new();
        let queue = graph.create_node(element::JITTER_QUEUE).unwrap();
        let depay = graph.create_node(element::RTP_DEPAY).unwrap();
        let src = graph.static_port(queue, PortDirection::Source).unwrap();
        let sink = graph.static_port(depay, PortDirection::Sink).unwrap();

        graph.link(src, sink).unwrap();
        assert_eq!(graph.port_peer(src).unwrap(), Some(sink));
        assert_eq!(graph.port_peer(sink).unwrap(), Some(src));

        // Second link on a busy port is rejected.
        let decoder = graph.create_node(element::AUDIO_DECODER).unwrap();
        let dec_sink = graph.static_port(decoder, PortDirection::Sink).unwrap();
        assert!(matches!(
            graph.link(src, dec_sink),
            Err(GraphError::PortBusy(_) | GraphError::FormatMismatch { .. })
        ));

        graph.unlink(src, sink).unwrap();
        assert_eq!(graph.port_peer(src).unwrap(), None);
        assert_eq!(
            graph.unlink(src, sink).unwrap_err(),
            GraphError::NotLinked { src, sink }
        );
    }

    #[test]
    fn test_link_rejects_format_mismatch() {
        let mut graph = Graph::new();
        let queue = graph.create_node(element::JITTER_QUEUE).unwrap();
        let decoder = graph.create_node(element::AUDIO_DECODER).unwrap();
        let src = graph.static_port(queue, PortDirection::Source).unwrap();
        let sink = graph.static_port(decoder, PortDirection::Sink).unwrap();

        assert_eq!(
            graph.link(src, sink).unwrap_err(),
            GraphError::FormatMismatch {
                src: MediaFormat::Rtp,
                sink: MediaFormat::G726,
            }
        );
    }

    #[test]
    fn test_link_rejects_wrong_directions() {
        let mut graph = Graph::new();
        let queue = graph.create_node(element::JITTER_QUEUE).unwrap();
        let depay = graph.create_node(element::RTP_DEPAY).unwrap();
        let sink_a = graph.static_port(queue, PortDirection::Sink).unwrap();
        let sink_b = graph.static_port(depay, PortDirection::Sink).unwrap();

        assert_eq!(
            graph.link(sink_a, sink_b).unwrap_err(),
            GraphError::InvalidLink {
                src: sink_a,
                sink: sink_b,
            }
        );
    }

    #[test]
    fn test_dynamic_port_request_and_release() {
        let mut graph = Graph::new();
        let mixer = graph.create_node(element::AUDIO_MIXER).unwrap();
        let sink = graph.request_port(mixer, PortDirection::Sink).unwrap();
        assert_eq!(graph.port_node(sink).unwrap(), mixer);

        // The mixer has no dynamic source template.
        assert_eq!(
            graph.request_port(mixer, PortDirection::Source).unwrap_err(),
            GraphError::NoPadTemplate {
                node: mixer,
                direction: PortDirection::Source,
            }
        );

        graph.release_port(sink).unwrap();
        assert_eq!(
            graph.port_peer(sink).unwrap_err(),
            GraphError::PortNotFound(sink)
        );

        // Static ports cannot be released.
        let out = graph.static_port(mixer, PortDirection::Source).unwrap();
        assert_eq!(
            graph.release_port(out).unwrap_err(),
            GraphError::StaticPortRelease(out)
        );
    }

    #[test]
    fn test_release_linked_port_rejected() {
        let mut graph = Graph::new();
        let mixer = graph.create_node(element::AUDIO_MIXER).unwrap();
        let decoder = graph.create_node(element::AUDIO_DECODER).unwrap();
        let mix_in = graph.request_port(mixer, PortDirection::Sink).unwrap();
        let dec_out = graph.static_port(decoder, PortDirection::Source).unwrap();
        graph.link(dec_out, mix_in).unwrap();

        assert_eq!(
            graph.release_port(mix_in).unwrap_err(),
            GraphError::PortBusy(mix_in)
        );
    }

    #[test]
    fn test_remove_requires_stop_and_unlink() {
        let mut graph = Graph::new();
        let queue = graph.create_node(element::JITTER_QUEUE).unwrap();
        let depay = graph.create_node(element::RTP_DEPAY).unwrap();
        let src = graph.static_port(queue, PortDirection::Source).unwrap();
        let sink = graph.static_port(depay, PortDirection::Sink).unwrap();
        graph.link(src, sink).unwrap();

        assert_eq!(
            graph.remove_node(queue).unwrap_err(),
            GraphError::NodeActive(queue)
        );
        graph.stop_node(queue).unwrap();
        assert_eq!(
            graph.remove_node(queue).unwrap_err(),
            GraphError::NodeLinked(queue)
        );

        graph.unlink(src, sink).unwrap();
        graph.remove_node(queue).unwrap();
        assert!(!graph.contains_node(queue));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_stop_node_is_idempotent() {
        let mut graph = Graph::new();
        let queue = graph.create_node(element::JITTER_QUEUE).unwrap();
        graph.stop_node(queue).unwrap();
        graph.stop_node(queue).unwrap();

        let stops = graph
            .journal()
            .iter()
            .filter(|op| matches!(op, GraphOp::StopNode(_)))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_pause_resume_journal_records_transitions_only() {
        let mut graph = Graph::new();
        graph.pause(); // already paused, no-op
        graph.resume();
        graph.resume(); // already running, no-op
        graph.pause();

        assert_eq!(graph.journal(), &[GraphOp::Resume, GraphOp::Pause]);
    }

    #[test]
    fn test_properties_round_trip() {
        let mut graph = Graph::new();
        let out = graph.create_node(element::UDP_OUTPUT).unwrap();
        graph.set_property(out, "host", "10.0.0.1").unwrap();
        graph.set_property(out, "port", "9559").unwrap();

        assert_eq!(graph.property(out, "host"), Some("10.0.0.1"));
        assert_eq!(graph.property(out, "port"), Some("9559"));
        assert_eq!(graph.property(out, "ttl"), None);
    }
}
