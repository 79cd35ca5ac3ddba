//! Pause-bracketed topology mutation.
//!
//! The execution engine forbids structural edits while data flows; every
//! attach and detach therefore happens inside [`with_graph_paused`]. The
//! bracket resumes only on success: bracket errors are fatal to the whole
//! session, and resuming a half-mutated graph would drive data through a
//! topology nobody reasoned about.

use crate::errors::MixError;
use media_graph::{Graph, NodeId, PortDirection, PortId, Subgraph};

/// Run `f` with the graph paused, resuming afterwards on success.
///
/// # Errors
///
/// Propagates the closure's error without resuming.
pub fn with_graph_paused<T>(
    graph: &mut Graph,
    f: impl FnOnce(&mut Graph) -> Result<T, MixError>,
) -> Result<T, MixError> {
    graph.pause();
    let value = f(graph)?;
    graph.resume();
    Ok(value)
}

/// Link an upstream source port into a subgraph's exposed input.
///
/// # Errors
///
/// `Link` when negotiation rejects the pairing; `InvariantViolation` when
/// the subgraph exposes no input.
pub fn attach_input(
    graph: &mut Graph,
    upstream: PortId,
    subgraph: &Subgraph,
) -> Result<(), MixError> {
    let input = subgraph.input().ok_or_else(|| {
        MixError::InvariantViolation("subgraph exposes no input port".to_string())
    })?;
    Ok(graph.link(upstream, input)?)
}

/// Link a subgraph's exposed output into a downstream sink port.
///
/// # Errors
///
/// `Link` when negotiation rejects the pairing; `InvariantViolation` when
/// the subgraph exposes no output.
pub fn attach_output(
    graph: &mut Graph,
    subgraph: &Subgraph,
    downstream: PortId,
) -> Result<(), MixError> {
    let output = subgraph.output().ok_or_else(|| {
        MixError::InvariantViolation("subgraph exposes no output port".to_string())
    })?;
    Ok(graph.link(output, downstream)?)
}

/// Unwire a subgraph from the live graph and discard it.
///
/// Output side first, then input side, then every member node is unwired
/// from its chain neighbours, stopped and removed downstream-first. The
/// engine refuses to remove a node with linked ports, and skipping the stop
/// step leaks element resources, so both happen on every path.
///
/// # Errors
///
/// `InvariantViolation` when the subgraph is not in the expected attached
/// state.
pub fn detach(graph: &mut Graph, subgraph: &Subgraph) -> Result<(), MixError> {
    if let Some(output) = subgraph.output() {
        if let Some(peer) = graph.port_peer(output)? {
            graph.unlink(output, peer)?;
        }
    }
    if let Some(input) = subgraph.input() {
        if let Some(peer) = graph.port_peer(input)? {
            graph.unlink(peer, input)?;
        }
    }
    for node in subgraph.nodes().iter().rev().copied() {
        unlink_member_ports(graph, node)?;
        graph.stop_node(node)?;
        graph.remove_node(node)?;
    }
    Ok(())
}

/// Unlink whatever is still wired to `node` before it is removed. The
/// internal chain links from the factories are still in place when a
/// subgraph comes back out of the graph.
fn unlink_member_ports(graph: &mut Graph, node: NodeId) -> Result<(), MixError> {
    for direction in [PortDirection::Sink, PortDirection::Source] {
        let Ok(port) = graph.static_port(node, direction) else {
            continue;
        };
        if let Some(peer) = graph.port_peer(port)? {
            match direction {
                PortDirection::Sink => graph.unlink(peer, port)?,
                PortDirection::Source => graph.unlink(port, peer)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::pipeline::decode;
    use media_graph::{element, GraphOp, PortDirection};

    #[test]
    fn test_bracket_pauses_and_resumes() {
        let mut graph = Graph::new();
        graph.resume();
        graph.take_journal();

        let chain = with_graph_paused(&mut graph, |g| {
            assert!(!g.is_running());
            decode::build_chain(g)
        })
        .unwrap();

        assert!(graph.is_running());
        assert_eq!(chain.nodes().len(), 3);

        let journal = graph.take_journal();
        assert_eq!(journal.first(), Some(&GraphOp::Pause));
        assert_eq!(journal.last(), Some(&GraphOp::Resume));
    }

    #[test]
    fn test_bracket_does_not_resume_on_error() {
        let mut graph = Graph::new();
        graph.resume();

        let result: Result<(), MixError> = with_graph_paused(&mut graph, |_| {
            Err(MixError::Link("rejected".to_string()))
        });

        assert!(result.is_err());
        assert!(!graph.is_running());
    }

    #[test]
    fn test_detach_reverses_attach() {
        let mut graph = Graph::new();
        let input_node = graph.create_node(element::RTP_INPUT).unwrap();
        let mixer = graph.create_node(element::AUDIO_MIXER).unwrap();
        let chain = decode::build_chain(&mut graph).unwrap();

        let slot = graph.request_port(input_node, PortDirection::Source).unwrap();
        let mix_in = graph.request_port(mixer, PortDirection::Sink).unwrap();
        attach_input(&mut graph, slot, &chain).unwrap();
        attach_output(&mut graph, &chain, mix_in).unwrap();
        assert!(graph.port_peer(slot).unwrap().is_some());

        detach(&mut graph, &chain).unwrap();
        assert_eq!(graph.port_peer(slot).unwrap(), None);
        assert_eq!(graph.port_peer(mix_in).unwrap(), None);
        for node in chain.nodes() {
            assert!(!graph.contains_node(*node));
        }

        // Both exposed links and both internal chain links are unwound.
        let journal = graph.take_journal();
        let unlinks = journal
            .iter()
            .filter(|op| matches!(op, GraphOp::Unlink(_, _)))
            .count();
        assert_eq!(unlinks, 4);

        // Stops precede removals for every member node.
        for node in chain.nodes() {
            let stop = journal
                .iter()
                .position(|op| *op == GraphOp::StopNode(*node))
                .expect("stop recorded");
            let remove = journal
                .iter()
                .position(|op| *op == GraphOp::RemoveNode(*node))
                .expect("remove recorded");
            assert!(stop < remove);
        }
    }
}
