//! Return chain factory (mesh mode).
//!
//! One chain per peer host: audio encoder -> RTP payloader -> UDP output
//! addressed at the peer, internally linked, exposing the encoder's sink as
//! the chain input. The chain is fed from the shared fan-out point.

use crate::errors::MixError;
use media_graph::{element, Graph, PortDirection, Subgraph};
use std::net::SocketAddr;

/// Build the return chain carrying the mix back to `peer`.
///
/// The graph must already be paused.
///
/// # Errors
///
/// `ElementCreation` when a stage cannot be constructed, `Link` when the
/// internal chain fails to negotiate - both fatal to the session.
pub fn build_chain(graph: &mut Graph, peer: SocketAddr) -> Result<Subgraph, MixError> {
    let encoder = graph.create_node(element::AUDIO_ENCODER)?;
    let pay = graph.create_node(element::RTP_PAY)?;
    let udp_out = graph.create_node(element::UDP_OUTPUT)?;
    graph.set_property(udp_out, "host", &peer.ip().to_string())?;
    graph.set_property(udp_out, "port", &peer.port().to_string())?;

    graph.link(
        graph.static_port(encoder, PortDirection::Source)?,
        graph.static_port(pay, PortDirection::Sink)?,
    )?;
    graph.link(
        graph.static_port(pay, PortDirection::Source)?,
        graph.static_port(udp_out, PortDirection::Sink)?,
    )?;

    let input = graph.static_port(encoder, PortDirection::Sink)?;
    Ok(Subgraph::new(vec![encoder, pay, udp_out], Some(input), None))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_addresses_the_peer() {
        let mut graph = Graph::new();
        let peer: SocketAddr = "192.0.2.7:5004".parse().unwrap();
        let chain = build_chain(&mut graph, peer).expect("chain should build");

        assert_eq!(chain.nodes().len(), 3);
        assert!(chain.output().is_none());
        let input = chain.input().expect("exposed input");
        assert_eq!(graph.port_peer(input).unwrap(), None);

        let udp_out = chain.nodes().last().copied().unwrap();
        assert_eq!(graph.property(udp_out, "host"), Some("192.0.2.7"));
        assert_eq!(graph.property(udp_out, "port"), Some("5004"));
    }
}
