//! Decode chain factory.
//!
//! One chain per peer: jitter queue -> RTP depayloader -> audio decoder,
//! internally linked, exposing the queue's sink as the chain input and the
//! decoder's source as the chain output. Attachment to the live graph is
//! the topology layer's job, not ours.

use crate::errors::MixError;
use media_graph::{element, Graph, PortDirection, Subgraph};

/// Build one peer's decode chain.
///
/// The graph must already be paused.
///
/// # Errors
///
/// `ElementCreation` when a stage cannot be constructed, `Link` when the
/// internal chain fails to negotiate - both fatal to the session.
pub fn build_chain(graph: &mut Graph) -> Result<Subgraph, MixError> {
    let queue = graph.create_node(element::JITTER_QUEUE)?;
    let depay = graph.create_node(element::RTP_DEPAY)?;
    let decoder = graph.create_node(element::AUDIO_DECODER)?;

    graph.link(
        graph.static_port(queue, PortDirection::Source)?,
        graph.static_port(depay, PortDirection::Sink)?,
    )?;
    graph.link(
        graph.static_port(depay, PortDirection::Source)?,
        graph.static_port(decoder, PortDirection::Sink)?,
    )?;

    let input = graph.static_port(queue, PortDirection::Sink)?;
    let output = graph.static_port(decoder, PortDirection::Source)?;
    Ok(Subgraph::new(
        vec![queue, depay, decoder],
        Some(input),
        Some(output),
    ))
}
