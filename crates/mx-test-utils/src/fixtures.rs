//! Graph and RTP datagram fixtures.

use bytes::{BufMut, Bytes, BytesMut};
use media_graph::{element, Graph, NodeId};
use mix_controller::transport::{MIN_HEADER_LEN, SESSION_PAYLOAD_TYPE};

/// A running primary graph: just the network-input node, the way the
/// service boots it before any peer has joined.
#[must_use]
pub fn primary_graph() -> (Graph, NodeId) {
    let mut graph = Graph::new();
    let input_node = graph
        .create_node(element::RTP_INPUT)
        .expect("input node should build");
    graph.resume();
    (graph, input_node)
}

/// A valid session-profile RTP datagram with an empty-ish payload.
#[must_use]
pub fn rtp_packet(ssrc: u32, sequence: u16) -> Bytes {
    rtp_packet_with(ssrc, sequence, SESSION_PAYLOAD_TYPE, 2)
}

/// An RTP datagram with explicit payload type and version, for negative
/// tests.
#[must_use]
pub fn rtp_packet_with(ssrc: u32, sequence: u16, payload_type: u8, version: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(MIN_HEADER_LEN + 8);
    buf.put_u8(version << 6);
    buf.put_u8(payload_type);
    buf.put_u16(sequence);
    buf.put_u32(0); // timestamp
    buf.put_u32(ssrc);
    buf.put_slice(&[0u8; 8]); // token payload
    buf.freeze()
}

/// Something that is definitely not RTP.
#[must_use]
pub fn garbage_datagram() -> Bytes {
    Bytes::from_static(b"hello, not rtp")
}
