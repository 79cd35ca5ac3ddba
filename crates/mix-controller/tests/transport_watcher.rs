//! Transport watcher tests over a real socket.
//!
//! Covers the source lifecycle the session core builds on: first datagram
//! announces a source, invalid datagrams are invisible, silence removes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use mix_controller::transport::{SourceHandle, TransportEvent, UdpTransport};
use mx_test_utils::fixtures::{garbage_datagram, rtp_packet, rtp_packet_with};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

async fn bind_watcher(source_timeout: Duration) -> (UdpTransport, CancellationToken) {
    let cancel = CancellationToken::new();
    let transport = UdpTransport::bind(
        "127.0.0.1:0".parse().unwrap(),
        source_timeout,
        cancel.child_token(),
    )
    .await
    .expect("bind should succeed");
    (transport, cancel)
}

#[tokio::test]
async fn test_source_lifecycle_from_datagrams() {
    let (transport, cancel) = bind_watcher(Duration::from_millis(300)).await;
    let target = transport.local_addr();
    let stats = transport.stats();
    let (_, mut events, _task) = transport.split();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let handle = SourceHandle::new(0x1234_5678);
    sender
        .send_to(&rtp_packet(handle.ssrc(), 1), target)
        .await
        .unwrap();

    let added = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("added event")
        .unwrap();
    assert_eq!(added, TransportEvent::SourceAdded(handle));

    // The watcher learned the sender's address - the dedup statistic.
    let local = sender.local_addr().unwrap();
    assert_eq!(stats.remote_address(handle).await, Some(local));

    // Silence past the timeout removes the source again.
    let removed = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("removed event")
        .unwrap();
    assert_eq!(removed, TransportEvent::SourceRemoved(handle));
    assert_eq!(stats.remote_address(handle).await, None);

    cancel.cancel();
}

#[tokio::test]
async fn test_foreign_traffic_never_becomes_a_source() {
    let (transport, cancel) = bind_watcher(Duration::from_secs(30)).await;
    let target = transport.local_addr();
    let (_, mut events, _task) = transport.split();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    // Garbage, wrong payload type, wrong version - then one valid packet.
    sender.send_to(&garbage_datagram(), target).await.unwrap();
    sender
        .send_to(&rtp_packet_with(0xaaaa_0001, 1, 0, 2), target)
        .await
        .unwrap();
    sender
        .send_to(&rtp_packet_with(0xaaaa_0002, 1, 96, 1), target)
        .await
        .unwrap();
    sender
        .send_to(&rtp_packet(0xaaaa_0003, 1), target)
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event should arrive")
        .unwrap();
    assert_eq!(
        event,
        TransportEvent::SourceAdded(SourceHandle::new(0xaaaa_0003))
    );

    cancel.cancel();
}
