//! End-to-end tests over the in-memory transport: discovery, invitation,
//! session establishment, typed broadcast, and handler dispatch.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use meshchat_core::transport::memory::MemoryHub;
use meshchat_core::transport::{Transport, TransportEvent};
use meshchat_core::{
    ConnectionStatus, FramePayload, MeshConfig, NetworkFrame, NetworkService, PeerId, Result,
    StatusEvent, TextMessage,
};

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn service_named(hub: &MemoryHub, name: &str) -> NetworkService {
    let config = MeshConfig {
        display_name: Some(name.to_string()),
        invite_timeout_secs: 5,
        ..MeshConfig::default()
    };
    let transport = Box::new(hub.endpoint(PeerId::new(name)));
    NetworkService::new(config, transport)
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<Result<T>>) -> T {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for dispatch")
        .expect("dispatch channel closed")
        .expect("handler delivered an error")
}

/// Wait until the sending service itself sees the peer as connected, so a
/// following broadcast cannot race the sender's own session bookkeeping.
async fn wait_until_sender_sees(service: &NetworkService, peer: &PeerId) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if service.connection().status_of(peer).await == ConnectionStatus::Connected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "sender never saw {peer} connect"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the given peer reaches `Connected`, collecting the statuses
/// seen along the way.
async fn wait_for_connected(
    rx: &mut mpsc::UnboundedReceiver<Result<StatusEvent>>,
    peer: &PeerId,
) -> Vec<ConnectionStatus> {
    let mut seen = Vec::new();
    loop {
        let event = recv(rx).await;
        if &event.peer == peer {
            seen.push(event.status);
            if event.status == ConnectionStatus::Connected {
                return seen;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[tokio::test]
async fn two_peers_exchange_a_text_message() {
    let hub = MemoryHub::new();
    let alice = service_named(&hub, "alice");
    let bob = service_named(&hub, "bob");

    let (_t, mut bob_statuses) = bob.subscribe_status_events().await;
    let (_t, mut bob_texts) = bob.subscribe_text_messages().await;

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    wait_for_connected(&mut bob_statuses, &PeerId::new("alice")).await;
    wait_until_sender_sees(&alice, &PeerId::new("bob")).await;

    let sent = alice.broadcast(TextMessage::new("hi")).await.unwrap();
    assert_eq!(sent.originator, Some(PeerId::new("alice")));
    assert_eq!(sent.text, "hi");

    let received = recv(&mut bob_texts).await;
    assert_eq!(received, sent);
    assert!(received.is_from(alice.local_peer()));
}

#[tokio::test]
async fn text_frame_reaches_only_the_text_handler() {
    let hub = MemoryHub::new();
    let alice = service_named(&hub, "alice");
    let bob = service_named(&hub, "bob");

    let (_t, mut bob_statuses) = bob.subscribe_status_events().await;
    let (_t, mut bob_texts) = bob.subscribe_text_messages().await;

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    wait_for_connected(&mut bob_statuses, &PeerId::new("alice")).await;
    wait_until_sender_sees(&alice, &PeerId::new("bob")).await;

    alice.broadcast(TextMessage::new("hello")).await.unwrap();
    let received = recv(&mut bob_texts).await;
    assert_eq!(received.text, "hello");

    // The status handler saw the connection transitions above, but not the
    // text frame.
    assert!(bob_statuses.try_recv().is_err());
}

#[tokio::test]
async fn one_frame_reaches_every_matching_handler_exactly_once() {
    let hub = MemoryHub::new();
    let alice = service_named(&hub, "alice");
    let bob = service_named(&hub, "bob");

    let (_t, mut bob_statuses) = bob.subscribe_status_events().await;
    let mut text_receivers = Vec::new();
    for _ in 0..3 {
        let (_t, rx) = bob.subscribe_text_messages().await;
        text_receivers.push(rx);
    }

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    wait_for_connected(&mut bob_statuses, &PeerId::new("alice")).await;
    wait_until_sender_sees(&alice, &PeerId::new("bob")).await;

    alice.broadcast(TextMessage::new("fan out")).await.unwrap();

    // Exactly one delivery per matching handler, in whatever order.
    for rx in &mut text_receivers {
        let received = recv(rx).await;
        assert_eq!(received.text, "fan out");
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn removed_handler_no_longer_receives() {
    let hub = MemoryHub::new();
    let alice = service_named(&hub, "alice");
    let bob = service_named(&hub, "bob");

    let (_t, mut bob_statuses) = bob.subscribe_status_events().await;
    let (kept_token, mut kept) = bob.subscribe_text_messages().await;
    let (dropped_token, mut dropped) = bob.subscribe_text_messages().await;
    assert_ne!(kept_token, dropped_token);

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    wait_for_connected(&mut bob_statuses, &PeerId::new("alice")).await;
    wait_until_sender_sees(&alice, &PeerId::new("bob")).await;

    bob.remove_handler(dropped_token).await;

    alice.broadcast(TextMessage::new("still here?")).await.unwrap();
    let received = recv(&mut kept).await;
    assert_eq!(received.text, "still here?");
    assert!(dropped.try_recv().is_err());
}

#[tokio::test]
async fn status_transitions_notify_once_each() {
    let hub = MemoryHub::new();
    let alice = service_named(&hub, "alice");
    let bob = service_named(&hub, "bob");

    let (_t, mut bob_statuses) = bob.subscribe_status_events().await;

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    let seen = wait_for_connected(&mut bob_statuses, &PeerId::new("alice")).await;

    // One notification per transition; the transitional state, if observed,
    // renders no text.
    assert_eq!(
        seen,
        vec![ConnectionStatus::Advertising, ConnectionStatus::Connected]
    );
    assert_eq!(seen[0].display_text(), None);
    assert_eq!(seen[1].display_text(), Some("joined"));

    // Losing the peer yields exactly one Disconnected notification.
    alice.stop().await.unwrap();
    loop {
        let event = recv(&mut bob_statuses).await;
        if event.peer == PeerId::new("alice") {
            assert_eq!(event.status, ConnectionStatus::Disconnected);
            assert_eq!(event.status.display_text(), Some("left"));
            break;
        }
    }
    assert!(bob_statuses.try_recv().is_err());
}

#[tokio::test]
async fn broadcast_reaches_all_connected_peers() {
    let hub = MemoryHub::new();
    let alice = service_named(&hub, "alice");
    let bob = service_named(&hub, "bob");
    let carol = service_named(&hub, "carol");

    let (_t, mut bob_statuses) = bob.subscribe_status_events().await;
    let (_t, mut carol_statuses) = carol.subscribe_status_events().await;
    let (_t, mut bob_texts) = bob.subscribe_text_messages().await;
    let (_t, mut carol_texts) = carol.subscribe_text_messages().await;

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    carol.start().await.unwrap();
    wait_for_connected(&mut bob_statuses, &PeerId::new("alice")).await;
    wait_for_connected(&mut carol_statuses, &PeerId::new("alice")).await;
    wait_until_sender_sees(&alice, &PeerId::new("bob")).await;
    wait_until_sender_sees(&alice, &PeerId::new("carol")).await;

    alice.broadcast(TextMessage::new("to everyone")).await.unwrap();

    assert_eq!(recv(&mut bob_texts).await.text, "to everyone");
    assert_eq!(recv(&mut carol_texts).await.text, "to everyone");
}

#[tokio::test]
async fn corrupt_frame_is_dropped_without_disturbing_later_frames() {
    let hub = MemoryHub::new();
    let bob = service_named(&hub, "bob");
    let (_t, mut bob_statuses) = bob.subscribe_status_events().await;
    let (_t, mut bob_texts) = bob.subscribe_text_messages().await;
    bob.start().await.unwrap();

    // A hand-driven endpoint that can put raw bytes on the wire.
    let mut rogue = hub.endpoint(PeerId::new("mallory"));
    let mut rogue_events = rogue.take_events().unwrap();
    rogue.start().await.unwrap();

    // Accept bob's invitation so a session exists.
    loop {
        let event = timeout(Duration::from_secs(2), rogue_events.recv())
            .await
            .expect("timed out waiting for an invitation")
            .expect("event stream closed");
        if let TransportEvent::InvitationReceived { reply, .. } = event {
            reply.send(true).unwrap();
            break;
        }
    }
    wait_for_connected(&mut bob_statuses, &PeerId::new("mallory")).await;

    // Undecodable bytes first, then a well-formed frame on the same stream.
    rogue
        .send(&[PeerId::new("bob")], &[0x01, 0x02, 0x03])
        .await
        .unwrap();
    let frame = NetworkFrame::with_payload(FramePayload::Text(TextMessage {
        originator: Some(PeerId::new("mallory")),
        text: "still alive".to_string(),
    }));
    rogue
        .send(&[PeerId::new("bob")], &frame.encode().unwrap())
        .await
        .unwrap();

    // The bad frame is dropped; the one behind it still dispatches.
    let received = recv(&mut bob_texts).await;
    assert_eq!(received.text, "still alive");
    assert!(received.is_from(&PeerId::new("mallory")));
}

#[tokio::test]
async fn late_registration_sees_only_later_frames() {
    let hub = MemoryHub::new();
    let alice = service_named(&hub, "alice");
    let bob = service_named(&hub, "bob");

    let (_t, mut bob_statuses) = bob.subscribe_status_events().await;
    let (_t, mut early) = bob.subscribe_text_messages().await;

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    wait_for_connected(&mut bob_statuses, &PeerId::new("alice")).await;
    wait_until_sender_sees(&alice, &PeerId::new("bob")).await;

    alice.broadcast(TextMessage::new("first")).await.unwrap();
    assert_eq!(recv(&mut early).await.text, "first");

    // Registered after the first frame; live for everything afterwards.
    let (_t, mut late) = bob.subscribe_text_messages().await;
    alice.broadcast(TextMessage::new("second")).await.unwrap();

    assert_eq!(recv(&mut early).await.text, "second");
    assert_eq!(recv(&mut late).await.text, "second");
    assert!(late.try_recv().is_err());
}
