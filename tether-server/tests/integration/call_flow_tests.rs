use crate::utils::{init_tracing, TestPeer};
use tether_core::{Address, ClientEnvelope, ServerEnvelope, SessionDescription};
use tether_server::RelayService;

fn register(service: &RelayService, peer: &TestPeer, username: &str) {
    service.handle_envelope(
        peer.id,
        ClientEnvelope::Register {
            username: username.to_string(),
        },
    );
}

#[tokio::test]
async fn call_request_reaches_the_callee_with_stamped_origin() {
    init_tracing();
    let service = RelayService::new();
    let alice = TestPeer::connect(&service);
    let mut bob = TestPeer::connect(&service);

    register(&service, &alice, "alice");
    register(&service, &bob, "bob");

    service.handle_envelope(alice.id, ClientEnvelope::CallRequest { to: "bob".into() });
    match bob.next().await {
        ServerEnvelope::IncomingCall { from } => assert_eq!(from, "alice"),
        other => panic!("expected incoming_call, got {other:?}"),
    }
}

#[tokio::test]
async fn unavailable_callee_earns_an_error_reply() {
    init_tracing();
    let service = RelayService::new();
    let mut alice = TestPeer::connect(&service);
    register(&service, &alice, "alice");

    service.handle_envelope(
        alice.id,
        ClientEnvelope::CallRequest {
            to: "nobody".into(),
        },
    );
    match alice.next().await {
        ServerEnvelope::Error { message } => assert!(message.contains("nobody")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn direct_offer_carries_server_resolved_from() {
    init_tracing();
    let service = RelayService::new();
    let alice = TestPeer::connect(&service);
    let mut bob = TestPeer::connect(&service);

    register(&service, &alice, "alice");
    register(&service, &bob, "bob");

    // The envelope has no sender name in it; the relay supplies one.
    service.handle_envelope(
        alice.id,
        ClientEnvelope::Offer {
            to: Address::peer("bob"),
            payload: SessionDescription::offer("v=0 direct"),
        },
    );
    match bob.next().await {
        ServerEnvelope::Offer { from, offer } => {
            assert_eq!(from.as_deref(), Some("alice"));
            assert_eq!(offer.sdp, "v=0 direct");
        }
        other => panic!("expected direct offer, got {other:?}"),
    }
}

#[tokio::test]
async fn disconnect_releases_the_username() {
    init_tracing();
    let service = RelayService::new();
    let alice = TestPeer::connect(&service);
    let mut bob = TestPeer::connect(&service);

    register(&service, &alice, "alice");
    register(&service, &bob, "bob");
    alice.drop_abruptly(&service);

    assert_eq!(service.names().resolve("alice"), None);

    service.handle_envelope(bob.id, ClientEnvelope::CallRequest { to: "alice".into() });
    assert!(matches!(bob.next().await, ServerEnvelope::Error { .. }));
}

#[tokio::test]
async fn call_rejection_flows_back_to_the_caller() {
    init_tracing();
    let service = RelayService::new();
    let mut alice = TestPeer::connect(&service);
    let mut bob = TestPeer::connect(&service);

    register(&service, &alice, "alice");
    register(&service, &bob, "bob");

    service.handle_envelope(alice.id, ClientEnvelope::CallRequest { to: "bob".into() });
    assert!(matches!(
        bob.next().await,
        ServerEnvelope::IncomingCall { .. }
    ));

    service.handle_envelope(bob.id, ClientEnvelope::CallRejected { to: "alice".into() });
    match alice.next().await {
        ServerEnvelope::CallRejected { from } => assert_eq!(from, "bob"),
        other => panic!("expected call_rejected, got {other:?}"),
    }
}
