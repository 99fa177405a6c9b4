use crate::utils::{init_tracing, TestPeer};
use tether_core::{Address, ClientEnvelope, IceCandidate, ServerEnvelope, SessionDescription};
use tether_server::RelayService;

fn join(service: &RelayService, peer: &TestPeer, room: &str) {
    service.handle_envelope(
        peer.id,
        ClientEnvelope::Join {
            room: room.to_string(),
        },
    );
}

#[tokio::test]
async fn scenario_a_first_creates_second_joins_quietly() {
    init_tracing();
    let service = RelayService::new();
    let mut x = TestPeer::connect(&service);
    let mut y = TestPeer::connect(&service);

    join(&service, &x, "main");
    assert!(matches!(x.try_next(), Some(ServerEnvelope::Created)));

    join(&service, &y, "main");
    assert!(matches!(y.try_next(), Some(ServerEnvelope::Joined)));

    // X is not told about Y's arrival; Y's ready is the first thing X sees.
    x.assert_silent();
}

#[tokio::test]
async fn scenario_b_full_negotiation_relay() {
    init_tracing();
    let service = RelayService::new();
    let mut x = TestPeer::connect(&service);
    let mut y = TestPeer::connect(&service);

    join(&service, &x, "main");
    join(&service, &y, "main");
    let _ = x.try_next();
    let _ = y.try_next();

    // Guest announces readiness; only the host hears it.
    service.handle_envelope(
        y.id,
        ClientEnvelope::Ready {
            room: "main".into(),
        },
    );
    assert!(matches!(x.try_next(), Some(ServerEnvelope::Ready)));
    y.assert_silent();

    // Host offers, guest answers.
    service.handle_envelope(
        x.id,
        ClientEnvelope::Offer {
            to: Address::room("main"),
            payload: SessionDescription::offer("v=0 host"),
        },
    );
    match y.try_next() {
        Some(ServerEnvelope::Offer { from: None, offer }) => assert_eq!(offer.sdp, "v=0 host"),
        other => panic!("expected relayed offer, got {other:?}"),
    }

    service.handle_envelope(
        y.id,
        ClientEnvelope::Answer {
            to: Address::room("main"),
            payload: SessionDescription::answer("v=0 guest"),
        },
    );
    match x.try_next() {
        Some(ServerEnvelope::Answer { from: None, answer }) => assert_eq!(answer.sdp, "v=0 guest"),
        other => panic!("expected relayed answer, got {other:?}"),
    }

    // Two candidates each way.
    for tag in ["host", "host2"] {
        service.handle_envelope(
            x.id,
            ClientEnvelope::IceCandidate {
                to: Address::room("main"),
                payload: IceCandidate {
                    candidate: format!("candidate:{tag}"),
                    sdp_mid: Some("0".into()),
                    sdp_m_line_index: Some(0),
                },
            },
        );
        assert!(matches!(
            y.try_next(),
            Some(ServerEnvelope::IceCandidate { .. })
        ));
    }
    for tag in ["guest", "guest2"] {
        service.handle_envelope(
            y.id,
            ClientEnvelope::IceCandidate {
                to: Address::room("main"),
                payload: IceCandidate {
                    candidate: format!("candidate:{tag}"),
                    sdp_mid: None,
                    sdp_m_line_index: None,
                },
            },
        );
        assert!(matches!(
            x.try_next(),
            Some(ServerEnvelope::IceCandidate { .. })
        ));
    }
}

#[tokio::test]
async fn scenario_c_abrupt_disconnect_rearms_the_room() {
    init_tracing();
    let service = RelayService::new();
    let mut x = TestPeer::connect(&service);
    let mut y = TestPeer::connect(&service);

    join(&service, &x, "main");
    join(&service, &y, "main");
    let _ = x.try_next();
    let _ = y.try_next();

    // Y vanishes without a leave envelope.
    y.drop_abruptly(&service);
    assert!(matches!(x.try_next(), Some(ServerEnvelope::Leave)));

    // The room survives with X alone, so Z is a joiner, not a creator.
    let mut z = TestPeer::connect(&service);
    join(&service, &z, "main");
    assert!(matches!(z.try_next(), Some(ServerEnvelope::Joined)));
    assert_eq!(service.rooms().member_count("main"), 2);
}

#[tokio::test]
async fn scenario_d_third_join_is_rejected_without_mutation() {
    init_tracing();
    let service = RelayService::new();
    let mut x = TestPeer::connect(&service);
    let mut z = TestPeer::connect(&service);
    let mut w = TestPeer::connect(&service);

    join(&service, &x, "main");
    join(&service, &z, "main");
    let _ = x.try_next();
    let _ = z.try_next();

    join(&service, &w, "main");
    assert!(matches!(w.try_next(), Some(ServerEnvelope::Full)));

    // Membership unchanged; the pair is undisturbed.
    assert_eq!(service.rooms().member_count("main"), 2);
    x.assert_silent();
    z.assert_silent();
}

#[tokio::test]
async fn relay_without_counterpart_drops_not_queues() {
    init_tracing();
    let service = RelayService::new();
    let mut x = TestPeer::connect(&service);
    join(&service, &x, "lonely");
    let _ = x.try_next();

    service.handle_envelope(
        x.id,
        ClientEnvelope::Offer {
            to: Address::room("lonely"),
            payload: SessionDescription::offer("v=0"),
        },
    );

    // Nothing queued: a later joiner starts clean from ready.
    let mut y = TestPeer::connect(&service);
    join(&service, &y, "lonely");
    assert!(matches!(y.try_next(), Some(ServerEnvelope::Joined)));
    y.assert_silent();
}

#[tokio::test]
async fn explicit_leave_empties_and_deletes_the_room() {
    init_tracing();
    let service = RelayService::new();
    let mut x = TestPeer::connect(&service);
    let mut y = TestPeer::connect(&service);

    join(&service, &x, "main");
    join(&service, &y, "main");
    let _ = x.try_next();
    let _ = y.try_next();

    service.handle_envelope(
        y.id,
        ClientEnvelope::Leave {
            room: "main".into(),
        },
    );
    assert!(matches!(x.try_next(), Some(ServerEnvelope::Leave)));

    service.handle_envelope(
        x.id,
        ClientEnvelope::Leave {
            room: "main".into(),
        },
    );
    assert!(!service.rooms().contains("main"));

    // Recreated fresh: created semantics, not joined.
    join(&service, &y, "main");
    assert!(matches!(y.try_next(), Some(ServerEnvelope::Created)));
}

#[tokio::test]
async fn disconnect_unregisters_the_connection() {
    init_tracing();
    let service = RelayService::new();
    let x = TestPeer::connect(&service);
    let id = x.id;

    assert!(service.connections().lookup(&id).is_some());
    x.drop_abruptly(&service);
    assert!(service.connections().lookup(&id).is_none());
}
