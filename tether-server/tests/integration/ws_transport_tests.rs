use crate::utils::{init_tracing, SIGNAL_TIMEOUT_MS};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tether_core::{ClientEnvelope, ServerEnvelope, SessionDescription};
use tether_server::{ws_handler, RelayService};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relay() -> (RelayService, SocketAddr) {
    let service = RelayService::new();
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(service.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (service, addr)
}

struct WsClient {
    stream: WsStream,
}

impl WsClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (stream, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("ws connect");
        let mut client = Self { stream };

        // First envelope on every connection is the assigned id.
        match client.next().await {
            ServerEnvelope::Connection { .. } => {}
            other => panic!("expected connection envelope, got {other:?}"),
        }
        client
    }

    async fn send(&mut self, envelope: &ClientEnvelope) {
        let json = serde_json::to_string(envelope).expect("encode");
        self.stream.send(Message::Text(json)).await.expect("send");
    }

    async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .expect("send raw");
    }

    async fn next(&mut self) -> ServerEnvelope {
        let deadline = Duration::from_millis(SIGNAL_TIMEOUT_MS);
        loop {
            let msg = tokio::time::timeout(deadline, self.stream.next())
                .await
                .expect("timed out waiting for envelope")
                .expect("stream ended")
                .expect("ws error");
            match msg {
                Message::Text(text) => {
                    return serde_json::from_str(&text).expect("decode server envelope")
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }
}

fn join(room: &str) -> ClientEnvelope {
    ClientEnvelope::Join {
        room: room.to_string(),
    }
}

#[tokio::test]
async fn end_to_end_negotiation_over_websockets() {
    init_tracing();
    let (_service, addr) = spawn_relay().await;

    let mut x = WsClient::connect(addr).await;
    x.send(&join("main")).await;
    assert!(matches!(x.next().await, ServerEnvelope::Created));

    let mut y = WsClient::connect(addr).await;
    y.send(&join("main")).await;
    assert!(matches!(y.next().await, ServerEnvelope::Joined));

    y.send(&ClientEnvelope::Ready {
        room: "main".into(),
    })
    .await;
    assert!(matches!(x.next().await, ServerEnvelope::Ready));

    x.send(&ClientEnvelope::Offer {
        to: tether_core::Address::room("main"),
        payload: SessionDescription::offer("v=0 x"),
    })
    .await;
    match y.next().await {
        ServerEnvelope::Offer { offer, .. } => assert_eq!(offer.sdp, "v=0 x"),
        other => panic!("expected offer, got {other:?}"),
    }

    y.send(&ClientEnvelope::Answer {
        to: tether_core::Address::room("main"),
        payload: SessionDescription::answer("v=0 y"),
    })
    .await;
    match x.next().await {
        ServerEnvelope::Answer { answer, .. } => assert_eq!(answer.sdp, "v=0 y"),
        other => panic!("expected answer, got {other:?}"),
    }

    y.send(&ClientEnvelope::Leave {
        room: "main".into(),
    })
    .await;
    assert!(matches!(x.next().await, ServerEnvelope::Leave));
}

#[tokio::test]
async fn dropped_socket_triggers_leave_notification() {
    init_tracing();
    let (service, addr) = spawn_relay().await;

    let mut x = WsClient::connect(addr).await;
    x.send(&join("main")).await;
    assert!(matches!(x.next().await, ServerEnvelope::Created));

    let mut y = WsClient::connect(addr).await;
    y.send(&join("main")).await;
    assert!(matches!(y.next().await, ServerEnvelope::Joined));

    // Kill Y's socket without a leave envelope.
    drop(y);

    assert!(matches!(x.next().await, ServerEnvelope::Leave));

    // The room still exists with X alone.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(SIGNAL_TIMEOUT_MS);
    while service.rooms().member_count("main") != 1 {
        assert!(tokio::time::Instant::now() < deadline, "room never settled");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut z = WsClient::connect(addr).await;
    z.send(&join("main")).await;
    assert!(matches!(z.next().await, ServerEnvelope::Joined));
}

#[tokio::test]
async fn malformed_envelopes_are_discarded_not_fatal() {
    init_tracing();
    let (_service, addr) = spawn_relay().await;

    let mut x = WsClient::connect(addr).await;
    x.send_raw("definitely not json").await;
    x.send_raw("{\"type\":\"unknown-thing\"}").await;

    // The connection is still alive and room state is untouched.
    x.send(&join("main")).await;
    assert!(matches!(x.next().await, ServerEnvelope::Created));
}
