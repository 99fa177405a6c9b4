use std::time::Duration;
use tether_core::{ClientId, ServerEnvelope};
use tether_server::RelayService;
use tokio::sync::mpsc;
use tracing::Level;

/// Timeout for signal exchange operations (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 5000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One fake transport attached straight to the relay, bypassing the
/// WebSocket layer. Captures everything the relay sends it.
pub struct TestPeer {
    pub id: ClientId,
    rx: mpsc::UnboundedReceiver<ServerEnvelope>,
}

impl TestPeer {
    /// Connect to the relay and swallow the initial `connection` envelope.
    pub fn connect(service: &RelayService) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = service.connect(tx);
        let mut peer = Self { id, rx };

        match peer.try_next() {
            Some(ServerEnvelope::Connection { client_id }) => assert_eq!(client_id, id),
            other => panic!("expected connection envelope, got {other:?}"),
        }
        peer
    }

    /// Next envelope already delivered, if any. Relay dispatch is
    /// synchronous, so scenario tests can use this without sleeping.
    pub fn try_next(&mut self) -> Option<ServerEnvelope> {
        self.rx.try_recv().ok()
    }

    pub async fn next(&mut self) -> ServerEnvelope {
        tokio::time::timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), self.rx.recv())
            .await
            .expect("timed out waiting for envelope")
            .expect("relay dropped the outbox")
    }

    pub fn assert_silent(&mut self) {
        if let Some(envelope) = self.try_next() {
            panic!("expected no envelope, got {envelope:?}");
        }
    }

    /// Simulate an abrupt transport close with no explicit leave.
    pub fn drop_abruptly(self, service: &RelayService) {
        service.handle_disconnect(self.id);
    }
}
