use crate::error::RelayError;
use dashmap::DashMap;
use std::sync::Arc;
use tether_core::{ClientId, ServerEnvelope};
use tokio::sync::mpsc;

/// Outbound half of one client transport. The writer task on the other end
/// serializes envelopes onto the wire; sending here never blocks on peer
/// I/O.
pub type Outbox = mpsc::UnboundedSender<ServerEnvelope>;

/// Maps each live client id to its transport outbox. Entries exist exactly
/// between transport accept and transport close; a lookup after
/// `unregister` returns nothing, never a stale handle.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    clients: Arc<DashMap<ClientId, Outbox>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted transport and mint its id.
    pub fn register(&self, outbox: Outbox) -> ClientId {
        let id = ClientId::new();
        self.clients.insert(id, outbox);
        id
    }

    pub fn lookup(&self, id: &ClientId) -> Option<Outbox> {
        self.clients.get(id).map(|entry| entry.clone())
    }

    pub fn unregister(&self, id: &ClientId) {
        self.clients.remove(id);
    }

    /// Fire-and-forget delivery to one client.
    pub fn send(&self, id: &ClientId, envelope: ServerEnvelope) -> Result<(), RelayError> {
        let outbox = self.lookup(id).ok_or(RelayError::TargetUnavailable)?;
        outbox
            .send(envelope)
            .map_err(|_| RelayError::TransportClosed)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
