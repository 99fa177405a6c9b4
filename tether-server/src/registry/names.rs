use dashmap::DashMap;
use std::sync::Arc;
use tether_core::ClientId;
use tracing::info;

/// Username → connection binding for the identifier-addressed call flow.
/// Re-registering a name rebinds it to the newer connection.
#[derive(Clone, Default)]
pub struct NameDirectory {
    names: Arc<DashMap<String, ClientId>>,
}

impl NameDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, username: &str, client: ClientId) {
        info!(username, %client, "registered name");
        self.names.insert(username.to_string(), client);
    }

    pub fn resolve(&self, username: &str) -> Option<ClientId> {
        self.names.get(username).map(|entry| *entry)
    }

    /// Reverse lookup, used to stamp `from` on forwarded envelopes.
    pub fn name_of(&self, client: ClientId) -> Option<String> {
        self.names
            .iter()
            .find(|entry| *entry.value() == client)
            .map(|entry| entry.key().clone())
    }

    /// Drop every binding held by a disconnecting client.
    pub fn unregister_client(&self, client: ClientId) {
        self.names.retain(|_, bound| *bound != client);
    }
}
