use crate::registry::{ConnectionRegistry, NameDirectory, Outbox, RoleAssignment, RoomRegistry};
use std::sync::Arc;
use tether_core::{Address, ClientEnvelope, ClientId, IceCandidate, ServerEnvelope, SessionDescription};
use tracing::{debug, info, warn};

struct RelayInner {
    connections: ConnectionRegistry,
    rooms: RoomRegistry,
    names: NameDirectory,
}

/// The signaling relay: decodes nothing itself, holds no cross-room state,
/// and never blocks on peer I/O — forwarding is fire-and-forget through
/// each target's outbox.
///
/// Target-unavailable policy follows the addressing mode: room-addressed
/// messages are dropped with a warning (room membership is the source of
/// truth), identifier-addressed messages earn the sender an `error` reply.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                connections: ConnectionRegistry::new(),
                rooms: RoomRegistry::new(),
                names: NameDirectory::new(),
            }),
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.inner.rooms
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.inner.connections
    }

    pub fn names(&self) -> &NameDirectory {
        &self.inner.names
    }

    /// Accept a transport: mint an id and tell the client about it.
    pub fn connect(&self, outbox: Outbox) -> ClientId {
        let client_id = self.inner.connections.register(outbox);
        info!(%client_id, "client connected");
        self.reply(client_id, ServerEnvelope::Connection { client_id });
        client_id
    }

    /// Dispatch one decoded envelope from `sender`.
    pub fn handle_envelope(&self, sender: ClientId, envelope: ClientEnvelope) {
        match envelope {
            ClientEnvelope::Join { room } => self.handle_join(sender, &room),
            ClientEnvelope::Ready { room } => {
                self.relay_to_room(&room, sender, ServerEnvelope::Ready)
            }
            ClientEnvelope::Offer { to, payload } => self.route_offer(sender, to, payload),
            ClientEnvelope::Answer { to, payload } => self.route_answer(sender, to, payload),
            ClientEnvelope::IceCandidate { to, payload } => {
                self.route_candidate(sender, to, payload)
            }
            ClientEnvelope::Leave { room } => self.handle_leave(sender, &room),
            ClientEnvelope::Register { username } => {
                self.inner.names.register(&username, sender);
            }
            ClientEnvelope::CallRequest { to } => {
                self.relay_to_name(sender, &to, |from| ServerEnvelope::IncomingCall { from })
            }
            ClientEnvelope::CallAccepted { to } => {
                self.relay_to_name(sender, &to, |from| ServerEnvelope::CallAccepted { from })
            }
            ClientEnvelope::CallRejected { to } => {
                self.relay_to_name(sender, &to, |from| ServerEnvelope::CallRejected { from })
            }
        }
    }

    /// Teardown of last resort: runs on transport close whether or not the
    /// client sent an explicit leave first.
    pub fn handle_disconnect(&self, client: ClientId) {
        info!(%client, "client disconnected");
        for room in self.inner.rooms.rooms_of(client) {
            self.handle_leave(client, &room);
        }
        self.inner.names.unregister_client(client);
        self.inner.connections.unregister(&client);
    }

    fn handle_join(&self, sender: ClientId, room: &str) {
        let role = self.inner.rooms.join(room, sender);
        debug!(%sender, room, ?role, "join handled");
        let reply = match role {
            RoleAssignment::Created => ServerEnvelope::Created,
            RoleAssignment::Joined => ServerEnvelope::Joined,
            RoleAssignment::Full => ServerEnvelope::Full,
        };
        self.reply(sender, reply);
    }

    fn handle_leave(&self, sender: ClientId, room: &str) {
        for member in self.inner.rooms.leave(room, sender) {
            if self.inner.connections.send(&member, ServerEnvelope::Leave).is_err() {
                warn!(%member, room, "leave notification target unreachable");
            }
        }
    }

    fn route_offer(&self, sender: ClientId, to: Address, payload: SessionDescription) {
        match to {
            Address::Room { room } => self.relay_to_room(
                &room,
                sender,
                ServerEnvelope::Offer {
                    from: None,
                    offer: payload,
                },
            ),
            Address::Peer { target } => self.relay_to_name(sender, &target, |from| {
                ServerEnvelope::Offer {
                    from: Some(from),
                    offer: payload,
                }
            }),
        }
    }

    fn route_answer(&self, sender: ClientId, to: Address, payload: SessionDescription) {
        match to {
            Address::Room { room } => self.relay_to_room(
                &room,
                sender,
                ServerEnvelope::Answer {
                    from: None,
                    answer: payload,
                },
            ),
            Address::Peer { target } => self.relay_to_name(sender, &target, |from| {
                ServerEnvelope::Answer {
                    from: Some(from),
                    answer: payload,
                }
            }),
        }
    }

    fn route_candidate(&self, sender: ClientId, to: Address, payload: IceCandidate) {
        match to {
            Address::Room { room } => self.relay_to_room(
                &room,
                sender,
                ServerEnvelope::IceCandidate {
                    from: None,
                    candidate: payload,
                },
            ),
            Address::Peer { target } => self.relay_to_name(sender, &target, |from| {
                ServerEnvelope::IceCandidate {
                    from: Some(from),
                    candidate: payload,
                }
            }),
        }
    }

    /// Forward to the other room member(s). No target means the counterpart
    /// is gone or was never there; the message is dropped, not queued — a
    /// rejoining peer restarts negotiation from `ready`.
    fn relay_to_room(&self, room: &str, sender: ClientId, envelope: ServerEnvelope) {
        let targets = self.inner.rooms.broadcast_targets(room, sender);
        if targets.is_empty() {
            warn!(%sender, room, "no reachable target in room, dropping message");
            return;
        }
        for target in targets {
            if self.inner.connections.send(&target, envelope.clone()).is_err() {
                warn!(%target, room, "room target unreachable, dropping message");
            }
        }
    }

    /// Forward to one named peer, stamping `from` with the sender's own
    /// registered name. Unresolvable or dead targets answer the sender
    /// with an `error` envelope; the transport stays open.
    fn relay_to_name<F>(&self, sender: ClientId, target: &str, build: F)
    where
        F: FnOnce(String) -> ServerEnvelope,
    {
        let from = self.inner.names.name_of(sender).unwrap_or_default();

        let delivered = self
            .inner
            .names
            .resolve(target)
            .map(|id| self.inner.connections.send(&id, build(from)).is_ok())
            .unwrap_or(false);

        if !delivered {
            warn!(%sender, target, "named target unavailable");
            self.reply(
                sender,
                ServerEnvelope::Error {
                    message: format!("user {target} unavailable"),
                },
            );
        }
    }

    fn reply(&self, client: ClientId, envelope: ServerEnvelope) {
        if self.inner.connections.send(&client, envelope).is_err() {
            debug!(%client, "reply target already gone");
        }
    }
}

impl Default for RelayService {
    fn default() -> Self {
        Self::new()
    }
}
