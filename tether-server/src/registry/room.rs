use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tether_core::ClientId;
use tracing::info;

/// Two-party rooms only; a third join is rejected, never silently dropped.
pub const ROOM_CAPACITY: usize = 2;

/// Outcome of a join attempt. The first member of a room is the host-elect,
/// the second the guest-elect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAssignment {
    Created,
    Joined,
    Full,
}

/// Members in insertion order; order decides the created/joined role.
#[derive(Debug, Default)]
struct Room {
    members: Vec<ClientId>,
}

/// Named rendezvous points. All mutation of one room serializes on its map
/// entry; distinct rooms never block each other.
///
/// A room entry must not outlive its last member: the next joiner's
/// `created` vs `joined` role hinges on whether the name is present.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<String, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `room`, creating it on first use. Re-joining a room the client
    /// is already in is idempotent and returns the role it already holds.
    pub fn join(&self, room: &str, client: ClientId) -> RoleAssignment {
        match self.rooms.entry(room.to_string()) {
            Entry::Vacant(entry) => {
                info!(room, %client, "creating room");
                entry.insert(Room {
                    members: vec![client],
                });
                RoleAssignment::Created
            }
            Entry::Occupied(mut entry) => {
                let members = &mut entry.get_mut().members;
                if let Some(position) = members.iter().position(|m| *m == client) {
                    return if position == 0 {
                        RoleAssignment::Created
                    } else {
                        RoleAssignment::Joined
                    };
                }
                if members.len() < ROOM_CAPACITY {
                    members.push(client);
                    RoleAssignment::Joined
                } else {
                    RoleAssignment::Full
                }
            }
        }
    }

    /// Remove `client` from `room`, dropping the room entry once empty.
    /// Returns the remaining members to notify of the departure. Leaving a
    /// room the client is not in is a no-op.
    pub fn leave(&self, room: &str, client: ClientId) -> Vec<ClientId> {
        let Entry::Occupied(mut entry) = self.rooms.entry(room.to_string()) else {
            return Vec::new();
        };

        let members = &mut entry.get_mut().members;
        let Some(position) = members.iter().position(|m| *m == client) else {
            return Vec::new();
        };
        members.remove(position);

        let remaining = members.clone();
        if remaining.is_empty() {
            info!(room, "room emptied, dropping it");
            entry.remove();
        }
        remaining
    }

    /// Everyone currently in `room` except `exclude`.
    pub fn broadcast_targets(&self, room: &str, exclude: ClientId) -> Vec<ClientId> {
        self.rooms
            .get(room)
            .map(|entry| {
                entry
                    .members
                    .iter()
                    .copied()
                    .filter(|m| *m != exclude)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All rooms the client is a member of. Used to clean up after an
    /// abrupt disconnect with no explicit leave.
    pub fn rooms_of(&self, client: ClientId) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|entry| entry.members.contains(&client))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|r| r.members.len()).unwrap_or(0)
    }
}
