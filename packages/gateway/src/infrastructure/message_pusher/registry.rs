//! Connection registry owned by the hub's event loop.
//!
//! Three maps kept consistent with each other:
//! connection id → client, user id → current connection id, room id → member connection ids.

use std::collections::{HashMap, HashSet};

use crate::domain::{ConnectionId, RoomId, UserId};

use super::client::Client;

#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<ConnectionId, Client>,
    users: HashMap<UserId, ConnectionId>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a client. The user's mapping always moves to the new connection (last writer
    /// wins); the previously mapped connection id, if any, is returned.
    ///
    /// The displaced connection stays registered (and in its room) until it unregisters.
    pub fn register(&mut self, client: Client) -> Option<ConnectionId> {
        let id = client.id();
        let displaced = self
            .users
            .insert(client.user_id().clone(), id)
            .filter(|previous| *previous != id);
        if let Some(room_id) = client.room_id() {
            self.rooms.entry(room_id.clone()).or_default().insert(id);
        }
        self.clients.insert(id, client);
        displaced
    }

    /// Remove a client. Returns it so the caller decides when the mailbox closes (on drop).
    ///
    /// The user mapping is only removed when it still points at this connection, so a stale
    /// unregister never clobbers a newer registration for the same user.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Client> {
        let client = self.clients.remove(id)?;
        if self.users.get(client.user_id()) == Some(id) {
            self.users.remove(client.user_id());
        }
        if let Some(room_id) = client.room_id()
            && let Some(members) = self.rooms.get_mut(room_id)
        {
            members.remove(id);
            if members.is_empty() {
                self.rooms.remove(room_id);
            }
        }
        Some(client)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Client> {
        self.clients.get(id)
    }

    /// The connection currently mapped to `user_id`
    pub fn current_connection(&self, user_id: &UserId) -> Option<&Client> {
        self.users
            .get(user_id)
            .and_then(|id| self.clients.get(id))
    }

    pub fn is_user_connected(&self, user_id: &UserId) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn room_members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
