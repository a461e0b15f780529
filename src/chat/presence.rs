/// Process-local room presence and fan-out
///
/// Membership is tracked per connection so an account with two open sockets
/// stays present until both leave. Nothing here is durable.
use crate::chat::ServerEvent;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of each room's broadcast channel
const ROOM_CHANNEL_CAPACITY: usize = 256;

/// Event fanned out to every connection in a room
#[derive(Debug, Clone)]
pub struct RoomBroadcast {
    /// Connection that must not receive this event (typing indicators)
    pub skip: Option<Uuid>,
    pub event: ServerEvent,
}

struct Room {
    /// connection id -> account id
    members: HashMap<Uuid, String>,
    tx: broadcast::Sender<RoomBroadcast>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(ROOM_CHANNEL_CAPACITY);
        Self {
            members: HashMap::new(),
            tx,
        }
    }

    fn accounts(&self) -> Vec<String> {
        self.members
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Room membership snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presence {
    pub count: usize,
    pub users: Vec<String>,
}

#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room and subscribe it to the room's events
    pub fn join(
        &self,
        room_id: &str,
        connection: Uuid,
        account_id: &str,
    ) -> (Presence, broadcast::Receiver<RoomBroadcast>) {
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(Room::new);

        room.members.insert(connection, account_id.to_string());
        let rx = room.tx.subscribe();
        let users = room.accounts();

        (
            Presence {
                count: users.len(),
                users,
            },
            rx,
        )
    }

    /// Remove a connection. Empty rooms are dropped.
    pub fn leave(&self, room_id: &str, connection: Uuid) -> Option<Presence> {
        let presence = {
            let mut room = self.rooms.get_mut(room_id)?;
            room.members.remove(&connection)?;
            let users = room.accounts();
            Presence {
                count: users.len(),
                users,
            }
        };

        if presence.count == 0 {
            self.rooms.remove_if(room_id, |_, room| room.members.is_empty());
        }
        Some(presence)
    }

    pub fn presence(&self, room_id: &str) -> Presence {
        let users = self
            .rooms
            .get(room_id)
            .map(|room| room.accounts())
            .unwrap_or_default();
        Presence {
            count: users.len(),
            users,
        }
    }

    /// Send an event to every subscriber of a room. Returns how many
    /// subscribers received it.
    pub fn publish(&self, room_id: &str, event: ServerEvent, skip: Option<Uuid>) -> usize {
        match self.rooms.get(room_id) {
            Some(room) => room.tx.send(RoomBroadcast { skip, event }).unwrap_or(0),
            None => 0,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
