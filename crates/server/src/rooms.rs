//! Connection room registry: which live sockets watch which game, and fan-out of
//! server events to them. Delivery never blocks; a full or closed outbound
//! channel drops the message with a warning.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chess_core::Side;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::protocol::ServerEvent;
use crate::session::{GameResult, MoveOutcome, SessionPublisher};

pub type ConnectionId = u64;

/// Serialized frames queued for one socket's writer task.
pub type Outbound = mpsc::Receiver<Arc<str>>;

/// Who is behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub player_id: Option<i64>,
    /// `None` for spectators
    pub color: Option<Side>,
}

struct Connection {
    room: String,
    participant: Participant,
    sender: mpsc::Sender<Arc<str>>,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<String, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, Connection>,
}

pub struct RoomRegistry {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
    buffer: usize,
}

impl RoomRegistry {
    /// `buffer` bounds each connection's outbound queue.
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a connection in `room`. The returned receiver yields every frame
    /// addressed to it and ends when the connection is removed.
    pub async fn connect(&self, room: &str, participant: Participant) -> (ConnectionId, Outbound) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);

        let mut inner = self.inner.write().await;
        inner.rooms.entry(room.to_string()).or_default().insert(id);
        inner.connections.insert(
            id,
            Connection {
                room: room.to_string(),
                participant,
                sender,
            },
        );
        debug!(room, conn_id = id, "connection registered");
        (id, receiver)
    }

    /// Remove a connection, deleting its room once empty. Returns who it was.
    pub async fn disconnect(&self, id: ConnectionId) -> Option<(String, Participant)> {
        let mut inner = self.inner.write().await;
        let conn = inner.connections.remove(&id)?;

        if let Some(members) = inner.rooms.get_mut(&conn.room) {
            members.remove(&id);
            if members.is_empty() {
                inner.rooms.remove(&conn.room);
            }
        }
        debug!(room = %conn.room, conn_id = id, "connection removed");
        Some((conn.room, conn.participant))
    }

    pub async fn broadcast_to_all(&self, room: &str, event: &ServerEvent) {
        self.deliver(room, None, event).await;
    }

    pub async fn broadcast_to_others(&self, room: &str, excluding: ConnectionId, event: &ServerEvent) {
        self.deliver(room, Some(excluding), event).await;
    }

    pub async fn send_to(&self, id: ConnectionId, event: &ServerEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };
        let inner = self.inner.read().await;
        if let Some(conn) = inner.connections.get(&id) {
            enqueue(id, conn, frame);
        }
    }

    async fn deliver(&self, room: &str, excluding: Option<ConnectionId>, event: &ServerEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return;
        };

        debug!(room, event = event.kind(), recipients = members.len(), "broadcast");
        for id in members {
            if Some(*id) == excluding {
                continue;
            }
            if let Some(conn) = inner.connections.get(id) {
                enqueue(*id, conn, frame.clone());
            }
        }
    }

    pub async fn connection_count(&self, room: &str) -> usize {
        self.inner.read().await.rooms.get(room).map_or(0, HashSet::len)
    }

    /// Colors with at least one seated connection in `room`.
    pub async fn colors_present(&self, room: &str) -> HashSet<Side> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(room)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.connections.get(id))
            .filter_map(|conn| conn.participant.color)
            .collect()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Drop every connection. Writers see their channel close and hang up.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        let closed = inner.connections.len();
        inner.connections.clear();
        inner.rooms.clear();
        debug!(closed, "room registry shut down");
    }
}

/// Rooms are named by game code; committed changes go to everyone in the room.
#[async_trait]
impl SessionPublisher for RoomRegistry {
    async fn move_committed(&self, code: &str, outcome: &MoveOutcome) {
        for event in ServerEvent::from_outcome(outcome) {
            self.broadcast_to_all(code, &event).await;
        }
    }

    async fn game_ended(&self, code: &str, result: GameResult, reason: &str) {
        let event = ServerEvent::GameOver {
            result,
            reason: reason.to_string(),
        };
        self.broadcast_to_all(code, &event).await;
    }
}

fn serialize(event: &ServerEvent) -> Option<Arc<str>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json.into()),
        Err(e) => {
            warn!(event = event.kind(), error = %e, "failed to serialize event");
            None
        }
    }
}

fn enqueue(id: ConnectionId, conn: &Connection, frame: Arc<str>) {
    if let Err(e) = conn.sender.try_send(frame) {
        warn!(room = %conn.room, conn_id = id, error = %e, "failed to enqueue event");
    }
}
