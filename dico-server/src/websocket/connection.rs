use dico_types::{Player, PlayerId, RoomId, ServerMessage};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub player: Option<Player>,
    pub rooms: HashSet<RoomId>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            player: None,
            rooms: HashSet::new(),
            connected_at: now,
            last_activity: now,
            sender,
        };

        (connection, receiver)
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player.as_ref().map(|player| player.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.player.is_some()
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }
}

/// Live sockets and the rooms each one listens to.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (connection, receiver) = Connection::new(id);
        self.connections.write().await.insert(id, connection);
        receiver
    }

    /// Returns the removed connection so the caller can leave its rooms.
    pub async fn remove_connection(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.write().await.remove(&id)
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.read().await.get(&id).cloned()
    }

    pub async fn set_connection_player(&self, id: ConnectionId, player: Player) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.player = Some(player);
        }
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.last_activity = Instant::now();
        }
    }

    pub async fn join_room(&self, id: ConnectionId, room_id: RoomId) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.rooms.insert(room_id);
        }
    }

    pub async fn leave_room(&self, id: ConnectionId, room_id: RoomId) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.rooms.remove(&room_id);
        }
    }

    /// Forget a room on every connection, once it is terminated.
    pub async fn clear_room(&self, room_id: RoomId) {
        for connection in self.connections.write().await.values_mut() {
            connection.rooms.remove(&room_id);
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        match self.connections.read().await.get(&id) {
            Some(connection) => connection.send_message(message),
            None => Err("Connection not found".to_string()),
        }
    }

    /// Deliver to every connection listening to `room_id`. Returns how many
    /// connections got the message.
    pub async fn send_to_room(&self, room_id: RoomId, message: ServerMessage) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|connection| connection.rooms.contains(&room_id))
            .filter(|connection| connection.send_message(message.clone()).is_ok())
            .count()
    }

    pub async fn connections_in_room(&self, room_id: RoomId) -> Vec<ConnectionId> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|connection| connection.rooms.contains(&room_id))
            .map(|connection| connection.id)
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
