use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::AuthService;
use crate::engine::RoomEngine;
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use dico_types::{ClientMessage, Player, RoomError, RoomId, ServerMessage};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    engine: RoomEngine,
    auth_service: Arc<AuthService>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        engine: RoomEngine,
        auth_service: Arc<AuthService>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            engine,
            auth_service,
        }
    }

    /// Room outcomes reach clients as broadcast events; only failures are
    /// answered directly.
    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        let event = message.event_name();
        let room_id = message.room_id();

        let player = match &message {
            ClientMessage::Authenticate { token } => {
                return self.handle_authenticate(token.clone()).await;
            }
            ClientMessage::Heartbeat => return Ok(()),
            _ => match self.current_player().await {
                Some(player) => player,
                None => return self.send_error("Authentication required").await,
            },
        };

        let result = match message {
            ClientMessage::JoinRoom { room_id, code } => {
                self.handle_join_room(&player, room_id, code).await
            }
            ClientMessage::LeaveRoom { room_id } => self.handle_leave_room(&player, room_id).await,
            ClientMessage::StartRoom { room_id } => self.engine.start(room_id, player.id).await,
            ClientMessage::Play { room_id, proposal } => self
                .engine
                .check_proposal(room_id, player.id, &proposal)
                .await
                .map(|_| ()),
            ClientMessage::StopRoom { room_id } => self.engine.stop_by(room_id, player.id).await,
            ClientMessage::Authenticate { .. } | ClientMessage::Heartbeat => Ok(()),
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => self.send_game_error(event, room_id, &e).await,
        }
    }

    pub async fn handle_disconnect(&self) {
        let Some(connection) = self
            .connection_manager
            .remove_connection(self.connection_id)
            .await
        else {
            return;
        };
        let Some(player_id) = connection.player_id() else {
            return;
        };

        for room_id in connection.rooms {
            match self.engine.leave(room_id, player_id).await {
                Ok(_) => info!("Player {} dropped from room {} on disconnect", player_id, room_id),
                // Already terminated rooms have nothing left to leave
                Err(RoomError::InvalidState(_)) => {}
                Err(e) => warn!(
                    "Failed to remove player {} from room {} on disconnect: {}",
                    player_id, room_id, e
                ),
            }
        }
    }

    async fn current_player(&self) -> Option<Player> {
        self.connection_manager
            .get_connection(self.connection_id)
            .await
            .and_then(|connection| connection.player)
    }

    async fn handle_authenticate(&self, token: String) -> Result<(), String> {
        info!("Authenticating connection {}", self.connection_id);

        match self.auth_service.validate_token(&token).await {
            Ok(player) => {
                self.connection_manager
                    .set_connection_player(self.connection_id, player.clone())
                    .await;
                self.send_message(ServerMessage::AuthenticationSuccess { player })
                    .await
            }
            Err(e) => {
                warn!(
                    "Authentication failed for connection {}: {}",
                    self.connection_id, e
                );
                self.send_message(ServerMessage::AuthenticationFailed {
                    reason: e.to_string(),
                })
                .await
            }
        }
    }

    async fn handle_join_room(
        &self,
        player: &Player,
        room_id: RoomId,
        code: Option<String>,
    ) -> Result<(), RoomError> {
        // Listen first so the joiner sees its own NewPlayer event
        self.connection_manager
            .join_room(self.connection_id, room_id)
            .await;

        if let Err(e) = self.engine.join(room_id, player, code.as_deref()).await {
            self.connection_manager
                .leave_room(self.connection_id, room_id)
                .await;
            return Err(e);
        }
        Ok(())
    }

    async fn handle_leave_room(&self, player: &Player, room_id: RoomId) -> Result<(), RoomError> {
        let result = self.engine.leave(room_id, player.id).await;
        self.connection_manager
            .leave_room(self.connection_id, room_id)
            .await;
        result.map(|_| ())
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.connection_manager
            .send_to_connection(self.connection_id, message)
            .await
    }

    async fn send_error(&self, message: &str) -> Result<(), String> {
        self.send_message(ServerMessage::Error {
            message: message.to_string(),
        })
        .await
    }

    async fn send_game_error(
        &self,
        event: &str,
        room_id: Option<RoomId>,
        error: &RoomError,
    ) -> Result<(), String> {
        self.send_message(ServerMessage::GameError {
            event: event.to_string(),
            room_id,
            kind: error.kind().to_string(),
            message: error.to_string(),
        })
        .await
    }
}
