use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RoomEngine;
use crate::websocket::ConnectionManager;
use dico_core::RoomEvent;
use dico_types::ServerMessage;

/// Wire form of an engine event.
pub fn event_to_message(event: RoomEvent) -> ServerMessage {
    match event {
        RoomEvent::PlayerJoined { room_id, player } => ServerMessage::NewPlayer { room_id, player },
        RoomEvent::PlayerLeft { room_id, player_id } => {
            ServerMessage::PlayerRemoved { room_id, player_id }
        }
        RoomEvent::RoomStarted { room_id } => ServerMessage::RoomStarted { room_id },
        RoomEvent::RoundStarted {
            room_id,
            round_id,
            obfuscated_word,
            obfuscated_description,
            current_player_id,
        } => ServerMessage::NewRound {
            room_id,
            round_id,
            obfuscated_word,
            definition: obfuscated_description,
            current_player_id,
        },
        RoomEvent::ProposalAccepted {
            room_id,
            player_id,
            player_score,
        } => ServerMessage::GoodProposal {
            room_id,
            player_id,
            player_score,
        },
        RoomEvent::ProposalRejected {
            room_id,
            player_id,
            next_player_id,
        } => ServerMessage::WrongProposal {
            room_id,
            player_id,
            next_player_id,
        },
        RoomEvent::Timeout {
            room_id,
            player_id,
            next_player_id,
            ..
        } => ServerMessage::Timeout {
            room_id,
            player_id,
            next_player_id,
        },
        RoomEvent::RoomStopped { room_id } => ServerMessage::Stop { room_id },
    }
}

/// Forward engine events to the connections listening to each room until
/// the engine side of the channel goes away.
pub fn spawn_event_dispatcher(
    engine: &RoomEngine,
    connection_manager: Arc<ConnectionManager>,
) -> JoinHandle<()> {
    let mut receiver = engine.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let room_id = event.room_id();
                    let name = event.name();
                    let stopped = matches!(event, RoomEvent::RoomStopped { .. });

                    let delivered = connection_manager
                        .send_to_room(room_id, event_to_message(event))
                        .await;
                    debug!("Event {} for room {} sent to {} connections", name, room_id, delivered);

                    if stopped {
                        connection_manager.clear_room(room_id).await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event dispatcher lagged, {} room events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Event dispatcher stopped");
    })
}
