use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::auth::AuthService;
use crate::engine::RoomEngine;
use dico_types::{ClientMessage, ServerMessage};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;

use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

pub async fn handle_connection(
    websocket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    engine: RoomEngine,
    auth_service: Arc<AuthService>,
) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let message_receiver = connection_manager.create_connection(connection_id).await;
    let message_handler = MessageHandler::new(
        connection_id,
        connection_manager.clone(),
        engine,
        auth_service,
    );

    let incoming_handler = {
        let message_handler = message_handler.clone();
        let connection_manager = connection_manager.clone();
        let mut rate_limiter = RateLimiter::new();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) if msg.is_close() => break,
                    Ok(msg) => {
                        if !rate_limiter.try_acquire() {
                            warn!("Rate limit exceeded for connection {}", connection_id);
                            break;
                        }
                        if let Some(reply) = handle_message(msg, &message_handler).await {
                            let _ = connection_manager
                                .send_to_connection(connection_id, reply)
                                .await;
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    let outgoing_handler = async move {
        let mut receiver = message_receiver;

        while let Some(message) = receiver.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {:?}", e);
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(Message::text(json)).await {
                warn!("Failed to send message to {}: {:?}", connection_id, e);
                break;
            }
        }
    };

    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
}

/// Returns a message to send back when the frame could not be handled.
async fn handle_message(msg: Message, message_handler: &MessageHandler) -> Option<ServerMessage> {
    // Pings, pongs and binary frames carry no commands
    let text = msg.to_str().ok()?;

    let client_message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            return Some(ServerMessage::Error {
                message: format!("Invalid JSON message: {}", e),
            });
        }
    };

    match message_handler.handle_message(client_message).await {
        Ok(()) => None,
        Err(e) => {
            warn!("Message handling error: {}", e);
            None
        }
    }
}
