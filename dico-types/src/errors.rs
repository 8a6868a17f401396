use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::RoomId;

/// Synchronous, user-facing failures of room operations. None of them is
/// retried by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, thiserror::Error)]
#[ts(export)]
pub enum RoomError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid room state: {0}")]
    InvalidState(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("room {room_id} is full ({max_players} players)")]
    CapacityExceeded { room_id: RoomId, max_players: u32 },
    #[error("invalid room settings: {0}")]
    Validation(String),
    #[error("room {0} kept changing underneath the update")]
    Conflict(RoomId),
    #[error("store failure: {0}")]
    Store(String),
}

impl RoomError {
    pub fn room_not_found(room_id: RoomId) -> Self {
        RoomError::NotFound(format!("room {}", room_id))
    }

    /// Stable machine-readable name, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            RoomError::NotFound(_) => "NotFound",
            RoomError::InvalidState(_) => "InvalidState",
            RoomError::Forbidden(_) => "Forbidden",
            RoomError::Unauthorized(_) => "Unauthorized",
            RoomError::CapacityExceeded { .. } => "CapacityExceeded",
            RoomError::Validation(_) => "Validation",
            RoomError::Conflict(_) => "Conflict",
            RoomError::Store(_) => "Store",
        }
    }
}
