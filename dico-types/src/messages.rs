use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Player, PlayerId, RoomId, RoundId};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    Authenticate { token: String },
    JoinRoom { room_id: RoomId, code: Option<String> },
    LeaveRoom { room_id: RoomId },
    StartRoom { room_id: RoomId },
    Play { room_id: RoomId, proposal: String },
    StopRoom { room_id: RoomId },
    Heartbeat,
}

impl ClientMessage {
    /// Name of the action, echoed back in `GameError` so clients can tell
    /// which request failed.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Authenticate { .. } => "authenticate",
            ClientMessage::JoinRoom { .. } => "joinRoom",
            ClientMessage::LeaveRoom { .. } => "leaveRoom",
            ClientMessage::StartRoom { .. } => "startRoom",
            ClientMessage::Play { .. } => "play",
            ClientMessage::StopRoom { .. } => "stopRoom",
            ClientMessage::Heartbeat => "heartbeat",
        }
    }

    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            ClientMessage::JoinRoom { room_id, .. }
            | ClientMessage::LeaveRoom { room_id }
            | ClientMessage::StartRoom { room_id }
            | ClientMessage::Play { room_id, .. }
            | ClientMessage::StopRoom { room_id } => Some(*room_id),
            ClientMessage::Authenticate { .. } | ClientMessage::Heartbeat => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    AuthenticationSuccess { player: Player },
    AuthenticationFailed { reason: String },
    NewPlayer { room_id: RoomId, player: Player },
    PlayerRemoved { room_id: RoomId, player_id: PlayerId },
    RoomStarted { room_id: RoomId },
    NewRound {
        room_id: RoomId,
        round_id: RoundId,
        obfuscated_word: Vec<Option<char>>,
        definition: String,
        current_player_id: PlayerId,
    },
    GoodProposal { room_id: RoomId, player_id: PlayerId, player_score: u32 },
    WrongProposal { room_id: RoomId, player_id: PlayerId, next_player_id: PlayerId },
    Timeout { room_id: RoomId, player_id: PlayerId, next_player_id: PlayerId },
    Stop { room_id: RoomId },
    GameError {
        event: String,
        room_id: Option<RoomId>,
        kind: String,
        message: String,
    },
    Error { message: String },
}
