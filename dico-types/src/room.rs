use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{PlayerId, RoomId, RoundId, WordId};

pub const MIN_PLAYERS_LIMIT: u32 = 1;
pub const MAX_PLAYERS_LIMIT: u32 = 20;
pub const MIN_TIMEOUT_SECONDS: u32 = 5;
pub const MAX_TIMEOUT_SECONDS: u32 = 300;
pub const MIN_NAME_LENGTH: usize = 3;

pub const DEFAULT_MAX_PLAYERS: u32 = 10;
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 30;
pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum RoomStatus {
    Created,   // Waiting for the owner to start
    Started,   // Rounds are being played
    Terminated, // Final, never mutated again
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Created => "Created",
            RoomStatus::Started => "Started",
            RoomStatus::Terminated => "Terminated",
        }
    }

    /// Status only ever moves forward: Created → Started → Terminated.
    /// Created may also jump straight to Terminated (everyone left).
    pub fn can_transition_to(self, target: RoomStatus) -> bool {
        matches!(
            (self, target),
            (RoomStatus::Created, RoomStatus::Started)
                | (RoomStatus::Created, RoomStatus::Terminated)
                | (RoomStatus::Started, RoomStatus::Terminated)
        )
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoomStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(RoomStatus::Created),
            "Started" => Ok(RoomStatus::Started),
            "Terminated" => Ok(RoomStatus::Terminated),
            other => Err(format!("unknown room status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Round {
    pub id: RoundId,
    pub word_id: WordId,
    pub current_player_id: Option<PlayerId>,
    pub winner_id: Option<PlayerId>,
    pub created_at: String,            // ISO 8601 string
    pub terminated_at: Option<String>, // Set once, when the word is found
}

impl Round {
    pub fn new(word_id: WordId, current_player_id: PlayerId, created_at: String) -> Self {
        Self {
            id: RoundId::new(),
            word_id,
            current_player_id: Some(current_player_id),
            winner_id: None,
            created_at,
            terminated_at: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.terminated_at.is_some()
    }

    /// Open and someone holds the turn.
    pub fn is_active(&self) -> bool {
        !self.is_closed() && self.current_player_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub owner_id: PlayerId,
    pub max_players: u32,
    pub is_private: bool,
    pub code: Option<String>,
    pub is_ranked: bool,
    pub locale: String,
    pub timeout_seconds: u32,
    pub status: RoomStatus,
    pub players_ids: Vec<PlayerId>,
    pub connected_players_ids: Vec<PlayerId>,
    pub rounds: Vec<Round>,
    /// Bumped by the store on every successful conditional write.
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl Room {
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn current_round_mut(&mut self) -> Option<&mut Round> {
        self.rounds.last_mut()
    }

    pub fn round(&self, round_id: RoundId) -> Option<&Round> {
        self.rounds.iter().find(|round| round.id == round_id)
    }

    pub fn round_mut(&mut self, round_id: RoundId) -> Option<&mut Round> {
        self.rounds.iter_mut().find(|round| round.id == round_id)
    }

    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.connected_players_ids.contains(&player_id)
    }

    pub fn has_played(&self, player_id: PlayerId) -> bool {
        self.players_ids.contains(&player_id)
    }

    pub fn is_full(&self) -> bool {
        self.connected_players_ids.len() >= self.max_players as usize
    }
}

/// Settings a client supplies when creating a room. Unset fields fall back to
/// the room defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomSettings {
    pub name: String,
    pub max_players: Option<u32>,
    pub is_private: Option<bool>,
    pub is_ranked: Option<bool>,
    pub locale: Option<String>,
    pub timeout_seconds: Option<u32>,
}

/// Public projection of a room: never exposes the private join code.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomView {
    pub id: RoomId,
    pub name: String,
    pub owner_id: PlayerId,
    pub max_players: u32,
    pub is_private: bool,
    pub is_ranked: bool,
    pub locale: String,
    pub timeout_seconds: u32,
    pub status: RoomStatus,
    pub players_ids: Vec<PlayerId>,
    pub connected_players_ids: Vec<PlayerId>,
    pub rounds: Vec<RoundView>,
    pub created_at: String,
}

/// A round as clients see it. Word ids derive from the word itself, so the
/// word of an open round stays hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoundView {
    pub id: RoundId,
    pub word_id: Option<WordId>,
    pub current_player_id: Option<PlayerId>,
    pub winner_id: Option<PlayerId>,
    pub created_at: String,
    pub terminated_at: Option<String>,
}

impl From<&Round> for RoundView {
    fn from(round: &Round) -> Self {
        RoundView {
            id: round.id,
            word_id: round.is_closed().then_some(round.word_id),
            current_player_id: round.current_player_id,
            winner_id: round.winner_id,
            created_at: round.created_at.clone(),
            terminated_at: round.terminated_at.clone(),
        }
    }
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        RoomView {
            id: room.id,
            name: room.name.clone(),
            owner_id: room.owner_id,
            max_players: room.max_players,
            is_private: room.is_private,
            is_ranked: room.is_ranked,
            locale: room.locale.clone(),
            timeout_seconds: room.timeout_seconds,
            status: room.status,
            players_ids: room.players_ids.clone(),
            connected_players_ids: room.connected_players_ids.clone(),
            rounds: room.rounds.iter().map(RoundView::from).collect(),
            created_at: room.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomPageView {
    pub rooms: Vec<RoomView>,
    pub total: u64,
}
