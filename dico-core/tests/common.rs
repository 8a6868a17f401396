#![allow(dead_code)]

use dico_core::{InMemoryRoomStore, RoomStore, build_room};
use dico_types::{Player, PlayerId, Room, RoomSettings, Round, WordId};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Creates a test player with the given name
pub fn create_test_player(name: &str) -> Player {
    Player {
        id: PlayerId::new(),
        username: name.to_string(),
        karma: 0,
    }
}

/// Creates a public room owned by `owner`
pub fn create_test_room(owner: &Player) -> Room {
    let settings = RoomSettings {
        name: "Test room".to_string(),
        max_players: Some(2),
        timeout_seconds: Some(5),
        ..Default::default()
    };
    build_room(owner, &settings, &mut StdRng::seed_from_u64(99)).unwrap()
}

/// Appends a round won by `winner` (or left open when `None`)
pub fn push_round(room: &mut Room, current: PlayerId, winner: Option<PlayerId>) {
    let mut round = Round::new(WordId::new(), current, chrono::Utc::now().to_rfc3339());
    if let Some(winner) = winner {
        round.winner_id = Some(winner);
        round.current_player_id = None;
        round.terminated_at = Some(chrono::Utc::now().to_rfc3339());
    }
    room.rounds.push(round);
}

pub async fn store_with(room: &Room) -> InMemoryRoomStore {
    let store = InMemoryRoomStore::new();
    store.insert(room).await.unwrap();
    store
}
