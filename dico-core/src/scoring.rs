use dico_types::{PlayerId, Room, RoomStatus, Round};

pub struct ScoreCalculator;

impl ScoreCalculator {
    /// Rounds won by `player_id`. Recomputed from history on every call; a
    /// room is one game session so the scan stays short.
    pub fn score(rounds: &[Round], player_id: PlayerId) -> u32 {
        rounds
            .iter()
            .filter(|round| round.winner_id == Some(player_id))
            .count() as u32
    }

    /// Wins across every terminated room the player took part in.
    pub fn total_score(rooms: &[Room], player_id: PlayerId) -> u32 {
        rooms
            .iter()
            .filter(|room| room.status == RoomStatus::Terminated && room.has_played(player_id))
            .map(|room| Self::score(&room.rounds, player_id))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dico_types::{RoomId, WordId};

    fn won_by(winner: Option<PlayerId>) -> Round {
        let mut round = Round::new(
            WordId::new(),
            PlayerId::new(),
            "2024-01-01T00:00:00+00:00".into(),
        );
        if winner.is_some() {
            round.winner_id = winner;
            round.current_player_id = None;
            round.terminated_at = Some("2024-01-01T00:00:30+00:00".into());
        }
        round
    }

    fn room_with(status: RoomStatus, players: Vec<PlayerId>, rounds: Vec<Round>) -> Room {
        Room {
            id: RoomId::new(),
            name: "room".into(),
            owner_id: players[0],
            max_players: 10,
            is_private: false,
            code: None,
            is_ranked: false,
            locale: "en".into(),
            timeout_seconds: 30,
            status,
            players_ids: players.clone(),
            connected_players_ids: players,
            rounds,
            version: 0,
            created_at: "2024-01-01T00:00:00+00:00".into(),
            updated_at: "2024-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_score_counts_only_wins_of_player() {
        let alice = PlayerId::new();
        let bob = PlayerId::new();
        let rounds = vec![
            won_by(Some(alice)),
            won_by(Some(bob)),
            won_by(Some(alice)),
            won_by(None),
        ];

        assert_eq!(ScoreCalculator::score(&rounds, alice), 2);
        assert_eq!(ScoreCalculator::score(&rounds, bob), 1);
        assert_eq!(ScoreCalculator::score(&rounds, PlayerId::new()), 0);
        assert_eq!(ScoreCalculator::score(&[], alice), 0);
    }

    #[test]
    fn test_total_score_ignores_unfinished_rooms() {
        let alice = PlayerId::new();
        let bob = PlayerId::new();

        let rooms = vec![
            room_with(
                RoomStatus::Terminated,
                vec![alice, bob],
                vec![won_by(Some(alice)), won_by(Some(alice))],
            ),
            room_with(RoomStatus::Started, vec![alice, bob], vec![won_by(Some(alice))]),
            room_with(
                RoomStatus::Terminated,
                vec![bob, alice],
                vec![won_by(Some(bob)), won_by(Some(alice))],
            ),
        ];

        assert_eq!(ScoreCalculator::total_score(&rooms, alice), 3);
        assert_eq!(ScoreCalculator::total_score(&rooms, bob), 1);
    }
}
