use dico_types::PlayerId;
use rand::Rng;
use rand::seq::SliceRandom;

pub struct TurnSequencer;

impl TurnSequencer {
    /// Player after `current` in roster order, wrapping around.
    ///
    /// When `current` is no longer connected the turn goes to the first
    /// connected player, so a disconnect mid-round never stalls rotation.
    /// Returns `None` only for an empty roster.
    pub fn next(connected: &[PlayerId], current: PlayerId) -> Option<PlayerId> {
        if connected.is_empty() {
            return None;
        }

        match connected.iter().position(|&id| id == current) {
            Some(index) => Some(connected[(index + 1) % connected.len()]),
            None => Some(connected[0]),
        }
    }

    /// Uniform pick used to open a round.
    pub fn pick_random<R: Rng + ?Sized>(connected: &[PlayerId], rng: &mut R) -> Option<PlayerId> {
        connected.choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn roster(size: usize) -> Vec<PlayerId> {
        (0..size).map(|_| PlayerId::new()).collect()
    }

    #[test]
    fn test_next_advances_and_wraps() {
        let players = roster(3);

        assert_eq!(TurnSequencer::next(&players, players[0]), Some(players[1]));
        assert_eq!(TurnSequencer::next(&players, players[1]), Some(players[2]));
        assert_eq!(TurnSequencer::next(&players, players[2]), Some(players[0]));
    }

    #[test]
    fn test_next_single_player_returns_same_player() {
        let players = roster(1);
        assert_eq!(TurnSequencer::next(&players, players[0]), Some(players[0]));
    }

    #[test]
    fn test_next_falls_back_to_first_when_current_left() {
        let players = roster(3);
        let departed = PlayerId::new();

        assert_eq!(TurnSequencer::next(&players, departed), Some(players[0]));
    }

    #[test]
    fn test_next_empty_roster() {
        assert_eq!(TurnSequencer::next(&[], PlayerId::new()), None);
    }

    #[test]
    fn test_pick_random_stays_in_roster() {
        let players = roster(4);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..100 {
            let picked = TurnSequencer::pick_random(&players, &mut rng).unwrap();
            assert!(players.contains(&picked));
        }
        assert_eq!(TurnSequencer::pick_random(&[], &mut rng), None);
    }

    #[test]
    fn test_pick_random_reaches_every_player() {
        let players = roster(3);
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();

        for _ in 0..200 {
            seen.insert(TurnSequencer::pick_random(&players, &mut rng).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }
}
