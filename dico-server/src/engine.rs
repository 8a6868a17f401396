use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::scheduler::RoundScheduler;
use dico_core::{
    RoomEvent, RoomEventBus, RoomPage, RoomQuery, RoomStore, ScoreCalculator, TurnSequencer,
    WordCorpus, WordObfuscator, build_room, codes_match,
};
use dico_types::{
    Player, PlayerId, Room, RoomError, RoomId, RoomSettings, RoomStatus, Round, RoundId,
};

pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: usize = 16;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Between `RoomStarted` and the first round.
    pub start_grace: Duration,
    /// Between a correct proposal and the next round.
    pub round_grace: Duration,
    pub max_update_attempts: usize,
    /// Fixes the opener picks; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_grace: DEFAULT_GRACE_DELAY,
            round_grace: DEFAULT_GRACE_DELAY,
            max_update_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalResult {
    pub correct: bool,
    pub player_score: u32,
    pub next_player_id: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    Rotated {
        next_player_id: PlayerId,
        connected_players: usize,
    },
    /// The round moved on before the timer fired.
    Aborted,
}

/// What a mutation closure decided for the room it was handed.
enum Change<T> {
    Write(T),
    /// Guards failed; nothing was modified.
    Keep(T),
}

struct Updated<T> {
    room: Room,
    value: T,
    written: bool,
}

enum LeaveChange {
    NotConnected,
    Left,
    Rotated { round_id: RoundId, next_player_id: PlayerId },
    Emptied,
}

struct EngineInner {
    store: Arc<dyn RoomStore>,
    words: Arc<dyn WordCorpus>,
    events: RoomEventBus,
    scheduler: RoundScheduler,
    config: EngineConfig,
    rng: Mutex<StdRng>,
}

/// Drives rooms through their lifecycle.
///
/// Holds no game state of its own. Every operation reads the room from the
/// store, checks it, and writes it back with a compare-and-set on `version`.
/// When the write loses, the room is re-read and the checks run again, so a
/// concurrent timeout and proposal can never both apply to the same turn.
#[derive(Clone)]
pub struct RoomEngine {
    inner: Arc<EngineInner>,
}

impl RoomEngine {
    pub fn new(
        store: Arc<dyn RoomStore>,
        words: Arc<dyn WordCorpus>,
        events: RoomEventBus,
        config: EngineConfig,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            inner: Arc::new(EngineInner {
                store,
                words,
                events,
                scheduler: RoundScheduler::new(),
                config,
                rng: Mutex::new(rng),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.inner.events.subscribe()
    }

    pub fn scheduler(&self) -> &RoundScheduler {
        &self.inner.scheduler
    }

    /// Drop every pending round timer. Rooms stay as they are in the store.
    pub fn shutdown(&self) {
        let pending = self.inner.scheduler.pending();
        self.inner.scheduler.cancel_all();
        info!("Room engine stopped, {} round timers cancelled", pending);
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self
            .inner
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }

    async fn load(&self, room_id: RoomId) -> Result<Room, RoomError> {
        self.inner
            .store
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| RoomError::room_not_found(room_id))
    }

    /// Read-modify-write loop over one room document.
    async fn update_room<T, F>(
        &self,
        room_id: RoomId,
        mut apply: F,
    ) -> Result<Updated<T>, RoomError>
    where
        F: FnMut(&mut Room) -> Result<Change<T>, RoomError>,
    {
        for attempt in 1..=self.inner.config.max_update_attempts {
            let mut room = self.load(room_id).await?;
            let expected_version = room.version;

            match apply(&mut room)? {
                Change::Keep(value) => {
                    return Ok(Updated {
                        room,
                        value,
                        written: false,
                    });
                }
                Change::Write(value) => {
                    room.updated_at = chrono::Utc::now().to_rfc3339();
                    if self
                        .inner
                        .store
                        .replace_if_version(&room, expected_version)
                        .await?
                    {
                        room.version = expected_version + 1;
                        return Ok(Updated {
                            room,
                            value,
                            written: true,
                        });
                    }
                    debug!(
                        "Room {} changed under update (attempt {}), re-reading",
                        room_id, attempt
                    );
                }
            }
        }

        warn!(
            "Giving up on room {} after {} conflicting updates",
            room_id, self.inner.config.max_update_attempts
        );
        Err(RoomError::Conflict(room_id))
    }

    pub async fn create_room(
        &self,
        owner: &Player,
        settings: &RoomSettings,
    ) -> Result<Room, RoomError> {
        let room = self.with_rng(|rng| build_room(owner, settings, rng))?;
        self.inner.store.insert(&room).await?;
        info!("Room {} '{}' created by {}", room.id, room.name, owner.id);
        Ok(room)
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, RoomError> {
        self.load(room_id).await
    }

    pub async fn get_room_status(&self, room_id: RoomId) -> Result<RoomStatus, RoomError> {
        Ok(self.load(room_id).await?.status)
    }

    pub async fn find_room_by_code(&self, code: &str) -> Result<Room, RoomError> {
        self.inner
            .store
            .find_by_code(code)
            .await?
            .ok_or_else(|| RoomError::NotFound("room with this code".to_string()))
    }

    /// Public rooms still waiting to start, newest first.
    pub async fn list_public_rooms(
        &self,
        skip: u64,
        take: Option<u64>,
    ) -> Result<RoomPage, RoomError> {
        Ok(self.inner.store.find(&RoomQuery::lobby(skip, take)).await?)
    }

    pub async fn find_user_rooms(
        &self,
        player_id: PlayerId,
        status: Option<RoomStatus>,
    ) -> Result<Vec<Room>, RoomError> {
        let page = self
            .inner
            .store
            .find(&RoomQuery::for_player(player_id, status))
            .await?;
        Ok(page.rooms)
    }

    pub async fn get_user_score(&self, player_id: PlayerId) -> Result<u32, RoomError> {
        let rooms = self
            .find_user_rooms(player_id, Some(RoomStatus::Terminated))
            .await?;
        Ok(ScoreCalculator::total_score(&rooms, player_id))
    }

    pub async fn join(
        &self,
        room_id: RoomId,
        player: &Player,
        code: Option<&str>,
    ) -> Result<Room, RoomError> {
        let updated = self
            .update_room(room_id, |room| {
                if room.status == RoomStatus::Terminated {
                    return Err(RoomError::InvalidState(format!(
                        "room {} is terminated",
                        room.id
                    )));
                }
                if let Some(stored) = room.code.as_deref() {
                    if !code.is_some_and(|provided| codes_match(stored, provided)) {
                        return Err(RoomError::Unauthorized("invalid room code".to_string()));
                    }
                }
                if room.is_connected(player.id) {
                    return Ok(Change::Keep(()));
                }
                if room.is_full() {
                    return Err(RoomError::CapacityExceeded {
                        room_id: room.id,
                        max_players: room.max_players,
                    });
                }

                if !room.has_played(player.id) {
                    room.players_ids.push(player.id);
                }
                room.connected_players_ids.push(player.id);
                Ok(Change::Write(()))
            })
            .await?;

        let room = updated.room;
        if !updated.written {
            debug!("Player {} already connected to room {}", player.id, room_id);
            return Ok(room);
        }

        info!(
            "Player {} joined room {} ({}/{})",
            player.id,
            room_id,
            room.connected_players_ids.len(),
            room.max_players
        );
        self.inner.events.publish(RoomEvent::PlayerJoined {
            room_id,
            player: player.clone(),
        });

        // A lone player's round stops rotating; a second player restarts it
        if room.status == RoomStatus::Started && room.connected_players_ids.len() == 2 {
            if let Some(round) = room.current_round().filter(|round| round.is_active()) {
                if let Some(current) = round.current_player_id {
                    self.arm_round_timeout(&room, round.id, current);
                }
            }
        }

        Ok(room)
    }

    pub async fn leave(&self, room_id: RoomId, player_id: PlayerId) -> Result<Room, RoomError> {
        let updated = self
            .update_room(room_id, |room| {
                if !room.status.can_transition_to(RoomStatus::Terminated) {
                    return Err(RoomError::InvalidState(format!(
                        "room {} is terminated",
                        room.id
                    )));
                }
                if !room.is_connected(player_id) {
                    return Ok(Change::Keep(LeaveChange::NotConnected));
                }

                room.connected_players_ids.retain(|&id| id != player_id);
                if room.connected_players_ids.is_empty() {
                    room.status = RoomStatus::Terminated;
                    return Ok(Change::Write(LeaveChange::Emptied));
                }

                if room.status == RoomStatus::Started {
                    let fallback = TurnSequencer::next(&room.connected_players_ids, player_id);
                    if let (Some(round), Some(next_player_id)) =
                        (room.current_round_mut(), fallback)
                    {
                        if round.is_active() && round.current_player_id == Some(player_id) {
                            round.current_player_id = Some(next_player_id);
                            return Ok(Change::Write(LeaveChange::Rotated {
                                round_id: round.id,
                                next_player_id,
                            }));
                        }
                    }
                }

                Ok(Change::Write(LeaveChange::Left))
            })
            .await?;

        let room = updated.room;
        if !updated.written {
            debug!("Player {} was not connected to room {}", player_id, room_id);
            return Ok(room);
        }

        info!("Player {} left room {}", player_id, room_id);
        self.inner
            .events
            .publish(RoomEvent::PlayerLeft { room_id, player_id });

        match updated.value {
            LeaveChange::Emptied => {
                self.inner.scheduler.cancel_room(room_id);
                info!("Room {} is empty and terminated", room_id);
                self.inner.events.publish(RoomEvent::RoomStopped { room_id });
            }
            LeaveChange::Rotated {
                round_id,
                next_player_id,
            } => {
                debug!(
                    "Turn in room {} passed to {} after the current player left",
                    room_id, next_player_id
                );
                self.arm_round_timeout(&room, round_id, next_player_id);
            }
            LeaveChange::Left | LeaveChange::NotConnected => {}
        }

        Ok(room)
    }

    pub async fn start(&self, room_id: RoomId, requester: PlayerId) -> Result<(), RoomError> {
        self.update_room(room_id, |room| {
            if !room.status.can_transition_to(RoomStatus::Started) {
                return Err(RoomError::InvalidState(format!(
                    "room {} must be in Created state to start, it is {}",
                    room.id, room.status
                )));
            }
            if room.owner_id != requester {
                return Err(RoomError::Forbidden(
                    "only the owner can start the room".to_string(),
                ));
            }
            room.status = RoomStatus::Started;
            Ok(Change::Write(()))
        })
        .await?;

        info!("Room {} started by {}", room_id, requester);
        self.inner.events.publish(RoomEvent::RoomStarted { room_id });

        let engine = self.clone();
        let delay = self.inner.config.start_grace;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = engine.start_next_round(room_id).await {
                error!("Failed to open the first round of room {}: {}", room_id, e);
            }
        });

        Ok(())
    }

    /// Open a new round with a random word for the room's locale and a
    /// random connected player holding the first turn.
    pub async fn start_next_round(&self, room_id: RoomId) -> Result<Round, RoomError> {
        let room = self.load(room_id).await?;
        if room.status != RoomStatus::Started {
            return Err(RoomError::InvalidState(format!(
                "room {} must be Started to open a round, it is {}",
                room_id, room.status
            )));
        }
        if room.connected_players_ids.is_empty() {
            return Err(RoomError::InvalidState(format!(
                "room {} has no connected players",
                room_id
            )));
        }

        let word = self
            .inner
            .words
            .random_word(Some(&room.locale))
            .await?
            .ok_or_else(|| RoomError::NotFound(format!("word for locale '{}'", room.locale)))?;

        let updated = self
            .update_room(room_id, |room| {
                if room.status != RoomStatus::Started {
                    return Err(RoomError::InvalidState(format!(
                        "room {} is {}",
                        room.id, room.status
                    )));
                }
                if room.current_round().is_some_and(Round::is_active) {
                    return Err(RoomError::InvalidState(format!(
                        "room {} already has a round in progress",
                        room.id
                    )));
                }

                let opener = self
                    .with_rng(|rng| TurnSequencer::pick_random(&room.connected_players_ids, rng))
                    .ok_or_else(|| {
                        RoomError::InvalidState(format!(
                            "room {} has no connected players",
                            room.id
                        ))
                    })?;

                let round = Round::new(word.id, opener, chrono::Utc::now().to_rfc3339());
                room.rounds.push(round.clone());
                Ok(Change::Write((round, opener)))
            })
            .await?;

        let (round, current_player_id) = updated.value;
        info!(
            "Round {} opened in room {}, {} plays first",
            round.id, room_id, current_player_id
        );

        self.inner.events.publish(RoomEvent::RoundStarted {
            room_id,
            round_id: round.id,
            obfuscated_word: WordObfuscator::obfuscate(&word.name),
            obfuscated_description: WordObfuscator::redact(&word.definition, &word.name),
            current_player_id,
        });
        self.arm_round_timeout(&updated.room, round.id, current_player_id);

        Ok(round)
    }

    pub async fn check_proposal(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        proposal: &str,
    ) -> Result<ProposalResult, RoomError> {
        let room = self.load(room_id).await?;
        if room.status != RoomStatus::Started {
            return Err(RoomError::InvalidState(format!(
                "room {} must be Started to play, it is {}",
                room_id, room.status
            )));
        }
        let round = room
            .current_round()
            .filter(|round| round.is_active())
            .ok_or_else(|| {
                RoomError::InvalidState(format!("no round in progress in room {}", room_id))
            })?;
        if round.current_player_id != Some(player_id) {
            return Err(RoomError::Forbidden("this is not your turn to play".to_string()));
        }

        let word = self
            .inner
            .words
            .word_by_id(round.word_id)
            .await?
            .ok_or_else(|| RoomError::NotFound(format!("word {}", round.word_id)))?;
        let round_id = round.id;
        let correct = proposal.trim().to_lowercase() == word.name.trim().to_lowercase();

        if correct {
            self.close_round(room_id, round_id, player_id).await
        } else {
            self.rotate_after_wrong_proposal(room_id, round_id, player_id).await
        }
    }

    async fn close_round(
        &self,
        room_id: RoomId,
        round_id: RoundId,
        player_id: PlayerId,
    ) -> Result<ProposalResult, RoomError> {
        let updated = self
            .update_room(room_id, |room| {
                if room.status != RoomStatus::Started {
                    return Ok(Change::Keep(()));
                }
                match room.round_mut(round_id) {
                    Some(round)
                        if round.is_active() && round.current_player_id == Some(player_id) =>
                    {
                        round.winner_id = Some(player_id);
                        round.current_player_id = None;
                        round.terminated_at = Some(chrono::Utc::now().to_rfc3339());
                        Ok(Change::Write(()))
                    }
                    _ => Ok(Change::Keep(())),
                }
            })
            .await?;

        let room = updated.room;
        let player_score = ScoreCalculator::score(&room.rounds, player_id);

        if !updated.written {
            debug!(
                "Correct proposal by {} in room {} lost the race for round {}",
                player_id, room_id, round_id
            );
            return Ok(ProposalResult {
                correct: false,
                player_score,
                next_player_id: current_player_of(&room, round_id),
            });
        }

        self.inner.scheduler.cancel((room_id, round_id));
        info!(
            "Player {} found the word of round {} in room {} (score {})",
            player_id, round_id, room_id, player_score
        );
        self.inner.events.publish(RoomEvent::ProposalAccepted {
            room_id,
            player_id,
            player_score,
        });

        let engine = self.clone();
        let delay = self.inner.config.round_grace;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = engine.start_next_round(room_id).await {
                error!("Failed to open the next round of room {}: {}", room_id, e);
            }
        });

        Ok(ProposalResult {
            correct: true,
            player_score,
            next_player_id: None,
        })
    }

    async fn rotate_after_wrong_proposal(
        &self,
        room_id: RoomId,
        round_id: RoundId,
        player_id: PlayerId,
    ) -> Result<ProposalResult, RoomError> {
        let updated = self.rotate_turn(room_id, round_id, player_id).await?;
        let room = &updated.room;
        let player_score = ScoreCalculator::score(&room.rounds, player_id);

        let Some(next_player_id) = updated.value.filter(|_| updated.written) else {
            debug!(
                "Wrong proposal by {} in room {} lost the race for round {}",
                player_id, room_id, round_id
            );
            return Ok(ProposalResult {
                correct: false,
                player_score,
                next_player_id: current_player_of(room, round_id),
            });
        };

        self.inner.events.publish(RoomEvent::ProposalRejected {
            room_id,
            player_id,
            next_player_id,
        });
        self.arm_round_timeout(room, round_id, next_player_id);

        Ok(ProposalResult {
            correct: false,
            player_score,
            next_player_id: Some(next_player_id),
        })
    }

    /// Pass the turn of `round_id` on from `from`, if `from` still holds it.
    async fn rotate_turn(
        &self,
        room_id: RoomId,
        round_id: RoundId,
        from: PlayerId,
    ) -> Result<Updated<Option<PlayerId>>, RoomError> {
        self.update_room(room_id, |room| {
            if room.status != RoomStatus::Started {
                return Ok(Change::Keep(None));
            }
            let Some(next_player_id) = TurnSequencer::next(&room.connected_players_ids, from) else {
                return Ok(Change::Keep(None));
            };
            match room.round_mut(round_id) {
                Some(round) if round.is_active() && round.current_player_id == Some(from) => {
                    round.current_player_id = Some(next_player_id);
                    Ok(Change::Write(Some(next_player_id)))
                }
                _ => Ok(Change::Keep(None)),
            }
        })
        .await
    }

    /// One timer firing: rotate the turn if `armed_for` still holds it.
    pub async fn handle_timeout(
        &self,
        room_id: RoomId,
        round_id: RoundId,
        armed_for: PlayerId,
    ) -> Result<TimeoutOutcome, RoomError> {
        let updated = self.rotate_turn(room_id, round_id, armed_for).await?;

        let Some(next_player_id) = updated.value.filter(|_| updated.written) else {
            debug!(
                "Timeout for {} in room {} round {} is stale",
                armed_for, room_id, round_id
            );
            return Ok(TimeoutOutcome::Aborted);
        };

        info!(
            "Player {} timed out in room {}, turn goes to {}",
            armed_for, room_id, next_player_id
        );
        self.inner.events.publish(RoomEvent::Timeout {
            room_id,
            round_id,
            player_id: armed_for,
            next_player_id,
        });

        Ok(TimeoutOutcome::Rotated {
            next_player_id,
            connected_players: updated.room.connected_players_ids.len(),
        })
    }

    /// Player holding the turn of `round_id`, when the round still needs a timer:
    /// room Started, round open and more than one player connected.
    async fn turn_holder(
        &self,
        room_id: RoomId,
        round_id: RoundId,
    ) -> Result<Option<PlayerId>, RoomError> {
        let room = self.load(room_id).await?;
        if room.status != RoomStatus::Started || room.connected_players_ids.len() < 2 {
            return Ok(None);
        }
        Ok(current_player_of(&room, round_id))
    }

    /// Arm the timeout loop of a round for `player_id`, replacing any earlier
    /// timer of that round. The loop keeps rotating on silence for as long as
    /// someone else is there to take the turn.
    fn arm_round_timeout(&self, room: &Room, round_id: RoundId, player_id: PlayerId) {
        let engine = self.clone();
        let room_id = room.id;
        let timeout = Duration::from_secs(u64::from(room.timeout_seconds));

        self.inner.scheduler.arm((room_id, round_id), async move {
            let mut armed_for = player_id;
            loop {
                tokio::time::sleep(timeout).await;

                let next = match engine.handle_timeout(room_id, round_id, armed_for).await {
                    Ok(TimeoutOutcome::Rotated {
                        next_player_id,
                        connected_players,
                    }) if connected_players > 1 => Ok(Some(next_player_id)),
                    Ok(TimeoutOutcome::Rotated { .. }) => {
                        debug!("Room {} has a single player, round timer stops", room_id);
                        Ok(None)
                    }
                    // The turn can move on without this timer, e.g. a rotation that
                    // lands while a join re-arms it
                    Ok(TimeoutOutcome::Aborted) => engine
                        .turn_holder(room_id, round_id)
                        .await
                        .map(|holder| holder.filter(|&holder| holder != armed_for)),
                    Err(e) => Err(e),
                };

                match next {
                    Ok(Some(player_id)) => armed_for = player_id,
                    Ok(None) => break,
                    Err(e) => {
                        error!(
                            "Round timeout failed for room {} round {}: {}",
                            room_id, round_id, e
                        );
                        break;
                    }
                }
            }
        });
    }

    pub async fn stop(&self, room_id: RoomId) -> Result<(), RoomError> {
        self.update_room(room_id, |room| {
            if !room.status.can_transition_to(RoomStatus::Terminated) {
                return Err(RoomError::InvalidState(format!(
                    "room {} is already terminated",
                    room.id
                )));
            }
            room.status = RoomStatus::Terminated;
            Ok(Change::Write(()))
        })
        .await?;

        let cancelled = self.inner.scheduler.cancel_room(room_id);
        info!("Room {} stopped ({} timers cancelled)", room_id, cancelled);
        self.inner.events.publish(RoomEvent::RoomStopped { room_id });
        Ok(())
    }

    /// Stop on behalf of a client; only the owner may do it.
    pub async fn stop_by(&self, room_id: RoomId, requester: PlayerId) -> Result<(), RoomError> {
        let room = self.load(room_id).await?;
        if room.owner_id != requester {
            return Err(RoomError::Forbidden(
                "only the owner can stop the room".to_string(),
            ));
        }
        self.stop(room_id).await
    }
}

fn current_player_of(room: &Room, round_id: RoundId) -> Option<PlayerId> {
    room.round(round_id)
        .filter(|round| round.is_active())
        .and_then(|round| round.current_player_id)
}
