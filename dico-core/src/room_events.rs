use dico_types::{Player, PlayerId, RoomId, RoundId};
use tokio::sync::broadcast;
use tracing::trace;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    PlayerJoined {
        room_id: RoomId,
        player: Player,
    },
    PlayerLeft {
        room_id: RoomId,
        player_id: PlayerId,
    },
    RoomStarted {
        room_id: RoomId,
    },
    RoundStarted {
        room_id: RoomId,
        round_id: RoundId,
        obfuscated_word: Vec<Option<char>>,
        obfuscated_description: String,
        current_player_id: PlayerId,
    },
    ProposalAccepted {
        room_id: RoomId,
        player_id: PlayerId,
        player_score: u32,
    },
    ProposalRejected {
        room_id: RoomId,
        player_id: PlayerId,
        next_player_id: PlayerId,
    },
    Timeout {
        room_id: RoomId,
        round_id: RoundId,
        player_id: PlayerId,
        next_player_id: PlayerId,
    },
    RoomStopped {
        room_id: RoomId,
    },
}

impl RoomEvent {
    pub fn room_id(&self) -> RoomId {
        match self {
            RoomEvent::PlayerJoined { room_id, .. }
            | RoomEvent::PlayerLeft { room_id, .. }
            | RoomEvent::RoomStarted { room_id }
            | RoomEvent::RoundStarted { room_id, .. }
            | RoomEvent::ProposalAccepted { room_id, .. }
            | RoomEvent::ProposalRejected { room_id, .. }
            | RoomEvent::Timeout { room_id, .. }
            | RoomEvent::RoomStopped { room_id } => *room_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::PlayerJoined { .. } => "newPlayer",
            RoomEvent::PlayerLeft { .. } => "playerRemoved",
            RoomEvent::RoomStarted { .. } => "roomStarted",
            RoomEvent::RoundStarted { .. } => "startNextRound",
            RoomEvent::ProposalAccepted { .. } => "goodProposal",
            RoomEvent::ProposalRejected { .. } => "wrongProposal",
            RoomEvent::Timeout { .. } => "timeout",
            RoomEvent::RoomStopped { .. } => "stop",
        }
    }
}

/// Outbound channel the engine writes lifecycle events to. Transports
/// subscribe; the engine never knows who is listening.
#[derive(Clone)]
pub struct RoomEventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl RoomEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: RoomEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            trace!("No subscriber for room event {}", name);
        }
    }
}

impl Default for RoomEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_delivers_to_every_subscriber() {
        let bus = RoomEventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let room_id = RoomId::new();

        bus.publish(RoomEvent::RoomStarted { room_id });

        assert_eq!(first.recv().await.unwrap(), RoomEvent::RoomStarted { room_id });
        assert_eq!(second.recv().await.unwrap().room_id(), room_id);
        assert_eq!(bus.sender.receiver_count(), 2);
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let bus = RoomEventBus::new(4);
        bus.publish(RoomEvent::RoomStopped { room_id: RoomId::new() });
        assert_eq!(bus.sender.receiver_count(), 0);
    }

    #[test]
    fn test_event_names() {
        let room_id = RoomId::new();
        let event = RoomEvent::Timeout {
            room_id,
            round_id: RoundId::new(),
            player_id: PlayerId::new(),
            next_player_id: PlayerId::new(),
        };
        assert_eq!(event.name(), "timeout");
        assert_eq!(RoomEvent::RoomStopped { room_id }.name(), "stop");
    }
}
