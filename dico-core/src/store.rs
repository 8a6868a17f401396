use async_trait::async_trait;
use dico_types::{PlayerId, Room, RoomError, RoomId, RoomStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::settings::normalize_code;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room {0} already exists")]
    Duplicate(RoomId),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("corrupt room document: {0}")]
    Corrupt(String),
}

impl From<StoreError> for RoomError {
    fn from(err: StoreError) -> Self {
        RoomError::Store(err.to_string())
    }
}

/// Filter for room listings. Results are ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct RoomQuery {
    pub status: Option<RoomStatus>,
    pub include_private: bool,
    pub player_id: Option<PlayerId>,
    pub skip: u64,
    pub take: Option<u64>,
}

impl RoomQuery {
    /// Public rooms that can still be joined before they start.
    pub fn lobby(skip: u64, take: Option<u64>) -> Self {
        Self {
            status: Some(RoomStatus::Created),
            include_private: false,
            player_id: None,
            skip,
            take,
        }
    }

    /// Every room the player has ever been part of.
    pub fn for_player(player_id: PlayerId, status: Option<RoomStatus>) -> Self {
        Self {
            status,
            include_private: true,
            player_id: Some(player_id),
            skip: 0,
            take: None,
        }
    }

    pub fn matches(&self, room: &Room) -> bool {
        if let Some(status) = self.status {
            if room.status != status {
                return false;
            }
        }
        if !self.include_private && room.is_private {
            return false;
        }
        if let Some(player_id) = self.player_id {
            if !room.has_played(player_id) {
                return false;
            }
        }
        true
    }

    /// Apply ordering and paging to an already filtered set.
    pub fn page(&self, mut rooms: Vec<Room>) -> RoomPage {
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let total = rooms.len() as u64;
        let take = self.take.unwrap_or(u64::MAX);
        let rooms = rooms
            .into_iter()
            .skip(self.skip as usize)
            .take(take.min(usize::MAX as u64) as usize)
            .collect();
        RoomPage { rooms, total }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoomPage {
    pub rooms: Vec<Room>,
    /// Matches before paging.
    pub total: u64,
}

/// Document store for rooms.
///
/// Every mutation goes through [`RoomStore::replace_if_version`]: the write
/// only lands if the stored document still carries `expected_version`, and the
/// stored copy then carries `expected_version + 1`. A `false` return means a
/// concurrent writer got there first.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn insert(&self, room: &Room) -> Result<(), StoreError>;

    async fn find_by_id(&self, room_id: RoomId) -> Result<Option<Room>, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Room>, StoreError>;

    async fn find(&self, query: &RoomQuery) -> Result<RoomPage, StoreError>;

    async fn replace_if_version(
        &self,
        room: &Room,
        expected_version: u64,
    ) -> Result<bool, StoreError>;
}

#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Room>>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn insert(&self, room: &Room) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.id) {
            return Err(StoreError::Duplicate(room.id));
        }
        rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn find_by_id(&self, room_id: RoomId) -> Result<Option<Room>, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(&room_id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Room>, StoreError> {
        let code = normalize_code(code);
        let rooms = self.rooms.read().await;
        Ok(rooms
            .values()
            .find(|room| room.code.as_deref() == Some(code.as_str()))
            .cloned())
    }

    async fn find(&self, query: &RoomQuery) -> Result<RoomPage, StoreError> {
        let rooms = self.rooms.read().await;
        let matching = rooms.values().filter(|room| query.matches(room)).cloned().collect();
        Ok(query.page(matching))
    }

    async fn replace_if_version(
        &self,
        room: &Room,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(&room.id) {
            Some(stored) if stored.version == expected_version => {
                let mut next = room.clone();
                next.version = expected_version + 1;
                *stored = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::build_room;
    use dico_types::{Player, RoomSettings};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn make_room(name: &str, is_private: bool) -> Room {
        let owner = Player {
            id: PlayerId::new(),
            username: "owner".into(),
            karma: 0,
        };
        let settings = RoomSettings {
            name: name.into(),
            is_private: Some(is_private),
            ..Default::default()
        };
        build_room(&owner, &settings, &mut StdRng::seed_from_u64(5)).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryRoomStore::new();
        let room = make_room("Lobby", false);

        store.insert(&room).await.unwrap();
        assert_eq!(store.find_by_id(room.id).await.unwrap(), Some(room.clone()));
        assert!(matches!(store.insert(&room).await, Err(StoreError::Duplicate(_))));
        assert_eq!(store.rooms.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_if_version_rejects_stale_writes() {
        let store = InMemoryRoomStore::new();
        let room = make_room("Lobby", false);
        store.insert(&room).await.unwrap();

        let mut first = room.clone();
        first.name = "First".into();
        assert!(store.replace_if_version(&first, 0).await.unwrap());

        let mut stale = room.clone();
        stale.name = "Stale".into();
        assert!(!store.replace_if_version(&stale, 0).await.unwrap());

        let stored = store.find_by_id(room.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "First");
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_replace_unknown_room_is_a_miss() {
        let store = InMemoryRoomStore::new();
        let room = make_room("Lobby", false);
        assert!(!store.replace_if_version(&room, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_code_is_case_insensitive() {
        let store = InMemoryRoomStore::new();
        let room = make_room("Secret", true);
        store.insert(&room).await.unwrap();

        let code = room.code.clone().unwrap().to_lowercase();
        let found = store.find_by_code(&format!("  {}  ", code)).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(room.id));
        assert!(store.find_by_code("ZZZZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lobby_query_hides_private_and_started_rooms() {
        let store = InMemoryRoomStore::new();
        let public = make_room("Public", false);
        let private = make_room("Private", true);
        let mut started = make_room("Started", false);
        started.status = RoomStatus::Started;

        for room in [&public, &private, &started] {
            store.insert(room).await.unwrap();
        }

        let page = store.find(&RoomQuery::lobby(0, None)).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rooms[0].id, public.id);
    }

    #[tokio::test]
    async fn test_paging_keeps_total() {
        let store = InMemoryRoomStore::new();
        for i in 0..5 {
            store.insert(&make_room(&format!("Room {}", i), false)).await.unwrap();
        }

        let page = store.find(&RoomQuery::lobby(1, Some(2))).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.rooms.len(), 2);
    }

    #[tokio::test]
    async fn test_player_query() {
        let store = InMemoryRoomStore::new();
        let room = make_room("Mine", true);
        let other = make_room("Other", false);
        store.insert(&room).await.unwrap();
        store.insert(&other).await.unwrap();

        let page = store.find(&RoomQuery::for_player(room.owner_id, None)).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rooms[0].id, room.id);
    }
}
