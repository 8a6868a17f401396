use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use dico_types::{RoomId, RoundId};
use tokio::task::JoinHandle;
use tracing::debug;

pub type TimerKey = (RoomId, RoundId);

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerInner {
    timers: Mutex<HashMap<TimerKey, PendingTimer>>,
    next_generation: AtomicU64,
}

/// Registry of round timeout tasks, at most one per `(room, round)`.
///
/// Cancelling only saves work: a timeout task re-reads the room before it
/// acts, so a task that outlives its round exits without touching anything.
#[derive(Clone, Default)]
pub struct RoundScheduler {
    inner: Arc<SchedulerInner>,
}

impl RoundScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<TimerKey, PendingTimer>> {
        self.inner
            .timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn `task` under `key`, aborting whatever was armed there before.
    pub fn arm<F>(&self, key: TimerKey, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let registry = self.clone();

        // Held across the spawn so the task cannot deregister before it is registered
        let mut timers = self.timers();
        let handle = tokio::spawn(async move {
            task.await;
            registry.finish(key, generation);
        });

        if let Some(previous) = timers.insert(key, PendingTimer { generation, handle }) {
            previous.handle.abort();
            debug!("Replaced timer for room {} round {}", key.0, key.1);
        }
    }

    fn finish(&self, key: TimerKey, generation: u64) {
        let mut timers = self.timers();
        if timers.get(&key).is_some_and(|timer| timer.generation == generation) {
            timers.remove(&key);
        }
    }

    pub fn cancel(&self, key: TimerKey) -> bool {
        match self.timers().remove(&key) {
            Some(timer) => {
                timer.handle.abort();
                debug!("Cancelled timer for room {} round {}", key.0, key.1);
                true
            }
            None => false,
        }
    }

    pub fn cancel_room(&self, room_id: RoomId) -> usize {
        let mut timers = self.timers();
        let keys: Vec<TimerKey> = timers.keys().filter(|key| key.0 == room_id).copied().collect();
        for key in &keys {
            if let Some(timer) = timers.remove(key) {
                timer.handle.abort();
            }
        }
        keys.len()
    }

    pub fn cancel_all(&self) {
        for (_, timer) in self.timers().drain() {
            timer.handle.abort();
        }
    }

    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.timers().contains_key(&key)
    }

    pub fn pending(&self) -> usize {
        self.timers().len()
    }
}
