use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::JournalError;

pub type SubscriptionId = u64;

/// Called with `(key, new_value)` after a successful write.
pub type Listener = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Where settings and trades live between sessions. The engine never talks to
/// a store; the command layer loads plain data from it and writes results back.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, JournalError>;

    fn set(&self, key: &str, value: &str) -> Result<(), JournalError>;

    fn subscribe(&self, key: &str, listener: Listener) -> SubscriptionId;

    /// Returns false when the id was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Subscriber registry shared by the store implementations.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(SubscriptionId, String, Listener)>>,
}

impl Listeners {
    /// Poisoning is ignored; entries are plain data.
    fn entries(&self) -> MutexGuard<'_, Vec<(SubscriptionId, String, Listener)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, key: &str, listener: Listener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries().push((id, key.to_string(), listener));
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(entry_id, _, _)| *entry_id != id);
        entries.len() != before
    }

    /// Listeners run outside the registry lock so they may subscribe or
    /// unsubscribe themselves.
    pub fn notify(&self, key: &str, value: &str) {
        let matching: Vec<Listener> = self
            .entries()
            .iter()
            .filter(|(_, entry_key, _)| entry_key == key)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in matching {
            listener(key, value);
        }
    }
}

/// In-process store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    listeners: Listeners,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, JournalError> {
        let values = self
            .values
            .lock()
            .map_err(|e| JournalError::StorageError(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), JournalError> {
        {
            let mut values = self
                .values
                .lock()
                .map_err(|e| JournalError::StorageError(e.to_string()))?;
            values.insert(key.to_string(), value.to_string());
        }
        self.listeners.notify(key, value);
        Ok(())
    }

    fn subscribe(&self, key: &str, listener: Listener) -> SubscriptionId {
        self.listeners.add(key, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }
}
