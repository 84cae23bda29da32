//! Reminder scheduler state: who gets reminders and what was already sent.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors reading or writing the subscriber file.
#[derive(Debug, Error)]
pub enum SubscriberStoreError {
    #[error("failed to access subscriber file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid subscriber file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Subscriber sets as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSubscribers {
    /// Chats that receive reminders.
    #[serde(default)]
    pub subscribed: BTreeSet<i64>,
    /// Chats that sent `/baja` and must not be re-registered implicitly.
    #[serde(default)]
    pub opted_out: BTreeSet<i64>,
}

impl PersistedSubscribers {
    /// Loads the sets from a JSON file. A missing file yields empty sets.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SubscriberStoreError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Saves the sets to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SubscriberStoreError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Backing file of a registry, written from the blocking pool.
#[derive(Debug)]
struct SubscriberFile {
    path: PathBuf,
    /// Version of the last snapshot written, so an older one never overwrites a newer one.
    written: Mutex<u64>,
}

impl SubscriberFile {
    fn write(&self, version: u64, sets: &PersistedSubscribers) {
        let mut written = self.written.lock();
        if version <= *written {
            return;
        }
        match sets.save(&self.path) {
            Ok(()) => *written = version,
            Err(e) => warn!("Failed to save subscribers to {}: {}", self.path.display(), e),
        }
    }
}

#[derive(Debug, Default)]
struct Versioned {
    version: u64,
    sets: PersistedSubscribers,
}

/// Chats registered for proactive reminders.
///
/// Every change is written through to the backing file, when there is one.
/// Inside a tokio runtime the write runs on the blocking pool, after the
/// in-memory lock is released. A failed write is logged and the in-memory
/// state stays authoritative.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    file: Option<Arc<SubscriberFile>>,
    state: Mutex<Versioned>,
}

impl SubscriberRegistry {
    /// A registry that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the registry backed by `path`.
    ///
    /// An unreadable or corrupt file is logged and replaced by an empty
    /// registry on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sets = PersistedSubscribers::load(&path).unwrap_or_else(|e| {
            warn!("Starting with no subscribers, could not load {}: {}", path.display(), e);
            PersistedSubscribers::default()
        });
        debug!(
            "Loaded {} subscribers ({} opted out) from {}",
            sets.subscribed.len(),
            sets.opted_out.len(),
            path.display()
        );
        Self {
            file: Some(Arc::new(SubscriberFile {
                path,
                written: Mutex::new(0),
            })),
            state: Mutex::new(Versioned { version: 0, sets }),
        }
    }

    /// Applies `change`; when it reports a modification the new sets are persisted.
    fn update<T>(&self, change: impl FnOnce(&mut PersistedSubscribers) -> (bool, T)) -> T {
        let (version, sets, result) = {
            let mut state = self.state.lock();
            let (modified, result) = change(&mut state.sets);
            if !modified {
                return result;
            }
            state.version += 1;
            (state.version, state.sets.clone(), result)
        };
        self.persist(version, sets);
        result
    }

    fn persist(&self, version: u64, sets: PersistedSubscribers) {
        let Some(file) = &self.file else {
            return;
        };
        let file = Arc::clone(file);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => drop(runtime.spawn_blocking(move || file.write(version, &sets))),
            Err(_) => file.write(version, &sets),
        }
    }

    /// Registers a chat seen interacting with the bot, unless it opted out.
    ///
    /// Returns `true` when the chat was newly added.
    pub fn register(&self, chat_id: i64) -> bool {
        self.update(|sets| {
            let added = !sets.opted_out.contains(&chat_id) && sets.subscribed.insert(chat_id);
            (added, added)
        })
    }

    /// Explicit subscription; clears a previous opt-out.
    ///
    /// Returns `true` when the chat was not subscribed before.
    pub fn subscribe(&self, chat_id: i64) -> bool {
        self.update(|sets| {
            let cleared = sets.opted_out.remove(&chat_id);
            let added = sets.subscribed.insert(chat_id);
            (cleared || added, added)
        })
    }

    /// Opts a chat out of reminders.
    ///
    /// Returns `true` when the chat was subscribed.
    pub fn unsubscribe(&self, chat_id: i64) -> bool {
        self.update(|sets| {
            let removed = sets.subscribed.remove(&chat_id);
            let marked = sets.opted_out.insert(chat_id);
            (removed || marked, removed)
        })
    }

    #[must_use]
    pub fn is_subscribed(&self, chat_id: i64) -> bool {
        self.state.lock().sets.subscribed.contains(&chat_id)
    }

    /// Current subscribers, in ascending chat id order.
    #[must_use]
    pub fn subscribers(&self) -> Vec<i64> {
        self.state.lock().sets.subscribed.iter().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().sets.subscribed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Last day each item was sent to each subscriber.
///
/// Lives in memory only; after a restart an item may be sent once more
/// on the same day.
#[derive(Debug, Default)]
pub struct NotificationLedger {
    sent: HashMap<(String, i64), NaiveDate>,
}

impl NotificationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn was_notified(&self, item_key: &str, chat_id: i64, day: NaiveDate) -> bool {
        self.sent
            .get(&(item_key.to_owned(), chat_id))
            .is_some_and(|last| *last == day)
    }

    pub fn mark(&mut self, item_key: &str, chat_id: i64, day: NaiveDate) {
        self.sent.insert((item_key.to_owned(), chat_id), day);
    }

    /// Forgets entries recorded before `day`.
    pub fn prune_before(&mut self, day: NaiveDate) {
        self.sent.retain(|_, last| *last >= day);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_register_respects_opt_out() {
        let registry = SubscriberRegistry::in_memory();
        assert!(registry.register(10));
        assert!(!registry.register(10));

        assert!(registry.unsubscribe(10));
        assert!(!registry.register(10));
        assert!(!registry.is_subscribed(10));

        assert!(registry.subscribe(10));
        assert!(registry.is_subscribed(10));
    }

    #[test]
    fn test_unsubscribe_unknown_chat() {
        let registry = SubscriberRegistry::in_memory();
        assert!(!registry.unsubscribe(5));
        assert!(!registry.register(5));
    }

    #[test]
    fn test_unsubscribe_is_explicit_and_sticky() {
        let registry = SubscriberRegistry::in_memory();
        registry.register(7);
        assert!(registry.unsubscribe(7));
        assert!(registry.is_empty());
        assert!(!registry.register(7));
    }

    #[test]
    fn test_registry_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscribers.json");

        let registry = SubscriberRegistry::open(&path);
        registry.register(1);
        registry.register(-1002);
        registry.unsubscribe(1);
        drop(registry);

        let reopened = SubscriberRegistry::open(&path);
        assert_eq!(reopened.subscribers(), vec![-1002]);
        assert!(!reopened.register(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writes_from_runtime_land_in_latest_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscribers.json");

        let registry = SubscriberRegistry::open(&path);
        for chat in 1..=20 {
            registry.register(chat);
        }
        registry.unsubscribe(5);
        let expected = PersistedSubscribers {
            subscribed: (1..=20).filter(|c| *c != 5).collect(),
            opted_out: BTreeSet::from([5]),
        };

        let mut on_disk = PersistedSubscribers::default();
        for _ in 0..200 {
            on_disk = PersistedSubscribers::load(&path).unwrap_or_default();
            if on_disk == expected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(on_disk, expected);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = PersistedSubscribers::load(dir.path().join("none.json")).unwrap();
        assert_eq!(loaded, PersistedSubscribers::default());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscribers.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            PersistedSubscribers::load(&path),
            Err(SubscriberStoreError::Json(_))
        ));
        let registry = SubscriberRegistry::open(&path);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ledger_once_per_day() {
        let mut ledger = NotificationLedger::new();
        assert!(!ledger.was_notified("pago:1", 1, day(1)));

        ledger.mark("pago:1", 1, day(1));
        assert!(ledger.was_notified("pago:1", 1, day(1)));
        assert!(!ledger.was_notified("pago:1", 2, day(1)));
        assert!(!ledger.was_notified("pago:1", 1, day(2)));
    }

    #[test]
    fn test_ledger_prune() {
        let mut ledger = NotificationLedger::new();
        ledger.mark("a", 1, day(1));
        ledger.mark("b", 1, day(2));
        ledger.prune_before(day(2));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.was_notified("b", 1, day(2)));
    }
}
