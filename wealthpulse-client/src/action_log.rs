//! In-memory action log.
//!
//! A bounded, newest-first buffer of recent gateway events with pub/sub
//! delivery, consumed by operator-facing views ("System Logs", "Activity").
//! Nothing is persisted.
//!
//! ```
//! use wealthpulse_client::action_log::{ActionLog, LogKind};
//!
//! let log = ActionLog::new(2);
//! let _subscription = log.subscribe(|entries| println!("{} entries", entries.len()));
//!
//! log.info("first", None);
//! log.info("second", None);
//! log.error("third", None);
//!
//! let entries = log.entries();
//! assert_eq!(entries.len(), 2);
//! assert_eq!(entries[0].message, "third");
//! assert_eq!(entries[0].kind, LogKind::Error);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of entries kept in memory.
pub const DEFAULT_CAPACITY: usize = 100;

/// Severity of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Error,
    Warning,
    Info,
}

/// One immutable log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub kind: LogKind,
}

type Listener = Arc<dyn Fn(&[LogEntry]) + Send + Sync>;

struct Subscribers {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

struct Shared {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    subscribers: Mutex<Subscribers>,
}

/// Bounded ring buffer of recent events. Cloning shares the same buffer.
#[derive(Clone)]
pub struct ActionLog {
    shared: Arc<Shared>,
}

impl ActionLog {
    /// Create a log keeping at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                capacity,
                entries: Mutex::new(VecDeque::with_capacity(capacity)),
                subscribers: Mutex::new(Subscribers {
                    next_id: 0,
                    listeners: Vec::new(),
                }),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Prepend an entry, evicting the oldest beyond capacity, and notify
    /// subscribers.
    pub fn log(
        &self,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
        kind: LogKind,
    ) -> LogEntry {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            message: message.into(),
            details,
            kind,
        };

        let snapshot = {
            let mut entries = self.shared.entries.lock();
            entries.push_front(entry.clone());
            entries.truncate(self.shared.capacity);
            Vec::from(entries.clone())
        };

        self.notify(&snapshot);
        entry
    }

    pub fn error(&self, message: impl Into<String>, details: Option<serde_json::Value>) -> LogEntry {
        self.log(message, details, LogKind::Error)
    }

    pub fn warning(&self, message: impl Into<String>, details: Option<serde_json::Value>) -> LogEntry {
        self.log(message, details, LogKind::Warning)
    }

    pub fn info(&self, message: impl Into<String>, details: Option<serde_json::Value>) -> LogEntry {
        self.log(message, details, LogKind::Info)
    }

    /// Snapshot of the buffer, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        Vec::from(self.shared.entries.lock().clone())
    }

    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.lock().is_empty()
    }

    /// Drop every entry and notify subscribers with the empty buffer.
    pub fn clear(&self) {
        self.shared.entries.lock().clear();
        self.notify(&[]);
    }

    /// Register a listener. It receives the current buffer immediately and
    /// the full buffer after every change until the returned guard is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[LogEntry]) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = {
            let mut subscribers = self.shared.subscribers.lock();
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.listeners.push((id, listener.clone()));
            id
        };

        listener(&self.entries());

        Subscription {
            id,
            log: Arc::downgrade(&self.shared),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().listeners.len()
    }

    // Listeners run outside both locks so they may log or unsubscribe.
    fn notify(&self, snapshot: &[LogEntry]) {
        let listeners: Vec<Listener> = self
            .shared
            .subscribers
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for ActionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionLog")
            .field("capacity", &self.shared.capacity)
            .field("len", &self.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    log: Weak<Shared>,
}

impl Subscription {
    /// Unsubscribe now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.log.upgrade() {
            shared
                .subscribers
                .lock()
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_newest_entry_first() {
        let log = ActionLog::new(10);
        log.info("one", None);
        log.warning("two", None);

        let entries = log.entries();
        assert_eq!(entries[0].message, "two");
        assert_eq!(entries[0].kind, LogKind::Warning);
        assert_eq!(entries[1].message, "one");
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = ActionLog::new(3);
        for i in 0..4 {
            log.error(format!("entry {}", i), None);
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "entry 3");
        assert!(entries.iter().all(|e| e.message != "entry 0"));
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let log = ActionLog::new(0);
        log.info("a", None);
        log.info("b", None);
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.entries()[0].message, "b");
    }

    #[test]
    fn test_subscribe_delivers_snapshot_immediately() {
        let log = ActionLog::new(5);
        log.info("existing", None);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = log.subscribe(move |entries| {
            sink.lock()
                .push(entries.iter().map(|e| e.message.clone()).collect::<Vec<_>>());
        });

        log.error("new", None);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], vec!["existing"]);
        assert_eq!(seen[1], vec!["new", "existing"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let log = ActionLog::new(5);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let sub = log.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        log.info("a", None);
        sub.unsubscribe();
        log.info("b", None);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(log.subscriber_count(), 0);
    }

    #[test]
    fn test_listener_may_log_reentrantly() {
        let log = ActionLog::new(5);
        let inner = log.clone();
        let _sub = log.subscribe(move |entries| {
            if entries.first().is_some_and(|e| e.message == "trigger") {
                inner.info("echo", None);
            }
        });

        log.info("trigger", None);

        let messages: Vec<_> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["echo", "trigger"]);
    }

    #[test]
    fn test_clear_notifies_empty_buffer() {
        let log = ActionLog::new(5);
        log.info("a", None);

        let last_len = Arc::new(AtomicUsize::new(usize::MAX));
        let sink = last_len.clone();
        let _sub = log.subscribe(move |entries| sink.store(entries.len(), Ordering::SeqCst));

        log.clear();
        assert!(log.is_empty());
        assert_eq!(last_len.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_entries_serialize_kind_lowercase() {
        let log = ActionLog::new(1);
        let entry = log.warning("w", Some(serde_json::json!({ "status": 500 })));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], "warning");
        assert_eq!(value["details"]["status"], 500);
    }
}
