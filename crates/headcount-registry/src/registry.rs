//! Token count store and change fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::subscription::{CountUpdate, SubscriberId, Subscription};

/// One tracked token.
struct Entry {
    users: u64,
    changed_at: Instant,
    subscribers: HashMap<SubscriberId, mpsc::UnboundedSender<CountUpdate>>,
}

impl Entry {
    fn new() -> Self {
        Self {
            users: 0,
            changed_at: Instant::now(),
            subscribers: HashMap::new(),
        }
    }

    /// Deliver the current count to every live subscriber of `token`.
    ///
    /// Subscribers whose receiver is gone are dropped here.
    fn publish(&mut self, token: &str) -> u64 {
        self.changed_at = Instant::now();
        let users = self.users;
        debug!("{token} has {users} realtime users");
        self.subscribers.retain(|_, tx| {
            tx.send(CountUpdate {
                token: token.to_owned(),
                users,
            })
            .is_ok()
        });
        users
    }

    fn is_idle(&self, max_idle: Duration) -> bool {
        self.users == 0 && self.subscribers.is_empty() && self.changed_at.elapsed() >= max_idle
    }
}

/// Shared token → count map with per-token subscriptions.
///
/// Construct one per process and hand it to every session behind an `Arc`.
pub struct Registry {
    entries: Mutex<HashMap<String, Entry>>,
    next_subscriber: AtomicU64,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(0),
        }
    }

    /// Add one to the count for `token`, creating it at 1 if absent.
    ///
    /// Returns the new count after publishing it.
    pub fn increment(&self, token: &str) -> u64 {
        let mut entries = self.entries.lock();
        let entry = entries.entry(token.to_owned()).or_insert_with(Entry::new);
        entry.users += 1;
        entry.publish(token)
    }

    /// Subtract one from the count for `token`, clamping at zero.
    ///
    /// An unknown token is created at 0. The change is published either way.
    pub fn decrement(&self, token: &str) -> u64 {
        let mut entries = self.entries.lock();
        let entry = entries.entry(token.to_owned()).or_insert_with(Entry::new);
        entry.users = entry.users.saturating_sub(1);
        entry.publish(token)
    }

    /// Current count for `token` (0 if never seen).
    pub fn get(&self, token: &str) -> u64 {
        self.entries.lock().get(token).map_or(0, |e| e.users)
    }

    /// Start receiving count changes for `token`.
    ///
    /// The current count is queued as the first update under the same lock
    /// that registers the subscriber, so no change can slip in between.
    pub fn subscribe(&self, token: &str) -> Subscription {
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        let mut entries = self.entries.lock();
        let entry = entries.entry(token.to_owned()).or_insert_with(Entry::new);
        let _ = tx.send(CountUpdate {
            token: token.to_owned(),
            users: entry.users,
        });
        let _ = entry.subscribers.insert(id, tx);
        debug!(token, subscriber = %id, "subscribed");

        Subscription {
            id,
            token: token.to_owned(),
            rx,
        }
    }

    /// Stop delivering updates to `subscription`.
    ///
    /// Returns `false` if it was already removed.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut entries = self.entries.lock();
        let removed = entries
            .get_mut(&subscription.token)
            .and_then(|e| e.subscribers.remove(&subscription.id))
            .is_some();
        if removed {
            debug!(token = %subscription.token, subscriber = %subscription.id, "unsubscribed");
        }
        removed
    }

    /// Drop zero-count entries with no subscribers that have not changed
    /// for at least `max_idle`. Returns how many were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.subscribers.retain(|_, tx| !tx.is_closed());
            !entry.is_idle(max_idle)
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "evicted idle tokens");
        }
        evicted
    }

    /// Number of tokens currently tracked.
    pub fn token_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Number of live subscriptions across all tokens.
    pub fn subscriber_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .map(|e| e.subscribers.len())
            .sum()
    }

    /// Sum of all counts.
    pub fn total_users(&self) -> u64 {
        self.entries.lock().values().map(|e| e.users).sum()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
