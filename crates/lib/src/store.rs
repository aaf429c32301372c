//! Proxy-granting ticket correlation store.
//!
//! The authority delivers a PGT to this client twice, over two unrelated
//! network paths: the validation response carries only an IOU, while the
//! real `(pgtIou, pgtId)` pair arrives through the proxy callback. Either may
//! land first. The store bridges the two: [`CorrelationStore::put`] records a
//! callback delivery, [`CorrelationStore::resolve`] waits (bounded) for the
//! IOU it was given.
//!
//! Entries are single-use. A resolved entry is gone; an entry nobody asks
//! for is purged once it is older than the configured ceiling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::DEFAULT_MAX_ENTRY_AGE;
use crate::{Error, Result, ticket_hint};

/// A delivered but not yet resolved proxy-granting ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationEntry {
    pub iou: String,
    pub ticket_id: String,
    /// Milliseconds since Unix epoch, per the store's clock.
    pub received_at: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CorrelationEntry>,
    /// Resolvers currently waiting, keyed by IOU. Each waiter has an id so a
    /// finished or cancelled resolver removes exactly its own registration.
    waiters: HashMap<String, Vec<(u64, oneshot::Sender<String>)>>,
    next_waiter: u64,
}

/// In-memory map from PGT-IOU to PGT with bounded waiting.
#[derive(Debug)]
pub struct CorrelationStore {
    inner: Mutex<Inner>,
    max_entry_age: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRY_AGE)
    }
}

impl CorrelationStore {
    /// Create an empty store that purges entries older than `max_entry_age`.
    pub fn new(max_entry_age: Duration) -> Self {
        Self::with_clock(max_entry_age, Arc::new(SystemClock))
    }

    /// Create an empty store aging entries against `clock`.
    pub fn with_clock(max_entry_age: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entry_age,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Nothing in the critical sections can leave the maps half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a PGT delivered by the authority's callback.
    ///
    /// If a resolver is already waiting for `iou` the ticket is handed to it
    /// directly and never stored. A second delivery for a stored IOU replaces
    /// the first.
    pub fn put(&self, iou: &str, ticket_id: &str) {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        self.sweep_locked(&mut inner, now);

        let mut ticket = ticket_id.to_string();
        if let Some(mut waiters) = inner.waiters.remove(iou) {
            while !waiters.is_empty() {
                let (_, sender) = waiters.remove(0);
                match sender.send(ticket) {
                    Ok(()) => {
                        if !waiters.is_empty() {
                            inner.waiters.insert(iou.to_string(), waiters);
                        }
                        tracing::debug!(iou = %ticket_hint(iou), "Handed PGT to waiting resolver");
                        return;
                    }
                    // Receiver gave up; try the next one.
                    Err(returned) => ticket = returned,
                }
            }
        }

        let entry = CorrelationEntry {
            iou: iou.to_string(),
            ticket_id: ticket,
            received_at: now,
        };
        if inner.entries.insert(iou.to_string(), entry).is_some() {
            tracing::warn!(
                iou = %ticket_hint(iou),
                "PGT-IOU delivered twice before resolution; keeping the newer ticket"
            );
        } else {
            tracing::debug!(iou = %ticket_hint(iou), "Stored PGT for later resolution");
        }
    }

    /// Resolve an IOU to its PGT, waiting up to `wait_budget` for the callback.
    ///
    /// On success the entry is removed, so each delivery resolves at most once.
    /// Returns [`Error::CorrelationTimeout`] when nothing arrives in time.
    pub async fn resolve(&self, iou: &str, wait_budget: Duration) -> Result<String> {
        let (registration, mut receiver) = {
            let mut inner = self.lock();
            if let Some(entry) = inner.entries.remove(iou) {
                return Ok(entry.ticket_id);
            }
            if wait_budget.is_zero() {
                return Err(timeout_error(iou, wait_budget));
            }
            let (sender, receiver) = oneshot::channel();
            let id = inner.next_waiter;
            inner.next_waiter += 1;
            inner
                .waiters
                .entry(iou.to_string())
                .or_default()
                .push((id, sender));
            (
                WaiterRegistration {
                    store: self,
                    iou,
                    id,
                },
                receiver,
            )
        };

        if let Ok(Ok(ticket)) = tokio::time::timeout(wait_budget, &mut receiver).await {
            return Ok(ticket);
        }

        // Deregister, then pick up a ticket that may have been sent between the
        // timer firing and the lock being taken.
        drop(registration);
        match receiver.try_recv() {
            Ok(ticket) => Ok(ticket),
            Err(_) => Err(timeout_error(iou, wait_budget)),
        }
    }

    fn deregister(&self, iou: &str, waiter_id: u64) {
        let mut inner = self.lock();
        let drained = inner.waiters.get_mut(iou).is_some_and(|waiters| {
            waiters.retain(|(id, _)| *id != waiter_id);
            waiters.is_empty()
        });
        if drained {
            inner.waiters.remove(iou);
        }
    }

    /// Purge entries older than the configured ceiling.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        self.sweep_locked(&mut inner, now)
    }

    fn sweep_locked(&self, inner: &mut Inner, now: u64) -> usize {
        let max_age = self.max_entry_age.as_millis() as u64;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| now.saturating_sub(entry.received_at) < max_age);
        let purged = before - inner.entries.len();
        if purged > 0 {
            tracing::debug!(purged, "Purged unclaimed PGT correlation entries");
        }
        purged
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.sweep();
            }
        })
    }

    /// Whether an unresolved entry exists for `iou`.
    pub fn contains(&self, iou: &str) -> bool {
        self.lock().entries.contains_key(iou)
    }

    /// The unresolved entry for `iou`, without consuming it.
    pub fn peek(&self, iou: &str) -> Option<CorrelationEntry> {
        self.lock().entries.get(iou).cloned()
    }

    /// Number of unresolved entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Number of resolvers currently waiting.
    pub fn pending_resolvers(&self) -> usize {
        self.lock().waiters.values().map(Vec::len).sum()
    }
}

/// A resolver's slot in the waiter table, released when the resolve ends,
/// including when its future is dropped mid-wait.
struct WaiterRegistration<'a> {
    store: &'a CorrelationStore,
    iou: &'a str,
    id: u64,
}

impl Drop for WaiterRegistration<'_> {
    fn drop(&mut self) {
        self.store.deregister(self.iou, self.id);
    }
}

fn timeout_error(iou: &str, waited: Duration) -> Error {
    Error::CorrelationTimeout {
        iou_hint: ticket_hint(iou),
        waited_ms: waited.as_millis() as u64,
    }
}
