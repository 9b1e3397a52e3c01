//! Progress aggregation and observation
//!
//! [`ProgressAggregator`] merges per-operation progress values into one
//! overall fraction and implements the flood-avoidance protocol that keeps a
//! single-threaded consumer (typically a UI loop) from drowning in updates:
//! the current total lives in a single atomically-exchanged word that can
//! hold the [`SENTINEL`] marker meaning "no unconsumed refresh pending".
//!
//! A producer publishes a freshly computed total with
//! [`ProgressAggregator::get_and_set`]; only when the previous value was the
//! sentinel does it schedule one consumer-side refresh. The consumer fetches
//! the latest value by swapping the sentinel back in. However frequently
//! producers fire, at most one refresh is ever in flight — intermediate
//! values are coalesced, never queued.
//!
//! [`ProgressNotifier`] is the per-operation observer registry. Attaching an
//! observer returns a [`Subscription`] whose `Drop` detaches it, so a
//! forgotten detach cannot leak.

use crate::types::OperationId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Reserved marker meaning "no unconsumed refresh pending".
pub const SENTINEL: f64 = -1.0;

/// Merges progress events from concurrently running operations.
///
/// Each operation owns one cell keyed by its identity; the total is the
/// arithmetic mean of all known cells, normalized to `[0, 1]`. Every
/// operation weighs equally regardless of byte size.
#[derive(Debug)]
pub struct ProgressAggregator {
    /// Last-known percentage per operation, in `[0, 100]`.
    cells: Mutex<HashMap<OperationId, f64>>,
    /// Current total as f64 bits; may hold [`SENTINEL`].
    slot: AtomicU64,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    /// Create an aggregator with the slot initialized to [`SENTINEL`].
    pub fn new() -> Self {
        Self::with_initial(SENTINEL)
    }

    /// Create an aggregator with the slot initialized to `value`.
    pub fn with_initial(value: f64) -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
            slot: AtomicU64::new(value.to_bits()),
        }
    }

    /// Upsert the cell for `id` and return the recomputed total in `[0, 1]`.
    pub fn update(&self, id: OperationId, percent: f64) -> f64 {
        let mut cells = self.lock_cells();
        cells.insert(id, percent);
        let sum: f64 = cells.values().sum();
        (sum / cells.len() as f64) / 100.0
    }

    /// The current total in `[0, 1]` without modifying any cell.
    ///
    /// Returns `0.0` when no operation is known yet.
    pub fn total(&self) -> f64 {
        let cells = self.lock_cells();
        if cells.is_empty() {
            return 0.0;
        }
        let sum: f64 = cells.values().sum();
        (sum / cells.len() as f64) / 100.0
    }

    /// Atomically exchange the slot value, returning the previous one.
    pub fn get_and_set(&self, value: f64) -> f64 {
        let previous = self.slot.swap(value.to_bits(), Ordering::AcqRel);
        f64::from_bits(previous)
    }

    /// Remove the cell for `id`, e.g. after the operation was cancelled.
    pub fn remove(&self, id: OperationId) {
        self.lock_cells().remove(&id);
    }

    /// Number of operations currently known to the aggregator.
    pub fn known_operations(&self) -> usize {
        self.lock_cells().len()
    }

    /// Remove all cells. The slot is left untouched.
    pub fn reset(&self) {
        self.lock_cells().clear();
    }

    fn lock_cells(&self) -> std::sync::MutexGuard<'_, HashMap<OperationId, f64>> {
        // A panicked worker must not wedge the whole aggregator.
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Boxed progress observer; receives percentages in `[0, 100]`.
pub type ProgressObserver = Box<dyn Fn(f64) + Send + Sync>;

type ObserverMap = Mutex<HashMap<u64, ProgressObserver>>;

/// Per-operation progress emitter with scoped observer registration.
///
/// Cloning shares the underlying registry; observers attached through any
/// clone receive every notification.
#[derive(Clone, Default)]
pub struct ProgressNotifier {
    observers: Arc<ObserverMap>,
    next_key: Arc<AtomicU64>,
}

impl ProgressNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer; dropping the returned [`Subscription`] detaches it.
    ///
    /// Observers must not attach or detach from within their own callback.
    pub fn attach(&self, observer: ProgressObserver) -> Subscription {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.lock_observers().insert(key, observer);
        Subscription {
            key,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// Notify all attached observers of a new percentage.
    pub fn notify(&self, percent: f64) {
        let observers = self.lock_observers();
        for observer in observers.values() {
            observer(percent);
        }
    }

    /// Detach every observer, regardless of outstanding subscriptions.
    pub fn clear(&self) {
        self.lock_observers().clear();
    }

    /// Number of currently attached observers.
    pub fn observer_count(&self) -> usize {
        self.lock_observers().len()
    }

    fn lock_observers(&self) -> std::sync::MutexGuard<'_, HashMap<u64, ProgressObserver>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProgressNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressNotifier")
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Handle for one attached observer; detaches on drop.
#[must_use = "dropping the subscription detaches the observer"]
pub struct Subscription {
    key: u64,
    observers: Weak<ObserverMap>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.key);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}
