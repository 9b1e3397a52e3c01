//! Registry of in-flight operations
//!
//! [`OperationGroup`] tracks every operation between submission and
//! completion and exposes a `watch` channel carrying the "any operation
//! active" flag, so consumers (a UI busy indicator, a shutdown routine) can
//! await membership changes instead of polling.

use crate::engine::executor::OperationHandle;
use crate::types::OperationId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tracing::warn;

/// Concurrent registry of active operations.
#[derive(Debug)]
pub struct OperationGroup {
    entries: Mutex<HashMap<OperationId, OperationHandle>>,
    any_active_tx: watch::Sender<bool>,
}

impl Default for OperationGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        let (any_active_tx, _) = watch::channel(false);
        Self {
            entries: Mutex::new(HashMap::new()),
            any_active_tx,
        }
    }

    /// Register a handle under its operation's identity.
    ///
    /// An identity that is already registered keeps its existing handle.
    pub fn put(&self, handle: OperationHandle) {
        let mut entries = self.lock_entries();
        entries.entry(handle.id()).or_insert(handle);
        self.any_active_tx.send_replace(!entries.is_empty());
    }

    /// Remove and return the handle for `id`, if present.
    pub fn remove(&self, id: OperationId) -> Option<OperationHandle> {
        let mut entries = self.lock_entries();
        let removed = entries.remove(&id);
        self.any_active_tx.send_replace(!entries.is_empty());
        removed
    }

    /// Look up the handle for `id`.
    pub fn get(&self, id: OperationId) -> Option<OperationHandle> {
        self.lock_entries().get(&id).cloned()
    }

    /// Request cancellation of every registered operation.
    ///
    /// Entries stay registered until their workers acknowledge completion;
    /// removal happens through the normal completion path. Returns the
    /// number of operations whose cancellation had no effect because they
    /// had already finished.
    pub fn cancel_all(&self, may_interrupt: bool) -> usize {
        let handles: Vec<OperationHandle> = self.lock_entries().values().cloned().collect();

        let mut failures = 0;
        for handle in &handles {
            if !handle.cancel(may_interrupt) {
                failures += 1;
            }
        }
        if failures > 0 {
            warn!(failures, "some operations had already finished and could not be cancelled");
        }
        failures
    }

    /// Returns `true` when no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Watch channel carrying `true` while at least one operation is
    /// registered. Every put/remove publishes the current state.
    pub fn any_active(&self) -> watch::Receiver<bool> {
        self.any_active_tx.subscribe()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<OperationId, OperationHandle>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, CodecContext};
    use crate::descriptor::{ArchiveDescriptor, compression_descriptor};
    use crate::engine::executor::ExecutionService;
    use crate::error::Result;
    use crate::operation::OperationBuilder;
    use crate::types::{ArchiveKind, Event};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Codec that spins until its release flag is set or it is interrupted.
    struct GateCodec {
        release: Arc<AtomicBool>,
    }

    impl Codec for GateCodec {
        fn accepted_levels(&self) -> std::ops::RangeInclusive<i64> {
            0..=9
        }

        fn compress(&self, _: &ArchiveDescriptor, ctx: &CodecContext) -> Result<()> {
            loop {
                ctx.check_interrupted()?;
                if self.release.load(Ordering::Acquire) {
                    ctx.report_percent(100.0);
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(2));
            }
        }

        fn extract(&self, d: &ArchiveDescriptor, ctx: &CodecContext) -> Result<()> {
            self.compress(d, ctx)
        }
    }

    fn gated_handle(
        id: u64,
        executor: &ExecutionService,
        release: Arc<AtomicBool>,
    ) -> (OperationHandle, tokio::task::JoinHandle<bool>) {
        let codec = Arc::new(GateCodec { release });
        let descriptor = compression_descriptor(
            codec.as_ref(),
            ArchiveKind::Zip,
            &format!("op{id}"),
            6,
            vec![PathBuf::from("input.txt")],
            PathBuf::from("/out"),
        )
        .unwrap();
        let operation =
            Arc::new(OperationBuilder::new(id.into(), descriptor, codec).build());
        let (events, _) = tokio::sync::broadcast::channel::<Event>(16);
        executor.spawn(operation, events)
    }

    #[test]
    fn membership_drives_the_active_flag() {
        tokio_test::block_on(async {
            let group = OperationGroup::new();
            let watch = group.any_active();
            assert!(!*watch.borrow());
            assert!(group.is_empty());

            let executor = ExecutionService::new(2);
            let release = Arc::new(AtomicBool::new(true));
            let (handle, join) = gated_handle(1, &executor, release);

            group.put(handle);
            assert!(*watch.borrow());
            assert_eq!(group.len(), 1);
            assert!(group.get(OperationId(1)).is_some());

            group.remove(OperationId(1));
            assert!(!*watch.borrow());
            assert!(group.is_empty());
            join.await.unwrap();
        });
    }

    #[tokio::test]
    async fn cancel_all_counts_already_finished_operations() {
        let group = OperationGroup::new();
        let executor = ExecutionService::new(2);

        // One operation finishes immediately, one keeps running.
        let done_release = Arc::new(AtomicBool::new(true));
        let (done, done_join) = gated_handle(1, &executor, done_release);
        let running_release = Arc::new(AtomicBool::new(false));
        let (running, running_join) = gated_handle(2, &executor, running_release);

        assert!(done_join.await.unwrap(), "gated op should succeed");
        group.put(done);
        group.put(running);

        let failures = group.cancel_all(true);
        assert_eq!(failures, 1, "only the finished operation fails to cancel");

        assert!(!running_join.await.unwrap(), "interrupted op is unsuccessful");
    }

    #[tokio::test]
    async fn entries_survive_until_explicitly_removed() {
        let group = OperationGroup::new();
        let executor = ExecutionService::new(2);
        let release = Arc::new(AtomicBool::new(false));
        let (handle, join) = gated_handle(7, &executor, release);
        let id = handle.id();
        group.put(handle);

        // Cancellation alone must not shrink the group.
        group.cancel_all(true);
        assert_eq!(group.len(), 1);
        assert!(!join.await.unwrap());

        group.remove(id);
        assert!(group.is_empty());
    }
}
