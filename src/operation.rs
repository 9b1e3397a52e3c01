//! Cancellable archive operations
//!
//! An [`ArchiveOperation`] binds one descriptor to one codec invocation. It
//! runs at most once, supports idempotent cooperative interruption, and fixes
//! its wall-clock duration exactly once when the codec returns. All failures
//! inside the codec are recovered into an unsuccessful boolean result; only
//! a repeated `execute` call surfaces as an error.

use crate::codec::{Codec, CodecContext, EntryFilter};
use crate::descriptor::ArchiveDescriptor;
use crate::error::{Error, Result};
use crate::progress::ProgressNotifier;
use crate::types::{CompressionMode, OperationId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One runnable compress/extract job.
///
/// Shared behind an `Arc` between the worker executing it and the handles
/// that may interrupt it or read its outcome.
pub struct ArchiveOperation {
    id: OperationId,
    descriptor: ArchiveDescriptor,
    codec: Arc<dyn Codec>,
    interrupt: Arc<AtomicBool>,
    notifier: ProgressNotifier,
    entry_filter: Option<EntryFilter>,
    copy_buffer_size: usize,
    started: AtomicBool,
    completed: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    /// Elapsed wall-clock time in nanoseconds; `0` means "not finished yet".
    elapsed_nanos: AtomicU64,
}

impl ArchiveOperation {
    /// This operation's identity.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// The descriptor this operation executes.
    pub fn descriptor(&self) -> &ArchiveDescriptor {
        &self.descriptor
    }

    /// The per-operation progress notifier.
    ///
    /// Observers attached here receive the codec's progress percentages.
    pub fn notifier(&self) -> &ProgressNotifier {
        &self.notifier
    }

    /// Request cooperative interruption. Idempotent; safe at any time,
    /// including before the operation starts or after it finished.
    ///
    /// Detaches progress observers and stops the clock right away; the
    /// codec notices the flag on its next chunk boundary.
    pub fn interrupt(&self) {
        if self.interrupt.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(id = %self.id, "interrupt requested");
        self.notifier.clear();
        let started_at = *self
            .started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(started_at) = started_at {
            self.record_elapsed(started_at.elapsed());
        }
    }

    /// Returns `true` if interruption has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Returns `true` once the operation has finished executing.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Wall-clock duration of the finished operation.
    ///
    /// `None` until the operation completes; afterwards the value never
    /// changes, no matter how often it is read.
    pub fn elapsed(&self) -> Option<Duration> {
        match self.elapsed_nanos.load(Ordering::Acquire) {
            0 => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    /// Wall-clock duration in seconds; `0.0` if the operation never ran.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }

    /// Run the codec for this operation's descriptor.
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` when the codec failed
    /// or was interrupted; both are terminal. Interruption is expected
    /// behavior and is not logged as a failure. Calling `execute` a second
    /// time fails with [`Error::OperationCompleted`].
    pub fn execute(&self) -> Result<bool> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::OperationCompleted);
        }

        info!(
            id = %self.id,
            archive = self.descriptor.archive_name(),
            mode = ?self.descriptor.mode(),
            "operation started"
        );

        let ctx = CodecContext::new(
            self.interrupt.clone(),
            self.notifier.clone(),
            self.entry_filter.clone(),
            self.copy_buffer_size,
        );
        let start = Instant::now();
        *self
            .started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(start);
        let outcome = match self.descriptor.mode() {
            CompressionMode::Compress => self.codec.compress(&self.descriptor, &ctx),
            CompressionMode::Extract => self.codec.extract(&self.descriptor, &ctx),
        };
        self.record_elapsed(start.elapsed());

        let success = match outcome {
            Ok(()) => {
                info!(id = %self.id, elapsed = ?self.elapsed(), "operation finished");
                true
            }
            Err(err) if err.is_interruption() || self.is_interrupted() => {
                // I/O errors raised while tearing down after an interrupt
                // request are part of normal cancellation.
                debug!(id = %self.id, "operation stopped after interrupt request");
                false
            }
            Err(err) => {
                warn!(id = %self.id, error = %err, "operation failed");
                false
            }
        };

        // Progress observers are scoped to the execution.
        self.notifier.clear();
        self.completed.store(true, Ordering::Release);
        Ok(success)
    }

    /// First writer wins; later completions of racing readers see the same
    /// value forever.
    fn record_elapsed(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos())
            .unwrap_or(u64::MAX)
            .max(1);
        let _ = self
            .elapsed_nanos
            .compare_exchange(0, nanos, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl std::fmt::Debug for ArchiveOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveOperation")
            .field("id", &self.id)
            .field("archive", &self.descriptor.archive_name())
            .field("mode", &self.descriptor.mode())
            .field("interrupted", &self.is_interrupted())
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Builder assembling an [`ArchiveOperation`] from its parts.
pub struct OperationBuilder {
    id: OperationId,
    descriptor: ArchiveDescriptor,
    codec: Arc<dyn Codec>,
    entry_filter: Option<EntryFilter>,
    copy_buffer_size: usize,
}

impl OperationBuilder {
    /// Start building an operation for `descriptor` executed by `codec`.
    pub fn new(id: OperationId, descriptor: ArchiveDescriptor, codec: Arc<dyn Codec>) -> Self {
        Self {
            id,
            descriptor,
            codec,
            entry_filter: None,
            copy_buffer_size: crate::config::Config::default().copy_buffer_size,
        }
    }

    /// Restrict archived entries to names matching `filter`.
    pub fn entry_filter(mut self, filter: Option<EntryFilter>) -> Self {
        self.entry_filter = filter;
        self
    }

    /// Override the copy-buffer size (which is also the interrupt-polling
    /// granularity).
    pub fn copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size;
        self
    }

    /// Finish building the operation.
    pub fn build(self) -> ArchiveOperation {
        ArchiveOperation {
            id: self.id,
            descriptor: self.descriptor,
            codec: self.codec,
            interrupt: Arc::new(AtomicBool::new(false)),
            notifier: ProgressNotifier::new(),
            entry_filter: self.entry_filter,
            copy_buffer_size: self.copy_buffer_size,
            started: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            started_at: Mutex::new(None),
            elapsed_nanos: AtomicU64::new(0),
        }
    }
}
