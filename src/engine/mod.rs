//! Engine facade tying descriptors, codecs, workers, and progress together
//!
//! [`ArchiveEngine`] is the single entry point: it resolves descriptors,
//! submits operations to the bounded worker pool, tracks them in the
//! operation group, merges their progress, and broadcasts lifecycle events.
//! Cloning the engine is cheap; all clones share the same state.

mod background;
mod executor;
mod group;

pub use executor::{ExecutionService, OperationHandle};
pub use group::OperationGroup;

use crate::codec::{Codec, EntryFilter, ZipCodec};
use crate::config::Config;
use crate::descriptor::{self, ArchiveDescriptor};
use crate::error::{Error, Result};
use crate::operation::OperationBuilder;
use crate::progress::{ProgressAggregator, ProgressObserver, SENTINEL};
use crate::types::{ArchiveKind, Event, OperationId};
use background::{ProgressPumpParams, spawn_progress_pump};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Per-submission options beyond what the descriptor carries.
#[derive(Default)]
pub struct SubmitOptions {
    /// Restrict archived entries to names matching this filter
    pub entry_filter: Option<EntryFilter>,
    /// Additional observer for this operation's raw progress percentages,
    /// detached automatically when the operation settles
    pub progress_observer: Option<ProgressObserver>,
}

/// Concurrent archive-operation orchestrator.
///
/// Must be constructed inside a tokio runtime; the engine spawns its
/// progress pump on creation.
#[derive(Clone)]
pub struct ArchiveEngine {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    codecs: HashMap<ArchiveKind, Arc<dyn Codec>>,
    group: OperationGroup,
    executor: ExecutionService,
    aggregator: Arc<ProgressAggregator>,
    refresh_tx: mpsc::Sender<()>,
    event_tx: broadcast::Sender<Event>,
    overall_tx: watch::Sender<f64>,
    next_id: AtomicU64,
    cancel_token: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ArchiveEngine {
    /// Create an engine with the built-in codecs (currently ZIP).
    pub fn new(config: Config) -> Result<Self> {
        let mut codecs: HashMap<ArchiveKind, Arc<dyn Codec>> = HashMap::new();
        codecs.insert(ArchiveKind::Zip, Arc::new(ZipCodec));
        Self::with_codecs(config, codecs)
    }

    /// Create an engine with an explicit codec registry.
    pub fn with_codecs(
        config: Config,
        codecs: HashMap<ArchiveKind, Arc<dyn Codec>>,
    ) -> Result<Self> {
        config.validate()?;

        let aggregator = Arc::new(ProgressAggregator::new());
        // Capacity 1 would suffice under the at-most-one-refresh protocol;
        // a little headroom absorbs the publish done on completion.
        let (refresh_tx, refresh_rx) = mpsc::channel(8);
        let (event_tx, _) = broadcast::channel(config.event_buffer);
        let (overall_tx, _) = watch::channel(0.0);
        let cancel_token = CancellationToken::new();

        let pump = spawn_progress_pump(ProgressPumpParams {
            aggregator: aggregator.clone(),
            refresh_rx,
            event_tx: event_tx.clone(),
            overall_tx: overall_tx.clone(),
            cancel_token: cancel_token.clone(),
        });

        info!(
            workers = config.max_concurrent_operations,
            "archive engine started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                executor: ExecutionService::new(config.max_concurrent_operations),
                config,
                codecs,
                group: OperationGroup::new(),
                aggregator,
                refresh_tx,
                event_tx,
                overall_tx,
                next_id: AtomicU64::new(1),
                cancel_token,
                pump: Mutex::new(Some(pump)),
            }),
        })
    }

    /// Build a descriptor for one compression job.
    ///
    /// `level` falls back to the configured default when `None`.
    pub fn describe_compression(
        &self,
        kind: ArchiveKind,
        archive_name: &str,
        level: Option<i64>,
        inputs: Vec<PathBuf>,
        output_dir: PathBuf,
    ) -> Result<ArchiveDescriptor> {
        let codec = self.codec_for(kind)?;
        let level = level.unwrap_or(self.inner.config.default_compression_level);
        descriptor::compression_descriptor(
            codec.as_ref(),
            kind,
            archive_name,
            level,
            inputs,
            output_dir,
        )
    }

    /// Build one descriptor per input, each with a collision-free name.
    pub fn describe_compressions(
        &self,
        kind: ArchiveKind,
        base_name: &str,
        level: Option<i64>,
        inputs: Vec<PathBuf>,
        output_dir: PathBuf,
    ) -> Result<Vec<ArchiveDescriptor>> {
        let codec = self.codec_for(kind)?;
        let level = level.unwrap_or(self.inner.config.default_compression_level);
        descriptor::compression_descriptors(
            codec.as_ref(),
            kind,
            base_name,
            level,
            inputs,
            output_dir,
        )
    }

    /// Build a descriptor for one extraction job.
    pub fn describe_extraction(
        &self,
        kind: ArchiveKind,
        archive: PathBuf,
        output_dir: PathBuf,
    ) -> Result<ArchiveDescriptor> {
        self.codec_for(kind)?;
        descriptor::extraction_descriptor(kind, archive, output_dir)
    }

    /// Submit a descriptor for execution with default options.
    pub fn submit(&self, descriptor: ArchiveDescriptor) -> Result<OperationHandle> {
        self.submit_with(descriptor, SubmitOptions::default())
    }

    /// Submit a descriptor for execution.
    ///
    /// The operation is registered, queued on the worker pool, and tracked
    /// until completion. Emits [`Event::Submitted`] immediately and
    /// [`Event::Started`] / [`Event::Completed`] as the lifecycle advances.
    pub fn submit_with(
        &self,
        descriptor: ArchiveDescriptor,
        options: SubmitOptions,
    ) -> Result<OperationHandle> {
        let codec = self.codec_for(descriptor.kind())?;
        let id = OperationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let name = descriptor.archive_name().to_string();

        let operation = Arc::new(
            OperationBuilder::new(id, descriptor, codec)
                .entry_filter(options.entry_filter)
                .copy_buffer_size(self.inner.config.copy_buffer_size)
                .build(),
        );

        let user_subscription = options
            .progress_observer
            .map(|observer| operation.notifier().attach(observer));

        // Register the cell up front so queued operations weigh into the
        // overall mean from the moment they are submitted.
        self.inner.aggregator.update(id, 0.0);

        let subscription = {
            let aggregator = self.inner.aggregator.clone();
            let refresh_tx = self.inner.refresh_tx.clone();
            operation.notifier().attach(Box::new(move |percent| {
                let total = aggregator.update(id, percent);
                if aggregator.get_and_set(total) == SENTINEL {
                    // Full only means a refresh is already on its way; the
                    // slot holds the latest total either way.
                    let _ = refresh_tx.try_send(());
                }
            }))
        };

        let _ = self.inner.event_tx.send(Event::Submitted { id, name });

        let (handle, join) = self.inner.executor.spawn(operation.clone(), self.inner.event_tx.clone());
        self.inner.group.put(handle.clone());

        // Watcher: settle the aggregator, unregister, and announce completion.
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let success = match join.await {
                Ok(success) => success,
                Err(err) => {
                    tracing::warn!(%id, error = %err, "worker task vanished");
                    false
                }
            };

            if !success && (operation.is_interrupted() || !operation.is_completed()) {
                // Cancelled or never-ran operations drop out of the mean so
                // the survivors' total is not dragged down forever.
                inner.aggregator.remove(id);
            }
            let total = inner.aggregator.total();
            if inner.aggregator.get_and_set(total) == SENTINEL {
                let _ = inner.refresh_tx.try_send(());
            }

            inner.group.remove(id);
            drop(subscription);
            drop(user_subscription);

            let elapsed_seconds = operation.elapsed_seconds();
            debug!(%id, success, elapsed_seconds, "operation settled");
            let _ = inner.event_tx.send(Event::Completed {
                id,
                success,
                elapsed_seconds,
            });
        });

        Ok(handle)
    }

    /// Request cancellation of one operation.
    ///
    /// Returns `false` if the operation is unknown or already finished.
    pub fn cancel(&self, id: OperationId, may_interrupt: bool) -> bool {
        self.inner
            .group
            .get(id)
            .map(|handle| handle.cancel(may_interrupt))
            .unwrap_or(false)
    }

    /// Request cancellation of every active operation.
    ///
    /// Returns the number of operations that had already finished and could
    /// not be cancelled.
    pub fn cancel_all(&self, may_interrupt: bool) -> usize {
        self.inner.group.cancel_all(may_interrupt)
    }

    /// Returns `true` when no operation is active.
    pub fn is_idle(&self) -> bool {
        self.inner.group.is_empty()
    }

    /// Number of active (queued or running) operations.
    pub fn active_count(&self) -> usize {
        self.inner.group.len()
    }

    /// Watch channel carrying `true` while any operation is active.
    pub fn any_active(&self) -> watch::Receiver<bool> {
        self.inner.group.any_active()
    }

    /// Subscribe to lifecycle and progress events.
    ///
    /// Every subscriber receives all events independently; slow subscribers
    /// may lag and skip ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.event_tx.subscribe()
    }

    /// Latest published overall progress, in `[0, 1]`.
    pub fn overall_progress(&self) -> f64 {
        *self.inner.overall_tx.borrow()
    }

    /// Watch channel carrying the overall progress, in `[0, 1]`.
    pub fn watch_overall(&self) -> watch::Receiver<f64> {
        self.inner.overall_tx.subscribe()
    }

    /// Forget all per-operation progress and restart the overall value at 0.
    ///
    /// Meant for the idle engine, e.g. between batches; progress of still
    /// active operations re-registers on their next report.
    pub fn reset_progress(&self) {
        self.inner.aggregator.reset();
        self.inner.aggregator.get_and_set(SENTINEL);
        self.inner.overall_tx.send_replace(0.0);
    }

    /// Wait until no operation is active.
    pub async fn wait_idle(&self) {
        let mut active = self.inner.group.any_active();
        while *active.borrow_and_update() {
            if active.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stop the engine: interrupt everything, wait for workers to settle,
    /// and tear down the progress pump.
    pub async fn shutdown(&self) {
        info!("archive engine shutting down");
        self.inner.group.cancel_all(true);
        self.inner.executor.close();
        self.wait_idle().await;

        self.inner.cancel_token.cancel();
        let pump = {
            let mut slot = self
                .inner
                .pump
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.take()
        };
        if let Some(pump) = pump {
            let _ = pump.await;
        }
    }

    fn codec_for(&self, kind: ArchiveKind) -> Result<Arc<dyn Codec>> {
        self.inner
            .codecs
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::UnknownCodec {
                kind: kind.to_string(),
            })
    }
}

impl std::fmt::Debug for ArchiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveEngine")
            .field("active", &self.active_count())
            .field("overall", &self.overall_progress())
            .finish()
    }
}
