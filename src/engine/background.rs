//! Background progress pump
//!
//! Consumer side of the flood-avoidance protocol: producers (codec observer
//! callbacks on blocking threads) publish totals into the aggregator slot and
//! send at most one refresh signal while the slot holds a value. The pump
//! drains the slot, coalescing however many intermediate totals were written
//! in between, and forwards the value to subscribers.

use crate::progress::{ProgressAggregator, SENTINEL};
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Everything the progress pump task needs.
pub(crate) struct ProgressPumpParams {
    /// Shared aggregator whose slot is drained on each refresh
    pub aggregator: Arc<ProgressAggregator>,
    /// Refresh signals from producer-side observers
    pub refresh_rx: mpsc::Receiver<()>,
    /// Event broadcast sender
    pub event_tx: broadcast::Sender<Event>,
    /// Latest overall progress, in `[0, 1]`
    pub overall_tx: watch::Sender<f64>,
    /// Shutdown signal
    pub cancel_token: CancellationToken,
}

/// Spawn the task that turns refresh signals into overall-progress updates.
///
/// Forwarded values never regress: a total that is lower than the last
/// published one (because a fresh operation joined the mean) is dropped.
/// Resetting the published value is the engine's job, done directly on the
/// watch channel.
pub(crate) fn spawn_progress_pump(params: ProgressPumpParams) -> JoinHandle<()> {
    let ProgressPumpParams {
        aggregator,
        mut refresh_rx,
        event_tx,
        overall_tx,
        cancel_token,
    } = params;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                signal = refresh_rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    let total = aggregator.get_and_set(SENTINEL);
                    if total == SENTINEL {
                        continue;
                    }
                    let published = *overall_tx.borrow();
                    if total <= published {
                        trace!(total, published, "dropping regressing progress total");
                        continue;
                    }
                    overall_tx.send_replace(total);
                    let _ = event_tx.send(Event::OverallProgress { fraction: total });
                }
            }
        }
    })
}
