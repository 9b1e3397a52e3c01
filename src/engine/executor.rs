//! Bounded execution of operations on blocking workers
//!
//! [`ExecutionService`] admits operations through a semaphore so at most the
//! configured number of codecs runs at once; queued operations wait for a
//! permit and can be abandoned before they start. The codec itself runs on a
//! blocking worker thread and stops only through its cooperative interrupt
//! flag.

use crate::operation::ArchiveOperation;
use crate::types::{Event, OperationId};
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shared reference to a submitted operation plus its cancellation lever.
///
/// Cloning is cheap; all clones control the same operation.
#[derive(Clone, Debug)]
pub struct OperationHandle {
    operation: Arc<ArchiveOperation>,
    queue_token: CancellationToken,
}

impl OperationHandle {
    /// The operation's identity.
    pub fn id(&self) -> OperationId {
        self.operation.id()
    }

    /// The underlying operation.
    pub fn operation(&self) -> &Arc<ArchiveOperation> {
        &self.operation
    }

    /// Returns `true` once the operation has finished executing.
    pub fn is_done(&self) -> bool {
        self.operation.is_completed()
    }

    /// Request cancellation.
    ///
    /// An operation still waiting for a worker permit is abandoned either
    /// way. A running operation is interrupted only when `may_interrupt` is
    /// `true`; with `false` it runs to completion. Returns `false` if the
    /// operation had already finished and the request had no effect.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        if self.is_done() {
            return false;
        }
        self.queue_token.cancel();
        if may_interrupt {
            self.operation.interrupt();
        }
        true
    }
}

/// Worker pool wrapper bounding concurrent codec executions.
#[derive(Debug)]
pub struct ExecutionService {
    permits: Arc<Semaphore>,
}

impl ExecutionService {
    /// Create a service allowing `max_concurrent` simultaneous executions.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Submit an operation for execution.
    ///
    /// The returned join handle resolves to the operation's boolean outcome:
    /// `true` for success, `false` for failure, interruption, abandonment in
    /// the queue, or a worker fault. Emits [`Event::Started`] once a permit
    /// is acquired.
    pub fn spawn(
        &self,
        operation: Arc<ArchiveOperation>,
        events: broadcast::Sender<Event>,
    ) -> (OperationHandle, JoinHandle<bool>) {
        let queue_token = CancellationToken::new();
        let handle = OperationHandle {
            operation: operation.clone(),
            queue_token: queue_token.clone(),
        };

        let permits = self.permits.clone();
        let join = tokio::spawn(async move {
            let id = operation.id();

            let permit = tokio::select! {
                _ = queue_token.cancelled() => {
                    debug!(%id, "operation abandoned while queued");
                    return false;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        debug!(%id, "worker pool closed before operation started");
                        return false;
                    }
                },
            };

            // The interrupt flag may already be set here; the codec notices
            // it on its first poll.
            let _ = events.send(Event::Started { id });
            let result = tokio::task::spawn_blocking(move || operation.execute()).await;
            drop(permit);

            match result {
                Ok(Ok(success)) => success,
                Ok(Err(err)) => {
                    warn!(%id, error = %err, "operation could not run");
                    false
                }
                Err(err) => {
                    warn!(%id, error = %err, "worker thread failed");
                    false
                }
            }
        });

        (handle, join)
    }

    /// Close the pool: queued operations fail to acquire a permit and
    /// resolve unsuccessfully. Running operations are unaffected.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Number of free worker slots.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}
