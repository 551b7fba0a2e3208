use std::collections::HashSet;
use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, Semaphore, SemaphorePermit, TryAcquireError, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, VerdictError};
use crate::state_machine::JobId;

/// Room for one id in the queue, held between reserving and pushing.
///
/// Reserving first lets the caller create the job record only once the queue
/// has agreed to take it.
pub struct Slot<'a> {
    queue: &'a JobQueue,
    permit: Option<SemaphorePermit<'a>>,
}

impl Slot<'_> {
    pub fn push(self, id: JobId) -> Result<()> {
        // Membership first, so a consumer that receives the id always finds it.
        self.queue.waiting().insert(id);
        if self.queue.tx.send(id).is_err() {
            self.queue.waiting().remove(&id);
            return Err(VerdictError::QueueClosed);
        }
        // The place is handed back in `JobQueue::release`.
        if let Some(permit) = self.permit {
            permit.forget();
        }
        Ok(())
    }
}

/// FIFO channel of pending job ids.
///
/// Every id is delivered to exactly one caller of [`JobQueue::dequeue`]. An id
/// withdrawn with [`JobQueue::remove`] gives its place back at once and is
/// never delivered.
#[derive(Debug)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<JobId>,
    rx: Mutex<mpsc::UnboundedReceiver<JobId>>,
    // Ids pushed and not yet delivered or withdrawn.
    waiting: StdMutex<HashSet<JobId>>,
    // Present only when bounded; one permit per free place.
    places: Option<Semaphore>,
}

impl JobQueue {
    /// `None` builds an unbounded queue.
    pub fn new(capacity: Option<usize>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            waiting: StdMutex::new(HashSet::new()),
            places: capacity.map(|cap| Semaphore::new(cap.max(1))),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::new(Some(capacity))
    }

    fn waiting(&self) -> MutexGuard<'_, HashSet<JobId>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_slot<'a>(&'a self, permit: Option<SemaphorePermit<'a>>) -> Result<Slot<'a>> {
        if self.tx.is_closed() {
            return Err(VerdictError::QueueClosed);
        }
        Ok(Slot {
            queue: self,
            permit,
        })
    }

    /// Reserve room for one id, waiting while a bounded queue is full.
    pub async fn reserve(&self) -> Result<Slot<'_>> {
        let permit = match &self.places {
            Some(places) => Some(
                places
                    .acquire()
                    .await
                    .map_err(|_| VerdictError::QueueClosed)?,
            ),
            None => None,
        };
        self.open_slot(permit)
    }

    /// Reserve room for one id without waiting.
    pub fn try_reserve(&self) -> Result<Slot<'_>> {
        let permit = match &self.places {
            Some(places) => match places.try_acquire() {
                Ok(permit) => Some(permit),
                Err(TryAcquireError::NoPermits) => return Err(VerdictError::QueueFull),
                Err(TryAcquireError::Closed) => return Err(VerdictError::QueueClosed),
            },
            None => None,
        };
        self.open_slot(permit)
    }

    /// Append an id, waiting for room when bounded.
    pub async fn enqueue(&self, id: JobId) -> Result<()> {
        self.reserve().await?.push(id)
    }

    /// Append an id or fail with `QueueFull` instead of waiting.
    pub fn try_enqueue(&self, id: JobId) -> Result<()> {
        self.try_reserve()?.push(id)
    }

    /// Take `id` out of the waiting set and free its place. False when the id
    /// was already delivered or withdrawn.
    fn release(&self, id: JobId) -> bool {
        let removed = self.waiting().remove(&id);
        if removed {
            if let Some(places) = &self.places {
                places.add_permits(1);
            }
        }
        removed
    }

    /// Wait for the next id. Returns `None` once `shutdown` is cancelled or
    /// the queue is closed and drained.
    pub async fn dequeue(&self, shutdown: &CancellationToken) -> Option<JobId> {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                id = async { self.rx.lock().await.recv().await } => id,
            };
            let id = next?;
            if self.release(id) {
                return Some(id);
            }
            tracing::debug!(job_id = %id, "Skipping withdrawn id");
        }
    }

    /// Withdraw a queued id so that no consumer receives it. Returns false
    /// when the id is not waiting in the queue.
    pub fn remove(&self, id: JobId) -> bool {
        let removed = self.release(id);
        if removed {
            tracing::debug!(job_id = %id, queued = self.len(), "Id withdrawn from queue");
        }
        removed
    }

    /// Refuse further ids. Ids already queued stay queued.
    pub async fn close(&self) {
        if let Some(places) = &self.places {
            places.close();
        }
        self.rx.lock().await.close();
    }

    /// Number of ids waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.waiting().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
