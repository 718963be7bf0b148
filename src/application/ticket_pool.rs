//! TicketPool - the bounded admission pool in front of the scoring provider.
//!
//! The provider rejects calls above a concurrency threshold; the pool
//! proactively caps in-flight calls below that threshold, trading bounded
//! queueing delay for near-zero provider-side rejections. Capacity comes
//! from configuration, one pool per provider, shared by every caller task.
//!
//! Waiters are served strictly in arrival order. When the waiter queue is
//! full, new arrivals are shed immediately with a retry hint instead of
//! queueing unboundedly.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout_at, Instant};

/// Default hold-time assumption before any ticket has completed.
const INITIAL_HOLD_ESTIMATE_MICROS: u64 = 1_000_000;

/// Fixed-capacity pool of admission tickets.
pub struct TicketPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    max_queue_depth: usize,
    queued: Arc<AtomicUsize>,
    /// Exponential moving average of ticket hold time, in microseconds.
    avg_hold_micros: Arc<AtomicU64>,
}

/// One admitted slot, owned exclusively by the request that acquired it.
///
/// The slot returns to the pool exactly once, when the ticket drops -
/// on success, failure, timeout, or caller cancellation alike.
#[derive(Debug)]
pub struct Ticket {
    issued_at: Instant,
    avg_hold_micros: Arc<AtomicU64>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let held = self.issued_at.elapsed().as_micros() as u64;
        let prev = self.avg_hold_micros.load(Ordering::Relaxed);
        // EWMA with alpha = 1/8; single writer races are tolerable here,
        // the average only feeds the retry hint.
        let next = if prev == 0 {
            held
        } else {
            prev - prev / 8 + held / 8
        };
        self.avg_hold_micros.store(next, Ordering::Relaxed);
    }
}

/// Why an acquisition did not produce a ticket.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AcquireError {
    /// The deadline elapsed while waiting in the queue.
    #[error("no ticket became available before the deadline")]
    Timeout,

    /// The waiter queue is full; the request was shed without queueing.
    #[error("admission queue full, retry after {retry_after_secs}s")]
    Overloaded {
        /// Estimated seconds until a queue slot is worth retrying.
        retry_after_secs: u32,
    },
}

impl TicketPool {
    /// Creates a pool of `capacity` tickets with at most `max_queue_depth`
    /// callers waiting behind them.
    pub fn new(capacity: usize, max_queue_depth: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            max_queue_depth,
            queued: Arc::new(AtomicUsize::new(0)),
            avg_hold_micros: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Waits for a ticket until `deadline`.
    ///
    /// Waiters are served in arrival order. A caller cancelled while
    /// queued leaves the queue without ever consuming a slot.
    pub async fn acquire(&self, deadline: Instant) -> Result<Ticket, AcquireError> {
        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            return Ok(self.issue(permit));
        }

        if self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                (depth < self.max_queue_depth).then_some(depth + 1)
            })
            .is_err()
        {
            return Err(AcquireError::Overloaded {
                retry_after_secs: self.retry_hint(),
            });
        }
        let _slot = QueuedSlot {
            queued: Arc::clone(&self.queued),
        };

        match timeout_at(deadline, Arc::clone(&self.permits).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(self.issue(permit)),
            // The pool owns its semaphore and never closes it.
            Ok(Err(_)) | Err(_) => Err(AcquireError::Timeout),
        }
    }

    /// Tickets currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Callers currently waiting for a ticket.
    pub fn queue_depth(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Configured pool size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn issue(&self, permit: OwnedSemaphorePermit) -> Ticket {
        Ticket {
            issued_at: Instant::now(),
            avg_hold_micros: Arc::clone(&self.avg_hold_micros),
            _permit: permit,
        }
    }

    /// Estimates how long a shed caller should wait before retrying,
    /// from the current queue depth and the observed mean hold time.
    fn retry_hint(&self) -> u32 {
        let hold = match self.avg_hold_micros.load(Ordering::Relaxed) {
            0 => INITIAL_HOLD_ESTIMATE_MICROS,
            observed => observed,
        };
        let ahead = self.queued.load(Ordering::Acquire) as u64 + 1;
        let est_micros = hold.saturating_mul(ahead) / self.capacity.max(1) as u64;
        ((est_micros + 999_999) / 1_000_000).max(1) as u32
    }
}

/// Occupies one waiter-queue slot for as long as it lives; dropping it
/// (including on cancellation) gives the slot back.
struct QueuedSlot {
    queued: Arc<AtomicUsize>,
}

impl Drop for QueuedSlot {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for TicketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}
