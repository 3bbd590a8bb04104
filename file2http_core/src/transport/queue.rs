/**
 * Bounded work queue between the input reader and the worker pool.
 *
 * Built on a `crossbeam_channel::bounded` channel and split into two
 * halves:
 * - `QueueProducer` — the only writer. `push` blocks while the queue is
 *   full, which is all the backpressure the pipeline has. `close` consumes
 *   the producer, so the queue is closed exactly once and nothing can be
 *   pushed afterwards.
 * - `QueueConsumer` — cloned once per worker. `recv` blocks for a record
 *   and returns `None` only after closure *and* once every queued record
 *   has been handed out. Closing never discards queued work.
 *
 * Every consumer also holds a liveness token. Once the last consumer is
 * dropped the producer stops blocking and reports `NoConsumers`. Records
 * that were accepted but never claimed stay reachable through the
 * `QueueDrain` returned by `close`.
 *
 * A capacity of 0 gives a rendezvous hand-off: the producer waits until a
 * worker actually takes each record.
 */
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Select, Sender, TryRecvError};

use crate::error::QueueError;
use crate::protocol::types::Record;

/// Default number of unclaimed records the queue may hold.
pub const DEFAULT_CAPACITY: usize = 1;

pub struct WorkQueue;

impl WorkQueue {
    /// Creates a queue holding at most `capacity` unclaimed records.
    pub fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        // Nothing is ever sent on this one; it only disconnects.
        let (alive, consumers) = crossbeam_channel::bounded::<()>(0);
        let closed = Arc::new(AtomicBool::new(false));

        let producer = QueueProducer {
            sender,
            leftovers: receiver.clone(),
            consumers,
            closed: closed.clone(),
        };
        let consumer = QueueConsumer {
            receiver,
            closed,
            _alive: alive,
        };

        (producer, consumer)
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

pub struct QueueProducer {
    sender: Sender<Record>,

    /// Keeps unclaimed records reachable after every consumer is gone.
    leftovers: Receiver<Record>,

    /// Disconnects when the last `QueueConsumer` is dropped.
    consumers: Receiver<()>,

    closed: Arc<AtomicBool>,
}

impl QueueProducer {
    /**
     * Enqueues `record`, blocking while the queue is full.
     *
     * # Errors
     * `QueueError::NoConsumers` when every consumer has been dropped, either
     * before the call or while it was blocked. The record is returned inside
     * the error.
     */
    pub fn push(&self, record: Record) -> Result<(), QueueError> {
        if self.consumers_gone() {
            return Err(QueueError::NoConsumers(record));
        }

        let mut select = Select::new();
        let send = select.send(&self.sender);
        select.recv(&self.consumers);

        let operation = select.select();
        if operation.index() == send {
            return operation
                .send(&self.sender, record)
                .map_err(|err| QueueError::NoConsumers(err.into_inner()));
        }

        // Only ever ready through disconnection.
        let _ = operation.recv(&self.consumers);
        Err(QueueError::NoConsumers(record))
    }

    fn consumers_gone(&self) -> bool {
        matches!(self.consumers.try_recv(), Err(TryRecvError::Disconnected))
    }

    /**
     * Signals that no more records will ever be pushed.
     *
     * Consumers keep receiving whatever is still queued; after that their
     * `recv` returns `None`. The returned drain gives access to anything no
     * consumer ever claimed.
     */
    pub fn close(self) -> QueueDrain {
        self.closed.store(true, Ordering::Release);
        drop(self.sender);
        QueueDrain {
            receiver: self.leftovers,
        }
    }
}

/**
 * Read side of a closed queue, held by whoever closed it.
 */
pub struct QueueDrain {
    receiver: Receiver<Record>,
}

impl QueueDrain {
    /**
     * Takes every record still queued without blocking.
     *
     * Only meaningful once every consumer has finished: until then a worker
     * may still be about to claim what this call would return.
     */
    pub fn leftovers(&self) -> Vec<Record> {
        self.receiver.try_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct QueueConsumer {
    receiver: Receiver<Record>,
    closed: Arc<AtomicBool>,

    /// Liveness token; the producer watches for the last one to drop.
    _alive: Sender<()>,
}

impl QueueConsumer {
    /// Blocks for the next record; `None` once closed and drained.
    pub fn recv(&self) -> Option<Record> {
        self.receiver.recv().ok()
    }

    /// Whether the producer has closed the queue. Records may remain.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Records waiting to be claimed.
    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }
}
