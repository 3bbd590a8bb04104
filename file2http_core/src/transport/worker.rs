/**
 * Delivery worker threads and their completion signalling.
 *
 * Architecture overview:
 *
 * ```text
 *  ┌──────────────┐   bounded queue    ┌──────────────┐
 *  │ input reader │ ───── Record ────► │  worker 0..N │ ── publish() ──► endpoint
 *  │  (producer)  │                    │   (threads)  │
 *  └──────────────┘                    └──────┬───────┘
 *                                             │ count_down()
 *                                     ┌───────▼─────────┐
 *                                     │ CompletionLatch │
 *                                     └─────────────────┘
 * ```
 *
 * Each worker loops `recv → publish` until the queue reports closed and
 * drained, then counts the shared latch down exactly once. The count-down
 * lives in a drop guard, so even a worker that panics signals completion.
 */
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, warn};

use super::publisher::Publish;
use super::queue::QueueConsumer;
use crate::protocol::types::Record;

// ---------------------------------------------------------------------------
// ErrorPolicy
// ---------------------------------------------------------------------------

/**
 * What a worker does after a failed delivery. Either way the failure is
 * logged with the offending record and the record is dropped.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Move on to the next record.
    #[default]
    Continue,

    /// Stop this worker for good. The other workers keep draining.
    Stop,
}

// ---------------------------------------------------------------------------
// CompletionLatch — counts workers down to zero
// ---------------------------------------------------------------------------

/**
 * Countdown latch the coordinator blocks on until every worker is done.
 *
 * Uses a `Mutex<usize>` + `Condvar` pair:
 * - The count starts at the number of workers.
 * - Each worker decrements it once on the way out.
 * - Waiters wake when it reaches zero.
 */
pub struct CompletionLatch {
    /// Workers that have not signalled yet.
    remaining: Mutex<usize>,

    /// Notified every time the count reaches zero.
    condvar: Condvar,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            condvar: Condvar::new(),
        }
    }

    /**
     * Records one completion. Extra calls past zero are ignored so a
     * mis-wired caller can never wrap the count.
     */
    pub fn count_down(&self) {
        let mut remaining = match self.remaining.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.condvar.notify_all();
            }
        }
    }

    pub fn remaining(&self) -> usize {
        match self.remaining.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let guard = match self.remaining.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let _done = self
            .condvar
            .wait_while(guard, |remaining| *remaining > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }

    /**
     * Blocks until the count reaches zero or `timeout` elapses.
     *
     * # Returns
     * `true` if every worker signalled in time, `false` on timeout.
     */
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = match self.remaining.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let (_guard, result) = self
            .condvar
            .wait_timeout_while(guard, timeout, |remaining| *remaining > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        !result.timed_out()
    }
}

/// Counts the latch down when dropped, panics included.
struct CompletionGuard(Arc<CompletionLatch>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

// ---------------------------------------------------------------------------
// Worker state and stats
// ---------------------------------------------------------------------------

/// `Running → Draining → Terminated`, never backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Queue open, taking records as they come.
    Running,

    /// Queue closed, finishing what is left in it.
    Draining,

    Terminated,
}

/// Per-worker counters, returned when the thread is joined.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub delivered: u64,
    pub failed: u64,

    /// Wall time spent inside `publish`, in milliseconds.
    pub busy_ms: u64,

    /// Records claimed after the queue was seen closed.
    pub drained: u64,

    /// Left the loop early because of `ErrorPolicy::Stop`.
    pub stopped_early: bool,

    /// The thread panicked. The record it held is counted in `failed`.
    pub panicked: bool,
}

impl WorkerStats {
    pub fn attempts(&self) -> u64 {
        self.delivered + self.failed
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub struct Worker<P> {
    id: usize,
    consumer: QueueConsumer,
    publisher: Arc<P>,
    policy: ErrorPolicy,
}

impl<P: Publish + 'static> Worker<P> {
    pub fn new(id: usize, consumer: QueueConsumer, publisher: Arc<P>, policy: ErrorPolicy) -> Self {
        Self {
            id,
            consumer,
            publisher,
            policy,
        }
    }

    /**
     * Spawns the worker on a named thread.
     *
     * The latch is counted down exactly once when the thread finishes,
     * whether the loop ended normally, stopped on error or panicked.
     *
     * # Errors
     * The OS refused to create the thread. The latch is not touched in that
     * case; the caller owns the bookkeeping for workers that never started.
     */
    pub fn spawn(self, latch: Arc<CompletionLatch>) -> std::io::Result<JoinHandle<WorkerStats>> {
        thread::Builder::new()
            .name(format!("file2http-worker-{}", self.id))
            .spawn(move || {
                let _signal = CompletionGuard(latch);
                let mut stats = WorkerStats {
                    worker_id: self.id,
                    ..WorkerStats::default()
                };

                let mut in_flight = None;

                /*
                 * A panic inside publish() must not take the completion
                 * signal with it. Log it, count the record it was holding
                 * as failed and fall through to the guard.
                 */
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    self.run_loop(&mut stats, &mut in_flight);
                }));

                if result.is_err() {
                    stats.panicked = true;
                    match in_flight.take() {
                        Some(record) => {
                            stats.failed += 1;
                            error!(worker_id = self.id, record = %record, "worker thread panicked while publishing; it will take no more records");
                        }
                        None => error!(worker_id = self.id, "worker thread panicked; it will take no more records"),
                    }
                }

                stats
            })
    }

    /**
     * Takes records until the queue is closed and empty, or until a failure
     * under `ErrorPolicy::Stop`.
     *
     * `recv()` only returns `None` once the producer has closed the queue
     * and every queued record has been claimed. Whatever a stopped worker
     * leaves behind is picked up by the other workers or, if none is left,
     * reported by the coordinator.
     *
     * The state moves to `Draining` the first time a record is claimed
     * after closure. A worker idle in `recv()` when the queue closes empty
     * has nothing to drain and goes straight to `Terminated`.
     */
    fn run_loop(&self, stats: &mut WorkerStats, in_flight: &mut Option<Record>) {
        let mut state = WorkerState::Running;
        debug!(worker_id = self.id, "worker started");

        while let Some(record) = self.consumer.recv() {
            if self.consumer.is_closed() {
                if state == WorkerState::Running {
                    state = WorkerState::Draining;
                    debug!(worker_id = self.id, queued = self.consumer.len(), "queue closed, draining");
                }
                stats.drained += 1;
            }

            let started = Instant::now();
            *in_flight = Some(record.clone());
            let result = self.publisher.publish(&record);
            *in_flight = None;
            stats.busy_ms += started.elapsed().as_millis() as u64;

            match result {
                Ok(()) => stats.delivered += 1,
                Err(err) => {
                    stats.failed += 1;
                    error!(worker_id = self.id, record = %record, error = %err, "publishing failed");

                    if self.policy == ErrorPolicy::Stop {
                        warn!(worker_id = self.id, "stopping worker after delivery failure");
                        stats.stopped_early = true;
                        break;
                    }
                }
            }
        }

        state = WorkerState::Terminated;
        debug!(
            worker_id = self.id,
            ?state,
            delivered = stats.delivered,
            failed = stats.failed,
            drained = stats.drained,
            "worker finished"
        );
    }
}
