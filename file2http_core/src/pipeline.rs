/**
 * The shutdown coordinator — owns one full run of the delivery pipeline.
 *
 * Lifecycle of `Pipeline::run`:
 * 1. Create the bounded queue and a latch sized to the worker count, then
 *    spawn every worker.
 * 2. Read the input to exhaustion, pushing each record. A read error is
 *    logged and treated as end of input.
 * 3. Close the queue. Nothing can be pushed after this point.
 * 4. Wait for one completion signal per worker, then join the threads to
 *    collect their stats.
 * 5. Drain whatever is still queued. Records only remain there when every
 *    worker stopped early; each one is logged and counted as stranded.
 *
 * `run` never returns while a delivery attempt is still outstanding, and
 * every enqueued record is either attempted or reported stranded.
 */
use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, PipelineError, QueueError};
use crate::protocol::input::InputReader;
use crate::transport::queue::{self, QueueProducer, WorkQueue};
use crate::transport::worker::{CompletionLatch, ErrorPolicy, Worker, WorkerStats};
use crate::transport::Publish;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 5;

/**
 * Shape of the worker pool. Fixed for the lifetime of a run.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of worker threads. Must be at least 1.
    pub workers: usize,

    /// Unclaimed records the queue may hold before `push` blocks.
    pub queue_capacity: usize,

    pub error_policy: ErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: queue::DEFAULT_CAPACITY,
            error_policy: ErrorPolicy::Continue,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/**
 * Outcome of one run. Serialisable so the binary can write it out as the
 * run profile.
 */
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    /// Records taken from the input, whether or not they were enqueued.
    pub records_read: u64,

    /// Records accepted by the queue.
    pub records_enqueued: u64,

    pub delivered: u64,
    pub failed: u64,

    /// Enqueued records that no worker was left to claim.
    pub stranded: u64,

    /// Set when input stopped because of a read error rather than EOF.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_error: Option<String>,

    pub elapsed_ms: u64,
    pub workers: Vec<WorkerStats>,
}

impl RunSummary {
    pub fn attempts(&self) -> u64 {
        self.delivered + self.failed
    }

    /**
     * Records that were read but never attempted: refused by the queue
     * after the last worker stopped, or left stranded in it.
     */
    pub fn dropped(&self) -> u64 {
        self.records_read - self.records_enqueued + self.stranded
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<P> {
    publisher: Arc<P>,
    config: PipelineConfig,
}

impl<P: Publish + 'static> Pipeline<P> {
    /**
     * # Errors
     * `ConfigError::NoWorkers` for an empty pool.
     */
    pub fn new(publisher: P, config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            publisher: Arc::new(publisher),
            config,
        })
    }

    /**
     * Delivers every record of `input` and returns once the pool has fully
     * drained.
     *
     * Delivery failures do not fail the run; they are counted in the
     * summary.
     *
     * # Errors
     * `PipelineError::Spawn` when a worker thread cannot be created. Any
     * workers that did start are shut down cleanly first.
     */
    pub fn run<R: BufRead>(&self, input: R) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let workers = self.config.workers;

        let (producer, consumer) = WorkQueue::bounded(self.config.queue_capacity);
        let latch = Arc::new(CompletionLatch::new(workers));

        info!(
            workers,
            queue_capacity = self.config.queue_capacity,
            error_policy = ?self.config.error_policy,
            "starting delivery workers"
        );

        /*
         * Every worker gets its own consumer clone; the original is dropped
         * at the end of this block so that, if every worker exits early,
         * the producer sees a disconnected queue instead of blocking.
         */
        let mut handles: Vec<JoinHandle<WorkerStats>> = Vec::with_capacity(workers);
        let spawned = {
            let consumer = consumer;
            let mut outcome = Ok(());

            for worker_id in 0..workers {
                let worker = Worker::new(
                    worker_id,
                    consumer.clone(),
                    self.publisher.clone(),
                    self.config.error_policy,
                );

                match worker.spawn(latch.clone()) {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        outcome = Err(PipelineError::Spawn { worker_id, source });
                        break;
                    }
                }
            }
            outcome
        };

        if let Err(err) = spawned {
            error!(error = %err, started = handles.len(), "could not start the worker pool");

            /*
             * Workers that never started will never count down. Account for
             * them here so the wait below covers only live threads.
             */
            for _ in handles.len()..workers {
                latch.count_down();
            }
            producer.close();
            latch.wait();
            Self::join(handles);
            return Err(err);
        }

        let mut summary = RunSummary::default();
        self.feed(input, &producer, &mut summary);

        let drain = producer.close();
        debug!(remaining = latch.remaining(), "queue closed, waiting for workers to drain");
        latch.wait();

        summary.workers = Self::join(handles);
        summary.delivered = summary.workers.iter().map(|w| w.delivered).sum();
        summary.failed = summary.workers.iter().map(|w| w.failed).sum();

        for record in drain.leftovers() {
            error!(record = %record, "no worker left to deliver record");
            summary.stranded += 1;
        }
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            records = summary.records_read,
            delivered = summary.delivered,
            failed = summary.failed,
            dropped = summary.dropped(),
            elapsed_ms = summary.elapsed_ms,
            "all workers drained"
        );

        Ok(summary)
    }

    /// Pushes records until input ends, fails, or no worker is left.
    fn feed<R: BufRead>(&self, input: R, producer: &QueueProducer, summary: &mut RunSummary) {
        for item in InputReader::new(input) {
            let record = match item {
                Ok(record) => record,
                Err(err) => {
                    error!(error = %err, "reading input failed; treating as end of input");
                    summary.input_error = Some(err.to_string());
                    break;
                }
            };

            summary.records_read += 1;
            match producer.push(record) {
                Ok(()) => summary.records_enqueued += 1,
                Err(QueueError::NoConsumers(record)) => {
                    warn!(record = %record, "every worker has stopped; no further records will be delivered");
                    break;
                }
            }
        }
    }

    /// Joins every worker thread, keeping stats from the ones that returned.
    fn join(handles: Vec<JoinHandle<WorkerStats>>) -> Vec<WorkerStats> {
        handles
            .into_iter()
            .enumerate()
            .filter_map(|(worker_id, handle)| match handle.join() {
                Ok(stats) => Some(stats),
                Err(_) => {
                    error!(worker_id, "worker thread could not be joined");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufReader, Cursor, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::error::{PublishError, PublishResult};
    use crate::protocol::types::Record;

    // -----------------------------------------------------------------------
    // Test publishers
    // -----------------------------------------------------------------------

    /// Records every delivery; optionally sleeps and fails on a marker.
    #[derive(Default)]
    struct Recording {
        delivered: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
        fail_on: Option<&'static str>,
    }

    impl Recording {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn failing_on(marker: &'static str) -> Self {
            Self {
                fail_on: Some(marker),
                ..Self::default()
            }
        }
    }

    impl Publish for Recording {
        fn publish(&self, record: &Record) -> PublishResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            self.delivered.lock().unwrap().push(record.to_string());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(record.as_str()) {
                return Err(PublishError::Body {
                    url: "http://test".into(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                });
            }
            Ok(())
        }
    }

    /// Shares a `Recording` so the test can inspect it after the run.
    struct Shared(Arc<Recording>);

    impl Publish for Shared {
        fn publish(&self, record: &Record) -> PublishResult {
            self.0.publish(record)
        }
    }

    fn config(workers: usize) -> PipelineConfig {
        PipelineConfig {
            workers,
            ..PipelineConfig::default()
        }
    }

    fn lines(records: &[String]) -> Cursor<String> {
        let mut input = records.join("\n");
        input.push('\n');
        Cursor::new(input)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_zero_workers_is_rejected() {
        let result = Pipeline::new(Recording::default(), config(0));
        assert!(matches!(result, Err(ConfigError::NoWorkers)));
    }

    #[test]
    fn test_single_worker_preserves_order() {
        let recorder = Arc::new(Recording::default());
        let pipeline = Pipeline::new(Shared(recorder.clone()), config(1)).unwrap();

        let records: Vec<String> = (0..50).map(|i| format!("record-{i}")).collect();
        let summary = pipeline.run(lines(&records)).unwrap();

        assert_eq!(summary.delivered, 50);
        assert_eq!(*recorder.delivered.lock().unwrap(), records);
    }

    #[test]
    fn test_many_workers_deliver_every_record_once() {
        let recorder = Arc::new(Recording::with_delay(Duration::from_millis(5)));
        let pipeline = Pipeline::new(Shared(recorder.clone()), config(4)).unwrap();

        let records: Vec<String> = (0..40).map(|i| format!("r{}", i % 7)).collect();
        let summary = pipeline.run(lines(&records)).unwrap();

        let mut delivered = recorder.delivered.lock().unwrap().clone();
        let mut expected = records.clone();
        delivered.sort();
        expected.sort();

        assert_eq!(delivered, expected);
        assert_eq!(summary.attempts(), 40);
        assert_eq!(summary.workers.len(), 4);
        assert!(recorder.max_in_flight.load(Ordering::SeqCst) > 1, "workers should overlap");
    }

    #[test]
    fn test_failure_does_not_stop_later_records() {
        let recorder = Arc::new(Recording::failing_on("bad"));
        let pipeline = Pipeline::new(Shared(recorder.clone()), config(1)).unwrap();

        let records = vec!["a".to_string(), "bad".to_string(), "b".to_string()];
        let summary = pipeline.run(lines(&records)).unwrap();

        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(*recorder.delivered.lock().unwrap(), records);
    }

    #[test]
    fn test_stop_policy_with_single_worker_stops_reading() {
        let recorder = Arc::new(Recording::failing_on("bad"));
        let config = PipelineConfig {
            workers: 1,
            queue_capacity: 0,
            error_policy: ErrorPolicy::Stop,
        };
        let pipeline = Pipeline::new(Shared(recorder.clone()), config).unwrap();

        let records: Vec<String> = ["a", "bad", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let summary = pipeline.run(lines(&records)).unwrap();

        assert_eq!(summary.failed, 1);
        assert!(summary.workers[0].stopped_early);
        assert_eq!(summary.attempts() + summary.stranded, summary.records_enqueued);
        assert!(summary.dropped() >= 1);
        assert_eq!(recorder.delivered.lock().unwrap()[..2], ["a", "bad"]);
    }

    #[test]
    fn test_stop_policy_reports_records_left_in_buffer() {
        // Slow failure: "b" sits in the buffer and "c" waits on a full queue
        // while the only worker is still busy with "bad".
        let recorder = Arc::new(Recording {
            delay: Duration::from_millis(150),
            fail_on: Some("bad"),
            ..Recording::default()
        });
        let config = PipelineConfig {
            workers: 1,
            queue_capacity: 1,
            error_policy: ErrorPolicy::Stop,
        };
        let pipeline = Pipeline::new(Shared(recorder.clone()), config).unwrap();

        let records: Vec<String> = ["bad", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let summary = pipeline.run(lines(&records)).unwrap();

        assert_eq!(summary.records_read, 3);
        assert_eq!(summary.records_enqueued, 2);
        assert_eq!(summary.attempts(), 1);
        assert_eq!(summary.stranded, 1);
        assert_eq!(summary.dropped(), 2);
        assert_eq!(summary.attempts() + summary.stranded, summary.records_enqueued);
        assert_eq!(*recorder.delivered.lock().unwrap(), ["bad"]);
    }

    #[test]
    fn test_stop_policy_with_some_workers_stopping() {
        let recorder = Arc::new(Recording {
            delay: Duration::from_millis(2),
            fail_on: Some("bad"),
            ..Recording::default()
        });
        let config = PipelineConfig {
            workers: 4,
            queue_capacity: 2,
            error_policy: ErrorPolicy::Stop,
        };
        let pipeline = Pipeline::new(Shared(recorder.clone()), config).unwrap();

        let mut records: Vec<String> = (0..30).map(|i| format!("r{i}")).collect();
        records[3] = "bad".into();
        records[10] = "bad".into();
        let summary = pipeline.run(lines(&records)).unwrap();

        let stopped = summary.workers.iter().filter(|w| w.stopped_early).count();
        assert_eq!(summary.failed, 2);
        assert_eq!(stopped, 2);

        // Two workers outlive the failures, so nothing is lost.
        assert_eq!(summary.records_read, 30);
        assert_eq!(summary.records_enqueued, 30);
        assert_eq!(summary.stranded, 0);
        assert_eq!(summary.attempts(), 30);
        assert_eq!(summary.dropped(), 0);
    }

    #[test]
    fn test_stop_policy_every_enqueued_record_is_accounted_for() {
        for (workers, queue_capacity) in [(1, 1), (2, 1), (2, 3), (3, 4)] {
            let recorder = Arc::new(Recording {
                delay: Duration::from_millis(5),
                fail_on: Some("bad"),
                ..Recording::default()
            });
            let config = PipelineConfig {
                workers,
                queue_capacity,
                error_policy: ErrorPolicy::Stop,
            };
            let pipeline = Pipeline::new(Shared(recorder.clone()), config).unwrap();

            let records: Vec<String> = (0..20).map(|i| if i % 3 == 0 { "bad".into() } else { format!("ok{i}") }).collect();
            let summary = pipeline.run(lines(&records)).unwrap();

            assert!(summary.workers.iter().all(|w| w.stopped_early), "{workers} workers, capacity {queue_capacity}");
            assert_eq!(
                summary.attempts() + summary.stranded,
                summary.records_enqueued,
                "{workers} workers, capacity {queue_capacity}"
            );
            assert_eq!(summary.attempts() + summary.dropped(), summary.records_read);
            assert_eq!(recorder.delivered.lock().unwrap().len() as u64, summary.attempts());
        }
    }

    /// Panics on every record.
    struct Exploding;

    impl Publish for Exploding {
        fn publish(&self, _record: &Record) -> PublishResult {
            panic!("publisher blew up");
        }
    }

    #[test]
    fn test_panicking_workers_count_their_record_as_failed() {
        let config = PipelineConfig {
            workers: 2,
            queue_capacity: 2,
            error_policy: ErrorPolicy::Continue,
        };
        let pipeline = Pipeline::new(Exploding, config).unwrap();

        let records: Vec<String> = (0..6).map(|i| format!("r{i}")).collect();
        let summary = pipeline.run(lines(&records)).unwrap();

        assert!(summary.workers.iter().all(|w| w.panicked));
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.attempts() + summary.stranded, summary.records_enqueued);
        assert_eq!(summary.attempts() + summary.dropped(), summary.records_read);
    }

    #[test]
    fn test_empty_input_drains_immediately() {
        let pipeline = Pipeline::new(Recording::default(), config(3)).unwrap();
        let summary = pipeline.run(Cursor::new(String::new())).unwrap();

        assert_eq!(summary.records_read, 0);
        assert_eq!(summary.attempts(), 0);
        assert_eq!(summary.workers.len(), 3);
    }

    /// Serves a few lines, then fails the read.
    struct FailingInput {
        data: Cursor<&'static [u8]>,
    }

    impl Read for FailingInput {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::InvalidData, "disk on fire")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_input_error_still_delivers_enqueued_records() {
        let recorder = Arc::new(Recording::default());
        let pipeline = Pipeline::new(Shared(recorder.clone()), config(2)).unwrap();

        let input = BufReader::new(FailingInput {
            data: Cursor::new(&b"one\ntwo\n"[..]),
        });
        let summary = pipeline.run(input).unwrap();

        assert_eq!(summary.records_read, 2);
        assert_eq!(summary.delivered, 2);
        assert!(summary.input_error.as_deref().unwrap().contains("disk on fire"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_every_record_attempted_exactly_once(
            workers in 1usize..6,
            capacity in 0usize..4,
            records in prop::collection::vec("[a-z0-9 ]{0,12}", 0..60),
        ) {
            let recorder = Arc::new(Recording::default());
            let config = PipelineConfig { workers, queue_capacity: capacity, ..PipelineConfig::default() };
            let pipeline = Pipeline::new(Shared(recorder.clone()), config).unwrap();

            let input: String = records.iter().map(|r| format!("{r}\n")).collect();
            let summary = pipeline.run(Cursor::new(input)).unwrap();

            let mut expected: Vec<String> = records.iter().map(|r| r.trim().to_string()).collect();
            let mut delivered = recorder.delivered.lock().unwrap().clone();

            prop_assert_eq!(summary.attempts(), records.len() as u64);
            prop_assert_eq!(summary.workers.iter().map(WorkerStats::attempts).sum::<u64>(), records.len() as u64);

            if workers == 1 {
                prop_assert_eq!(&delivered, &expected);
            }
            delivered.sort();
            expected.sort();
            prop_assert_eq!(delivered, expected);
        }
    }
}
