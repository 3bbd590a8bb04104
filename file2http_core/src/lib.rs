/*!
 * file2http core — the concurrent delivery engine.
 *
 * Reads newline-delimited records, hands them to a bounded queue and lets
 * a fixed pool of worker threads publish each one to an HTTP endpoint.
 * The `file2http` binary crate wires this up to a command line.
 *
 * # Module structure
 *
 * - `protocol/` — what we deliver: records, input reading, addresses
 * - `transport/` — how we deliver: HTTP, publishers, queue, workers
 * - `pipeline` — run lifecycle: spawn, feed, close, drain
 * - `error` — error types
 *
 * # Example
 * ```no_run
 * use file2http_core::{DeliveryMode, Pipeline, PipelineConfig, Publisher, Target, Transport};
 *
 * let target = Target::new(DeliveryMode::Post, "http://127.0.0.1:8080/ingest")?;
 * let publisher = Publisher::new(target, Transport::default());
 * let pipeline = Pipeline::new(publisher, PipelineConfig::default())?;
 *
 * let summary = pipeline.run(std::io::stdin().lock())?;
 * println!("delivered {} of {}", summary.delivered, summary.records_read);
 * # Ok::<(), Box<dyn std::error::Error>>(())
 * ```
 */

mod error;
mod pipeline;
mod protocol;
mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::{ConfigError, PipelineError, PublishError, PublishResult, QueueError};
pub use pipeline::{Pipeline, PipelineConfig, RunSummary, DEFAULT_WORKERS};
pub use protocol::address::{escape, normalize_address};
pub use protocol::constants::VERSION;
pub use protocol::input::InputReader;
pub use protocol::types::Record;
pub use transport::queue::DEFAULT_CAPACITY as DEFAULT_QUEUE_CAPACITY;
pub use transport::{
    CompletionLatch, DeliveryMode, ErrorPolicy, Publish, Publisher, QueueConsumer, QueueDrain,
    QueueProducer, Request, Target, Transport, TransportConfig, WorkQueue, Worker, WorkerState,
    WorkerStats,
};
