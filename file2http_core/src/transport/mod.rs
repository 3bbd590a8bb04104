/**
 * Transport layer — everything about *how* records reach the endpoint.
 *
 * - `http` — shared `ureq` agent
 * - `publisher` — delivery strategies and the `Publish` seam
 * - `queue` — bounded work queue
 * - `worker` — worker threads, error policy, completion latch
 */

pub mod http;
pub mod publisher;
pub mod queue;
pub mod worker;

pub use http::{Transport, TransportConfig};
pub use publisher::{DeliveryMode, Publish, Publisher, Request, Target};
pub use queue::{QueueConsumer, QueueDrain, QueueProducer, WorkQueue};
pub use worker::{CompletionLatch, ErrorPolicy, Worker, WorkerState, WorkerStats};
