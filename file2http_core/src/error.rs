/**
 * Error types for the delivery pipeline.
 *
 * Errors fall into three groups with very different blast radius:
 * - `ConfigError` — fatal, raised before any worker is spawned.
 * - `PublishError` — per record; logged by the worker and dropped.
 * - `PipelineError` — the coordinator itself could not run the pool.
 */
use std::io;

use thiserror::Error;

use crate::protocol::types::Record;

/// Result alias used by the publisher variants.
pub type PublishResult = std::result::Result<(), PublishError>;

/**
 * Startup configuration errors. Every variant is fatal.
 */
#[derive(Debug, Error)]
pub enum ConfigError {
    /// None of the delivery modes was given an address.
    #[error("need a delivery address: pass one of --post, --get, --pubsub or --queue")]
    MissingAddress,

    /// A GET template must carry exactly one `%s`.
    #[error("invalid get address '{template}': expected exactly one '%s' placeholder, found {placeholders}")]
    InvalidTemplate { template: String, placeholders: usize },

    #[error("worker count must be at least 1")]
    NoWorkers,
}

/**
 * A single delivery attempt failed at the transport level.
 *
 * HTTP status codes never produce this error; only a request that could
 * not be completed does.
 */
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("reading response body from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },
}

/**
 * Returned by `QueueProducer::push` when no consumer is left to take the
 * record. The record is handed back to the caller.
 */
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("every consumer has stopped; record was not enqueued")]
    NoConsumers(Record),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to spawn worker {worker_id}: {source}")]
    Spawn {
        worker_id: usize,
        #[source]
        source: io::Error,
    },
}
