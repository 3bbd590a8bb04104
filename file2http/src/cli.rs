/*!
 * Command-line surface.
 *
 * Exactly one delivery mode is used per run. When several are given the
 * first of `--post`, `--get`, `--pubsub`, `--queue` wins.
 */

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use file2http_core::{
    normalize_address, ConfigError, DeliveryMode, ErrorPolicy, PipelineConfig, Target,
    TransportConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS,
};
use tracing::warn;

use crate::logging::LogFormat;

/// Read lines from stdin and publish each one to an HTTP endpoint.
#[derive(Parser, Debug)]
#[command(name = "file2http")]
#[command(version = concat!("v", env!("CARGO_PKG_VERSION")), about, long_about = None)]
pub struct Cli {
    /// HTTP address to POST each line to; the line is the request body
    #[arg(long, value_name = "ADDR")]
    pub post: Option<String>,

    /// HTTP address to GET; '%s' is replaced with the URL-escaped line
    #[arg(long, value_name = "TEMPLATE")]
    pub get: Option<String>,

    /// Pubsub address; lines are POSTed as JSON to ADDR/pub
    #[arg(long, value_name = "ADDR")]
    pub pubsub: Option<String>,

    /// Queue address; lines are sent as GET ADDR/put?data=<line>
    #[arg(long, value_name = "ADDR")]
    pub queue: Option<String>,

    /// Number of concurrent publishers
    #[arg(short = 'n', long = "workers", env = "FILE2HTTP_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Lines that may wait in the queue before reading blocks (0 = hand-off)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// What a publisher does after a failed delivery
    #[arg(long, value_enum, default_value_t = OnError::Continue)]
    pub on_error: OnError,

    /// Seconds allowed to establish a connection
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Seconds allowed for a whole request
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub request_timeout: u64,

    /// Read lines from this file instead of stdin
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Write a JSON run profile (per-worker timings and counts) to this file
    #[arg(long, value_name = "PATH")]
    pub cpuprofile: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnError {
    /// Log the failure and take the next line
    Continue,
    /// Log the failure and stop that publisher for good
    Stop,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Continue => ErrorPolicy::Continue,
            OnError::Stop => ErrorPolicy::Stop,
        }
    }
}

impl Cli {
    /**
     * Picks the delivery target by precedence and validates it.
     *
     * # Errors
     * `MissingAddress` when no mode has an address, `InvalidTemplate` for a
     * GET address without exactly one `%s`.
     */
    pub fn target(&self) -> Result<Target, ConfigError> {
        let candidates = [
            (DeliveryMode::Post, &self.post),
            (DeliveryMode::Get, &self.get),
            (DeliveryMode::Pubsub, &self.pubsub),
            (DeliveryMode::Queue, &self.queue),
        ];

        let mut given = candidates
            .iter()
            .filter_map(|(mode, address)| {
                address
                    .as_deref()
                    .filter(|a| !a.is_empty())
                    .map(|a| (*mode, a))
            });

        let (mode, address) = given.next().ok_or(ConfigError::MissingAddress)?;
        for (ignored, _) in given {
            warn!(%mode, %ignored, "several delivery modes given; using the first");
        }

        Target::new(mode, &normalize_address(address))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            error_policy: self.on_error.into(),
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }
}
