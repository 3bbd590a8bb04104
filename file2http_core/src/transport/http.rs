/*!
 * HTTP transport shared by every worker.
 *
 * Uses `ureq` — a blocking client with no async runtime. Each worker is a
 * dedicated OS thread, so blocking I/O is exactly what we want, and the
 * agent's connection pool is safe to share across all of them.
 *
 * Status codes are never errors here: any response the server sends back
 * counts as delivered. Only a request that could not complete fails.
 */

use std::fmt;
use std::io;
use std::time::Duration;

use ureq::Agent;

use crate::error::{PublishError, PublishResult};

/**
 * Timeouts applied to every request.
 */
#[derive(Clone, Copy, Debug)]
pub struct TransportConfig {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,

    /// Upper bound for a whole request, body included.
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/**
 * Thin wrapper around `ureq::Agent`.
 *
 * One `Transport` is built at startup and owned by the `Publisher`, which
 * all workers share behind an `Arc`.
 */
#[derive(Clone)]
pub struct Transport {
    agent: Agent,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_connect(Some(config.connect_timeout))
            .timeout_global(Some(config.request_timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self { agent }
    }

    /// POSTs `body` to `url` with the given content type.
    pub fn post(&self, url: &str, content_type: &str, body: &[u8]) -> PublishResult {
        let response = self
            .agent
            .post(url)
            .header("Content-Type", content_type)
            .send(body);

        Self::finish(url, response)
    }

    /// Issues a GET to `url`.
    pub fn get(&self, url: &str) -> PublishResult {
        let response = self.agent.get(url).call();
        Self::finish(url, response)
    }

    /**
     * Reads and discards the response body so the connection can go back
     * to the pool. The status is logged at trace level and otherwise
     * ignored.
     */
    fn finish(
        url: &str,
        response: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> PublishResult {
        let mut response = response.map_err(|source| PublishError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status().as_u16();
        tracing::trace!(url, status, "endpoint responded");

        io::copy(&mut response.body_mut().as_reader(), &mut io::sink()).map_err(|source| {
            PublishError::Body {
                url: url.to_string(),
                source,
            }
        })?;

        Ok(())
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}
