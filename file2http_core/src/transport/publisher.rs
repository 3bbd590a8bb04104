/*!
 * Delivery strategies — how a record becomes one HTTP request.
 *
 * | Target            | Method | URL                              | Body                         |
 * |-------------------|--------|----------------------------------|------------------------------|
 * | `BodyPost`        | POST   | endpoint                         | record, octet-stream         |
 * | `TemplatedGet`    | GET    | template with `%s` = escaped rec | —                            |
 * | `JsonSubpathPost` | POST   | `{endpoint}/pub`                 | record, application/json     |
 * | `QueryGet`        | GET    | `{endpoint}/put?data={escaped}`  | —                            |
 *
 * Building the request is pure (`Target::request`); sending it is the
 * transport's job. The worker pool only sees the `Publish` trait, so tests
 * can drive it without a network.
 */

use std::fmt;

use crate::error::{ConfigError, PublishResult};
use crate::protocol::address::{count_placeholders, escape, join_subpath, render_template};
use crate::protocol::constants::{JSON, OCTET_STREAM, PUBSUB_PATH, QUEUE_PATH};
use crate::protocol::types::Record;
use crate::transport::http::Transport;

// ---------------------------------------------------------------------------
// Publish — the seam the worker pool is generic over
// ---------------------------------------------------------------------------

/**
 * Delivers one record.
 *
 * Implementations are shared read-only by every worker thread, hence the
 * `Send + Sync` bound. A returned error is a transport failure for this
 * record only; it never affects other records.
 */
pub trait Publish: Send + Sync {
    fn publish(&self, record: &Record) -> PublishResult;
}

// ---------------------------------------------------------------------------
// DeliveryMode / Target
// ---------------------------------------------------------------------------

/// The four ways an operator can ask for records to be delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    Post,
    Get,
    Pubsub,
    Queue,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryMode::Post => "post",
            DeliveryMode::Get => "get",
            DeliveryMode::Pubsub => "pubsub",
            DeliveryMode::Queue => "queue",
        };
        f.write_str(name)
    }
}

/**
 * A validated delivery target: one variant per strategy, each carrying the
 * endpoint configuration it needs.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    BodyPost { endpoint: String },
    TemplatedGet { template: String },
    JsonSubpathPost { url: String },
    QueryGet { url: String },
}

/// The request a target produces for one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request<'a> {
    Post {
        url: String,
        content_type: &'static str,
        body: &'a [u8],
    },
    Get {
        url: String,
    },
}

impl Target {
    /**
     * Builds a target for `mode`, validating the address.
     *
     * # Errors
     * `ConfigError::InvalidTemplate` when a GET template does not contain
     * exactly one `%s`.
     */
    pub fn new(mode: DeliveryMode, address: &str) -> Result<Self, ConfigError> {
        let target = match mode {
            DeliveryMode::Post => Target::BodyPost {
                endpoint: address.to_string(),
            },
            DeliveryMode::Get => {
                let placeholders = count_placeholders(address);
                if placeholders != 1 {
                    return Err(ConfigError::InvalidTemplate {
                        template: address.to_string(),
                        placeholders,
                    });
                }
                Target::TemplatedGet {
                    template: address.to_string(),
                }
            }
            DeliveryMode::Pubsub => Target::JsonSubpathPost {
                url: join_subpath(address, PUBSUB_PATH),
            },
            DeliveryMode::Queue => Target::QueryGet {
                url: join_subpath(address, QUEUE_PATH),
            },
        };

        Ok(target)
    }

    pub fn mode(&self) -> DeliveryMode {
        match self {
            Target::BodyPost { .. } => DeliveryMode::Post,
            Target::TemplatedGet { .. } => DeliveryMode::Get,
            Target::JsonSubpathPost { .. } => DeliveryMode::Pubsub,
            Target::QueryGet { .. } => DeliveryMode::Queue,
        }
    }

    /// Shapes the request for `record` without sending anything.
    pub fn request<'a>(&self, record: &'a Record) -> Request<'a> {
        match self {
            Target::BodyPost { endpoint } => Request::Post {
                url: endpoint.clone(),
                content_type: OCTET_STREAM,
                body: record.as_bytes(),
            },
            Target::TemplatedGet { template } => Request::Get {
                url: render_template(template, record.as_str()),
            },
            Target::JsonSubpathPost { url } => Request::Post {
                url: url.clone(),
                content_type: JSON,
                body: record.as_bytes(),
            },
            Target::QueryGet { url } => Request::Get {
                url: format!("{url}?data={}", escape(record.as_str())),
            },
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::BodyPost { endpoint } => write!(f, "POST {endpoint}"),
            Target::TemplatedGet { template } => write!(f, "GET {template}"),
            Target::JsonSubpathPost { url } => write!(f, "POST {url}"),
            Target::QueryGet { url } => write!(f, "GET {url}?data=%s"),
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/**
 * The production `Publish` implementation: a target plus the shared HTTP
 * transport. Immutable once built.
 */
#[derive(Clone, Debug)]
pub struct Publisher {
    target: Target,
    transport: Transport,
}

impl Publisher {
    pub fn new(target: Target, transport: Transport) -> Self {
        Self { target, transport }
    }
}

impl Publish for Publisher {
    fn publish(&self, record: &Record) -> PublishResult {
        match self.target.request(record) {
            Request::Post {
                url,
                content_type,
                body,
            } => self.transport.post(&url, content_type, body),
            Request::Get { url } => self.transport.get(&url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(s: &str) -> Record {
        Record::new(s)
    }

    #[test]
    fn test_body_post_request() {
        let target = Target::new(DeliveryMode::Post, "http://x/ingest").unwrap();
        let rec = record("hello world");

        assert_eq!(
            target.request(&rec),
            Request::Post {
                url: "http://x/ingest".into(),
                content_type: "application/octet-stream",
                body: b"hello world",
            }
        );
    }

    #[test]
    fn test_templated_get_request() {
        let target = Target::new(DeliveryMode::Get, "http://x/ingest?q=%s").unwrap();

        assert_eq!(
            target.request(&record("a b")),
            Request::Get {
                url: "http://x/ingest?q=a%20b".into()
            }
        );
    }

    #[test]
    fn test_templated_get_rejects_wrong_placeholder_count() {
        for (template, expected) in [("http://x/ingest", 0), ("http://x/%s?q=%s", 2)] {
            match Target::new(DeliveryMode::Get, template) {
                Err(ConfigError::InvalidTemplate { placeholders, .. }) => {
                    assert_eq!(placeholders, expected)
                }
                other => panic!("expected InvalidTemplate for {template}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_pubsub_request() {
        let target = Target::new(DeliveryMode::Pubsub, "http://x/").unwrap();

        assert_eq!(
            target.request(&record(r#"{"k":1}"#)),
            Request::Post {
                url: "http://x/pub".into(),
                content_type: "application/json",
                body: br#"{"k":1}"#,
            }
        );
    }

    #[test]
    fn test_queue_request() {
        let target = Target::new(DeliveryMode::Queue, "http://x").unwrap();

        assert_eq!(
            target.request(&record("a&b")),
            Request::Get {
                url: "http://x/put?data=a%26b".into()
            }
        );
    }

    #[test]
    fn test_mode_round_trips() {
        for mode in [
            DeliveryMode::Post,
            DeliveryMode::Get,
            DeliveryMode::Pubsub,
            DeliveryMode::Queue,
        ] {
            let target = Target::new(mode, "http://x/%s").unwrap();
            assert_eq!(target.mode(), mode);
        }
    }
}
