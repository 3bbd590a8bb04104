/**
 * Wire-level constants shared by the publisher variants.
 */

/// Version string printed by `--version`.
pub const VERSION: &str = concat!("file2http v", env!("CARGO_PKG_VERSION"));

/// Content type of a body-POST delivery.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type of a pubsub delivery.
pub const JSON: &str = "application/json";

/// The single placeholder a GET template must contain.
pub const TEMPLATE_PLACEHOLDER: &str = "%s";

/// Subpath appended to a pubsub endpoint.
pub const PUBSUB_PATH: &str = "/pub";

/// Subpath appended to a queue endpoint; the record goes in `data`.
pub const QUEUE_PATH: &str = "/put";

/// Host used when an address is given as a bare port.
pub const LOOPBACK: &str = "127.0.0.1";
