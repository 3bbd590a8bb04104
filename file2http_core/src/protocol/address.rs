/**
 * Endpoint address handling.
 *
 * Operators may give an address either as a full URL or as a bare port
 * number. A bare port is shorthand for a service on the loopback interface:
 * `4151` becomes `http://127.0.0.1:4151`.
 *
 * The URL builders here are the only place a record is turned into part of
 * a URL, so escaping rules live in one spot.
 */
use super::constants::{LOOPBACK, TEMPLATE_PLACEHOLDER};

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/**
 * Returns `address` unchanged unless it parses as an integer, in which case
 * it is expanded to a loopback URL on that port.
 *
 * # Example
 * ```
 * use file2http_core::normalize_address;
 *
 * assert_eq!(normalize_address("8080"), "http://127.0.0.1:8080");
 * assert_eq!(normalize_address("http://example.com"), "http://example.com");
 * ```
 */
pub fn normalize_address(address: &str) -> String {
    match address.trim().parse::<i64>() {
        Ok(port) => format!("http://{LOOPBACK}:{port}"),
        Err(_) => address.to_string(),
    }
}

// ---------------------------------------------------------------------------
// URL building
// ---------------------------------------------------------------------------

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub fn escape(record: &str) -> String {
    urlencoding::encode(record).into_owned()
}

/// Number of `%s` placeholders in a GET template.
pub fn count_placeholders(template: &str) -> usize {
    template.matches(TEMPLATE_PLACEHOLDER).count()
}

/**
 * Substitutes the escaped record into the template's placeholder.
 *
 * Callers validate the template up front; with no placeholder the template
 * comes back unchanged.
 */
pub fn render_template(template: &str, record: &str) -> String {
    template.replacen(TEMPLATE_PLACEHOLDER, &escape(record), 1)
}

/// Joins `endpoint` and `subpath` without doubling the slash.
pub fn join_subpath(endpoint: &str, subpath: &str) -> String {
    format!("{}{subpath}", endpoint.trim_end_matches('/'))
}
