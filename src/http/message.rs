//! Parsed HTTP/1.x messages.
//!
//! Both message types hold a fully buffered body. Framing is tracked
//! separately from the headers so that a chunked body can be re-framed
//! when it is written out again.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use http::{Method, StatusCode, Version};

/// Name of the response header carrying the recorded response size.
pub const X_BYTES: HeaderName = HeaderName::from_static("x-bytes");

/// How a message body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body at all.
    Empty,
    /// `Content-Length` delimited.
    Length,
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Body runs until the peer closes (responses only).
    UntilEof,
}

/// A request read from a client.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Raw request-target as received (origin-form or absolute-form).
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub framing: Framing,
}

impl ProxyRequest {
    /// Path component of the request target, without the query string.
    pub fn path(&self) -> &str {
        target_path(&self.target)
    }

    /// True when the client asked for the connection to close after this exchange.
    pub fn wants_close(&self) -> bool {
        should_close(self.version, &self.headers)
    }
}

/// A response read from the origin.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub version: Version,
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub framing: Framing,
    /// Declared body length; -1 when the origin did not declare one.
    pub content_length: i64,
    /// The connection this response travels on must close afterwards.
    pub close: bool,
}

impl ProxyResponse {
    /// Set the `X-Bytes` header to the given recorded size.
    pub fn set_recorded_bytes(&mut self, bytes: i64) {
        self.headers.insert(X_BYTES, HeaderValue::from(bytes));
    }
}

/// Extract the path of an origin-form or absolute-form request target.
pub fn target_path(target: &str) -> &str {
    if target == "*" {
        return target;
    }

    let rest = match target.find("://") {
        Some(idx) => {
            let after_scheme = &target[idx + 3..];
            match after_scheme.find(['/', '?']) {
                Some(slash) => &after_scheme[slash..],
                None => "/",
            }
        }
        None => target,
    };

    let path = match rest.find(['?', '#']) {
        Some(end) => &rest[..end],
        None => rest,
    };

    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// HTTP/1.x persistence rules: 1.0 closes unless asked to keep alive,
/// 1.1 stays open unless asked to close.
pub fn should_close(version: Version, headers: &HeaderMap) -> bool {
    if has_connection_token(headers, "close") {
        return true;
    }
    version <= Version::HTTP_10 && !has_connection_token(headers, "keep-alive")
}

/// Check the comma separated `Connection` header values for a token.
pub fn has_connection_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}
