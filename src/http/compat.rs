//! Response normalization for the client's protocol version.
//!
//! # Responsibilities
//! - Downgrade responses for HTTP/1.0 clients (version, framing)
//! - Make the `Connection` header agree with the close decision
//!
//! # Design Decisions
//! - Bodies are already buffered, so a chunked body can always be re-framed
//!   with an exact `Content-Length`
//! - The close decision only ever flips from keep-alive to close, never back

use http::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::Version;

use crate::http::message::{Framing, ProxyRequest, ProxyResponse};

/// Rewrite `resp` so it is valid for the HTTP version `req` was sent with.
pub fn normalize(resp: &mut ProxyResponse, req: &ProxyRequest) {
    if req.version <= Version::HTTP_10 {
        resp.version = Version::HTTP_10;

        if resp.framing == Framing::Chunked {
            strip_chunked(&mut resp.headers);
            resp.headers
                .insert(CONTENT_LENGTH, HeaderValue::from(resp.body.len()));
            resp.framing = Framing::Length;
        }
    }

    if req.wants_close() {
        resp.close = true;
    }

    if resp.close {
        resp.headers
            .insert(CONNECTION, HeaderValue::from_static("close"));
    } else if resp.version == Version::HTTP_10 {
        // 1.0 peers default to close, so persistence must be stated.
        resp.headers
            .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    }
}

/// Drop the `chunked` coding from `Transfer-Encoding`, keeping any others.
fn strip_chunked(headers: &mut HeaderMap) {
    let remaining: Vec<String> = headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("chunked"))
        .map(str::to_string)
        .collect();

    headers.remove(TRANSFER_ENCODING);
    if remaining.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&remaining.join(", ")) {
        headers.insert(TRANSFER_ENCODING, value);
    }
}
