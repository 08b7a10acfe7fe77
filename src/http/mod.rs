//! HTTP/1.x protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! client stream
//!     → codec.rs (read_request: bounded head, httparse, body framing)
//!     → message.rs (ProxyRequest)
//!     → [handler forwards via codec::write_request to a pooled backend]
//!     → codec.rs (read_response, framed by the request method)
//!     → message.rs (ProxyResponse, X-Bytes header)
//!     → compat.rs (normalize for the client's HTTP version)
//!     → codec.rs (write_response) → client stream
//! ```

pub mod codec;
pub mod compat;
pub mod message;

pub use codec::{CodecError, Limits};
pub use message::{Framing, ProxyRequest, ProxyResponse, X_BYTES};
