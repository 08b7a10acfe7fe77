//! Upstream (origin) connection subsystem.
//!
//! # Data Flow
//! ```text
//! Connection handler needs a backend
//!     → pool.rs acquire (idle FIFO, bounded wait)
//!         → hit: idle Backend
//!         → miss: origin.rs dial → backend.rs (new Backend)
//!     → handler relays one request/response over it
//!     → pool.rs release (bounded wait) or backend.rs close
//! ```
//!
//! # Design Decisions
//! - A single fixed origin; `Origin` is the seam for a resolver later
//! - Backends move by value, so one owner at a time is enforced by the type
//! - Any I/O failure on a checked-out backend closes it; it never goes back

pub mod backend;
pub mod origin;
pub mod pool;

pub use backend::{Backend, BackendId};
pub use origin::{DialError, Origin};
pub use pool::BackendPool;
