//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, no admission limit)
//!     → connection.rs (client ID, live-connection tracking)
//!     → Hand off to proxy::handler
//! ```
//!
//! # Design Decisions
//! - Accept errors are transient: logged, then the loop continues
//! - Bind errors are fatal and returned to the caller

pub mod connection;
pub mod listener;

pub use connection::{ClientId, ClientSession, ClientTracker};
pub use listener::{Listener, ListenerError};
