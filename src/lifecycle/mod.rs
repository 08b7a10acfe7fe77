//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config (already loaded) → metrics → ProxyServer → bind listener → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - No draining: open client connections and checked-out backends are
//!   dropped with the process

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
