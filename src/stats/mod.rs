//! Response statistics.
//!
//! A placeholder for cache validation: for every relayed response the
//! handler records its declared size against the request path and echoes
//! the recorded value back in the `X-Bytes` response header.

pub mod table;

pub use table::StatsTable;
