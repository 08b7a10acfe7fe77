//! Per-client connection handler.
//!
//! # States
//! ```text
//! ReadingRequest → AcquiringBackend → Forwarding → ReadingResponse
//!     → RelayingResponse → Continue (back to ReadingRequest) | Terminate
//! ```
//!
//! # Failure policy
//! - Client EOF between requests: clean termination
//! - Client read/parse error: log, terminate
//! - No idle backend and the dial fails: terminate, nothing written back
//! - Backend write or response read failure: close the backend, terminate
//! - Client write failure: terminate; the backend is still released
//! - Origin mandates close: close the backend, terminate after the response
//!
//! Nothing is retried and no error response is synthesized.

use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::http::{codec, compat, Limits, ProxyRequest};
use crate::observability::metrics;
use crate::stats::StatsTable;
use crate::upstream::{Backend, BackendPool};

/// Shared services handed to every connection task.
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub pool: Arc<BackendPool>,
    pub stats: Arc<StatsTable>,
    pub limits: Limits,
}

/// What the handler does after one request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Continue,
    Terminate,
}

/// Serve one client connection until it closes or a cycle fails.
///
/// Requests on the connection are handled strictly one at a time.
pub async fn handle_connection<S>(stream: S, state: ProxyState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut client_writer) = tokio::io::split(stream);
    let mut client_reader = BufReader::new(read_half);

    while relay_once(&mut client_reader, &mut client_writer, &state).await == Cycle::Continue {}

    let _ = client_writer.shutdown().await;
}

async fn relay_once<R, W>(client_reader: &mut R, client_writer: &mut W, state: &ProxyState) -> Cycle
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // ReadingRequest
    let request = match codec::read_request(client_reader, state.limits).await {
        Ok(request) => request,
        Err(e) if e.is_eof() => {
            tracing::debug!("Client closed connection");
            return Cycle::Terminate;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request");
            return Cycle::Terminate;
        }
    };
    let start = Instant::now();
    tracing::trace!(path = %request.path(), "Request received");

    // AcquiringBackend
    let mut backend = match state.pool.acquire().await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(path = %request.path(), error = %e, "No backend available, dropping request");
            return Cycle::Terminate;
        }
    };

    // Forwarding
    if let Err(e) = forward(&mut backend, &request).await {
        tracing::warn!(backend_id = %backend.id(), error = %e, "Failed to forward request");
        backend.close("write_failed").await;
        return Cycle::Terminate;
    }

    // ReadingResponse
    let mut response =
        match codec::read_response(&mut backend.reader, &request.method, state.limits).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(backend_id = %backend.id(), error = %e, "Failed to read response");
                backend.close("read_failed").await;
                return Cycle::Terminate;
            }
        };
    // Decided before normalization, which may add a client-side close.
    let backend_reusable = !response.close;

    // RelayingResponse
    let recorded = state.stats.update(request.path(), response.content_length);
    response.set_recorded_bytes(recorded);
    compat::normalize(&mut response, &request);

    let written = async {
        codec::write_response(client_writer, &response).await?;
        client_writer.flush().await
    }
    .await;
    metrics::record_request(response.status.as_u16(), start);

    let mut next = match written {
        Ok(()) => {
            tracing::info!(path = %request.path(), status = response.status.as_u16(), "proxied");
            tracing::debug!(
                method = %request.method,
                target = %request.target,
                version = ?request.version,
                headers = ?request.headers,
                "Request head"
            );
            Cycle::Continue
        }
        Err(e) => {
            tracing::warn!(path = %request.path(), error = %e, "Failed to write response");
            Cycle::Terminate
        }
    };
    if response.close {
        next = Cycle::Terminate;
    }

    // Decision
    if backend_reusable {
        state.pool.release_in_background(backend);
    } else {
        backend.close("response_close").await;
    }
    next
}

async fn forward(backend: &mut Backend, request: &ProxyRequest) -> std::io::Result<()> {
    codec::write_request(&mut backend.writer, request).await?;
    backend.writer.flush().await
}
