//! Origin server dialing.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::OriginConfig;
use crate::upstream::backend::Backend;

/// Error type for origin dials.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid origin address {0:?}")]
    InvalidAddress(String),
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("connect to {addr} timed out after {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },
}

/// The single upstream server every request is relayed to.
#[derive(Debug, Clone)]
pub struct Origin {
    addr: SocketAddr,
    connect_timeout: Duration,
}

impl Origin {
    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &OriginConfig) -> Result<Self, DialError> {
        let addr = config
            .address
            .parse()
            .map_err(|_| DialError::InvalidAddress(config.address.clone()))?;
        Ok(Self::new(addr, config.connect_timeout()))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Open one new connection. Never retries.
    pub async fn dial(&self) -> Result<Backend, DialError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| DialError::Timeout {
                addr: self.addr,
                timeout: self.connect_timeout,
            })?
            .map_err(|source| DialError::Connect {
                addr: self.addr,
                source,
            })?;

        let backend = Backend::new(stream, self.addr);
        tracing::debug!(backend_id = %backend.id(), origin = %self.addr, "Dialed origin");
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn from_config_rejects_bad_address() {
        let config = OriginConfig {
            address: "origin.invalid".into(),
            connect_timeout_ms: 100,
        };
        assert!(matches!(
            Origin::from_config(&config),
            Err(DialError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn dial_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let origin = Origin::new(addr, Duration::from_secs(1));
        let err = origin.dial().await.unwrap_err();
        assert!(matches!(err, DialError::Connect { .. }));
    }

    #[tokio::test]
    async fn dial_gives_fresh_backends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = Origin::new(listener.local_addr().unwrap(), Duration::from_secs(1));

        let a = origin.dial().await.unwrap();
        let b = origin.dial().await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.peer_addr(), origin.addr());
    }
}
