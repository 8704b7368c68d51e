//! reqwest-backed transport
//!
//! One pooled client shared by every download. `shutdown()` drops the
//! client; in-flight requests finish on their own handle, later requests
//! fail with [`TransportError::Closed`].

use std::time::Duration;

use futures_util::future::BoxFuture;
use log::info;
use parking_lot::RwLock;

use super::{Response, Transport, TransportError};
use crate::constants::{CONNECT_TIMEOUT_SECS, POOL_HEADROOM, REQUEST_TIMEOUT_SECS, USER_AGENT};

pub struct HttpTransport {
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    /// Build a client sized for `max_concurrent` simultaneous downloads
    pub fn new(max_concurrent: usize) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(max_concurrent + POOL_HEADROOM)
            .build()
            .map_err(map_error)?;

        Ok(Self {
            client: RwLock::new(Some(client)),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.client.read().is_none()
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            // Client is a cheap handle; the lock is never held across await
            let client = self.client.read().clone();
            let client = client.ok_or(TransportError::Closed)?;

            let response = client.get(url).send().await.map_err(map_error)?;
            let status = response.status().as_u16();
            if !response.status().is_success() {
                return Ok(Response {
                    status,
                    body: Vec::new(),
                });
            }

            let body = response.bytes().await.map_err(map_error)?;
            Ok(Response {
                status,
                body: body.to_vec(),
            })
        })
    }

    fn shutdown(&self) {
        if self.client.write().take().is_some() {
            info!("HTTP transport shut down");
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_without_requests() {
        let transport = HttpTransport::new(4).unwrap();
        assert!(!transport.is_closed());
        transport.shutdown();
        transport.shutdown();
        assert!(transport.is_closed());

        let result = transport.get("https://example.invalid/x.png").await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
