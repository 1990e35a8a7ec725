//! REST transport: `GET {base_url}/v1/device/status` via [`reqwest`].

use async_trait::async_trait;

use fleetmon_core::device::StatusReport;

use crate::transport::{DeviceTransport, TransportError};

/// HTTP client for a single device endpoint.
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl RestTransport {
    /// Create a transport for a device's HTTP base URL, reusing an
    /// existing [`reqwest::Client`] for connection pooling.
    ///
    /// Trailing slashes are stripped so equivalent URLs share one
    /// cache entry in the pool.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Normalized base URL (e.g. `http://dev-1:3000`).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DeviceTransport for RestTransport {
    async fn fetch_status(&self) -> Result<StatusReport, TransportError> {
        let response = self
            .client
            .get(format!("{}/v1/device/status", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<StatusReport>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_normalized() {
        let client = reqwest::Client::new();
        let transport = RestTransport::new(client, "http://dev-1:3000//");
        assert_eq!(transport.base_url(), "http://dev-1:3000");
    }
}
