//! Transport contract shared by the REST and gRPC clients.

use async_trait::async_trait;

use fleetmon_core::device::StatusReport;

/// One wire protocol implementation for fetching a status report from
/// a single endpoint.
///
/// Implementations hold their endpoint configuration; `fetch_status`
/// takes no arguments so the pool can cache one instance per endpoint.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Fetch the current status report from the endpoint.
    async fn fetch_status(&self) -> Result<StatusReport, TransportError>;
}

/// Errors from either transport: network failure, non-success response,
/// or decode failure. Always recoverable via retry or fallback.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The REST endpoint returned a non-2xx status code.
    #[error("Status endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The RPC call failed (connection or non-OK gRPC status).
    #[error("RPC call failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// The endpoint address could not be parsed.
    #[error("Invalid endpoint address: {0}")]
    InvalidEndpoint(String),
}
