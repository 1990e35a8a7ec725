//! Device status client library.
//!
//! Provides the two wire transports (REST, gRPC) behind a common
//! [`DeviceTransport`](transport::DeviceTransport) trait, plus the
//! [`DeviceClientPool`](pool::DeviceClientPool) that caches clients per
//! endpoint and negotiates which protocol each host supports.

pub mod grpc;
pub mod pool;
pub mod proto;
pub mod rest;
pub mod transport;
