//! Protocol-negotiating device client pool.
//!
//! Caches one transport client per (protocol, endpoint) so repeated
//! polls reuse connections, and remembers per host whether gRPC (the
//! preferred protocol) ever answered. Hosts that fail their first gRPC
//! probe are polled over REST from then on; hosts with known gRPC
//! support fall back to REST per-call on transient failures without
//! losing the capability flag.
//!
//! Both caches live for the process lifetime only. Re-probing on
//! restart is a soft cost, not a correctness issue.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use fleetmon_core::device::StatusReport;

use crate::grpc::GrpcTransport;
use crate::rest::RestTransport;
use crate::transport::{DeviceTransport, TransportError};

// ---------------------------------------------------------------------------
// Transport factory
// ---------------------------------------------------------------------------

/// Which wire protocol a client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Grpc,
    Rest,
}

impl TransportKind {
    /// Cache-key prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Grpc => "grpc",
            TransportKind::Rest => "rest",
        }
    }
}

/// Creates transport clients for the pool. The seam exists so tests can
/// substitute scripted transports for real network clients.
pub trait TransportFactory: Send + Sync {
    /// Build a client for reaching `host` over the given protocol.
    fn create(
        &self,
        kind: TransportKind,
        host: &str,
    ) -> Result<Arc<dyn DeviceTransport>, TransportError>;
}

/// Production factory: real gRPC and REST clients on configured ports.
pub struct DefaultTransportFactory {
    http_client: reqwest::Client,
    grpc_port: u16,
    rest_port: u16,
}

impl DefaultTransportFactory {
    pub fn new(grpc_port: u16, rest_port: u16) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            grpc_port,
            rest_port,
        }
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn create(
        &self,
        kind: TransportKind,
        host: &str,
    ) -> Result<Arc<dyn DeviceTransport>, TransportError> {
        match kind {
            TransportKind::Grpc => {
                let url = format!("http://{}", authority(host, self.grpc_port));
                Ok(Arc::new(GrpcTransport::new(&url)?))
            }
            TransportKind::Rest => {
                let base_url = format!("http://{}", authority(host, self.rest_port));
                Ok(Arc::new(RestTransport::new(
                    self.http_client.clone(),
                    &base_url,
                )))
            }
        }
    }
}

/// Dial authority for a host. Port-scan discovery produces hosts that
/// already name their port (`127.0.0.1:3005`); those are used verbatim,
/// bare hostnames get the configured default port.
fn authority(host: &str, default_port: u16) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:{default_port}")
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Client cache plus per-host capability memory.
///
/// Created once at startup and shared via `Arc`. Both internal maps are
/// unbounded; fleet size is small and stable, so no eviction is needed.
pub struct DeviceClientPool {
    factory: Arc<dyn TransportFactory>,
    clients: RwLock<HashMap<String, Arc<dyn DeviceTransport>>>,
    grpc_support_by_host: RwLock<HashMap<String, bool>>,
}

impl DeviceClientPool {
    /// Create a pool with real transports on the given device ports.
    pub fn new(grpc_port: u16, rest_port: u16) -> Self {
        Self::with_factory(Arc::new(DefaultTransportFactory::new(grpc_port, rest_port)))
    }

    /// Create a pool with a custom transport factory.
    pub fn with_factory(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
            grpc_support_by_host: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a status report from `host`, negotiating the protocol.
    ///
    /// gRPC is attempted first unless the host is already known not to
    /// support it; REST is the fallback. The first probe's outcome is
    /// cached per host, and a transient gRPC failure on a known-capable
    /// host falls back for that call only.
    pub async fn get_status_for_endpoint(
        &self,
        host: &str,
    ) -> Result<StatusReport, TransportError> {
        let grpc_supported = self.grpc_support_by_host.read().await.get(host).copied();

        if grpc_supported != Some(false) {
            match self.get_status(TransportKind::Grpc, host).await {
                Ok(report) => {
                    if grpc_supported.is_none() {
                        self.set_grpc_support(host, true).await;
                        tracing::debug!(host, "Detected gRPC support");
                    }
                    tracing::debug!(host, "Polled device via gRPC");
                    return Ok(report);
                }
                Err(e) => {
                    if grpc_supported.is_none() {
                        self.set_grpc_support(host, false).await;
                        tracing::debug!(host, "No gRPC support, falling back to REST");
                    } else {
                        tracing::warn!(
                            host,
                            error = %e,
                            "gRPC polling failed, falling back to REST",
                        );
                    }
                }
            }
        }

        let report = self.get_status(TransportKind::Rest, host).await?;
        tracing::debug!(host, "Polled device via REST");
        Ok(report)
    }

    /// Cached gRPC capability for a host; `None` until first probe.
    pub async fn grpc_support(&self, host: &str) -> Option<bool> {
        self.grpc_support_by_host.read().await.get(host).copied()
    }

    /// Drop all cached clients. Capability memory is kept.
    pub async fn clear(&self) {
        self.clients.write().await.clear();
    }

    async fn get_status(
        &self,
        kind: TransportKind,
        host: &str,
    ) -> Result<StatusReport, TransportError> {
        let client = self.get_or_create_client(kind, host).await?;
        client.fetch_status().await
    }

    async fn get_or_create_client(
        &self,
        kind: TransportKind,
        host: &str,
    ) -> Result<Arc<dyn DeviceTransport>, TransportError> {
        let key = format!("{}:{host}", kind.as_str());

        if let Some(existing) = self.clients.read().await.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let client = self.factory.create(kind, host)?;
        self.clients
            .write()
            .await
            .insert(key, Arc::clone(&client));
        Ok(client)
    }

    async fn set_grpc_support(&self, host: &str, supported: bool) {
        self.grpc_support_by_host
            .write()
            .await
            .insert(host.to_string(), supported);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use fleetmon_core::device::DeviceState;

    fn sample_report(via: &str) -> StatusReport {
        StatusReport {
            mac: "AA:BB".into(),
            name: via.into(),
            model: "UDM-Pro".into(),
            shortname: "udm".into(),
            ip: "10.0.0.2".into(),
            product_line: "network".into(),
            state: DeviceState::Online,
            version: "4.1.13".into(),
            firmware_status: "upToDate".into(),
            update_available: None,
            is_console: true,
            is_managed: false,
            startup_time: "2024-06-01T08:30:00.000Z".into(),
            adoption_time: None,
            checksum: "abc123".into(),
        }
    }

    /// Transport that follows a success/failure script, repeating the
    /// last entry once the script is exhausted.
    struct ScriptedTransport {
        label: &'static str,
        script: Mutex<Vec<bool>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(label: &'static str, script: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                label,
                script: Mutex::new(script.to_vec()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DeviceTransport for ScriptedTransport {
        async fn fetch_status(&self) -> Result<StatusReport, TransportError> {
            let mut script = self.script.lock().unwrap();
            let ok = if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().copied().unwrap_or(false)
            };
            self.calls.fetch_add(1, Ordering::SeqCst);

            if ok {
                Ok(sample_report(self.label))
            } else {
                Err(TransportError::InvalidEndpoint("scripted failure".into()))
            }
        }
    }

    struct MockFactory {
        grpc: Arc<ScriptedTransport>,
        rest: Arc<ScriptedTransport>,
        creates: AtomicU32,
    }

    impl TransportFactory for MockFactory {
        fn create(
            &self,
            kind: TransportKind,
            _host: &str,
        ) -> Result<Arc<dyn DeviceTransport>, TransportError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(match kind {
                TransportKind::Grpc => Arc::clone(&self.grpc) as Arc<dyn DeviceTransport>,
                TransportKind::Rest => Arc::clone(&self.rest) as Arc<dyn DeviceTransport>,
            })
        }
    }

    fn pool_with(
        grpc_script: &[bool],
        rest_script: &[bool],
    ) -> (DeviceClientPool, Arc<ScriptedTransport>, Arc<ScriptedTransport>) {
        let grpc = ScriptedTransport::new("grpc", grpc_script);
        let rest = ScriptedTransport::new("rest", rest_script);
        let factory = Arc::new(MockFactory {
            grpc: Arc::clone(&grpc),
            rest: Arc::clone(&rest),
            creates: AtomicU32::new(0),
        });
        (DeviceClientPool::with_factory(factory), grpc, rest)
    }

    #[test]
    fn bare_host_gets_the_default_port() {
        assert_eq!(authority("dev-1", 50051), "dev-1:50051");
    }

    #[test]
    fn host_with_explicit_port_is_used_verbatim() {
        assert_eq!(authority("127.0.0.1:3005", 50051), "127.0.0.1:3005");
        assert_eq!(authority("127.0.0.1:3005", 3000), "127.0.0.1:3005");
    }

    #[tokio::test]
    async fn grpc_success_caches_capability_true() {
        let (pool, grpc, rest) = pool_with(&[true], &[true]);

        let report = pool.get_status_for_endpoint("dev-1").await.unwrap();
        assert_eq!(report.name, "grpc");
        assert_eq!(pool.grpc_support("dev-1").await, Some(true));
        assert_eq!(grpc.calls(), 1);
        assert_eq!(rest.calls(), 0);
    }

    #[tokio::test]
    async fn first_grpc_failure_caches_incapability_and_falls_back() {
        let (pool, grpc, rest) = pool_with(&[false], &[true]);

        let report = pool.get_status_for_endpoint("dev-1").await.unwrap();
        assert_eq!(report.name, "rest");
        assert_eq!(pool.grpc_support("dev-1").await, Some(false));
        assert_eq!(grpc.calls(), 1);
        assert_eq!(rest.calls(), 1);
    }

    #[tokio::test]
    async fn cached_incapability_skips_grpc_entirely() {
        let (pool, grpc, rest) = pool_with(&[false], &[true]);

        pool.get_status_for_endpoint("dev-1").await.unwrap();
        pool.get_status_for_endpoint("dev-1").await.unwrap();

        // gRPC was probed exactly once; the second call went straight to REST.
        assert_eq!(grpc.calls(), 1);
        assert_eq!(rest.calls(), 2);
    }

    #[tokio::test]
    async fn transient_grpc_failure_does_not_reset_capability() {
        // First call succeeds over gRPC, second fails transiently.
        let (pool, grpc, rest) = pool_with(&[true, false, true], &[true]);

        pool.get_status_for_endpoint("dev-1").await.unwrap();
        assert_eq!(pool.grpc_support("dev-1").await, Some(true));

        let report = pool.get_status_for_endpoint("dev-1").await.unwrap();
        assert_eq!(report.name, "rest");
        // Capability stays true: the next call tries gRPC again.
        assert_eq!(pool.grpc_support("dev-1").await, Some(true));

        let report = pool.get_status_for_endpoint("dev-1").await.unwrap();
        assert_eq!(report.name, "grpc");
        assert_eq!(grpc.calls(), 3);
        assert_eq!(rest.calls(), 1);
    }

    #[tokio::test]
    async fn both_transports_failing_returns_error() {
        let (pool, _grpc, _rest) = pool_with(&[false], &[false]);

        let result = pool.get_status_for_endpoint("dev-1").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn clients_are_cached_per_endpoint() {
        let grpc = ScriptedTransport::new("grpc", &[true]);
        let rest = ScriptedTransport::new("rest", &[true]);
        let factory = Arc::new(MockFactory {
            grpc,
            rest,
            creates: AtomicU32::new(0),
        });
        let pool = DeviceClientPool::with_factory(Arc::clone(&factory) as Arc<dyn TransportFactory>);

        pool.get_status_for_endpoint("dev-1").await.unwrap();
        pool.get_status_for_endpoint("dev-1").await.unwrap();
        pool.get_status_for_endpoint("dev-1").await.unwrap();

        // One gRPC client for dev-1, created once.
        assert_eq!(factory.creates.load(Ordering::SeqCst), 1);
    }
}
