//! Fleet monitoring engine: device discovery, status polling, health
//! state derivation, and reconciliation into persistent storage.
//!
//! The object graph is wired explicitly at process start: a
//! [`DiscoveryOrchestrator`](discovery::DiscoveryOrchestrator) feeds a
//! [`MonitorService`](service::MonitorService), which polls devices
//! through the shared client pool and writes snapshots through
//! [`StatusSync`](sync::StatusSync). The
//! [`MonitorScheduler`](scheduler::MonitorScheduler) drives the two
//! periodic cycles.

pub mod config;
pub mod discovery;
pub mod scheduler;
pub mod service;
pub mod sync;
