//! Domain logic shared across the fleetmon workspace.
//!
//! This crate has zero internal dependencies so it can be used by the
//! persistence layer, the device client pool, the monitor, and any
//! future CLI tooling.

pub mod checksum;
pub mod device;
pub mod error;
pub mod health;
pub mod retry;
pub mod types;
