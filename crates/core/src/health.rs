//! Health state derivation from consecutive poll failures.
//!
//! This lives in `core` so the monitor and any future tooling agree on
//! the thresholds.

use crate::device::DeviceState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// A device with up to this many consecutive failures is `degraded`;
/// one more pushes it to `offline`.
pub const DEGRADED_FAILURE_THRESHOLD: u32 = 2;

/// Maximum poll attempts per cycle before a failure is counted.
pub const POLL_MAX_ATTEMPTS: u32 = 3;

/// Backoff schedule between poll attempts, in milliseconds.
pub const POLL_RETRY_DELAYS_MS: [u64; 3] = [1_000, 2_000, 3_000];

// ---------------------------------------------------------------------------
// State derivation
// ---------------------------------------------------------------------------

/// Derive the authoritative state of a *discoverable* device from its
/// consecutive-failure count.
///
/// Zero failures means the most recent poll succeeded. Undiscoverable
/// devices are `unknown` and never reach this function.
pub fn state_for_failures(consecutive_failures: u32) -> DeviceState {
    if consecutive_failures == 0 {
        DeviceState::Online
    } else if consecutive_failures <= DEGRADED_FAILURE_THRESHOLD {
        DeviceState::Degraded
    } else {
        DeviceState::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_failures_is_online() {
        assert_eq!(state_for_failures(0), DeviceState::Online);
    }

    #[test]
    fn one_failure_is_degraded() {
        assert_eq!(state_for_failures(1), DeviceState::Degraded);
    }

    #[test]
    fn two_failures_is_still_degraded() {
        assert_eq!(state_for_failures(2), DeviceState::Degraded);
    }

    #[test]
    fn three_failures_is_offline() {
        assert_eq!(state_for_failures(3), DeviceState::Offline);
    }

    #[test]
    fn failures_beyond_threshold_stay_offline() {
        assert_eq!(state_for_failures(10), DeviceState::Offline);
    }
}
