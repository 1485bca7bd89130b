//! Security Manager configuration

use super::constants::*;
use super::types::PairingFeatures;
use std::time::Duration;

/// Pairing configuration shared by every session of a manager
#[derive(Debug, Clone)]
pub struct SmpConfig {
    /// Features advertised in the outbound Pairing Request
    pub features: PairingFeatures,
    /// How long to wait for each expected packet from the peer
    pub timeout: Duration,
    /// How long to wait for a deferred passkey
    pub passkey_timeout: Duration,
    /// Send Pairing Failed when the peers negotiate OOB or LE Secure
    /// Connections instead of only dropping the session
    pub notify_unsupported: bool,
}

impl Default for SmpConfig {
    fn default() -> Self {
        Self {
            features: PairingFeatures::default(),
            timeout: Duration::from_millis(SMP_TIMEOUT_GENERAL),
            passkey_timeout: Duration::from_millis(SMP_TIMEOUT_PASSKEY),
            notify_unsupported: true,
        }
    }
}

impl SmpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_passkey_timeout(mut self, timeout: Duration) -> Self {
        self.passkey_timeout = timeout;
        self
    }
}
