//! Passkey input for the Passkey Entry association model

use super::types::*;
use crate::gap::BdAddr;
use log::debug;
use std::sync::Mutex;

/// Answer of a passkey provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasskeyReply {
    /// The passkey is known right away
    Ready(Passkey),
    /// The passkey will be supplied later through `provide_passkey`
    Deferred,
}

/// Source of the passkey typed by the user.
///
/// A session asks once per Passkey Entry pairing. Returning an error fails
/// the pairing with [`SmpError::PasskeyEntryFailed`] semantics.
pub trait PasskeyProvider: Send + Sync {
    fn request_passkey(&self, peer: &BdAddr) -> SmpResult<PasskeyReply>;

    /// A deferred passkey for `peer` was supplied to its session
    fn completed(&self, _peer: &BdAddr) {}

    /// The session waiting for `peer` went away before a passkey arrived
    fn cancel(&self, _peer: &BdAddr) {}
}

/// Provider answering every request with the same passkey
#[derive(Debug, Clone, Copy)]
pub struct FixedPasskey(Passkey);

impl FixedPasskey {
    pub fn new(passkey: Passkey) -> Self {
        Self(passkey)
    }
}

impl PasskeyProvider for FixedPasskey {
    fn request_passkey(&self, _peer: &BdAddr) -> SmpResult<PasskeyReply> {
        Ok(PasskeyReply::Ready(self.0))
    }
}

/// Provider that always defers, for hosts collecting the passkey
/// asynchronously (a UI prompt, a socket, ...).
///
/// It remembers which peers are waiting so the host can tell whether a
/// prompt is still wanted.
#[derive(Debug, Default)]
pub struct DeferredPasskey {
    pending: Mutex<Vec<BdAddr>>,
}

impl DeferredPasskey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peers currently waiting for passkey input
    pub fn pending(&self) -> Vec<BdAddr> {
        match self.pending.lock() {
            Ok(pending) => pending.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Mark the request for `peer` as answered
    pub fn complete(&self, peer: &BdAddr) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|addr| addr != peer);
        }
    }
}

impl PasskeyProvider for DeferredPasskey {
    fn request_passkey(&self, peer: &BdAddr) -> SmpResult<PasskeyReply> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| SmpError::PasskeyEntryFailed("passkey provider poisoned".into()))?;
        if !pending.contains(peer) {
            pending.push(*peer);
        }
        Ok(PasskeyReply::Deferred)
    }

    fn completed(&self, peer: &BdAddr) {
        self.complete(peer);
    }

    fn cancel(&self, peer: &BdAddr) {
        debug!("Passkey request for {} cancelled", peer);
        self.complete(peer);
    }
}
