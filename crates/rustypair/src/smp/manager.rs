//! Security Manager Protocol manager implementation
//!
//! This module provides the main interface for the SMP module: it owns one
//! pairing session per connected peer, routes link traffic to it, and
//! forwards session events to the application callback.
//!
//! Sessions never write to the link while the session table is locked.
//! Their PDUs go to a per-session outbox that is flushed to the link once
//! the lock is released, so a transport may deliver the peer's reply back
//! into the manager from inside [`Transport::write`].

use super::config::SmpConfig;
use super::crypto::CryptoProvider;
use super::keys::BondingStore;
use super::passkey::{DeferredPasskey, PasskeyProvider};
use super::session::PairingSession;
use super::types::*;
use crate::gap::{Address, BdAddr};
use crate::l2cap::{split_basic_frame, MemoryTransport, Transport, TransportError};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// A session together with the link its PDUs are flushed to
struct SessionSlot {
    session: PairingSession,
    outbox: Arc<MemoryTransport>,
    link: Arc<dyn Transport>,
}

/// PDUs to flush for one peer after the session lock is released
struct Outbound {
    remote: BdAddr,
    outbox: Arc<MemoryTransport>,
    link: Arc<dyn Transport>,
}

/// Type for SMP event callback
pub type SmpEventCallback = Arc<Mutex<dyn FnMut(SmpEvent) -> SmpResult<()> + Send + Sync>>;

/// Security Manager Protocol manager
pub struct SmpManager {
    /// Local identity used in every confirm computation
    local: Address,

    /// Pairing configuration applied to new sessions
    config: RwLock<SmpConfig>,

    /// Active pairing sessions
    sessions: RwLock<HashMap<BdAddr, SessionSlot>>,

    /// Event callback
    event_callback: Mutex<Option<SmpEventCallback>>,

    /// Passkey input for Passkey Entry pairings
    passkey_provider: RwLock<Arc<dyn PasskeyProvider>>,

    /// Bond storage shared by all sessions
    store: Arc<dyn BondingStore>,

    crypto: Arc<dyn CryptoProvider>,
}

impl SessionSlot {
    fn outbound(&self, remote: BdAddr) -> Outbound {
        Outbound {
            remote,
            outbox: self.outbox.clone(),
            link: self.link.clone(),
        }
    }
}

impl SmpManager {
    /// Create a new SMP manager
    pub fn new(
        local: Address,
        crypto: Arc<dyn CryptoProvider>,
        store: Arc<dyn BondingStore>,
    ) -> Self {
        Self {
            local,
            config: RwLock::new(SmpConfig::default()),
            sessions: RwLock::new(HashMap::new()),
            event_callback: Mutex::new(None),
            passkey_provider: RwLock::new(Arc::new(DeferredPasskey::new())),
            store,
            crypto,
        }
    }

    pub fn local_address(&self) -> Address {
        self.local
    }

    /// Set the event callback
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: FnMut(SmpEvent) -> SmpResult<()> + Send + Sync + 'static,
    {
        match self.event_callback.lock() {
            Ok(mut event_callback) => *event_callback = Some(Arc::new(Mutex::new(callback))),
            Err(_) => warn!("SMP event callback lock poisoned"),
        }
    }

    /// Set the passkey provider used by sessions started from now on
    pub fn set_passkey_provider(&self, provider: Arc<dyn PasskeyProvider>) -> SmpResult<()> {
        let mut passkey_provider = self
            .passkey_provider
            .write()
            .map_err(|_| SmpError::InvalidState)?;
        *passkey_provider = provider;
        Ok(())
    }

    /// Replace the configuration used by sessions started from now on
    pub fn set_config(&self, config: SmpConfig) -> SmpResult<()> {
        let mut current = self.config.write().map_err(|_| SmpError::InvalidState)?;
        *current = config;
        Ok(())
    }

    pub fn config(&self) -> SmpResult<SmpConfig> {
        let config = self.config.read().map_err(|_| SmpError::InvalidState)?;
        Ok(config.clone())
    }

    /// Start pairing with a newly connected peer.
    ///
    /// `transport` is the link to that peer. A peer with a live session is
    /// rejected; a finished session is replaced.
    pub fn initiate_pairing(&self, remote: Address, transport: Arc<dyn Transport>) -> SmpResult<()> {
        let config = self.config()?;
        let passkey = self
            .passkey_provider
            .read()
            .map_err(|_| SmpError::InvalidState)?
            .clone();

        let (result, events, outbound) = {
            let mut sessions = self.sessions.write().map_err(|_| SmpError::InvalidState)?;
            if let Some(existing) = sessions.get(&remote.addr) {
                if !existing.session.phase().is_terminal() {
                    return Err(SmpError::InvalidState);
                }
            }

            let outbox = Arc::new(MemoryTransport::new());
            let mut session = PairingSession::new(
                self.local,
                remote,
                config,
                outbox.clone(),
                self.crypto.clone(),
                self.store.clone(),
                passkey,
            );
            let result = session.start();
            let events = session.drain_events();
            let outbound = Outbound {
                remote: remote.addr,
                outbox: outbox.clone(),
                link: transport.clone(),
            };
            sessions.insert(
                remote.addr,
                SessionSlot {
                    session,
                    outbox,
                    link: transport,
                },
            );
            (result, events, outbound)
        };

        self.finish(result, events, vec![outbound])
    }

    /// Handle a buffer received from `remote` on the fixed channel
    /// `channel_id`. Channels other than SMP are ignored.
    pub fn handle_smp_packet(&self, remote: &BdAddr, channel_id: u16, data: &[u8]) -> SmpResult<()> {
        self.with_session(remote, |session| session.on_data(channel_id, data))
    }

    /// Handle a complete basic L2CAP frame received from `remote`
    pub fn handle_l2cap_frame(&self, remote: &BdAddr, frame: &[u8]) -> SmpResult<()> {
        let (channel_id, payload) = split_basic_frame(frame)?;
        self.handle_smp_packet(remote, channel_id, payload)
    }

    /// Supply the passkey a session asked for with `PasskeyRequested`
    pub fn provide_passkey(&self, remote: &BdAddr, passkey: Passkey) -> SmpResult<()> {
        self.with_session(remote, |session| session.provide_passkey(passkey))
    }

    /// Abort a pending passkey request
    pub fn cancel_passkey(&self, remote: &BdAddr) -> SmpResult<()> {
        self.with_session(remote, |session| session.cancel_passkey())
    }

    /// The link to `remote` went away; its session is dropped
    pub fn handle_disconnect(&self, remote: &BdAddr) -> SmpResult<()> {
        let events = {
            let mut sessions = self.sessions.write().map_err(|_| SmpError::InvalidState)?;
            let mut slot = sessions
                .remove(remote)
                .ok_or(SmpError::ConnectionNotFound)?;
            slot.session.on_stream_end();
            slot.session.drain_events()
        };

        self.notify_events(events);
        Ok(())
    }

    /// Fail every session whose awaited packet is overdue
    pub fn process_timeouts(&self) -> SmpResult<()> {
        self.expire_sessions(Instant::now())
    }

    /// Same as [`process_timeouts`](Self::process_timeouts) against an
    /// explicit clock reading
    pub fn expire_sessions(&self, now: Instant) -> SmpResult<()> {
        let mut events = Vec::new();
        let mut outbound = Vec::new();
        {
            let mut sessions = self.sessions.write().map_err(|_| SmpError::InvalidState)?;
            for (remote, slot) in sessions.iter_mut() {
                if slot.session.check_timeout(now) {
                    events.extend(slot.session.drain_events());
                    outbound.push(slot.outbound(*remote));
                }
            }
        }

        self.finish(Ok(()), events, outbound)
    }

    /// Current phase of the session with `remote`
    pub fn phase(&self, remote: &BdAddr) -> Option<PairingPhase> {
        let sessions = self.sessions.read().ok()?;
        sessions.get(remote).map(|slot| slot.session.phase())
    }

    /// Short-term key of a successful pairing with `remote`
    pub fn short_term_key(&self, remote: &BdAddr) -> Option<[u8; 16]> {
        let sessions = self.sessions.read().ok()?;
        sessions
            .get(remote)
            .and_then(|slot| slot.session.short_term_key())
    }

    /// Check if a device is bonded
    pub fn is_bonded(&self, remote: &BdAddr) -> SmpResult<bool> {
        Ok(self.store.lookup(remote)?.is_some())
    }

    /// Get all bonded devices
    pub fn bonded_devices(&self) -> SmpResult<Vec<BdAddr>> {
        Ok(self.store.addresses()?)
    }

    /// Forget the bond with a device; returns whether one existed
    pub fn remove_bond(&self, remote: &BdAddr) -> SmpResult<bool> {
        let removed = self.store.remove(remote)?;
        if removed {
            debug!("Removed bond with {}", remote);
        }
        Ok(removed)
    }

    fn with_session<F>(&self, remote: &BdAddr, op: F) -> SmpResult<()>
    where
        F: FnOnce(&mut PairingSession) -> SmpResult<()>,
    {
        let (result, events, outbound) = {
            let mut sessions = self.sessions.write().map_err(|_| SmpError::InvalidState)?;
            let slot = sessions
                .get_mut(remote)
                .ok_or(SmpError::ConnectionNotFound)?;
            let result = op(&mut slot.session);
            (result, slot.session.drain_events(), slot.outbound(*remote))
        };

        self.finish(result, events, vec![outbound])
    }

    /// Report events, then flush queued PDUs. A link that refuses a PDU
    /// fails the session it belongs to.
    fn finish(
        &self,
        mut result: SmpResult<()>,
        events: Vec<SmpEvent>,
        outbound: Vec<Outbound>,
    ) -> SmpResult<()> {
        self.notify_events(events);

        for pending in outbound {
            while let Some((channel_id, pdu)) = pending.outbox.pop_sent() {
                if let Err(err) = pending.link.write(channel_id, &pdu) {
                    warn!("Write to {} failed: {}", pending.remote, err);
                    let failed = self.fail_link(&pending, err.clone());
                    self.notify_events(failed);
                    if result.is_ok() {
                        result = Err(SmpError::Transport(err));
                    }
                    break;
                }
            }
        }

        result
    }

    fn fail_link(&self, pending: &Outbound, err: TransportError) -> Vec<SmpEvent> {
        // Anything still queued would go to the same dead link
        pending.outbox.take_sent();

        let mut sessions = match self.sessions.write() {
            Ok(sessions) => sessions,
            Err(_) => return Vec::new(),
        };
        match sessions.get_mut(&pending.remote) {
            Some(slot) if Arc::ptr_eq(&slot.outbox, &pending.outbox) => {
                slot.session.on_transport_error(err);
                slot.outbox.take_sent();
                slot.session.drain_events()
            }
            _ => Vec::new(),
        }
    }

    // Runs without the session lock held so the callback may call back in
    fn notify_events(&self, events: Vec<SmpEvent>) {
        if events.is_empty() {
            return;
        }

        let callback = match self.event_callback.lock() {
            Ok(event_callback) => event_callback.clone(),
            Err(_) => {
                warn!("SMP event callback lock poisoned, dropping events");
                return;
            }
        };

        let Some(callback) = callback else {
            debug!("No SMP event callback, dropping {} events", events.len());
            return;
        };

        for event in events {
            let mut callback = match callback.lock() {
                Ok(callback) => callback,
                Err(_) => {
                    warn!("SMP event callback poisoned");
                    return;
                }
            };
            if let Err(err) = (*callback)(event) {
                warn!("SMP event callback failed: {}", err);
            }
        }
    }
}
