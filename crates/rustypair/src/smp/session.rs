//! LE Legacy pairing session
//!
//! One [`PairingSession`] drives the pairing of the local device, acting as
//! initiator, with one connected peer. The session is fed inbound SMP PDUs
//! in link order and writes its own PDUs through the link's [`Transport`].
//! Every outcome is queued as an [`SmpEvent`] and handed out exactly once by
//! [`PairingSession::poll_event`].
//!
//! ```text
//! Idle -> RequestSent -> [ResponseReceived] -> ConfirmSent -> RandomExchanged -> Succeeded
//!   \                                                                            |
//!    `-> AlreadyBonded                      Encryption Information, Master Identification
//! ```
//!
//! Any failure moves the session to `Failed`; a dropped link moves it to
//! `Ended`. Both are final.

use super::config::SmpConfig;
use super::constants::*;
use super::crypto::CryptoProvider;
use super::keys::{BondingRecord, BondingStore};
use super::packet::SmpCommand;
use super::passkey::{PasskeyProvider, PasskeyReply};
use super::resolver::resolve_exchange;
use super::types::*;
use crate::gap::{Address, BdAddr};
use crate::l2cap::{Transport, TransportError};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

type Pdu = [u8; SMP_PAIRING_FEATURES_LEN];

/// Outcome of the feature exchange, fixed for the rest of the session
#[derive(Debug, Clone, Copy)]
struct Exchange {
    preq: Pdu,
    pres: Pdu,
    method: AuthenticationMethod,
    /// Keys the responder agreed to distribute
    responder_keys: KeyDistribution,
}

#[derive(Debug, Clone, Copy)]
enum SessionState {
    Idle,
    RequestSent {
        preq: Pdu,
    },
    AwaitingPasskey {
        exchange: Exchange,
    },
    ConfirmSent {
        exchange: Exchange,
        tk: [u8; 16],
        local_random: [u8; 16],
    },
    RandomExchanged {
        exchange: Exchange,
        tk: [u8; 16],
        local_random: [u8; 16],
        peer_confirm: [u8; 16],
    },
    Succeeded {
        method: AuthenticationMethod,
        stk: [u8; 16],
        /// Keys the responder agreed to distribute
        responder_keys: KeyDistribution,
        ltk: Option<[u8; 16]>,
        bonded: bool,
    },
    AlreadyBonded(BondingRecord),
    Failed,
    Ended,
}

impl SessionState {
    fn phase(&self) -> PairingPhase {
        match self {
            SessionState::Idle => PairingPhase::Idle,
            SessionState::RequestSent { .. } => PairingPhase::RequestSent,
            SessionState::AwaitingPasskey { .. } => PairingPhase::ResponseReceived,
            SessionState::ConfirmSent { .. } => PairingPhase::ConfirmSent,
            SessionState::RandomExchanged { .. } => PairingPhase::RandomExchanged,
            SessionState::Succeeded { .. } => PairingPhase::Succeeded,
            SessionState::AlreadyBonded(_) => PairingPhase::AlreadyBonded,
            SessionState::Failed => PairingPhase::Failed,
            SessionState::Ended => PairingPhase::Ended,
        }
    }
}

/// Pairing state machine for one peer
pub struct PairingSession {
    local: Address,
    remote: Address,
    config: SmpConfig,
    transport: Arc<dyn Transport>,
    crypto: Arc<dyn CryptoProvider>,
    store: Arc<dyn BondingStore>,
    passkey: Arc<dyn PasskeyProvider>,
    state: SessionState,
    /// When the packet or input currently waited for is overdue
    deadline: Option<Instant>,
    events: VecDeque<SmpEvent>,
}

impl PairingSession {
    pub fn new(
        local: Address,
        remote: Address,
        config: SmpConfig,
        transport: Arc<dyn Transport>,
        crypto: Arc<dyn CryptoProvider>,
        store: Arc<dyn BondingStore>,
        passkey: Arc<dyn PasskeyProvider>,
    ) -> Self {
        Self {
            local,
            remote,
            config,
            transport,
            crypto,
            store,
            passkey,
            state: SessionState::Idle,
            deadline: None,
            events: VecDeque::new(),
        }
    }

    pub fn local(&self) -> Address {
        self.local
    }

    pub fn remote(&self) -> Address {
        self.remote
    }

    pub fn phase(&self) -> PairingPhase {
        self.state.phase()
    }

    /// Authentication method, once the feature exchange resolved one
    pub fn method(&self) -> Option<AuthenticationMethod> {
        match &self.state {
            SessionState::AwaitingPasskey { exchange }
            | SessionState::ConfirmSent { exchange, .. }
            | SessionState::RandomExchanged { exchange, .. } => Some(exchange.method),
            SessionState::Succeeded { method, .. } => Some(*method),
            _ => None,
        }
    }

    /// Short-term key, only available after the confirm check passed
    pub fn short_term_key(&self) -> Option<[u8; 16]> {
        match &self.state {
            SessionState::Succeeded { stk, .. } => Some(*stk),
            _ => None,
        }
    }

    /// Whether the peer's long-term key has been persisted
    pub fn is_bonded(&self) -> bool {
        matches!(
            self.state,
            SessionState::Succeeded { bonded: true, .. } | SessionState::AlreadyBonded(_)
        )
    }

    /// Bond found in the store when the session started
    pub fn existing_bond(&self) -> Option<BondingRecord> {
        match &self.state {
            SessionState::AlreadyBonded(record) => Some(*record),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Next undelivered event
    pub fn poll_event(&mut self) -> Option<SmpEvent> {
        self.events.pop_front()
    }

    /// Every undelivered event, oldest first
    pub fn drain_events(&mut self) -> Vec<SmpEvent> {
        self.events.drain(..).collect()
    }

    /// Begin pairing.
    ///
    /// A peer with a stored bond short-circuits to `AlreadyBonded` without
    /// any traffic; otherwise the Pairing Request goes out.
    pub fn start(&mut self) -> SmpResult<()> {
        if !matches!(self.state, SessionState::Idle) {
            return Err(SmpError::InvalidState);
        }

        let existing = match self.store.lookup(&self.remote.addr) {
            Ok(existing) => existing,
            Err(err) => return Err(self.fail(SmpError::Storage(err))),
        };

        if let Some(record) = existing {
            info!("{} is already bonded, skipping pairing", self.remote);
            self.state = SessionState::AlreadyBonded(record);
            self.emit(SmpEvent::BondingInfoFound(self.remote.addr, record));
            return Ok(());
        }

        let preq = self.config.features.to_pdu(SMP_PAIRING_REQUEST);
        if let Err(err) = self.send_pdu(&preq) {
            return Err(self.fail(err));
        }

        debug!("Pairing request sent to {}", self.remote);
        self.state = SessionState::RequestSent { preq };
        self.arm_deadline();
        Ok(())
    }

    /// Handle a buffer received on the fixed channel `channel_id`.
    ///
    /// Traffic for other channels is ignored, as is anything arriving once
    /// the session is over. An `Err` means this packet failed the session;
    /// the same error is queued as [`SmpEvent::PairingFailed`].
    pub fn on_data(&mut self, channel_id: u16, data: &[u8]) -> SmpResult<()> {
        if channel_id != SMP_CID {
            trace!(
                "Ignoring {} bytes on channel 0x{:04x} from {}",
                data.len(),
                channel_id,
                self.remote
            );
            return Ok(());
        }

        if self.phase().is_terminal() {
            debug!(
                "Dropping SMP packet from {} while {}",
                self.remote,
                self.phase()
            );
            return Ok(());
        }

        log_pdu("RX", &self.remote.addr, data);

        match self.dispatch(data) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Continue a pairing that is waiting for deferred passkey input
    pub fn provide_passkey(&mut self, passkey: Passkey) -> SmpResult<()> {
        let exchange = match self.state {
            SessionState::AwaitingPasskey { exchange } => exchange,
            _ => return Err(SmpError::InvalidState),
        };

        debug!("Passkey supplied for {}", self.remote);
        self.passkey.completed(&self.remote.addr);
        match self.send_confirm(exchange, passkey.to_tk()) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Abort a pairing that is waiting for passkey input, e.g. the user
    /// dismissed the prompt
    pub fn cancel_passkey(&mut self) -> SmpResult<()> {
        if !matches!(self.state, SessionState::AwaitingPasskey { .. }) {
            return Err(SmpError::InvalidState);
        }

        self.fail(SmpError::PasskeyEntryFailed(
            "passkey entry cancelled".into(),
        ));
        Ok(())
    }

    /// The link carrying the session went away
    pub fn on_stream_end(&mut self) {
        if matches!(self.state, SessionState::Ended) {
            return;
        }

        if matches!(self.state, SessionState::AwaitingPasskey { .. }) {
            self.passkey.cancel(&self.remote.addr);
        }

        debug!("SMP session with {} ended while {}", self.remote, self.phase());
        self.state = SessionState::Ended;
        self.deadline = None;
        self.emit(SmpEvent::SessionEnded(self.remote.addr));
    }

    /// The link refused a PDU this session had already handed over
    pub fn on_transport_error(&mut self, err: TransportError) {
        self.fail(SmpError::Transport(err));
    }

    /// Fail the session if the awaited packet or input is overdue at `now`.
    /// Returns whether the session timed out.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline && !self.phase().is_terminal() => {
                warn!("SMP timeout with {} while {}", self.remote, self.phase());
                self.fail(SmpError::Timeout);
                true
            }
            _ => false,
        }
    }

    fn dispatch(&mut self, data: &[u8]) -> SmpResult<()> {
        let command = SmpCommand::parse(data)?;

        match command {
            SmpCommand::PairingResponse(features) => self.handle_pairing_response(data, &features),
            SmpCommand::PairingConfirm(confirm) => self.handle_pairing_confirm(confirm),
            SmpCommand::PairingRandom(random) => self.handle_pairing_random(random),
            SmpCommand::PairingFailed(reason) => {
                warn!("{} aborted pairing: {}", self.remote, reason);
                Err(SmpError::RemoteFailure(reason))
            }
            SmpCommand::EncryptionInformation(ltk) => self.handle_encryption_information(ltk),
            SmpCommand::MasterIdentification { ediv, rand } => {
                self.handle_master_identification(ediv, rand)
            }
            SmpCommand::PairingRequest(_) => Err(self.unexpected(SMP_PAIRING_REQUEST)),
        }
    }

    fn handle_pairing_response(&mut self, pdu: &[u8], features: &PairingFeatures) -> SmpResult<()> {
        let preq = match self.state {
            SessionState::RequestSent { preq } => preq,
            _ => return Err(self.unexpected(SMP_PAIRING_RESPONSE)),
        };

        if !(SMP_MIN_ENCRYPTION_KEY_SIZE..=SMP_MAX_ENCRYPTION_KEY_SIZE)
            .contains(&features.max_key_size)
        {
            return Err(SmpError::EncryptionKeySize(features.max_key_size));
        }

        let mut pres = [0u8; SMP_PAIRING_FEATURES_LEN];
        pres.copy_from_slice(pdu);

        let method = resolve_exchange(Some(&preq[..]), Some(&pres[..]))?;
        info!("Pairing with {} using {}", self.remote, method);

        if !method.is_supported() {
            return Err(SmpError::UnsupportedMethod(method));
        }

        let exchange = Exchange {
            preq,
            pres,
            method,
            responder_keys: self.config.features.responder_key_dist & features.responder_key_dist,
        };

        match method.model {
            AssociationModel::JustWorks => self.send_confirm(exchange, [0u8; 16]),
            AssociationModel::Passkey => self.request_passkey(exchange),
            _ => Err(SmpError::UnsupportedMethod(method)),
        }
    }

    fn request_passkey(&mut self, exchange: Exchange) -> SmpResult<()> {
        let reply = self
            .passkey
            .request_passkey(&self.remote.addr)
            .map_err(|err| match err {
                SmpError::PasskeyEntryFailed(_) => err,
                other => SmpError::PasskeyEntryFailed(other.to_string()),
            })?;

        match reply {
            PasskeyReply::Ready(passkey) => self.send_confirm(exchange, passkey.to_tk()),
            PasskeyReply::Deferred => {
                debug!("Waiting for passkey input for {}", self.remote);
                self.state = SessionState::AwaitingPasskey { exchange };
                self.deadline = Some(Instant::now() + self.config.passkey_timeout);
                self.emit(SmpEvent::PasskeyRequested(self.remote.addr));
                Ok(())
            }
        }
    }

    fn send_confirm(&mut self, exchange: Exchange, tk: [u8; 16]) -> SmpResult<()> {
        let local_random = self.crypto.random_nonce();
        let confirm = self.confirm_value(&exchange, &tk, &local_random);

        self.send(&SmpCommand::PairingConfirm(confirm))?;
        self.state = SessionState::ConfirmSent {
            exchange,
            tk,
            local_random,
        };
        self.arm_deadline();
        Ok(())
    }

    fn handle_pairing_confirm(&mut self, peer_confirm: [u8; 16]) -> SmpResult<()> {
        let (exchange, tk, local_random) = match self.state {
            SessionState::ConfirmSent {
                exchange,
                tk,
                local_random,
            } => (exchange, tk, local_random),
            _ => return Err(self.unexpected(SMP_PAIRING_CONFIRM)),
        };

        // Checked once the peer reveals its random
        self.send(&SmpCommand::PairingRandom(local_random))?;
        self.state = SessionState::RandomExchanged {
            exchange,
            tk,
            local_random,
            peer_confirm,
        };
        self.arm_deadline();
        Ok(())
    }

    fn handle_pairing_random(&mut self, peer_random: [u8; 16]) -> SmpResult<()> {
        let (exchange, tk, local_random, peer_confirm) = match self.state {
            SessionState::RandomExchanged {
                exchange,
                tk,
                local_random,
                peer_confirm,
            } => (exchange, tk, local_random, peer_confirm),
            _ => return Err(self.unexpected(SMP_PAIRING_RANDOM)),
        };

        let expected = self.confirm_value(&exchange, &tk, &peer_random);
        if !constant_time_eq(&expected, &peer_confirm) {
            warn!("Confirm value from {} does not match", self.remote);
            return Err(SmpError::ConfirmValueFailed);
        }

        let stk = self.crypto.s1(&tk, &peer_random, &local_random);
        let level = exchange.method.model.security_level();

        info!("Pairing with {} succeeded ({:?})", self.remote, level);
        self.state = SessionState::Succeeded {
            method: exchange.method,
            stk,
            responder_keys: exchange.responder_keys,
            ltk: None,
            bonded: false,
        };

        // Only keep the clock running if the peer still owes us its LTK
        if exchange.responder_keys.contains(KeyDistribution::ENC_KEY) {
            self.arm_deadline();
        } else {
            self.deadline = None;
        }

        self.emit(SmpEvent::PairingSucceeded(self.remote.addr, stk, level));
        Ok(())
    }

    fn handle_encryption_information(&mut self, ltk: [u8; 16]) -> SmpResult<()> {
        self.state = match self.state {
            SessionState::Succeeded {
                method,
                stk,
                responder_keys,
                ltk: None,
                bonded: false,
            } if responder_keys.contains(KeyDistribution::ENC_KEY) => SessionState::Succeeded {
                method,
                stk,
                responder_keys,
                ltk: Some(ltk),
                bonded: false,
            },
            _ => return Err(self.unexpected(SMP_ENCRYPTION_INFORMATION)),
        };

        debug!("Received LTK from {}", self.remote);
        self.arm_deadline();
        Ok(())
    }

    fn handle_master_identification(&mut self, ediv: u16, rand: [u8; 8]) -> SmpResult<()> {
        let (method, stk, responder_keys, ltk) = match self.state {
            SessionState::Succeeded {
                method,
                stk,
                responder_keys,
                ltk: Some(ltk),
                bonded: false,
            } => (method, stk, responder_keys, ltk),
            _ => return Err(self.unexpected(SMP_MASTER_IDENTIFICATION)),
        };

        let record = BondingRecord::new(ltk, ediv, rand);
        self.store.store(&self.remote.addr, &record)?;

        self.state = SessionState::Succeeded {
            method,
            stk,
            responder_keys,
            ltk: Some(ltk),
            bonded: true,
        };
        self.deadline = None;

        info!("Bond with {} stored", self.remote);
        self.emit(SmpEvent::BondStored(self.remote.addr, record));
        Ok(())
    }

    fn confirm_value(&self, exchange: &Exchange, tk: &[u8; 16], random: &[u8; 16]) -> [u8; 16] {
        self.crypto.c1(
            tk,
            random,
            &exchange.pres,
            &exchange.preq,
            self.local.kind.flag(),
            &self.local.addr.bytes,
            self.remote.kind.flag(),
            &self.remote.addr.bytes,
        )
    }

    fn unexpected(&self, opcode: u8) -> SmpError {
        SmpError::UnexpectedCommand {
            opcode,
            phase: self.phase(),
        }
    }

    fn send(&self, command: &SmpCommand) -> SmpResult<()> {
        self.send_pdu(&command.serialize())
    }

    fn send_pdu(&self, pdu: &[u8]) -> SmpResult<()> {
        log_pdu("TX", &self.remote.addr, pdu);
        self.transport.write(SMP_CID, pdu)?;
        Ok(())
    }

    fn arm_deadline(&mut self) {
        self.deadline = Some(Instant::now() + self.config.timeout);
    }

    fn emit(&mut self, event: SmpEvent) {
        self.events.push_back(event);
    }

    /// Move to `Failed`, tell the peer when the error calls for it, and
    /// queue the failure event. Returns `err` for the caller to propagate.
    fn fail(&mut self, err: SmpError) -> SmpError {
        if self.phase().is_terminal() {
            return err;
        }

        let notify = match &err {
            SmpError::UnsupportedMethod(_) => self.config.notify_unsupported,
            _ => true,
        };

        if let Some(reason) = err.failure_reason().filter(|_| notify) {
            let pdu = SmpCommand::PairingFailed(reason).serialize();
            if let Err(send_err) = self.send_pdu(&pdu) {
                warn!(
                    "Could not send Pairing Failed to {}: {}",
                    self.remote, send_err
                );
            }
        }

        if matches!(self.state, SessionState::AwaitingPasskey { .. }) {
            self.passkey.cancel(&self.remote.addr);
        }

        warn!("Pairing with {} failed: {}", self.remote, err);
        self.state = SessionState::Failed;
        self.deadline = None;
        self.emit(SmpEvent::PairingFailed(self.remote.addr, err.clone()));
        err
    }
}

fn log_pdu(direction: &str, peer: &BdAddr, pdu: &[u8]) {
    match pdu.first() {
        // Key material stays out of the logs
        Some(&SMP_ENCRYPTION_INFORMATION) | Some(&SMP_MASTER_IDENTIFICATION) => trace!(
            "SMP {} {} opcode 0x{:02x} ({} bytes)",
            direction,
            peer,
            pdu[0],
            pdu.len()
        ),
        _ => trace!("SMP {} {} {}", direction, peer, hex::encode(pdu)),
    }
}

fn constant_time_eq(a: &[u8; 16], b: &[u8; 16]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l2cap::MemoryTransport;
    use crate::smp::crypto::AesCrypto;
    use crate::smp::keys::MemoryBondingStore;
    use crate::smp::passkey::{DeferredPasskey, FixedPasskey};
    use std::time::Duration;

    fn session_with(
        store: Arc<MemoryBondingStore>,
        passkey: Arc<dyn PasskeyProvider>,
    ) -> (PairingSession, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let session = PairingSession::new(
            Address::public(BdAddr::new([0xA6, 0xA5, 0xA4, 0xA3, 0xA2, 0xA1])),
            Address::random(BdAddr::new([0xB6, 0xB5, 0xB4, 0xB3, 0xB2, 0xB1])),
            SmpConfig::default(),
            transport.clone(),
            Arc::new(AesCrypto::new()),
            store,
            passkey,
        );
        (session, transport)
    }

    fn session() -> (PairingSession, Arc<MemoryTransport>) {
        session_with(
            Arc::new(MemoryBondingStore::new()),
            Arc::new(DeferredPasskey::new()),
        )
    }

    #[test]
    fn test_start_sends_fixed_request() {
        let (mut session, transport) = session();
        assert_eq!(session.phase(), PairingPhase::Idle);

        session.start().unwrap();
        assert_eq!(session.phase(), PairingPhase::RequestSent);
        assert!(session.deadline().is_some());
        assert_eq!(
            transport.take_sent(),
            vec![(SMP_CID, vec![0x01, 0x02, 0x00, 0x01, 0x10, 0x00, 0x01])]
        );

        // Only once
        assert_eq!(session.start(), Err(SmpError::InvalidState));
    }

    #[test]
    fn test_other_channels_are_ignored() {
        let (mut session, transport) = session();
        session.start().unwrap();
        transport.take_sent();

        session.on_data(0x0004, &[0x05, 0x04]).unwrap();
        assert_eq!(session.phase(), PairingPhase::RequestSent);
        assert_eq!(transport.sent_count(), 0);
        assert!(session.poll_event().is_none());
    }

    #[test]
    fn test_just_works_sends_confirm() {
        let (mut session, transport) = session();
        session.start().unwrap();
        transport.take_sent();

        session
            .on_data(SMP_CID, &[0x02, 0x00, 0x00, 0x01, 0x10, 0x00, 0x01])
            .unwrap();
        assert_eq!(session.phase(), PairingPhase::ConfirmSent);
        assert_eq!(
            session.method(),
            Some(AuthenticationMethod::legacy(AssociationModel::JustWorks))
        );

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1[0], SMP_PAIRING_CONFIRM);
        assert_eq!(sent[0].1.len(), SMP_PAIRING_VALUE_LEN);
    }

    #[test]
    fn test_key_size_out_of_range() {
        let (mut session, transport) = session();
        session.start().unwrap();
        transport.take_sent();

        let result = session.on_data(SMP_CID, &[0x02, 0x00, 0x00, 0x01, 0x06, 0x00, 0x01]);
        assert_eq!(result, Err(SmpError::EncryptionKeySize(6)));
        assert_eq!(session.phase(), PairingPhase::Failed);
        assert_eq!(
            transport.take_sent(),
            vec![(SMP_CID, vec![SMP_PAIRING_FAILED, SMP_REASON_ENCRYPTION_KEY_SIZE])]
        );
    }

    #[test]
    fn test_deferred_passkey() {
        let provider = Arc::new(DeferredPasskey::new());
        let (mut session, transport) =
            session_with(Arc::new(MemoryBondingStore::new()), provider.clone());
        session.start().unwrap();
        transport.take_sent();

        // Keyboard on both sides with MITM: Passkey Entry
        session
            .on_data(SMP_CID, &[0x02, 0x02, 0x00, 0x05, 0x10, 0x00, 0x01])
            .unwrap();
        assert_eq!(session.phase(), PairingPhase::ResponseReceived);
        assert_eq!(transport.sent_count(), 0);
        assert_eq!(
            session.poll_event(),
            Some(SmpEvent::PasskeyRequested(session.remote().addr))
        );
        assert_eq!(provider.pending(), vec![session.remote().addr]);

        session.provide_passkey(Passkey::new(123456).unwrap()).unwrap();
        assert_eq!(session.phase(), PairingPhase::ConfirmSent);
        assert_eq!(transport.take_sent()[0].1[0], SMP_PAIRING_CONFIRM);

        // Nothing left to supply
        assert_eq!(
            session.provide_passkey(Passkey::new(1).unwrap()),
            Err(SmpError::InvalidState)
        );
    }

    #[test]
    fn test_fixed_passkey_goes_straight_to_confirm() {
        let (mut session, transport) = session_with(
            Arc::new(MemoryBondingStore::new()),
            Arc::new(FixedPasskey::new(Passkey::new(123456).unwrap())),
        );
        session.start().unwrap();
        transport.take_sent();

        session
            .on_data(SMP_CID, &[0x02, 0x04, 0x00, 0x05, 0x10, 0x00, 0x01])
            .unwrap();
        assert_eq!(session.phase(), PairingPhase::ConfirmSent);
        assert!(session.poll_event().is_none());
    }

    #[test]
    fn test_cancel_passkey_reports_entry_failed() {
        let provider = Arc::new(DeferredPasskey::new());
        let (mut session, transport) =
            session_with(Arc::new(MemoryBondingStore::new()), provider.clone());
        session.start().unwrap();
        session
            .on_data(SMP_CID, &[0x02, 0x02, 0x00, 0x05, 0x10, 0x00, 0x01])
            .unwrap();
        transport.take_sent();

        session.cancel_passkey().unwrap();
        assert_eq!(session.phase(), PairingPhase::Failed);
        assert!(provider.pending().is_empty());
        assert_eq!(
            transport.take_sent(),
            vec![(SMP_CID, vec![SMP_PAIRING_FAILED, SMP_REASON_PASSKEY_ENTRY_FAILED])]
        );
    }

    #[test]
    fn test_timeout_only_after_deadline() {
        let (mut session, transport) = session();
        session.start().unwrap();
        transport.take_sent();

        assert!(!session.check_timeout(Instant::now()));
        assert_eq!(session.phase(), PairingPhase::RequestSent);

        assert!(session.check_timeout(Instant::now() + Duration::from_secs(31)));
        assert_eq!(session.phase(), PairingPhase::Failed);
        assert_eq!(
            session.poll_event(),
            Some(SmpEvent::PairingFailed(session.remote().addr, SmpError::Timeout))
        );
        // Timeouts are not reported to the peer
        assert_eq!(transport.sent_count(), 0);

        // A failed session never times out again
        assert!(!session.check_timeout(Instant::now() + Duration::from_secs(120)));
    }

    #[test]
    fn test_constant_time_eq() {
        let a = [7u8; 16];
        let mut b = a;
        assert!(constant_time_eq(&a, &b));
        b[15] ^= 1;
        assert!(!constant_time_eq(&a, &b));
    }
}
