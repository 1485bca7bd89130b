//! Type definitions for the Security Manager Protocol
use super::constants::*;
use super::keys::BondingRecord;
use crate::error::StorageError;
use crate::gap::BdAddr;
use crate::l2cap::TransportError;
use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

/// SMP Error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmpError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unexpected command 0x{opcode:02x} while {phase}")]
    UnexpectedCommand { opcode: u8, phase: PairingPhase },

    #[error("Command not supported: 0x{0:02x}")]
    CommandNotSupported(u8),

    #[error("Encryption key size {0} out of range")]
    EncryptionKeySize(u8),

    #[error("Confirm value failed")]
    ConfirmValueFailed,

    #[error("Unsupported pairing method: {0}")]
    UnsupportedMethod(AuthenticationMethod),

    #[error("Peer reported pairing failure: {0}")]
    RemoteFailure(FailureReason),

    #[error("Passkey entry failed: {0}")]
    PasskeyEntryFailed(String),

    #[error("Bonding storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Missing precondition: {0}")]
    MissingPrecondition(&'static str),

    #[error("Operation timeout")]
    Timeout,

    #[error("Session ended")]
    SessionEnded,

    #[error("Invalid state for operation")]
    InvalidState,

    #[error("Connection not found")]
    ConnectionNotFound,
}

/// Broad classification of an [`SmpError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Packet out of sequence, malformed, or not valid for the session
    Protocol,
    /// Confirm mismatch or failed passkey entry
    Authentication,
    /// OOB, LE Secure Connections or an unresolved association model
    Unsupported,
    /// Bonding store unreadable, corrupt or not writable
    Storage,
    /// Programming error or API misuse
    Internal,
    /// The peer aborted pairing
    Remote,
    /// The peer stopped answering
    Timeout,
    /// The link went away
    Cancelled,
    /// Outbound write failed
    Transport,
}

impl SmpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SmpError::InvalidParameter(_)
            | SmpError::UnexpectedCommand { .. }
            | SmpError::CommandNotSupported(_)
            | SmpError::EncryptionKeySize(_) => ErrorKind::Protocol,
            SmpError::ConfirmValueFailed | SmpError::PasskeyEntryFailed(_) => {
                ErrorKind::Authentication
            }
            SmpError::UnsupportedMethod(_) => ErrorKind::Unsupported,
            SmpError::RemoteFailure(_) => ErrorKind::Remote,
            SmpError::Storage(_) => ErrorKind::Storage,
            SmpError::Transport(_) => ErrorKind::Transport,
            SmpError::Timeout => ErrorKind::Timeout,
            SmpError::SessionEnded => ErrorKind::Cancelled,
            SmpError::MissingPrecondition(_)
            | SmpError::InvalidState
            | SmpError::ConnectionNotFound => ErrorKind::Internal,
        }
    }

    /// Reason to report to the peer in a Pairing Failed command, if any.
    ///
    /// Failures the peer caused or cannot act on (its own Pairing Failed, a
    /// dead link, timeouts, local storage) are not reported.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            SmpError::InvalidParameter(_) => Some(FailureReason::InvalidParameters),
            SmpError::UnexpectedCommand { .. } => Some(FailureReason::UnspecifiedReason),
            SmpError::CommandNotSupported(_) => Some(FailureReason::CommandNotSupported),
            SmpError::EncryptionKeySize(_) => Some(FailureReason::EncryptionKeySize),
            SmpError::ConfirmValueFailed => Some(FailureReason::ConfirmValueFailed),
            SmpError::PasskeyEntryFailed(_) => Some(FailureReason::PasskeyEntryFailed),
            SmpError::UnsupportedMethod(method) => match method.model {
                AssociationModel::OutOfBand if method.auth_type == AuthType::Legacy => {
                    Some(FailureReason::OobNotAvailable)
                }
                _ => Some(FailureReason::PairingNotSupported),
            },
            SmpError::MissingPrecondition(_) => Some(FailureReason::UnspecifiedReason),
            SmpError::RemoteFailure(_)
            | SmpError::Storage(_)
            | SmpError::Transport(_)
            | SmpError::Timeout
            | SmpError::SessionEnded
            | SmpError::InvalidState
            | SmpError::ConnectionNotFound => None,
        }
    }
}

/// Result type for SMP operations
pub type SmpResult<T> = Result<T, SmpError>;

/// IO Capability types for pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoCapability {
    /// Display only capability
    DisplayOnly,
    /// Display with yes/no capability
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input, no output
    NoInputNoOutput,
    /// Both keyboard and display
    KeyboardDisplay,
}

impl IoCapability {
    /// Every defined capability, in protocol value order
    pub const ALL: [IoCapability; 5] = [
        IoCapability::DisplayOnly,
        IoCapability::DisplayYesNo,
        IoCapability::KeyboardOnly,
        IoCapability::NoInputNoOutput,
        IoCapability::KeyboardDisplay,
    ];

    /// Convert to u8 value for protocol
    pub fn to_u8(&self) -> u8 {
        match self {
            IoCapability::DisplayOnly => SMP_IO_CAPABILITY_DISPLAY_ONLY,
            IoCapability::DisplayYesNo => SMP_IO_CAPABILITY_DISPLAY_YES_NO,
            IoCapability::KeyboardOnly => SMP_IO_CAPABILITY_KEYBOARD_ONLY,
            IoCapability::NoInputNoOutput => SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT,
            IoCapability::KeyboardDisplay => SMP_IO_CAPABILITY_KEYBOARD_DISPLAY,
        }
    }

    /// Convert from u8 value from protocol
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SMP_IO_CAPABILITY_DISPLAY_ONLY => Some(IoCapability::DisplayOnly),
            SMP_IO_CAPABILITY_DISPLAY_YES_NO => Some(IoCapability::DisplayYesNo),
            SMP_IO_CAPABILITY_KEYBOARD_ONLY => Some(IoCapability::KeyboardOnly),
            SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT => Some(IoCapability::NoInputNoOutput),
            SMP_IO_CAPABILITY_KEYBOARD_DISPLAY => Some(IoCapability::KeyboardDisplay),
            _ => None,
        }
    }
}

impl fmt::Display for IoCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoCapability::DisplayOnly => write!(f, "Display Only"),
            IoCapability::DisplayYesNo => write!(f, "Display Yes/No"),
            IoCapability::KeyboardOnly => write!(f, "Keyboard Only"),
            IoCapability::NoInputNoOutput => write!(f, "No Input No Output"),
            IoCapability::KeyboardDisplay => write!(f, "Keyboard Display"),
        }
    }
}

bitflags! {
    /// Authentication requirements field of a Pairing Request/Response
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AuthReq: u8 {
        const BONDING = SMP_AUTH_REQ_BONDING;
        const MITM = SMP_AUTH_REQ_MITM;
        const SECURE_CONNECTIONS = SMP_AUTH_REQ_SC;
        const KEYPRESS = SMP_AUTH_REQ_KEYPRESS;
        const CT2 = SMP_AUTH_REQ_CT2;
    }
}

bitflags! {
    /// Key distribution field of a Pairing Request/Response
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyDistribution: u8 {
        /// Encryption key (LTK, EDIV, RAND)
        const ENC_KEY = SMP_KEY_DIST_ENC_KEY;
        /// Identity key (IRK, public address)
        const ID_KEY = SMP_KEY_DIST_ID_KEY;
        /// Signing key (CSRK)
        const SIGN_KEY = SMP_KEY_DIST_SIGN_KEY;
        /// Link key derivation
        const LINK_KEY = SMP_KEY_DIST_LINK_KEY;
    }
}

/// SMP Pairing Features, the parameters of a Pairing Request or Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingFeatures {
    /// IO Capability
    pub io_capability: IoCapability,
    /// OOB data flag
    pub oob_data_present: bool,
    /// Authentication requirements
    pub auth_req: AuthReq,
    /// Maximum encryption key size (7-16)
    pub max_key_size: u8,
    /// Initiator key distribution
    pub initiator_key_dist: KeyDistribution,
    /// Responder key distribution
    pub responder_key_dist: KeyDistribution,
}

impl PairingFeatures {
    pub fn mitm(&self) -> bool {
        self.auth_req.contains(AuthReq::MITM)
    }

    pub fn secure_connections(&self) -> bool {
        self.auth_req.contains(AuthReq::SECURE_CONNECTIONS)
    }

    pub fn bonding(&self) -> bool {
        self.auth_req.contains(AuthReq::BONDING)
    }
}

impl Default for PairingFeatures {
    /// The features this host requests with: keyboard only, no OOB data,
    /// bonding without MITM, 16 byte keys, and only the responder's
    /// encryption key distributed.
    fn default() -> Self {
        Self {
            io_capability: IoCapability::KeyboardOnly,
            oob_data_present: false,
            auth_req: AuthReq::BONDING,
            max_key_size: SMP_MAX_ENCRYPTION_KEY_SIZE,
            initiator_key_dist: KeyDistribution::empty(),
            responder_key_dist: KeyDistribution::ENC_KEY,
        }
    }
}

/// Pairing flavour negotiated by the two peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthType {
    /// LE Legacy pairing
    Legacy,
    /// LE Secure Connections
    SecureConnections,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::Legacy => write!(f, "LE Legacy"),
            AuthType::SecureConnections => write!(f, "LE Secure Connections"),
        }
    }
}

/// Association model used to authenticate the pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationModel {
    /// Just Works method - no user interaction
    JustWorks,
    /// Passkey Entry - one device enters a passkey
    Passkey,
    /// Numeric Comparison - only defined for Secure Connections
    NumericComparison,
    /// Out of Band data
    OutOfBand,
    /// No model was selected
    Unresolved,
}

impl AssociationModel {
    /// Security level a key derived with this model provides
    pub fn security_level(&self) -> SecurityLevel {
        match self {
            AssociationModel::JustWorks => SecurityLevel::EncryptionOnly,
            AssociationModel::Passkey
            | AssociationModel::NumericComparison
            | AssociationModel::OutOfBand => SecurityLevel::EncryptionWithAuthentication,
            AssociationModel::Unresolved => SecurityLevel::None,
        }
    }
}

impl fmt::Display for AssociationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationModel::JustWorks => write!(f, "Just Works"),
            AssociationModel::Passkey => write!(f, "Passkey Entry"),
            AssociationModel::NumericComparison => write!(f, "Numeric Comparison"),
            AssociationModel::OutOfBand => write!(f, "Out of Band"),
            AssociationModel::Unresolved => write!(f, "Unresolved"),
        }
    }
}

/// Outcome of the authentication method decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticationMethod {
    pub auth_type: AuthType,
    pub model: AssociationModel,
}

impl AuthenticationMethod {
    pub fn legacy(model: AssociationModel) -> Self {
        Self {
            auth_type: AuthType::Legacy,
            model,
        }
    }

    /// Whether this host can run the pairing flow for this method
    pub fn is_supported(&self) -> bool {
        self.auth_type == AuthType::Legacy
            && matches!(
                self.model,
                AssociationModel::JustWorks | AssociationModel::Passkey
            )
    }
}

impl fmt::Display for AuthenticationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.auth_type, self.model)
    }
}

/// Pairing Failed reason codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    PasskeyEntryFailed,
    OobNotAvailable,
    AuthenticationRequirements,
    ConfirmValueFailed,
    PairingNotSupported,
    EncryptionKeySize,
    CommandNotSupported,
    UnspecifiedReason,
    RepeatedAttempts,
    InvalidParameters,
    DhKeyCheckFailed,
    NumericComparisonFailed,
    BrEdrPairingInProgress,
    CrossTransportKeyNotAllowed,
    /// A reason code this implementation does not know
    Other(u8),
}

impl FailureReason {
    /// Convert to u8 value for protocol
    pub fn to_u8(&self) -> u8 {
        match self {
            FailureReason::PasskeyEntryFailed => SMP_REASON_PASSKEY_ENTRY_FAILED,
            FailureReason::OobNotAvailable => SMP_REASON_OOB_NOT_AVAILABLE,
            FailureReason::AuthenticationRequirements => SMP_REASON_AUTHENTICATION_REQUIREMENTS,
            FailureReason::ConfirmValueFailed => SMP_REASON_CONFIRM_VALUE_FAILED,
            FailureReason::PairingNotSupported => SMP_REASON_PAIRING_NOT_SUPPORTED,
            FailureReason::EncryptionKeySize => SMP_REASON_ENCRYPTION_KEY_SIZE,
            FailureReason::CommandNotSupported => SMP_REASON_COMMAND_NOT_SUPPORTED,
            FailureReason::UnspecifiedReason => SMP_REASON_UNSPECIFIED_REASON,
            FailureReason::RepeatedAttempts => SMP_REASON_REPEATED_ATTEMPTS,
            FailureReason::InvalidParameters => SMP_REASON_INVALID_PARAMETERS,
            FailureReason::DhKeyCheckFailed => SMP_REASON_DHKEY_CHECK_FAILED,
            FailureReason::NumericComparisonFailed => SMP_REASON_NUMERIC_COMPARISON_FAILED,
            FailureReason::BrEdrPairingInProgress => SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS,
            FailureReason::CrossTransportKeyNotAllowed => {
                SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED
            }
            FailureReason::Other(code) => *code,
        }
    }

    /// Convert from u8 value from protocol
    pub fn from_u8(value: u8) -> Self {
        match value {
            SMP_REASON_PASSKEY_ENTRY_FAILED => FailureReason::PasskeyEntryFailed,
            SMP_REASON_OOB_NOT_AVAILABLE => FailureReason::OobNotAvailable,
            SMP_REASON_AUTHENTICATION_REQUIREMENTS => FailureReason::AuthenticationRequirements,
            SMP_REASON_CONFIRM_VALUE_FAILED => FailureReason::ConfirmValueFailed,
            SMP_REASON_PAIRING_NOT_SUPPORTED => FailureReason::PairingNotSupported,
            SMP_REASON_ENCRYPTION_KEY_SIZE => FailureReason::EncryptionKeySize,
            SMP_REASON_COMMAND_NOT_SUPPORTED => FailureReason::CommandNotSupported,
            SMP_REASON_UNSPECIFIED_REASON => FailureReason::UnspecifiedReason,
            SMP_REASON_REPEATED_ATTEMPTS => FailureReason::RepeatedAttempts,
            SMP_REASON_INVALID_PARAMETERS => FailureReason::InvalidParameters,
            SMP_REASON_DHKEY_CHECK_FAILED => FailureReason::DhKeyCheckFailed,
            SMP_REASON_NUMERIC_COMPARISON_FAILED => FailureReason::NumericComparisonFailed,
            SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS => FailureReason::BrEdrPairingInProgress,
            SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED => {
                FailureReason::CrossTransportKeyNotAllowed
            }
            other => FailureReason::Other(other),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::PasskeyEntryFailed => write!(f, "Passkey entry failed"),
            FailureReason::OobNotAvailable => write!(f, "OOB not available"),
            FailureReason::AuthenticationRequirements => {
                write!(f, "Authentication requirements")
            }
            FailureReason::ConfirmValueFailed => write!(f, "Confirm value failed"),
            FailureReason::PairingNotSupported => write!(f, "Pairing not supported"),
            FailureReason::EncryptionKeySize => write!(f, "Encryption key size"),
            FailureReason::CommandNotSupported => write!(f, "Command not supported"),
            FailureReason::UnspecifiedReason => write!(f, "Unspecified reason"),
            FailureReason::RepeatedAttempts => write!(f, "Repeated attempts"),
            FailureReason::InvalidParameters => write!(f, "Invalid parameters"),
            FailureReason::DhKeyCheckFailed => write!(f, "DHKey check failed"),
            FailureReason::NumericComparisonFailed => write!(f, "Numeric comparison failed"),
            FailureReason::BrEdrPairingInProgress => write!(f, "BR/EDR pairing in progress"),
            FailureReason::CrossTransportKeyNotAllowed => {
                write!(f, "Cross-transport key derivation not allowed")
            }
            FailureReason::Other(code) => write!(f, "Reason 0x{:02x}", code),
        }
    }
}

/// Six digit passkey used by the Passkey Entry model
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Passkey(u32);

impl Passkey {
    /// Create a passkey, rejecting values above 999999
    pub fn new(value: u32) -> SmpResult<Self> {
        if value > SMP_PASSKEY_MAX {
            return Err(SmpError::PasskeyEntryFailed(format!(
                "passkey {} has more than six digits",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Parse a passkey typed as up to six decimal digits
    pub fn parse(input: &str) -> SmpResult<Self> {
        let digits = input.trim();
        if digits.is_empty() || digits.len() > 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SmpError::PasskeyEntryFailed(
                "passkey must be one to six decimal digits".into(),
            ));
        }
        let value = digits
            .parse::<u32>()
            .map_err(|e| SmpError::PasskeyEntryFailed(e.to_string()))?;
        Self::new(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Temporary key for this passkey: the value as a little-endian u32 in
    /// the low four octets, zero elsewhere
    pub fn to_tk(&self) -> [u8; 16] {
        let mut tk = [0u8; 16];
        tk[0..4].copy_from_slice(&self.0.to_le_bytes());
        tk
    }
}

impl fmt::Display for Passkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl fmt::Debug for Passkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passkey(******)")
    }
}

/// Where a pairing session is in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingPhase {
    /// Session created, nothing sent yet
    Idle,
    /// Pairing Request sent, waiting for the response
    RequestSent,
    /// Response received, waiting for passkey input
    ResponseReceived,
    /// Local confirm sent, waiting for the peer's confirm
    ConfirmSent,
    /// Local random sent, waiting for the peer's random
    RandomExchanged,
    /// Short-term key derived
    Succeeded,
    /// Existing bonding information was found, no pairing needed
    AlreadyBonded,
    /// Pairing failed
    Failed,
    /// The link went away
    Ended,
}

impl PairingPhase {
    /// No further protocol traffic is accepted in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PairingPhase::AlreadyBonded | PairingPhase::Failed | PairingPhase::Ended
        )
    }
}

impl fmt::Display for PairingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingPhase::Idle => write!(f, "idle"),
            PairingPhase::RequestSent => write!(f, "waiting for pairing response"),
            PairingPhase::ResponseReceived => write!(f, "waiting for passkey"),
            PairingPhase::ConfirmSent => write!(f, "waiting for pairing confirm"),
            PairingPhase::RandomExchanged => write!(f, "waiting for pairing random"),
            PairingPhase::Succeeded => write!(f, "paired"),
            PairingPhase::AlreadyBonded => write!(f, "already bonded"),
            PairingPhase::Failed => write!(f, "failed"),
            PairingPhase::Ended => write!(f, "ended"),
        }
    }
}

/// SMP Event types for callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmpEvent {
    /// A bond already exists, pairing was skipped
    BondingInfoFound(BdAddr, BondingRecord),
    /// The passkey provider deferred; supply one with `provide_passkey`
    PasskeyRequested(BdAddr),
    /// Short-term key derived after a successful confirm check
    PairingSucceeded(BdAddr, [u8; 16], SecurityLevel),
    /// Long-term key material distributed by the peer was persisted
    BondStored(BdAddr, BondingRecord),
    /// Pairing failed
    PairingFailed(BdAddr, SmpError),
    /// The link carrying the session went away
    SessionEnded(BdAddr),
}

impl SmpEvent {
    /// Peer the event belongs to
    pub fn address(&self) -> BdAddr {
        match self {
            SmpEvent::BondingInfoFound(addr, _)
            | SmpEvent::PasskeyRequested(addr)
            | SmpEvent::PairingSucceeded(addr, _, _)
            | SmpEvent::BondStored(addr, _)
            | SmpEvent::PairingFailed(addr, _)
            | SmpEvent::SessionEnded(addr) => *addr,
        }
    }
}

/// Security level for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    /// No security (unencrypted)
    None = 0,
    /// Encryption without authentication (Just Works)
    EncryptionOnly = 1,
    /// Encryption with authentication (MITM protection)
    EncryptionWithAuthentication = 2,
}

impl SecurityLevel {
    /// Check if this security level includes encryption
    pub fn is_encrypted(&self) -> bool {
        *self >= SecurityLevel::EncryptionOnly
    }

    /// Check if this security level includes authentication
    pub fn is_authenticated(&self) -> bool {
        *self >= SecurityLevel::EncryptionWithAuthentication
    }
}
