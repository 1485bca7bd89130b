//! RustyPair - Bluetooth LE Legacy pairing for Rust
//!
//! This library implements the initiator side of the Security Manager
//! Protocol for Bluetooth Low Energy: it negotiates the pairing method with a
//! connected peer, runs the Just Works or Passkey Entry confirm exchange,
//! derives the short-term key and persists the long-term key the peer
//! distributes. The link itself is supplied by the caller through the
//! [`l2cap::Transport`] trait.

pub mod error;
pub mod gap;
pub mod l2cap;
pub mod smp;

// Re-export common types for convenience
pub use error::StorageError;
pub use gap::{Address, AddressType, BdAddr};
pub use l2cap::{MemoryTransport, Transport, TransportError};
pub use smp::{
    AesCrypto, BondingRecord, BondingStore, FileBondingStore, IoCapability, MemoryBondingStore,
    PairingPhase, PairingSession, Passkey, SecurityLevel, SmpConfig, SmpError, SmpEvent,
    SmpManager,
};
