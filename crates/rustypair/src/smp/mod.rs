//! Security Manager Protocol (SMP) implementation
//!
//! This module implements the initiator side of Bluetooth LE Legacy pairing:
//! - Negotiating the authentication method from the exchanged features
//! - Just Works and Passkey Entry confirm/random exchanges
//! - Short-term key derivation
//! - Persisting the long-term key the peer distributes
//!
//! LE Secure Connections and Out of Band pairing are recognized and rejected.

pub mod bonding_file;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod keys;
pub mod manager;
pub mod packet;
pub mod passkey;
pub mod resolver;
pub mod session;
mod types;

// Re-export public API
pub use self::bonding_file::FileBondingStore;
pub use self::config::SmpConfig;
pub use self::crypto::{AesCrypto, CryptoProvider};
pub use self::keys::*;
pub use self::manager::{SmpEventCallback, SmpManager};
pub use self::packet::SmpCommand;
pub use self::passkey::*;
pub use self::resolver::{resolve, resolve_exchange};
pub use self::session::PairingSession;
pub use self::types::*;
