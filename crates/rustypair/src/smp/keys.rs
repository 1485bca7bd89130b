//! Bonding records and their storage
//!
//! A bond is the long-term key material a peer distributed after a
//! successful pairing: the LTK together with the EDIV and Rand values that
//! identify it when the link is re-encrypted on a later connection.

use crate::error::StorageError;
use crate::gap::BdAddr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Long-term key material for one bonded peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondingRecord {
    /// Long Term Key
    #[serde(with = "hex::serde")]
    pub ltk: [u8; 16],
    /// EDIV (Encrypted Diversifier)
    pub ediv: u16,
    /// RAND (Random number)
    #[serde(with = "hex::serde")]
    pub rand: [u8; 8],
}

impl BondingRecord {
    pub fn new(ltk: [u8; 16], ediv: u16, rand: [u8; 8]) -> Self {
        Self { ltk, ediv, rand }
    }
}

/// Persistent storage of bonding records, keyed by peer address.
///
/// Implementations are shared by every pairing session on the host, so a
/// `store` must be atomic with respect to concurrent `lookup`/`store` calls.
pub trait BondingStore: Send + Sync {
    /// Record for `address`, or `None` when the peer is not bonded
    fn lookup(&self, address: &BdAddr) -> Result<Option<BondingRecord>, StorageError>;

    /// Insert or replace the record for `address`
    fn store(&self, address: &BdAddr, record: &BondingRecord) -> Result<(), StorageError>;

    /// Forget `address`; returns whether a record existed
    fn remove(&self, address: &BdAddr) -> Result<bool, StorageError>;

    /// Every bonded address
    fn addresses(&self) -> Result<Vec<BdAddr>, StorageError>;
}

/// In-memory implementation of BondingStore
#[derive(Debug, Default)]
pub struct MemoryBondingStore {
    records: RwLock<HashMap<BdAddr, BondingRecord>>,
}

impl MemoryBondingStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl BondingStore for MemoryBondingStore {
    fn lookup(&self, address: &BdAddr) -> Result<Option<BondingRecord>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(address).copied())
    }

    fn store(&self, address: &BdAddr, record: &BondingRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        records.insert(*address, *record);
        Ok(())
    }

    fn remove(&self, address: &BdAddr) -> Result<bool, StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.remove(address).is_some())
    }

    fn addresses(&self) -> Result<Vec<BdAddr>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut addresses: Vec<BdAddr> = records.keys().copied().collect();
        addresses.sort();
        Ok(addresses)
    }
}
