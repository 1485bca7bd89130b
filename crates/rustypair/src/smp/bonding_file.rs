//! JSON file backed bonding store
//!
//! The file holds one object mapping `xx:xx:xx:xx:xx:xx` addresses to
//! `{ "ltk": hex, "ediv": number, "rand": hex }` records. A missing or empty
//! file is an empty store; anything else that does not parse is reported as
//! corruption rather than silently replaced.

use super::keys::{BondingRecord, BondingStore};
use crate::error::StorageError;
use crate::gap::BdAddr;
use log::{debug, error};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

type RecordMap = BTreeMap<String, BondingRecord>;

/// Bonding store persisted as a JSON document
#[derive(Debug)]
pub struct FileBondingStore {
    path: PathBuf,
    // Serializes every read-modify-write cycle on the file
    lock: Mutex<()>,
}

impl FileBondingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.lock.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn load(&self) -> Result<RecordMap, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("Bonding store {} does not exist yet", self.path.display());
                return Ok(RecordMap::new());
            }
            Err(err) => return Err(StorageError::read(&self.path, err)),
        };

        if contents.trim().is_empty() {
            return Ok(RecordMap::new());
        }

        let records: RecordMap = serde_json::from_str(&contents).map_err(|err| {
            error!("Bonding store {} is corrupt: {}", self.path.display(), err);
            StorageError::Corrupt {
                path: self.path.clone(),
                message: err.to_string(),
            }
        })?;

        // Every key has to be a well formed address
        for key in records.keys() {
            key.parse::<BdAddr>().map_err(|_| StorageError::Corrupt {
                path: self.path.clone(),
                message: format!("invalid device address key {:?}", key),
            })?;
        }

        Ok(records)
    }

    fn save(&self, records: &RecordMap) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(records).map_err(|err| StorageError::Write {
            path: self.path.clone(),
            message: err.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| StorageError::write(parent, err))?;
            }
        }

        // Write a sibling file and rename it over the store so a crash never
        // leaves a half written document behind
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|err| StorageError::write(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| StorageError::write(&self.path, err))?;
        Ok(())
    }
}

impl BondingStore for FileBondingStore {
    fn lookup(&self, address: &BdAddr) -> Result<Option<BondingRecord>, StorageError> {
        let _guard = self.guard()?;
        let records = self.load()?;
        Ok(records.get(&address.to_string()).copied())
    }

    fn store(&self, address: &BdAddr, record: &BondingRecord) -> Result<(), StorageError> {
        let _guard = self.guard()?;
        let mut records = self.load()?;
        records.insert(address.to_string(), *record);
        self.save(&records)?;
        debug!("Stored bond for {} in {}", address, self.path.display());
        Ok(())
    }

    fn remove(&self, address: &BdAddr) -> Result<bool, StorageError> {
        let _guard = self.guard()?;
        let mut records = self.load()?;
        let existed = records.remove(&address.to_string()).is_some();
        if existed {
            self.save(&records)?;
        }
        Ok(existed)
    }

    fn addresses(&self) -> Result<Vec<BdAddr>, StorageError> {
        let _guard = self.guard()?;
        let records = self.load()?;
        records
            .keys()
            .map(|key| {
                key.parse::<BdAddr>()
                    .map_err(|_| StorageError::InvalidAddress(key.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "rustypair-{}-{}-{}.json",
            name,
            std::process::id(),
            hex::encode(rand::random::<[u8; 4]>())
        ))
    }

    #[test]
    fn test_round_trip_preserves_bytes() {
        let path = temp_path("round-trip");
        let addr: BdAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let record = BondingRecord::new(rand::random(), 0xA55A, rand::random());

        FileBondingStore::new(&path).store(&addr, &record).unwrap();

        // A fresh store instance reads the file back
        let reloaded = FileBondingStore::new(&path);
        assert_eq!(reloaded.lookup(&addr).unwrap(), Some(record));
        assert_eq!(reloaded.addresses().unwrap(), vec![addr]);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"aa:bb:cc:dd:ee:ff\""));
        assert!(contents.contains(&hex::encode(record.ltk)));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unknown_address_is_not_found() {
        let path = temp_path("unknown");
        let store = FileBondingStore::new(&path);
        let known: BdAddr = "11:22:33:44:55:66".parse().unwrap();
        let unknown: BdAddr = "66:55:44:33:22:11".parse().unwrap();

        // Missing file is an empty store
        assert_eq!(store.lookup(&unknown).unwrap(), None);

        store
            .store(&known, &BondingRecord::new([1; 16], 1, [2; 8]))
            .unwrap();
        assert_eq!(store.lookup(&unknown).unwrap(), None);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_empty_file_is_empty_store() {
        let path = temp_path("empty");
        fs::write(&path, "  \n").unwrap();
        let store = FileBondingStore::new(&path);
        assert!(store.addresses().unwrap().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_fails_loudly() {
        let path = temp_path("corrupt");
        fs::write(&path, "{ not json").unwrap();
        let store = FileBondingStore::new(&path);
        let addr: BdAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();

        assert!(matches!(
            store.lookup(&addr),
            Err(StorageError::Corrupt { .. })
        ));
        // The corrupt document is not overwritten by a store
        assert!(store
            .store(&addr, &BondingRecord::new([0; 16], 0, [0; 8]))
            .is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");

        // Well formed JSON with a bad address key is corrupt too
        fs::write(&path, r#"{"nope": {"ltk": "00000000000000000000000000000000", "ediv": 0, "rand": "0000000000000000"}}"#).unwrap();
        assert!(matches!(
            store.lookup(&addr),
            Err(StorageError::Corrupt { .. })
        ));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_last_writer_wins_and_remove() {
        let path = temp_path("overwrite");
        let store = FileBondingStore::new(&path);
        let addr: BdAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();

        store
            .store(&addr, &BondingRecord::new([1; 16], 1, [1; 8]))
            .unwrap();
        let second = BondingRecord::new([2; 16], 2, [2; 8]);
        store.store(&addr, &second).unwrap();
        assert_eq!(store.lookup(&addr).unwrap(), Some(second));

        assert!(store.remove(&addr).unwrap());
        assert_eq!(store.lookup(&addr).unwrap(), None);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_concurrent_stores_do_not_lose_updates() {
        let path = temp_path("concurrent");
        let store = Arc::new(FileBondingStore::new(&path));

        let handles: Vec<_> = (0u8..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let addr = BdAddr::new([i, 0, 0, 0, 0, 0xAA]);
                    store
                        .store(&addr, &BondingRecord::new([i; 16], i as u16, [i; 8]))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.addresses().unwrap().len(), 8);
        let _ = fs::remove_file(&path);
    }
}
