//! Error types for the rustypair library
//!
//! Errors raised by the bonding store adapters. Protocol level failures live
//! in [`crate::smp::SmpError`], which wraps these.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading or writing bonding records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to read bonding store {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to write bonding store {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Bonding store {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Invalid device address in bonding store: {0}")]
    InvalidAddress(String),

    #[error("Bonding store lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub(crate) fn read(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        StorageError::Read {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        StorageError::Write {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
