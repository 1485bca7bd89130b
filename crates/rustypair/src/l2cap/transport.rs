//! Transport boundary between the Security Manager and the link layer
//!
//! The Security Manager never touches sockets or HCI handles. It is handed
//! channel-tagged buffers and writes channel-tagged buffers back through a
//! [`Transport`].

use std::sync::Mutex;
use thiserror::Error;

/// Errors raised by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Malformed L2CAP frame: {0}")]
    MalformedFrame(String),

    #[error("Payload of {0} bytes does not fit a basic frame")]
    PayloadTooLarge(usize),

    #[error("Link disconnected")]
    Disconnected,

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Outbound half of an established LE link
pub trait Transport: Send + Sync {
    /// Queue `data` for transmission on the fixed channel `channel_id`.
    ///
    /// [`SmpManager`](crate::smp::SmpManager) calls this without holding any
    /// of its locks, so an implementation may hand the peer's answer back to
    /// the manager before returning.
    fn write(&self, channel_id: u16, data: &[u8]) -> Result<(), TransportError>;
}

/// Transport that records every outbound write.
///
/// Used by the demo and tests to stand in for a real link, and to shuttle
/// frames between two simulated devices.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<(u16, Vec<u8>)>>,
    closed: Mutex<bool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything written so far
    pub fn take_sent(&self) -> Vec<(u16, Vec<u8>)> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Remove and return the oldest write, if any
    pub fn pop_sent(&self) -> Option<(u16, Vec<u8>)> {
        let mut sent = match self.sent.lock() {
            Ok(sent) => sent,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sent.is_empty() {
            None
        } else {
            Some(sent.remove(0))
        }
    }

    /// Number of frames currently queued
    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }

    /// Make every subsequent write fail with [`TransportError::Disconnected`]
    pub fn close(&self) {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
    }
}

impl Transport for MemoryTransport {
    fn write(&self, channel_id: u16, data: &[u8]) -> Result<(), TransportError> {
        let closed = self.closed.lock().map(|c| *c).unwrap_or(true);
        if closed {
            return Err(TransportError::Disconnected);
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|_| TransportError::WriteFailed("transport lock poisoned".into()))?;
        sent.push((channel_id, data.to_vec()));
        Ok(())
    }
}
