//! L2CAP fixed channel plumbing
//!
//! This module provides the small part of L2CAP the Security Manager needs:
//! - Fixed channel identifiers
//! - Basic frame parsing for demultiplexing ACL payloads
//! - The transport boundary used to send SMP commands

pub mod constants;
pub mod packet;
pub mod transport;
#[cfg(test)]
mod tests;

// Re-export the public API
pub use self::constants::*;
pub use self::packet::{build_basic_frame, split_basic_frame, L2capHeader};
pub use self::transport::{MemoryTransport, Transport, TransportError};
