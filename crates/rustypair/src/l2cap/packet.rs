//! L2CAP basic frame handling
//!
//! Fixed channels on LE links use basic (B-frame) framing only, so this is
//! all that is needed to demultiplex an ACL payload to a channel.

use super::constants::*;
use super::transport::TransportError;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// L2CAP Packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2capHeader {
    /// Length of the L2CAP payload in bytes
    pub length: u16,
    /// Channel Identifier
    pub channel_id: u16,
}

impl L2capHeader {
    /// Create a new L2CAP header
    pub fn new(length: u16, channel_id: u16) -> Self {
        Self { length, channel_id }
    }

    /// Parse an L2CAP header from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < L2CAP_BASIC_HEADER_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let length = cursor.read_u16::<LittleEndian>().ok()?;
        let channel_id = cursor.read_u16::<LittleEndian>().ok()?;

        Some(Self { length, channel_id })
    }

    /// Serialize the header to bytes
    pub fn to_bytes(&self) -> [u8; L2CAP_BASIC_HEADER_SIZE] {
        let mut bytes = [0u8; L2CAP_BASIC_HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.length.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.channel_id.to_le_bytes());
        bytes
    }
}

/// Split a basic L2CAP frame into its channel identifier and payload.
///
/// The length field must match the payload exactly; fragmented or padded
/// frames are rejected rather than guessed at.
pub fn split_basic_frame(frame: &[u8]) -> Result<(u16, &[u8]), TransportError> {
    let header = L2capHeader::parse(frame).ok_or(TransportError::MalformedFrame(format!(
        "frame of {} bytes is shorter than the basic header",
        frame.len()
    )))?;

    let payload = &frame[L2CAP_BASIC_HEADER_SIZE..];
    if payload.len() != header.length as usize {
        return Err(TransportError::MalformedFrame(format!(
            "header announces {} bytes, frame carries {}",
            header.length,
            payload.len()
        )));
    }

    Ok((header.channel_id, payload))
}

/// Build a basic L2CAP frame for `channel_id` around `payload`
pub fn build_basic_frame(channel_id: u16, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let length = u16::try_from(payload.len())
        .map_err(|_| TransportError::PayloadTooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(L2CAP_BASIC_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&L2capHeader::new(length, channel_id).to_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}
