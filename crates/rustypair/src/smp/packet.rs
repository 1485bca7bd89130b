//! SMP command packets
//!
//! Every SMP PDU is one opcode octet followed by a fixed size payload.
//! Parsing is strict: a PDU whose length does not match its opcode is
//! rejected instead of being read with a guessed layout.

use super::constants::*;
use super::types::*;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

impl PairingFeatures {
    /// Serialize as a Pairing Request (`SMP_PAIRING_REQUEST`) or Pairing
    /// Response (`SMP_PAIRING_RESPONSE`) PDU
    pub fn to_pdu(&self, opcode: u8) -> [u8; SMP_PAIRING_FEATURES_LEN] {
        [
            opcode,
            self.io_capability.to_u8(),
            if self.oob_data_present {
                SMP_OOB_PRESENT
            } else {
                SMP_OOB_NOT_PRESENT
            },
            self.auth_req.bits(),
            self.max_key_size,
            self.initiator_key_dist.bits(),
            self.responder_key_dist.bits(),
        ]
    }

    /// Parse the parameters of a Pairing Request or Response PDU
    pub fn from_pdu(data: &[u8]) -> SmpResult<Self> {
        expect_len(data, SMP_PAIRING_FEATURES_LEN, "Pairing features")?;

        let io_capability = IoCapability::from_u8(data[1]).ok_or_else(|| {
            SmpError::InvalidParameter(format!("reserved IO capability 0x{:02x}", data[1]))
        })?;

        let oob_data_present = match data[2] {
            SMP_OOB_NOT_PRESENT => false,
            SMP_OOB_PRESENT => true,
            other => {
                return Err(SmpError::InvalidParameter(format!(
                    "reserved OOB data flag 0x{:02x}",
                    other
                )))
            }
        };

        Ok(Self {
            io_capability,
            oob_data_present,
            auth_req: AuthReq::from_bits_retain(data[3]),
            max_key_size: data[4],
            initiator_key_dist: KeyDistribution::from_bits_retain(data[5]),
            responder_key_dist: KeyDistribution::from_bits_retain(data[6]),
        })
    }
}

/// A decoded SMP command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmpCommand {
    PairingRequest(PairingFeatures),
    PairingResponse(PairingFeatures),
    PairingConfirm([u8; 16]),
    PairingRandom([u8; 16]),
    PairingFailed(FailureReason),
    EncryptionInformation([u8; 16]),
    MasterIdentification { ediv: u16, rand: [u8; 8] },
}

impl SmpCommand {
    /// Parse from raw packet
    pub fn parse(data: &[u8]) -> SmpResult<Self> {
        let opcode = *data
            .first()
            .ok_or_else(|| SmpError::InvalidParameter("Empty SMP packet".into()))?;

        match opcode {
            SMP_PAIRING_REQUEST => Ok(SmpCommand::PairingRequest(PairingFeatures::from_pdu(data)?)),
            SMP_PAIRING_RESPONSE => {
                Ok(SmpCommand::PairingResponse(PairingFeatures::from_pdu(data)?))
            }
            SMP_PAIRING_CONFIRM => Ok(SmpCommand::PairingConfirm(parse_value(
                data,
                "Pairing confirm",
            )?)),
            SMP_PAIRING_RANDOM => Ok(SmpCommand::PairingRandom(parse_value(
                data,
                "Pairing random",
            )?)),
            SMP_PAIRING_FAILED => {
                expect_len(data, SMP_PAIRING_FAILED_LEN, "Pairing failed")?;
                Ok(SmpCommand::PairingFailed(FailureReason::from_u8(data[1])))
            }
            SMP_ENCRYPTION_INFORMATION => Ok(SmpCommand::EncryptionInformation(parse_value(
                data,
                "Encryption information",
            )?)),
            SMP_MASTER_IDENTIFICATION => {
                expect_len(data, SMP_MASTER_IDENTIFICATION_LEN, "Master identification")?;

                let mut cursor = Cursor::new(&data[1..]);
                let ediv = cursor
                    .read_u16::<LittleEndian>()
                    .map_err(|_| SmpError::InvalidParameter("Failed to read EDIV".into()))?;

                let mut rand = [0u8; 8];
                cursor
                    .read_exact(&mut rand)
                    .map_err(|_| SmpError::InvalidParameter("Failed to read RAND".into()))?;

                Ok(SmpCommand::MasterIdentification { ediv, rand })
            }
            other => Err(SmpError::CommandNotSupported(other)),
        }
    }

    /// Serialize to raw packet
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            SmpCommand::PairingRequest(features) => features.to_pdu(SMP_PAIRING_REQUEST).to_vec(),
            SmpCommand::PairingResponse(features) => {
                features.to_pdu(SMP_PAIRING_RESPONSE).to_vec()
            }
            SmpCommand::PairingConfirm(value) => value_pdu(SMP_PAIRING_CONFIRM, value),
            SmpCommand::PairingRandom(value) => value_pdu(SMP_PAIRING_RANDOM, value),
            SmpCommand::PairingFailed(reason) => vec![SMP_PAIRING_FAILED, reason.to_u8()],
            SmpCommand::EncryptionInformation(ltk) => value_pdu(SMP_ENCRYPTION_INFORMATION, ltk),
            SmpCommand::MasterIdentification { ediv, rand } => {
                let mut packet = Vec::with_capacity(SMP_MASTER_IDENTIFICATION_LEN);
                packet.push(SMP_MASTER_IDENTIFICATION);
                packet.extend_from_slice(&ediv.to_le_bytes());
                packet.extend_from_slice(rand);
                packet
            }
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            SmpCommand::PairingRequest(_) => SMP_PAIRING_REQUEST,
            SmpCommand::PairingResponse(_) => SMP_PAIRING_RESPONSE,
            SmpCommand::PairingConfirm(_) => SMP_PAIRING_CONFIRM,
            SmpCommand::PairingRandom(_) => SMP_PAIRING_RANDOM,
            SmpCommand::PairingFailed(_) => SMP_PAIRING_FAILED,
            SmpCommand::EncryptionInformation(_) => SMP_ENCRYPTION_INFORMATION,
            SmpCommand::MasterIdentification { .. } => SMP_MASTER_IDENTIFICATION,
        }
    }

    /// Human readable command name for logs
    pub fn name(&self) -> &'static str {
        match self {
            SmpCommand::PairingRequest(_) => "Pairing Request",
            SmpCommand::PairingResponse(_) => "Pairing Response",
            SmpCommand::PairingConfirm(_) => "Pairing Confirm",
            SmpCommand::PairingRandom(_) => "Pairing Random",
            SmpCommand::PairingFailed(_) => "Pairing Failed",
            SmpCommand::EncryptionInformation(_) => "Encryption Information",
            SmpCommand::MasterIdentification { .. } => "Master Identification",
        }
    }
}

fn expect_len(data: &[u8], len: usize, what: &str) -> SmpResult<()> {
    if data.len() != len {
        return Err(SmpError::InvalidParameter(format!(
            "{} must be {} bytes, got {}",
            what,
            len,
            data.len()
        )));
    }
    Ok(())
}

fn parse_value(data: &[u8], what: &str) -> SmpResult<[u8; 16]> {
    expect_len(data, SMP_PAIRING_VALUE_LEN, what)?;

    let mut value = [0u8; 16];
    value.copy_from_slice(&data[1..SMP_PAIRING_VALUE_LEN]);
    Ok(value)
}

fn value_pdu(opcode: u8, value: &[u8; 16]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(SMP_PAIRING_VALUE_LEN);
    packet.push(opcode);
    packet.extend_from_slice(value);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_bytes() {
        let pdu = PairingFeatures::default().to_pdu(SMP_PAIRING_REQUEST);
        assert_eq!(pdu, [0x01, 0x02, 0x00, 0x01, 0x10, 0x00, 0x01]);
    }

    #[test]
    fn test_parse_pairing_response() {
        let data = [0x02, 0x00, 0x00, 0x05, 0x10, 0x00, 0x01];
        let command = SmpCommand::parse(&data).unwrap();
        let features = match command {
            SmpCommand::PairingResponse(features) => features,
            other => panic!("unexpected command {:?}", other),
        };
        assert_eq!(features.io_capability, IoCapability::DisplayOnly);
        assert!(!features.oob_data_present);
        assert!(features.bonding());
        assert!(features.mitm());
        assert!(!features.secure_connections());
        assert_eq!(features.max_key_size, 16);

        // Re-serializing gives the same bytes back
        assert_eq!(features.to_pdu(SMP_PAIRING_RESPONSE), data);
    }

    #[test]
    fn test_reserved_auth_req_bits_are_kept() {
        let data = [0x02, 0x03, 0x00, 0xC1, 0x10, 0x00, 0x01];
        let features = PairingFeatures::from_pdu(&data).unwrap();
        assert_eq!(features.auth_req.bits(), 0xC1);
        assert_eq!(features.to_pdu(SMP_PAIRING_RESPONSE), data);
    }

    #[test]
    fn test_reject_malformed_features() {
        // Reserved IO capability
        assert!(matches!(
            SmpCommand::parse(&[0x02, 0x05, 0x00, 0x01, 0x10, 0x00, 0x01]),
            Err(SmpError::InvalidParameter(_))
        ));
        // Reserved OOB flag
        assert!(SmpCommand::parse(&[0x02, 0x00, 0x02, 0x01, 0x10, 0x00, 0x01]).is_err());
        // Short and long packets
        assert!(SmpCommand::parse(&[0x02, 0x00, 0x00, 0x01, 0x10, 0x00]).is_err());
        assert!(SmpCommand::parse(&[0x02, 0x00, 0x00, 0x01, 0x10, 0x00, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_value_packets() {
        let mut data = vec![SMP_PAIRING_CONFIRM];
        data.extend(0u8..16);
        let command = SmpCommand::parse(&data).unwrap();
        assert_eq!(command.opcode(), SMP_PAIRING_CONFIRM);
        assert_eq!(command.serialize(), data);

        // 15 byte value
        assert!(SmpCommand::parse(&data[..16]).is_err());

        data[0] = SMP_PAIRING_RANDOM;
        assert!(matches!(
            SmpCommand::parse(&data).unwrap(),
            SmpCommand::PairingRandom(_)
        ));
    }

    #[test]
    fn test_master_identification() {
        let data = [0x07, 0x34, 0x12, 1, 2, 3, 4, 5, 6, 7, 8];
        let command = SmpCommand::parse(&data).unwrap();
        assert_eq!(
            command,
            SmpCommand::MasterIdentification {
                ediv: 0x1234,
                rand: [1, 2, 3, 4, 5, 6, 7, 8]
            }
        );
        assert_eq!(command.serialize(), data.to_vec());
        assert!(SmpCommand::parse(&data[..10]).is_err());
    }

    #[test]
    fn test_pairing_failed_and_unknown_opcodes() {
        assert_eq!(
            SmpCommand::parse(&[0x05, 0x04]).unwrap(),
            SmpCommand::PairingFailed(FailureReason::ConfirmValueFailed)
        );
        assert!(SmpCommand::parse(&[0x05]).is_err());
        assert!(SmpCommand::parse(&[]).is_err());

        // Identity information is a real command, just not one we handle
        assert_eq!(
            SmpCommand::parse(&[SMP_IDENTITY_INFORMATION; 17]),
            Err(SmpError::CommandNotSupported(SMP_IDENTITY_INFORMATION))
        );
        assert_eq!(
            SmpCommand::parse(&[0x7F]),
            Err(SmpError::CommandNotSupported(0x7F))
        );
    }
}
