use crate::gap::constants::*;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a textual device address cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid device address: {0}")]
pub struct AddrParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Public,
    Random,
}

impl AddressType {
    /// The one-octet flag used by the `c1` confirm function (`iat`/`rat`)
    pub fn flag(&self) -> u8 {
        u8::from(*self)
    }
}

impl TryFrom<u8> for AddressType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            PUBLIC_DEVICE_ADDRESS => Ok(AddressType::Public),
            RANDOM_DEVICE_ADDRESS => Ok(AddressType::Random),
            other => Err(other),
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
        }
    }
}

/// Bluetooth device address.
///
/// `bytes` holds the address in little-endian (over-the-air) order, so the
/// textual form `aa:bb:cc:dd:ee:ff` is stored as `[ff, ee, dd, cc, bb, aa]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BdAddr {
    pub bytes: [u8; BD_ADDR_LEN],
}

impl BdAddr {
    pub fn new(bytes: [u8; BD_ADDR_LEN]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= BD_ADDR_LEN {
            let mut bytes = [0u8; BD_ADDR_LEN];
            bytes.copy_from_slice(&slice[0..BD_ADDR_LEN]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

impl FromStr for BdAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != BD_ADDR_LEN {
            return Err(AddrParseError(s.to_string()));
        }

        let mut bytes = [0u8; BD_ADDR_LEN];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(AddrParseError(s.to_string()));
            }
            bytes[BD_ADDR_LEN - 1 - i] =
                u8::from_str_radix(part, 16).map_err(|_| AddrParseError(s.to_string()))?;
        }

        Ok(Self { bytes })
    }
}

/// A device address together with its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub addr: BdAddr,
    pub kind: AddressType,
}

impl Address {
    pub fn new(addr: BdAddr, kind: AddressType) -> Self {
        Self { addr, kind }
    }

    pub fn public(addr: BdAddr) -> Self {
        Self::new(addr, AddressType::Public)
    }

    pub fn random(addr: BdAddr) -> Self {
        Self::new(addr, AddressType::Random)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AddressType::Public => write!(f, "{} (public)", self.addr),
            AddressType::Random => write!(f, "{} (random)", self.addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bd_addr_text_form() {
        let addr: BdAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(addr.bytes, [0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa]);
        assert_eq!(addr.to_string(), "aa:bb:cc:dd:ee:ff");

        // Upper case input is accepted, output is always lower case
        let upper: BdAddr = "A1:B2:C3:D4:E5:F6".parse().unwrap();
        assert_eq!(upper.to_string(), "a1:b2:c3:d4:e5:f6");
    }

    #[test]
    fn test_bd_addr_rejects_garbage() {
        assert!("aa:bb:cc:dd:ee".parse::<BdAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:ff:00".parse::<BdAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:gg".parse::<BdAddr>().is_err());
        assert!("aabbccddeeff".parse::<BdAddr>().is_err());
        assert!("a:bb:cc:dd:ee:fff".parse::<BdAddr>().is_err());
    }

    #[test]
    fn test_address_type_flag() {
        assert_eq!(AddressType::Public.flag(), 0);
        assert_eq!(AddressType::Random.flag(), 1);
        assert_eq!(AddressType::try_from(1), Ok(AddressType::Random));
        assert_eq!(AddressType::try_from(2), Err(2));
    }
}
