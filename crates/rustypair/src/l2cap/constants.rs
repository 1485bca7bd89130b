//! Constants for the L2CAP fixed channels used on LE links

// Basic L2CAP header: 2-octet length + 2-octet channel identifier
pub const L2CAP_BASIC_HEADER_SIZE: usize = 4;

// LE fixed channel identifiers
pub const L2CAP_CID_ATT: u16 = 0x0004;
pub const L2CAP_CID_SMP: u16 = 0x0006;
