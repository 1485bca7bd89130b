// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;

// Length of a Bluetooth device address in octets
pub const BD_ADDR_LEN: usize = 6;
