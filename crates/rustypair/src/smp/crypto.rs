//! Cryptographic functions for the Security Manager Protocol
//!
//! The pairing engine only needs the LE Legacy toolbox: the `c1` confirm
//! function, the `s1` key generation function and a source of nonces. They
//! are consumed through [`CryptoProvider`] so a controller's AES engine or a
//! test double can be plugged in.
//!
//! All values are little-endian octet arrays, the order they travel in over
//! the air. AES itself works on most-significant-octet-first blocks, so
//! [`e`] reverses on the way in and out.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// Cryptographic capability consumed by a pairing session
pub trait CryptoProvider: Send + Sync {
    /// Confirm value generation function `c1` (Vol 3, Part H, 2.2.3).
    ///
    /// `pres` and `preq` are the complete 7-octet PDUs, opcode included;
    /// `iat`/`rat` are the address type flags (0 = public, 1 = random).
    #[allow(clippy::too_many_arguments)]
    fn c1(
        &self,
        tk: &[u8; 16],
        rand: &[u8; 16],
        pres: &[u8; 7],
        preq: &[u8; 7],
        iat: u8,
        ia: &[u8; 6],
        rat: u8,
        ra: &[u8; 6],
    ) -> [u8; 16];

    /// Key generation function `s1` (Vol 3, Part H, 2.2.4)
    fn s1(&self, tk: &[u8; 16], r1: &[u8; 16], r2: &[u8; 16]) -> [u8; 16];

    /// Fresh 128-bit random nonce
    fn random_nonce(&self) -> [u8; 16];
}

/// Software AES-128 implementation of the legacy pairing functions
#[derive(Debug, Default, Clone, Copy)]
pub struct AesCrypto;

impl AesCrypto {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for AesCrypto {
    fn c1(
        &self,
        tk: &[u8; 16],
        rand: &[u8; 16],
        pres: &[u8; 7],
        preq: &[u8; 7],
        iat: u8,
        ia: &[u8; 6],
        rat: u8,
        ra: &[u8; 6],
    ) -> [u8; 16] {
        // p1 = pres || preq || rat' || iat'
        let mut p1 = [0u8; 16];
        p1[0] = iat;
        p1[1] = rat;
        p1[2..9].copy_from_slice(preq);
        p1[9..16].copy_from_slice(pres);

        // p2 = padding || ia || ra
        let mut p2 = [0u8; 16];
        p2[0..6].copy_from_slice(ra);
        p2[6..12].copy_from_slice(ia);

        let first = e(tk, &xor(rand, &p1));
        e(tk, &xor(&first, &p2))
    }

    fn s1(&self, tk: &[u8; 16], r1: &[u8; 16], r2: &[u8; 16]) -> [u8; 16] {
        // r' = r1' || r2', the low 64 bits of each
        let mut r_prime = [0u8; 16];
        r_prime[0..8].copy_from_slice(&r2[0..8]);
        r_prime[8..16].copy_from_slice(&r1[0..8]);

        e(tk, &r_prime)
    }

    fn random_nonce(&self) -> [u8; 16] {
        rand::random::<[u8; 16]>()
    }
}

/// Security function `e`: AES-128 encryption of `data` under `key`
pub fn e(key: &[u8; 16], data: &[u8; 16]) -> [u8; 16] {
    let mut key_be = *key;
    key_be.reverse();
    let mut block_be = *data;
    block_be.reverse();

    let cipher = Aes128::new(&GenericArray::from(key_be));
    let mut block = GenericArray::from(block_be);
    cipher.encrypt_block(&mut block);

    let mut out = [0u8; 16];
    out.copy_from_slice(&block);
    out.reverse();
    out
}

fn xor(a: &[u8; 16], b: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = a[i] ^ b[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse a most-significant-octet-first hex string into a little-endian
    /// array, matching how the specification prints its sample data
    fn le<const N: usize>(msb_first: &str) -> [u8; N] {
        let mut bytes: [u8; N] = hex::decode(msb_first).unwrap().try_into().unwrap();
        bytes.reverse();
        bytes
    }

    #[test]
    fn test_c1_sample_data() {
        let crypto = AesCrypto::new();
        let confirm = crypto.c1(
            &[0u8; 16],
            &le("5783D52156AD6F0E6388274EC6702EE0"),
            &le("05000800000302"),
            &le("07071000000101"),
            1,
            &le("A1A2A3A4A5A6"),
            0,
            &le("B1B2B3B4B5B6"),
        );
        assert_eq!(confirm, le::<16>("1e1e3fef878988ead2a74dc5bef13b86"));
    }

    #[test]
    fn test_s1_sample_data() {
        let crypto = AesCrypto::new();
        let stk = crypto.s1(
            &[0u8; 16],
            &le("000F0E0D0C0B0A091122334455667788"),
            &le("010203040506070899AABBCCDDEEFF00"),
        );
        assert_eq!(stk, le::<16>("9a1fe1f0e8b0f49b5b4216ae796da062"));
    }

    #[test]
    fn test_c1_depends_on_every_input() {
        let crypto = AesCrypto::new();
        let tk = [0u8; 16];
        let r = [0x55u8; 16];
        let preq = [0x01, 0x02, 0x00, 0x01, 0x10, 0x00, 0x01];
        let pres = [0x02, 0x03, 0x00, 0x01, 0x10, 0x00, 0x01];
        let ia = [1, 2, 3, 4, 5, 6];
        let ra = [6, 5, 4, 3, 2, 1];
        let base = crypto.c1(&tk, &r, &pres, &preq, 0, &ia, 0, &ra);

        assert_ne!(base, crypto.c1(&[1u8; 16], &r, &pres, &preq, 0, &ia, 0, &ra));
        assert_ne!(base, crypto.c1(&tk, &[0x56u8; 16], &pres, &preq, 0, &ia, 0, &ra));
        assert_ne!(base, crypto.c1(&tk, &r, &preq, &pres, 0, &ia, 0, &ra));
        assert_ne!(base, crypto.c1(&tk, &r, &pres, &preq, 1, &ia, 0, &ra));
        assert_ne!(base, crypto.c1(&tk, &r, &pres, &preq, 0, &ra, 0, &ia));
    }

    #[test]
    fn test_random_nonces_differ() {
        let crypto = AesCrypto::new();
        assert_ne!(crypto.random_nonce(), crypto.random_nonce());
    }
}
