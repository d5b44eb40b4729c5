//! Wire nonces.
//!
//! Every authenticated encryption on a connection uses a 24-byte nonce that
//! is incremented exactly once per packet in its direction. The send and
//! receive directions hold independent nonce values that are never shared.

use crypto_box::aead::OsRng;
use rand::RngCore;

use crate::core::NONCE_SIZE;

/// A 24-byte wire nonce with an explicit increment operation.
///
/// Ownership discipline is structural: the outbound pipeline owns the send
/// nonce, the inbound pipeline owns the receive nonce, and neither exposes
/// a mutable accessor to the other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a fresh random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create a nonce from raw bytes.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Increment by one, big-endian, wrapping at the top.
    ///
    /// Must be invoked exactly once per packet encrypted or decrypted in
    /// the owning direction; the peer's corresponding counter must advance
    /// in lockstep or decryption fails.
    pub fn increment(&mut self) {
        for byte in self.0.iter_mut().rev() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                break;
            }
        }
    }

    /// Convert to the AEAD nonce type.
    pub(crate) fn to_aead(&self) -> crypto_box::Nonce {
        crypto_box::Nonce::clone_from_slice(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_low_byte() {
        let mut nonce = Nonce::from_bytes([0u8; NONCE_SIZE]);
        nonce.increment();
        let mut expected = [0u8; NONCE_SIZE];
        expected[NONCE_SIZE - 1] = 1;
        assert_eq!(nonce.as_bytes(), &expected);
    }

    #[test]
    fn test_increment_carries() {
        let mut bytes = [0u8; NONCE_SIZE];
        bytes[NONCE_SIZE - 1] = 0xff;
        bytes[NONCE_SIZE - 2] = 0xff;
        let mut nonce = Nonce::from_bytes(bytes);
        nonce.increment();

        let mut expected = [0u8; NONCE_SIZE];
        expected[NONCE_SIZE - 3] = 1;
        assert_eq!(nonce.as_bytes(), &expected);
    }

    #[test]
    fn test_increment_wraps() {
        let mut nonce = Nonce::from_bytes([0xff; NONCE_SIZE]);
        nonce.increment();
        assert_eq!(nonce.as_bytes(), &[0u8; NONCE_SIZE]);
    }

    #[test]
    fn test_generated_nonces_differ() {
        // Identical random nonces would mean a broken RNG.
        assert_ne!(Nonce::generate(), Nonce::generate());
    }

    #[test]
    fn test_sequential_increments_are_distinct() {
        let mut nonce = Nonce::generate();
        let first = nonce.clone();
        nonce.increment();
        assert_ne!(first, nonce);
        nonce.increment();
        assert_ne!(first, nonce);
    }
}
