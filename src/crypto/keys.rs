//! X25519 key management.
//!
//! Thin wrappers over `crypto_box` key types. Secret key material is
//! zeroized on drop by the underlying crate.

use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey};

use crate::core::{PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};

/// A long-term X25519 keypair identifying a relay or peer.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Create a keypair from existing secret key material.
    pub fn from_secret_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Get the secret key.
    ///
    /// Handle with care - this exposes sensitive key material.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &fingerprint(&self.public))
            .finish_non_exhaustive()
    }
}

/// Short hex fingerprint of a public key, for log lines only.
pub fn fingerprint(key: &PublicKey) -> String {
    hex::encode(&key.as_bytes()[..8])
}

/// Raw public key bytes, used as registry and routing-table keys.
pub type PublicKeyBytes = [u8; PUBLIC_KEY_SIZE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();

        // Keys should be different
        assert_ne!(kp1.public_key().as_bytes(), kp2.public_key().as_bytes());
    }

    #[test]
    fn test_keypair_from_secret_bytes() {
        let kp = Keypair::generate();
        let restored = Keypair::from_secret_bytes(kp.secret_key().to_bytes());
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let kp = Keypair::generate();
        let fp = fingerprint(kp.public_key());
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
