//! COURIER Protocol - Crypto Layer
//!
//! Key management, wire nonces, and the two-message relay handshake.
//!
//! The primitives themselves are the classic crypto-box construction
//! (X25519 + XSalsa20-Poly1305) supplied by the `crypto_box` crate; this
//! module only wraps them with the protocol's key/nonce bookkeeping.

pub use crypto_box::{PublicKey, SecretKey};

mod handshake;
mod keys;
mod nonce;

pub use handshake::*;
pub use keys::*;
pub use nonce::*;
