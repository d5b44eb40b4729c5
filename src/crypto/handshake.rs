//! The two-message relay handshake.
//!
//! ```text
//! client -> relay:  pubkey(32) || nonce(24) || Box_shr0(temp_pk(32) || seed(24))
//! relay  -> client: nonce(24)  ||             Box_shr0(temp_pk(32) || sent(24))
//! ```
//!
//! `shr0 = DH(client static, relay static)` protects only the handshake
//! blobs. The session key for every later frame is a fresh ephemeral
//! exchange, `DH(client temp, relay temp)`, so session traffic stays
//! forward-secret independent of the long-term keys. The client's `seed`
//! becomes the relay's receive nonce; the relay's `sent` becomes the
//! relay's send nonce.

use crypto_box::aead::{Aead, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use zeroize::Zeroize;

use crate::core::{
    CLIENT_HANDSHAKE_SIZE, CryptoError, HANDSHAKE_PLAIN_SIZE, NONCE_SIZE, PUBLIC_KEY_SIZE,
    SERVER_HANDSHAKE_SIZE,
};

use super::Nonce;

/// Everything a completed handshake yields.
///
/// The two cipher/nonce pairs are constructed separately so each pipeline
/// takes exclusive ownership of its direction; nothing is shared after the
/// handshake returns.
pub struct SessionKeys {
    /// The remote party's long-term public key.
    pub peer_key: PublicKey,
    /// Cipher for frames we send.
    pub send_cipher: SalsaBox,
    /// Cipher for frames we receive.
    pub recv_cipher: SalsaBox,
    /// Send-direction nonce, incremented once per sealed frame.
    pub send_nonce: Nonce,
    /// Receive-direction nonce, incremented once per opened frame.
    pub recv_nonce: Nonce,
}

/// Relay side of the handshake.
pub struct ServerHandshake;

impl ServerHandshake {
    /// Process a client handshake request and produce the response bytes.
    ///
    /// Any size or decrypt failure here is a protocol violation by the
    /// peer and closes only this connection.
    pub fn respond(
        relay_secret: &SecretKey,
        request: &[u8],
    ) -> Result<(SessionKeys, Vec<u8>), CryptoError> {
        if request.len() != CLIENT_HANDSHAKE_SIZE {
            return Err(CryptoError::HandshakeFailed(format!(
                "request size {}, want {CLIENT_HANDSHAKE_SIZE}",
                request.len()
            )));
        }

        let client_key = read_key(&request[..PUBLIC_KEY_SIZE])?;
        let outer_nonce = read_nonce(&request[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + NONCE_SIZE])?;

        // shr0: long-term DH, only for the handshake blobs.
        let outer = SalsaBox::new(&client_key, relay_secret);
        let mut plain = outer
            .decrypt(
                &outer_nonce.to_aead(),
                &request[PUBLIC_KEY_SIZE + NONCE_SIZE..],
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;
        if plain.len() != HANDSHAKE_PLAIN_SIZE {
            plain.zeroize();
            return Err(CryptoError::HandshakeFailed(format!(
                "handshake plaintext size {}",
                plain.len()
            )));
        }

        let client_temp = read_key(&plain[..PUBLIC_KEY_SIZE])?;
        let recv_nonce = read_nonce(&plain[PUBLIC_KEY_SIZE..])?;
        plain.zeroize();

        // Fresh ephemeral exchange for the session itself.
        let temp_secret = SecretKey::generate(&mut OsRng);
        let send_nonce = Nonce::generate();

        let mut response_plain = Vec::with_capacity(HANDSHAKE_PLAIN_SIZE);
        response_plain.extend_from_slice(temp_secret.public_key().as_bytes());
        response_plain.extend_from_slice(send_nonce.as_bytes());

        let response_nonce = Nonce::generate();
        let blob = outer
            .encrypt(&response_nonce.to_aead(), response_plain.as_slice())
            .map_err(|_| CryptoError::EncryptionFailed)?;
        response_plain.zeroize();

        let mut response = Vec::with_capacity(SERVER_HANDSHAKE_SIZE);
        response.extend_from_slice(response_nonce.as_bytes());
        response.extend_from_slice(&blob);

        let keys = SessionKeys {
            peer_key: client_key,
            send_cipher: SalsaBox::new(&client_temp, &temp_secret),
            recv_cipher: SalsaBox::new(&client_temp, &temp_secret),
            send_nonce,
            recv_nonce,
        };
        Ok((keys, response))
    }
}

/// Client side of the handshake.
///
/// Held between sending the request and consuming the relay's response.
pub struct ClientHandshake {
    relay_key: PublicKey,
    temp_secret: SecretKey,
    outer: SalsaBox,
    send_nonce: Nonce,
}

impl ClientHandshake {
    /// Build the handshake request for `relay_key`.
    ///
    /// Returns the in-flight state and the request bytes to put on the
    /// wire.
    pub fn initiate(
        client_secret: &SecretKey,
        relay_key: &PublicKey,
    ) -> Result<(Self, Vec<u8>), CryptoError> {
        let temp_secret = SecretKey::generate(&mut OsRng);
        // The seed we send becomes the relay's receive nonce, so it is our
        // send nonce.
        let send_nonce = Nonce::generate();
        let outer_nonce = Nonce::generate();

        let mut plain = Vec::with_capacity(HANDSHAKE_PLAIN_SIZE);
        plain.extend_from_slice(temp_secret.public_key().as_bytes());
        plain.extend_from_slice(send_nonce.as_bytes());

        let outer = SalsaBox::new(relay_key, client_secret);
        let blob = outer
            .encrypt(&outer_nonce.to_aead(), plain.as_slice())
            .map_err(|_| CryptoError::EncryptionFailed)?;
        plain.zeroize();

        let mut request = Vec::with_capacity(CLIENT_HANDSHAKE_SIZE);
        request.extend_from_slice(client_secret.public_key().as_bytes());
        request.extend_from_slice(outer_nonce.as_bytes());
        request.extend_from_slice(&blob);

        let state = Self {
            relay_key: relay_key.clone(),
            temp_secret,
            outer,
            send_nonce,
        };
        Ok((state, request))
    }

    /// Consume the relay's response and derive the session keys.
    pub fn finalize(self, response: &[u8]) -> Result<SessionKeys, CryptoError> {
        if response.len() != SERVER_HANDSHAKE_SIZE {
            return Err(CryptoError::HandshakeFailed(format!(
                "response size {}, want {SERVER_HANDSHAKE_SIZE}",
                response.len()
            )));
        }

        let response_nonce = read_nonce(&response[..NONCE_SIZE])?;
        let mut plain = self
            .outer
            .decrypt(&response_nonce.to_aead(), &response[NONCE_SIZE..])
            .map_err(|_| CryptoError::DecryptionFailed)?;
        if plain.len() != HANDSHAKE_PLAIN_SIZE {
            plain.zeroize();
            return Err(CryptoError::HandshakeFailed(format!(
                "handshake plaintext size {}",
                plain.len()
            )));
        }

        let relay_temp = read_key(&plain[..PUBLIC_KEY_SIZE])?;
        let recv_nonce = read_nonce(&plain[PUBLIC_KEY_SIZE..])?;
        plain.zeroize();

        Ok(SessionKeys {
            peer_key: self.relay_key,
            send_cipher: SalsaBox::new(&relay_temp, &self.temp_secret),
            recv_cipher: SalsaBox::new(&relay_temp, &self.temp_secret),
            send_nonce: self.send_nonce,
            recv_nonce,
        })
    }
}

fn read_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    let arr: [u8; PUBLIC_KEY_SIZE] = bytes
        .try_into()
        .map_err(|_| CryptoError::HandshakeFailed("truncated key field".into()))?;
    Ok(PublicKey::from(arr))
}

fn read_nonce(bytes: &[u8]) -> Result<Nonce, CryptoError> {
    let arr: [u8; NONCE_SIZE] = bytes
        .try_into()
        .map_err(|_| CryptoError::HandshakeFailed("truncated nonce field".into()))?;
    Ok(Nonce::from_bytes(arr))
}
