//! Frame encoding and decoding.
//!
//! Every post-handshake unit on the wire is `length:u16-be || ciphertext`,
//! where the ciphertext is the authenticated encryption of a plaintext
//! whose first byte is the packet type.

use std::fmt;

use crypto_box::SalsaBox;
use crypto_box::aead::Aead;

use crate::core::{
    CryptoError, LENGTH_PREFIX_SIZE, MAX_FRAME_PAYLOAD, ProtocolError, RESERVED_TYPE_COUNT,
};
use crate::crypto::Nonce;

/// Routing request (peer asks the relay for a connection-id slot).
pub const PACKET_ROUTING_REQUEST: u8 = 0;
/// Routing response.
pub const PACKET_ROUTING_RESPONSE: u8 = 1;
/// A routed peer came online.
pub const PACKET_CONNECTION_NOTIFICATION: u8 = 2;
/// A routed peer went offline.
pub const PACKET_DISCONNECT_NOTIFICATION: u8 = 3;
/// Liveness probe.
pub const PACKET_PING: u8 = 4;
/// Liveness reply echoing the ping id.
pub const PACKET_PONG: u8 = 5;
/// Out-of-band send toward a peer.
pub const PACKET_OOB_SEND: u8 = 6;
/// Out-of-band delivery from a peer.
pub const PACKET_OOB_RECV: u8 = 7;
/// Onion request toward the onion subsystem.
pub const PACKET_ONION_REQUEST: u8 = 8;
/// Onion response from the onion subsystem.
pub const PACKET_ONION_RESPONSE: u8 = 9;

/// Size of the ping id carried by ping and pong bodies.
pub const PING_ID_SIZE: usize = 8;

/// Classification of a packet-type byte.
///
/// Total over the whole byte space: 0-9 are the named control types,
/// 10-15 are reserved but unassigned, and everything at or above
/// [`RESERVED_TYPE_COUNT`] is routed application data for a connection-id
/// slot. Reserved and routed types are forwarded to the pluggable handler,
/// never treated as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Routing request.
    RoutingRequest,
    /// Routing response.
    RoutingResponse,
    /// Peer-online notification.
    ConnectionNotification,
    /// Peer-offline notification.
    DisconnectNotification,
    /// Liveness probe.
    Ping,
    /// Liveness reply.
    Pong,
    /// Out-of-band send.
    OobSend,
    /// Out-of-band delivery.
    OobRecv,
    /// Onion request.
    OnionRequest,
    /// Onion response.
    OnionResponse,
    /// Reserved-unassigned type in the 10-15 range.
    Reserved(u8),
    /// Routed application data for a connection-id slot (>= 16).
    Data(u8),
}

impl PacketKind {
    /// Classify a raw packet-type byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            PACKET_ROUTING_REQUEST => Self::RoutingRequest,
            PACKET_ROUTING_RESPONSE => Self::RoutingResponse,
            PACKET_CONNECTION_NOTIFICATION => Self::ConnectionNotification,
            PACKET_DISCONNECT_NOTIFICATION => Self::DisconnectNotification,
            PACKET_PING => Self::Ping,
            PACKET_PONG => Self::Pong,
            PACKET_OOB_SEND => Self::OobSend,
            PACKET_OOB_RECV => Self::OobRecv,
            PACKET_ONION_REQUEST => Self::OnionRequest,
            PACKET_ONION_RESPONSE => Self::OnionResponse,
            b if b < RESERVED_TYPE_COUNT => Self::Reserved(b),
            b => Self::Data(b),
        }
    }

    /// The raw packet-type byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::RoutingRequest => PACKET_ROUTING_REQUEST,
            Self::RoutingResponse => PACKET_ROUTING_RESPONSE,
            Self::ConnectionNotification => PACKET_CONNECTION_NOTIFICATION,
            Self::DisconnectNotification => PACKET_DISCONNECT_NOTIFICATION,
            Self::Ping => PACKET_PING,
            Self::Pong => PACKET_PONG,
            Self::OobSend => PACKET_OOB_SEND,
            Self::OobRecv => PACKET_OOB_RECV,
            Self::OnionRequest => PACKET_ONION_REQUEST,
            Self::OnionResponse => PACKET_ONION_RESPONSE,
            Self::Reserved(b) | Self::Data(b) => b,
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoutingRequest => write!(f, "ROUTING_REQUEST"),
            Self::RoutingResponse => write!(f, "ROUTING_RESPONSE"),
            Self::ConnectionNotification => write!(f, "CONNECTION_NOTIFICATION"),
            Self::DisconnectNotification => write!(f, "DISCONNECT_NOTIFICATION"),
            Self::Ping => write!(f, "PING"),
            Self::Pong => write!(f, "PONG"),
            Self::OobSend => write!(f, "OOB_SEND"),
            Self::OobRecv => write!(f, "OOB_RECV"),
            Self::OnionRequest => write!(f, "ONION_REQUEST"),
            Self::OnionResponse => write!(f, "ONION_RESPONSE"),
            Self::Reserved(b) => write!(f, "RESERVED_{b}"),
            Self::Data(b) => write!(f, "DATA_FOR_CONNID_{b}"),
        }
    }
}

/// Encrypt a plaintext and prepend the big-endian length prefix.
///
/// The caller owns the nonce and increments it after the frame is actually
/// written to the socket.
pub fn seal(
    cipher: &SalsaBox,
    nonce: &Nonce,
    plaintext: &[u8],
) -> Result<Vec<u8>, crate::core::ConnectionError> {
    if plaintext.is_empty() {
        return Err(ProtocolError::EmptyPacket.into());
    }
    if plaintext.len() > MAX_FRAME_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            len: plaintext.len(),
            max: MAX_FRAME_PAYLOAD,
        }
        .into());
    }

    let ciphertext = cipher
        .encrypt(&nonce.to_aead(), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + ciphertext.len());
    frame.extend_from_slice(&(ciphertext.len() as u16).to_be_bytes());
    frame.extend_from_slice(&ciphertext);
    Ok(frame)
}

/// Decrypt one frame body (the bytes after the length prefix).
///
/// The caller owns the nonce and increments it after a successful open.
pub fn open(
    cipher: &SalsaBox,
    nonce: &Nonce,
    body: &[u8],
) -> Result<Vec<u8>, crate::core::ConnectionError> {
    let plaintext = cipher
        .decrypt(&nonce.to_aead(), body)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    if plaintext.is_empty() {
        return Err(ProtocolError::EmptyPacket.into());
    }
    Ok(plaintext)
}

/// Build a PING plaintext carrying `ping_id`.
pub fn ping_packet(ping_id: u64) -> Vec<u8> {
    let mut packet = Vec::with_capacity(1 + PING_ID_SIZE);
    packet.push(PACKET_PING);
    packet.extend_from_slice(&ping_id.to_be_bytes());
    packet
}

/// Build a PONG plaintext echoing `ping_id`.
pub fn pong_packet(ping_id: u64) -> Vec<u8> {
    let mut packet = Vec::with_capacity(1 + PING_ID_SIZE);
    packet.push(PACKET_PONG);
    packet.extend_from_slice(&ping_id.to_be_bytes());
    packet
}

/// Parse the 8-byte big-endian ping id from a ping or pong body.
pub fn parse_ping_id(body: &[u8]) -> Result<u64, ProtocolError> {
    let arr: [u8; PING_ID_SIZE] = body
        .get(..PING_ID_SIZE)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::TruncatedPingBody(body.len()))?;
    Ok(u64::from_be_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConnectionError, MAC_SIZE};
    use crate::crypto::Keypair;
    use crypto_box::SalsaBox;

    fn test_cipher() -> SalsaBox {
        let a = Keypair::generate();
        let b = Keypair::generate();
        SalsaBox::new(b.public_key(), a.secret_key())
    }

    fn peer_ciphers() -> (SalsaBox, SalsaBox) {
        let a = Keypair::generate();
        let b = Keypair::generate();
        (
            SalsaBox::new(b.public_key(), a.secret_key()),
            SalsaBox::new(a.public_key(), b.secret_key()),
        )
    }

    #[test]
    fn test_packet_kind_covers_the_byte_space() {
        assert_eq!(PacketKind::from_byte(4), PacketKind::Ping);
        assert_eq!(PacketKind::from_byte(5), PacketKind::Pong);
        assert_eq!(PacketKind::from_byte(10), PacketKind::Reserved(10));
        assert_eq!(PacketKind::from_byte(15), PacketKind::Reserved(15));
        assert_eq!(PacketKind::from_byte(16), PacketKind::Data(16));
        assert_eq!(PacketKind::from_byte(255), PacketKind::Data(255));

        for byte in 0..=255u8 {
            assert_eq!(PacketKind::from_byte(byte).as_byte(), byte);
        }
    }

    #[test]
    fn test_packet_kind_names() {
        assert_eq!(PacketKind::from_byte(0).to_string(), "ROUTING_REQUEST");
        assert_eq!(PacketKind::from_byte(12).to_string(), "RESERVED_12");
        assert_eq!(PacketKind::from_byte(42).to_string(), "DATA_FOR_CONNID_42");
    }

    #[test]
    fn test_frame_roundtrip_and_length_prefix() {
        let (seal_side, open_side) = peer_ciphers();
        let nonce = Nonce::generate();

        let plaintext = vec![PACKET_PING, 1, 2, 3, 4, 5, 6, 7, 8];
        let frame = seal(&seal_side, &nonce, &plaintext).unwrap();

        // First two bytes are L + MAC_SIZE, big-endian.
        let prefixed = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(prefixed, plaintext.len() + MAC_SIZE);
        assert_eq!(frame.len(), LENGTH_PREFIX_SIZE + prefixed);

        let recovered = open(&open_side, &nonce, &frame[LENGTH_PREFIX_SIZE..]).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn test_open_with_wrong_nonce_fails() {
        let (seal_side, open_side) = peer_ciphers();
        let nonce = Nonce::generate();

        let frame = seal(&seal_side, &nonce, b"\x04payload").unwrap();

        let mut wrong = nonce.clone();
        wrong.increment();
        let err = open(&open_side, &wrong, &frame[LENGTH_PREFIX_SIZE..]);
        assert!(matches!(
            err,
            Err(ConnectionError::Crypto(CryptoError::DecryptionFailed))
        ));
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let (seal_side, _) = peer_ciphers();
        let stranger = test_cipher();
        let nonce = Nonce::generate();

        let frame = seal(&seal_side, &nonce, b"\x04payload").unwrap();
        let err = open(&stranger, &nonce, &frame[LENGTH_PREFIX_SIZE..]);
        assert!(matches!(
            err,
            Err(ConnectionError::Crypto(CryptoError::DecryptionFailed))
        ));
    }

    #[test]
    fn test_seal_rejects_empty_and_oversized() {
        let cipher = test_cipher();
        let nonce = Nonce::generate();

        assert!(matches!(
            seal(&cipher, &nonce, b""),
            Err(ConnectionError::Protocol(ProtocolError::EmptyPacket))
        ));

        let oversized = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        assert!(matches!(
            seal(&cipher, &nonce, &oversized),
            Err(ConnectionError::Protocol(
                ProtocolError::PayloadTooLarge { .. }
            ))
        ));
    }

    #[test]
    fn test_ping_pong_bodies() {
        let ping = ping_packet(42);
        assert_eq!(ping[0], PACKET_PING);
        assert_eq!(parse_ping_id(&ping[1..]).unwrap(), 42);

        let pong = pong_packet(u64::MAX);
        assert_eq!(pong[0], PACKET_PONG);
        assert_eq!(parse_ping_id(&pong[1..]).unwrap(), u64::MAX);

        assert!(matches!(
            parse_ping_id(&[1, 2, 3]),
            Err(ProtocolError::TruncatedPingBody(3))
        ));
    }
}
