//! Error types for the COURIER protocol.

use thiserror::Error;

/// Errors in the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Authenticated encryption failed.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Authenticated decryption failed (invalid tag or corrupted).
    #[error("decryption failed (invalid tag or corrupted)")]
    DecryptionFailed,
}

/// Protocol violations observed on the wire.
///
/// These always come from the remote peer and must never escalate beyond
/// the offending connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Decrypted frame carried no packet-type byte.
    #[error("empty packet plaintext")]
    EmptyPacket,

    /// Ping or pong body shorter than the 8-byte ping id.
    #[error("truncated ping body: {0} bytes")]
    TruncatedPingBody(usize),

    /// Payload exceeds what the frame format or queue policy allows.
    #[error("payload too large: {len} bytes, limit {max}")]
    PayloadTooLarge {
        /// Offered payload length.
        len: usize,
        /// Applicable limit.
        max: usize,
    },
}

/// Errors terminating or rejected by a single secure connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Socket read/write failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Crypto failure (handshake or frame decrypt).
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Protocol violation by the peer.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Outbound queue at capacity; the payload was dropped. Non-fatal,
    /// the caller may retry or accept the loss.
    #[error("outbound queue full, packet dropped")]
    QueueFull,

    /// Connection already closed.
    #[error("connection closed")]
    Closed,

    /// Peer failed to answer a ping within the timeout.
    #[error("ping timed out")]
    PingTimeout,

    /// Inbound accumulator exceeded its fixed capacity. Invariant
    /// violation; the connection is closed.
    #[error("receive buffer overflow: {0}")]
    BufferOverflow(#[from] crate::transport::BufferOverflow),
}

/// Errors raised by the relay server itself.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Failed to bind a listening port.
    #[error("bind failed on port {port}: {source}")]
    Bind {
        /// The configured port.
        port: u16,
        /// Underlying error.
        source: std::io::Error,
    },

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
