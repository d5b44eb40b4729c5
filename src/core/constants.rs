//! Protocol constants.
//!
//! These values are fixed by the wire protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// X25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 secret key size.
pub const SECRET_KEY_SIZE: usize = 32;

/// XSalsa20 wire nonce size.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size.
pub const MAC_SIZE: usize = 16;

// =============================================================================
// HANDSHAKE SIZES
// =============================================================================

/// Plaintext carried inside each handshake blob (temp key + nonce).
pub const HANDSHAKE_PLAIN_SIZE: usize = PUBLIC_KEY_SIZE + NONCE_SIZE;

/// Total client handshake request size:
/// `pubkey || nonce || Box(temp pubkey || nonce seed)`.
pub const CLIENT_HANDSHAKE_SIZE: usize =
    PUBLIC_KEY_SIZE + NONCE_SIZE + HANDSHAKE_PLAIN_SIZE + MAC_SIZE;

/// Total relay handshake response size:
/// `nonce || Box(temp pubkey || send nonce)`.
pub const SERVER_HANDSHAKE_SIZE: usize = NONCE_SIZE + HANDSHAKE_PLAIN_SIZE + MAC_SIZE;

// =============================================================================
// FRAMING
// =============================================================================

/// Size of the big-endian length prefix on every data frame.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest plaintext that still fits the `u16` length prefix after sealing.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize - MAC_SIZE;

/// Maximum control-packet plaintext size; larger payloads are rejected
/// before enqueue.
pub const MAX_PACKET_SIZE: usize = 2048;

/// Packet types below this value are reserved control types; types at or
/// above it are per-connection routed-data ids.
pub const RESERVED_TYPE_COUNT: u8 = 16;

// =============================================================================
// RESOURCE BOUNDS
// =============================================================================

/// Inbound byte accumulator capacity. A protocol-conformant peer can never
/// overflow this; hitting it is an invariant violation that closes the
/// connection.
pub const RECV_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Bounded capacity of the prioritized control output queue.
pub const CONTROL_QUEUE_CAPACITY: usize = 64;

/// Bounded capacity of the data output queue.
pub const DATA_QUEUE_CAPACITY: usize = 128;

/// Chunk size for socket reads feeding the accumulator.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Maximum simultaneous connections accepted across both registries.
pub const MAX_INCOMING_CONNECTIONS: usize = 256;

// =============================================================================
// LIVENESS
// =============================================================================

/// Interval between relay-initiated pings on an idle connection.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long an outstanding ping may go unanswered before the peer is
/// considered dead.
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);
