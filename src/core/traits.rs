//! Core traits for the COURIER protocol.
//!
//! These are the seams between the relay core and the surrounding system:
//! lifecycle hooks, the pluggable packet dispatcher, and the opaque onion
//! collaborator handle.

use std::net::SocketAddr;

use crypto_box::PublicKey;

use crate::transport::PacketKind;

/// Lifecycle callbacks fired by a secure connection.
///
/// All methods have no-op defaults; implement only what the embedding
/// system needs. Hooks run on the connection's pipeline tasks and must not
/// block.
pub trait ConnectionHooks: Send + Sync + 'static {
    /// Raw bytes arrived from the socket (pre-decrypt).
    fn on_bytes_received(&self, _n: usize) {}

    /// An encrypted frame was written to the socket.
    fn on_bytes_sent(&self, _n: usize) {}

    /// The first post-handshake packet decrypted cleanly; both sides hold
    /// the session key. The connection is now `Confirmed`.
    fn on_confirmed(&self, _peer: &PublicKey) {}

    /// The connection terminated. `peer` is `None` when the socket closed
    /// before the handshake revealed a public key.
    fn on_closed(&self, _peer: Option<&PublicKey>, _addr: SocketAddr) {}
}

/// Hooks implementation that does nothing.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl ConnectionHooks for NoopHooks {}

/// Pluggable dispatcher for packet types whose semantics live outside the
/// relay core.
///
/// PING is answered internally, and PONG liveness bookkeeping happens
/// before forwarding. Everything else arrives here with its body (the
/// plaintext after the type byte): the routing family, notifications,
/// OOB packets, onion packets, the reserved 10-15 range, and routed-data
/// ids at 16 and above. Unrecognized types are forwarded, never treated
/// as an error.
pub trait PacketHandler: Send + Sync + 'static {
    /// Handle one decrypted packet from `peer`.
    fn on_packet(&self, peer: &PublicKey, kind: PacketKind, body: &[u8]);
}

/// Handler that logs and otherwise ignores every packet.
#[derive(Debug, Default)]
pub struct NullHandler;

impl PacketHandler for NullHandler {
    fn on_packet(&self, peer: &PublicKey, kind: PacketKind, body: &[u8]) {
        tracing::trace!(
            peer = %crate::crypto::fingerprint(peer),
            kind = %kind,
            len = body.len(),
            "unhandled packet"
        );
    }
}

/// Opaque handle to the onion-routing collaborator.
///
/// The relay core stores this and nothing more; no calls into it are
/// defined here. It exists so the surrounding system can thread its onion
/// subsystem through the server without the core depending on its shape.
pub trait OnionRouter: Send + Sync + 'static {}
