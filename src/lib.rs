//! # COURIER Protocol
//!
//! **C**onfidential **O**verlay **U**ntrusted **R**elay
//!
//! COURIER is the TCP relay core of an encrypted peer overlay: it lets two
//! peers that cannot reach each other directly exchange authenticated,
//! encrypted packets through a relay node that never sees plaintext after
//! the handshake. It provides:
//!
//! - **Security**: a fixed two-message handshake deriving a fresh per-session
//!   key (ephemeral X25519), with independent per-direction nonces
//! - **Framing**: length-prefixed authenticated frames over TCP with
//!   incremental reassembly from partial reads
//! - **Backpressure**: bounded, prioritized per-connection output queues with
//!   non-blocking, fallible enqueue
//! - **Isolation**: protocol violations from the network close only the
//!   offending connection, never the process
//!
//! ## Modules
//!
//! - [`core`]: constants, error types, and the traits at the crate's seams
//! - [`crypto`]: keys, wire nonces, and the relay handshake
//! - [`transport`]: frame codec, receive accumulator, throughput metering
//! - [`connection`]: the secure connection state machine and its two pipelines
//! - [`server`]: the multi-port relay server and its connection registries
//!
//! ## Example Usage
//!
//! ```no_run
//! use courier_protocol::prelude::*;
//!
//! # async fn run() -> Result<(), RelayError> {
//! let keypair = Keypair::generate();
//! let config = RelayConfig {
//!     ports: vec![33445, 3389],
//!     ..RelayConfig::default()
//! };
//! let mut relay = RelayServer::new(keypair, config);
//! let addrs = relay.bind().await?;
//! println!("relay listening on {addrs:?}");
//! relay.run().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod core;
pub mod crypto;
pub mod server;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::connection::{ConnectionHandle, ConnectionStatus, SecureConnection};
    pub use crate::core::*;
    pub use crate::crypto::{ClientHandshake, Keypair, Nonce, SessionKeys};
    pub use crate::server::{RelayConfig, RelayServer};
    pub use crate::transport::PacketKind;
}

// Re-export commonly used items at crate root
pub use connection::{ConnectionHandle, ConnectionStatus, SecureConnection};
pub use self::core::{ConnectionError, ConnectionHooks, CryptoError, PacketHandler, RelayError};
pub use crypto::{Keypair, Nonce};
pub use server::{RelayConfig, RelayServer};
pub use transport::PacketKind;
