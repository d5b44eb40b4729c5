//! COURIER Protocol - Secure Connection
//!
//! One accepted TCP socket wrapped in the relay's secure connection:
//! handshake, forward-only status machine, routing table, and the two
//! independently scheduled pipelines (inbound decode, outbound encode)
//! that own the crypto state of their direction exclusively.

mod inbound;
mod outbound;
mod peer;
mod secure;
mod status;

pub use peer::*;
pub use secure::*;
pub use status::*;
