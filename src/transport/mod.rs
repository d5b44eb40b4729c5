//! COURIER Protocol - Transport Layer
//!
//! Wire mechanics below the connection state machine:
//!
//! - **Frame codec**: [`PacketKind`], [`seal`]/[`open`] for the
//!   `length:u16-be || ciphertext` framing
//! - **Receive accumulator**: [`RecvBuffer`], a growable byte queue driving
//!   length-prefix reassembly across partial socket reads
//! - **Throughput metering**: [`ThroughputMeter`] rolling bytes/sec for
//!   diagnostics
//!
//! Everything here is synchronous and socket-agnostic; the connection
//! pipelines own the I/O.

mod buffer;
mod frame;
mod throughput;

pub use buffer::*;
pub use frame::*;
pub use throughput::*;
