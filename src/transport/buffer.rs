//! Inbound byte accumulator.
//!
//! A growable FIFO byte queue that turns arbitrary partial socket reads
//! back into whole frames: push raw bytes in, pop exact frame-sized chunks
//! out once enough data has arrived.

use std::collections::VecDeque;

use thiserror::Error;

use crate::core::RECV_BUFFER_CAPACITY;

/// The accumulator's fixed capacity was exceeded.
///
/// A protocol-conformant peer can never trigger this; it is an invariant
/// violation that closes the connection rather than aborting the process.
#[derive(Debug, Error)]
#[error("{needed} bytes buffered would exceed capacity {capacity}")]
pub struct BufferOverflow {
    /// Bytes that would have been buffered.
    pub needed: usize,
    /// The fixed capacity.
    pub capacity: usize,
}

/// FIFO byte queue feeding length-prefix reassembly.
#[derive(Debug)]
pub struct RecvBuffer {
    bytes: VecDeque<u8>,
    capacity: usize,
}

impl RecvBuffer {
    /// Create an accumulator with the protocol's default capacity.
    pub fn new() -> Self {
        Self::with_capacity(RECV_BUFFER_CAPACITY)
    }

    /// Create an accumulator with an explicit capacity bound.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            capacity,
        }
    }

    /// Append raw bytes from the socket.
    pub fn push(&mut self, data: &[u8]) -> Result<(), BufferOverflow> {
        let needed = self.bytes.len() + data.len();
        if needed > self.capacity {
            return Err(BufferOverflow {
                needed,
                capacity: self.capacity,
            });
        }
        self.bytes.extend(data);
        Ok(())
    }

    /// Number of bytes currently buffered.
    pub fn available(&self) -> usize {
        self.bytes.len()
    }

    /// Remove and return exactly `n` bytes, or `None` if fewer are
    /// buffered (nothing is consumed in that case).
    pub fn pop_exact(&mut self, n: usize) -> Option<Vec<u8>> {
        if self.bytes.len() < n {
            return None;
        }
        Some(self.bytes.drain(..n).collect())
    }

    /// Remove and return a big-endian `u16`, or `None` if fewer than two
    /// bytes are buffered.
    pub fn pop_u16(&mut self) -> Option<u16> {
        let bytes = self.pop_exact(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

impl Default for RecvBuffer {
    fn default() -> Self {
        Self::new()
    }
}
