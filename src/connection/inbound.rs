//! Inbound pipeline: socket reads, frame reassembly, decryption, and
//! packet dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crypto_box::{PublicKey, SalsaBox};
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::core::{ConnectionError, ConnectionHooks, PacketHandler, READ_CHUNK_SIZE};
use crate::crypto::Nonce;
use crate::transport::{
    PacketKind, RecvBuffer, ThroughputMeter, open, parse_ping_id, pong_packet,
};

use super::{ConnectionStatus, StatusCell};

/// Owns the read half of the socket, the receive cipher, and the receive
/// nonce. Nothing else touches them.
pub(crate) struct Inbound {
    reader: OwnedReadHalf,
    cipher: SalsaBox,
    nonce: Nonce,
    peer_key: PublicKey,
    status: Arc<StatusCell>,
    ctrl_tx: mpsc::Sender<Vec<u8>>,
    pending_ping: Arc<AtomicU64>,
    hooks: Arc<dyn ConnectionHooks>,
    handler: Arc<dyn PacketHandler>,
    buffer: RecvBuffer,
    next_len: Option<u16>,
    meter: ThroughputMeter,
}

impl Inbound {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        reader: OwnedReadHalf,
        cipher: SalsaBox,
        nonce: Nonce,
        peer_key: PublicKey,
        status: Arc<StatusCell>,
        ctrl_tx: mpsc::Sender<Vec<u8>>,
        pending_ping: Arc<AtomicU64>,
        hooks: Arc<dyn ConnectionHooks>,
        handler: Arc<dyn PacketHandler>,
    ) -> Self {
        Self {
            reader,
            cipher,
            nonce,
            peer_key,
            status,
            ctrl_tx,
            pending_ping,
            hooks,
            handler,
            buffer: RecvBuffer::new(),
            next_len: None,
            meter: ThroughputMeter::new(),
        }
    }

    /// Read until EOF or a protocol violation.
    ///
    /// A clean EOF ends the connection without error; any framing,
    /// decryption, or buffer fault closes it with the cause.
    pub(crate) async fn run(mut self) -> Result<(), ConnectionError> {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            self.hooks.on_bytes_received(n);
            if let Some(avg) = self.meter.record(n) {
                trace!(avg_bps = avg, "recv throughput");
            }
            self.buffer.push(&chunk[..n])?;
            self.drain_frames()?;
        }
    }

    /// Decode every complete frame currently buffered.
    ///
    /// A frame may straddle reads, so the pending length prefix is held
    /// across calls until its body arrives.
    fn drain_frames(&mut self) -> Result<(), ConnectionError> {
        loop {
            let len = match self.next_len {
                Some(len) => len,
                None => match self.buffer.pop_u16() {
                    Some(len) => {
                        self.next_len = Some(len);
                        len
                    }
                    None => return Ok(()),
                },
            };
            let Some(body) = self.buffer.pop_exact(len as usize) else {
                return Ok(());
            };
            self.next_len = None;

            let plain = open(&self.cipher, &self.nonce, &body)?;
            self.nonce.increment();
            self.handle_packet(&plain)?;
        }
    }

    fn handle_packet(&mut self, plain: &[u8]) -> Result<(), ConnectionError> {
        // Any successfully decrypted packet proves the peer holds the
        // session key, so the first one confirms the connection.
        if self.status.get() == ConnectionStatus::Unconfirmed {
            self.status.advance(ConnectionStatus::Confirmed);
            self.hooks.on_confirmed(&self.peer_key);
        }

        let kind = PacketKind::from_byte(plain[0]);
        match kind {
            PacketKind::Ping => {
                let id = parse_ping_id(&plain[1..])?;
                // A dropped pong just means the peer pings again.
                if self.ctrl_tx.try_send(pong_packet(id)).is_err() {
                    warn!(id, "control queue full, pong dropped");
                }
            }
            PacketKind::Pong => {
                let id = parse_ping_id(&plain[1..])?;
                let _ = self
                    .pending_ping
                    .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire);
                self.handler.on_packet(&self.peer_key, kind, &plain[1..]);
            }
            other => self.handler.on_packet(&self.peer_key, other, &plain[1..]),
        }
        Ok(())
    }
}
