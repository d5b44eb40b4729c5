//! Outbound pipeline: queue draining, encryption, socket writes, and
//! ping liveness.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crypto_box::SalsaBox;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, sleep_until};
use tracing::trace;

use crate::core::{ConnectionError, ConnectionHooks, PING_INTERVAL, PING_TIMEOUT};
use crate::crypto::Nonce;
use crate::transport::{ThroughputMeter, ping_packet, seal};

/// Owns the write half of the socket, the send cipher, and the send
/// nonce. All frames leave through here, so the nonce sequence matches
/// the wire order exactly.
pub(crate) struct Outbound {
    writer: OwnedWriteHalf,
    cipher: SalsaBox,
    nonce: Nonce,
    ctrl_rx: mpsc::Receiver<Vec<u8>>,
    data_rx: mpsc::Receiver<Vec<u8>>,
    pending_ping: Arc<AtomicU64>,
    hooks: Arc<dyn ConnectionHooks>,
    ping_deadline: Option<Instant>,
    meter: ThroughputMeter,
}

impl Outbound {
    pub(crate) fn new(
        writer: OwnedWriteHalf,
        cipher: SalsaBox,
        nonce: Nonce,
        ctrl_rx: mpsc::Receiver<Vec<u8>>,
        data_rx: mpsc::Receiver<Vec<u8>>,
        pending_ping: Arc<AtomicU64>,
        hooks: Arc<dyn ConnectionHooks>,
    ) -> Self {
        Self {
            writer,
            cipher,
            nonce,
            ctrl_rx,
            data_rx,
            pending_ping,
            hooks,
            ping_deadline: None,
            meter: ThroughputMeter::new(),
        }
    }

    /// Drain the queues until both close, the socket fails, or a ping
    /// goes unanswered.
    ///
    /// Control and data are polled fairly, but every data write is
    /// followed by a full control drain so pongs never starve behind a
    /// stream of data frames.
    pub(crate) async fn run(mut self) -> Result<(), ConnectionError> {
        let mut ping_timer = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        loop {
            // The guard keeps the branch disabled while no ping is in
            // flight; the fallback value is never slept on.
            let deadline = self
                .ping_deadline
                .unwrap_or_else(|| Instant::now() + PING_INTERVAL);

            tokio::select! {
                maybe = self.ctrl_rx.recv() => {
                    let Some(packet) = maybe else { return Ok(()) };
                    self.write_frame(&packet).await?;
                }
                maybe = self.data_rx.recv() => {
                    let Some(packet) = maybe else { return Ok(()) };
                    self.write_frame(&packet).await?;
                    self.flush_control().await?;
                }
                _ = ping_timer.tick() => {
                    self.send_ping().await?;
                }
                _ = sleep_until(deadline), if self.ping_deadline.is_some() => {
                    if self.pending_ping.load(Ordering::Acquire) != 0 {
                        return Err(ConnectionError::PingTimeout);
                    }
                    self.ping_deadline = None;
                }
            }
        }
    }

    /// Write everything currently in the control queue.
    async fn flush_control(&mut self) -> Result<(), ConnectionError> {
        while let Ok(packet) = self.ctrl_rx.try_recv() {
            self.write_frame(&packet).await?;
        }
        Ok(())
    }

    async fn write_frame(&mut self, plaintext: &[u8]) -> Result<(), ConnectionError> {
        let frame = seal(&self.cipher, &self.nonce, plaintext)?;
        self.writer.write_all(&frame).await?;
        // Only incremented after the write succeeds, so a failed write
        // never leaves a gap in the sequence.
        self.nonce.increment();

        self.hooks.on_bytes_sent(frame.len());
        if let Some(avg) = self.meter.record(frame.len()) {
            trace!(avg_bps = avg, "send throughput");
        }
        Ok(())
    }

    async fn send_ping(&mut self) -> Result<(), ConnectionError> {
        if self.pending_ping.load(Ordering::Acquire) != 0 {
            // Still waiting on the last one; the deadline branch decides.
            return Ok(());
        }
        // Zero marks "no ping outstanding", so it is never used as an id.
        let id = rand::random::<u64>().max(1);
        self.pending_ping.store(id, Ordering::Release);
        self.ping_deadline = Some(Instant::now() + PING_TIMEOUT);
        self.write_frame(&ping_packet(id)).await
    }
}
