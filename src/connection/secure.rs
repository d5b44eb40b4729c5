//! The secure connection: one accepted socket, its handshake, and the
//! lifecycle of its two pipelines.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, OnceLock};

use crypto_box::{PublicKey, SecretKey};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::core::{
    CLIENT_HANDSHAKE_SIZE, CONTROL_QUEUE_CAPACITY, ConnectionError, ConnectionHooks,
    DATA_QUEUE_CAPACITY, MAX_FRAME_PAYLOAD, MAX_PACKET_SIZE, PacketHandler, ProtocolError,
};
use crate::crypto::{ServerHandshake, fingerprint};

use super::inbound::Inbound;
use super::outbound::Outbound;
use super::{ConnectionStatus, RoutingTable, StatusCell};

/// A relay-side secure connection over one accepted TCP socket.
///
/// Created on accept; [`run`](Self::run) performs the handshake and then
/// drives the inbound and outbound pipelines until the socket closes, the
/// peer violates the protocol, or a ping goes unanswered. Producers talk
/// to the connection through its cloneable [`ConnectionHandle`].
pub struct SecureConnection {
    stream: Option<TcpStream>,
    peer_addr: SocketAddr,
    relay_secret: SecretKey,
    status: Arc<StatusCell>,
    routing: RoutingTable,
    hooks: Arc<dyn ConnectionHooks>,
    handler: Arc<dyn PacketHandler>,
    ctrl_tx: mpsc::Sender<Vec<u8>>,
    data_tx: mpsc::Sender<Vec<u8>>,
    ctrl_rx: Option<mpsc::Receiver<Vec<u8>>>,
    data_rx: Option<mpsc::Receiver<Vec<u8>>>,
    peer_key: Arc<OnceLock<PublicKey>>,
    pending_ping: Arc<AtomicU64>,
}

impl SecureConnection {
    /// Wrap an accepted socket.
    ///
    /// `relay_secret` is the relay's long-term secret key; the peer's
    /// public key becomes known once the handshake request arrives.
    pub fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        relay_secret: SecretKey,
        hooks: Arc<dyn ConnectionHooks>,
        handler: Arc<dyn PacketHandler>,
    ) -> Self {
        let (ctrl_tx, ctrl_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let (data_tx, data_rx) = mpsc::channel(DATA_QUEUE_CAPACITY);

        Self {
            stream: Some(stream),
            peer_addr,
            relay_secret,
            status: Arc::new(StatusCell::new()),
            routing: RoutingTable::new(),
            hooks,
            handler,
            ctrl_tx,
            data_tx,
            ctrl_rx: Some(ctrl_rx),
            data_rx: Some(data_rx),
            peer_key: Arc::new(OnceLock::new()),
            pending_ping: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Producer handle for this connection.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            peer_addr: self.peer_addr,
            ctrl_tx: self.ctrl_tx.clone(),
            data_tx: self.data_tx.clone(),
            status: Arc::clone(&self.status),
            routing: self.routing.clone(),
            peer_key: Arc::clone(&self.peer_key),
        }
    }

    /// The remote socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Run the connection to completion: handshake, then both pipelines.
    ///
    /// Always resets the status and fires the closed hook on the way out,
    /// whatever the outcome. Errors are connection-local by construction.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let result = self.drive().await;

        self.status.reset();
        self.hooks.on_closed(self.peer_key.get(), self.peer_addr);
        match &result {
            Ok(()) => debug!(peer = %self.peer_addr, "connection closed"),
            Err(error) => debug!(peer = %self.peer_addr, %error, "connection closed"),
        }
        result
    }

    async fn drive(&mut self) -> Result<(), ConnectionError> {
        let mut stream = self.stream.take().ok_or(ConnectionError::Closed)?;

        // Handshake runs before either pipeline exists, so the session
        // keys are written exactly once and only read afterwards.
        let mut request = [0u8; CLIENT_HANDSHAKE_SIZE];
        stream.read_exact(&mut request).await?;
        let (keys, response) = ServerHandshake::respond(&self.relay_secret, &request)?;
        stream.write_all(&response).await?;

        let _ = self.peer_key.set(keys.peer_key.clone());
        self.status.advance(ConnectionStatus::Unconfirmed);
        debug!(
            peer = %self.peer_addr,
            key = %fingerprint(&keys.peer_key),
            "handshake complete"
        );

        let (reader, writer) = stream.into_split();
        let ctrl_rx = self.ctrl_rx.take().ok_or(ConnectionError::Closed)?;
        let data_rx = self.data_rx.take().ok_or(ConnectionError::Closed)?;

        let inbound = Inbound::new(
            reader,
            keys.recv_cipher,
            keys.recv_nonce,
            keys.peer_key,
            Arc::clone(&self.status),
            self.ctrl_tx.clone(),
            Arc::clone(&self.pending_ping),
            Arc::clone(&self.hooks),
            Arc::clone(&self.handler),
        );
        let outbound = Outbound::new(
            writer,
            keys.send_cipher,
            keys.send_nonce,
            ctrl_rx,
            data_rx,
            Arc::clone(&self.pending_ping),
            Arc::clone(&self.hooks),
        );

        // Whichever pipeline finishes first takes the other down with it;
        // dropping the losing future closes its socket half.
        tokio::select! {
            result = inbound.run() => result,
            result = outbound.run() => result,
        }
    }
}

/// Cloneable producer handle to a secure connection.
///
/// Enqueues are non-blocking: a full queue fails fast with
/// [`ConnectionError::QueueFull`] and the payload is dropped; the caller
/// retries or accepts the loss.
#[derive(Clone)]
pub struct ConnectionHandle {
    peer_addr: SocketAddr,
    ctrl_tx: mpsc::Sender<Vec<u8>>,
    data_tx: mpsc::Sender<Vec<u8>>,
    status: Arc<StatusCell>,
    routing: RoutingTable,
    peer_key: Arc<OnceLock<PublicKey>>,
}

impl ConnectionHandle {
    /// Enqueue a control-priority plaintext (e.g. a PONG).
    ///
    /// Rejects payloads over [`MAX_PACKET_SIZE`] before enqueueing.
    pub fn send_control(&self, plaintext: Vec<u8>) -> Result<(), ConnectionError> {
        if plaintext.len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                len: plaintext.len(),
                max: MAX_PACKET_SIZE,
            }
            .into());
        }
        enqueue(&self.ctrl_tx, plaintext)
    }

    /// Enqueue an application-data plaintext.
    pub fn send_data(&self, plaintext: Vec<u8>) -> Result<(), ConnectionError> {
        if plaintext.len() > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                len: plaintext.len(),
                max: MAX_FRAME_PAYLOAD,
            }
            .into());
        }
        enqueue(&self.data_tx, plaintext)
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    /// The peer's long-term public key, once the handshake revealed it.
    pub fn peer_key(&self) -> Option<&PublicKey> {
        self.peer_key.get()
    }

    /// The remote socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// This connection's routing table.
    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }
}

fn enqueue(queue: &mpsc::Sender<Vec<u8>>, plaintext: Vec<u8>) -> Result<(), ConnectionError> {
    queue.try_send(plaintext).map_err(|err| match err {
        TrySendError::Full(_) => ConnectionError::QueueFull,
        TrySendError::Closed(_) => ConnectionError::Closed,
    })
}
