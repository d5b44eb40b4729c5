//! The multi-port relay server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crypto_box::PublicKey;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::connection::{ConnectionHandle, SecureConnection};
use crate::core::{
    ConnectionHooks, MAX_INCOMING_CONNECTIONS, NoopHooks, NullHandler, OnionRouter, PacketHandler,
    RelayError,
};
use crate::crypto::{Keypair, PublicKeyBytes, fingerprint};

use super::Registry;

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind listeners on.
    pub bind_addr: IpAddr,
    /// TCP ports to listen on. Port 0 binds an ephemeral port.
    pub ports: Vec<u16>,
    /// Accepted connections beyond this are dropped at accept time.
    pub max_connections: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ports: Vec::new(),
            max_connections: MAX_INCOMING_CONNECTIONS,
        }
    }
}

/// A relay accepting encrypted client connections on one or more ports.
///
/// Every accepted socket becomes a [`SecureConnection`] driven on its own
/// task. Its handle sits in the pending registry until the first
/// decryptable frame arrives, then moves to the confirmed registry under
/// the client's public key. Both registries are cleaned when the
/// connection ends, whatever the cause.
pub struct RelayServer {
    keypair: Keypair,
    config: RelayConfig,
    hooks: Arc<dyn ConnectionHooks>,
    handler: Arc<dyn PacketHandler>,
    onion: Option<Arc<dyn OnionRouter>>,
    pending: Registry<SocketAddr>,
    confirmed: Registry<PublicKeyBytes>,
    active: Arc<AtomicUsize>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayServer {
    /// Create a relay with no-op hooks and the null packet handler.
    pub fn new(keypair: Keypair, config: RelayConfig) -> Self {
        Self {
            keypair,
            config,
            hooks: Arc::new(NoopHooks),
            handler: Arc::new(NullHandler),
            onion: None,
            pending: Registry::new(),
            confirmed: Registry::new(),
            active: Arc::new(AtomicUsize::new(0)),
            tasks: Vec::new(),
        }
    }

    /// Install lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn ConnectionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Install the routed-packet handler.
    pub fn with_handler(mut self, handler: Arc<dyn PacketHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Attach an onion router. The handle is held for the relay's
    /// lifetime; no traffic is routed through it yet.
    pub fn with_onion(mut self, onion: Arc<dyn OnionRouter>) -> Self {
        self.onion = Some(onion);
        self
    }

    /// The relay's long-term public key.
    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public_key()
    }

    /// Look up a confirmed connection by its peer's public key.
    pub fn connection(&self, key: &PublicKey) -> Option<ConnectionHandle> {
        self.confirmed.get(key.as_bytes())
    }

    /// Number of confirmed connections.
    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }

    /// Bind every configured port and start accepting.
    ///
    /// Returns the bound addresses; accept loops keep running on their
    /// own tasks after this returns. Any port failing to bind aborts the
    /// whole startup.
    pub async fn bind(&mut self) -> Result<Vec<SocketAddr>, RelayError> {
        let mut addrs = Vec::with_capacity(self.config.ports.len());
        for &port in &self.config.ports {
            let listener = TcpListener::bind((self.config.bind_addr, port))
                .await
                .map_err(|source| RelayError::Bind { port, source })?;
            let local = listener.local_addr()?;
            info!(addr = %local, key = %fingerprint(self.keypair.public_key()), "relay listening");
            addrs.push(local);

            let inner = Arc::new(AcceptState {
                keypair: self.keypair.clone(),
                hooks: Arc::clone(&self.hooks),
                handler: Arc::clone(&self.handler),
                pending: self.pending.clone(),
                confirmed: self.confirmed.clone(),
                active: Arc::clone(&self.active),
                max_connections: self.config.max_connections,
            });
            self.tasks.push(tokio::spawn(accept_loop(listener, inner)));
        }
        Ok(addrs)
    }

    /// Bind (if not already bound) and serve until every accept loop ends.
    pub async fn run(mut self) -> Result<(), RelayError> {
        if self.tasks.is_empty() {
            self.bind().await?;
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        Ok(())
    }
}

struct AcceptState {
    keypair: Keypair,
    hooks: Arc<dyn ConnectionHooks>,
    handler: Arc<dyn PacketHandler>,
    pending: Registry<SocketAddr>,
    confirmed: Registry<PublicKeyBytes>,
    active: Arc<AtomicUsize>,
    max_connections: usize,
}

async fn accept_loop(listener: TcpListener, state: Arc<AcceptState>) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "accept failed");
                continue;
            }
        };
        if state.active.load(Ordering::Acquire) >= state.max_connections {
            warn!(peer = %peer_addr, "connection limit reached, dropping");
            continue;
        }
        state.active.fetch_add(1, Ordering::AcqRel);
        spawn_connection(stream, peer_addr, Arc::clone(&state));
    }
}

fn spawn_connection(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AcceptState>) {
    let registrar = Arc::new(Registrar {
        addr: peer_addr,
        pending: state.pending.clone(),
        confirmed: state.confirmed.clone(),
        user: Arc::clone(&state.hooks),
    });
    let conn = SecureConnection::new(
        stream,
        peer_addr,
        state.keypair.secret_key().clone(),
        registrar,
        Arc::clone(&state.handler),
    );
    state.pending.insert(peer_addr, conn.handle());

    tokio::spawn(async move {
        let _ = conn.run().await;
        state.active.fetch_sub(1, Ordering::AcqRel);
    });
}

/// Hook shim that keeps the registries in step with connection state and
/// forwards every event to the user's hooks. One per connection.
struct Registrar {
    addr: SocketAddr,
    pending: Registry<SocketAddr>,
    confirmed: Registry<PublicKeyBytes>,
    user: Arc<dyn ConnectionHooks>,
}

impl ConnectionHooks for Registrar {
    fn on_bytes_received(&self, n: usize) {
        self.user.on_bytes_received(n);
    }

    fn on_bytes_sent(&self, n: usize) {
        self.user.on_bytes_sent(n);
    }

    fn on_confirmed(&self, peer: &PublicKey) {
        // Promotion happens before the first packet is dispatched, so a
        // handler looking up the sender always finds it confirmed.
        if let Some(handle) = self.pending.remove(&self.addr) {
            self.confirmed.insert(*peer.as_bytes(), handle);
        }
        self.user.on_confirmed(peer);
    }

    fn on_closed(&self, peer: Option<&PublicKey>, addr: SocketAddr) {
        self.pending.remove(&addr);
        if let Some(key) = peer {
            // Only evict the confirmed entry if it is still ours; a newer
            // connection from the same key may have displaced it.
            if self
                .confirmed
                .get(key.as_bytes())
                .is_some_and(|h| h.peer_addr() == addr)
            {
                self.confirmed.remove(key.as_bytes());
            }
        }
        self.user.on_closed(peer, addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionStatus;
    use crate::core::SERVER_HANDSHAKE_SIZE;
    use crate::crypto::{ClientHandshake, Nonce, SessionKeys};
    use crate::transport::{open, ping_packet, pong_packet, seal};
    use crypto_box::SalsaBox;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn ephemeral_relay() -> (RelayServer, SocketAddr, PublicKey) {
        let keypair = Keypair::generate();
        let relay_key = keypair.public_key().clone();
        let config = RelayConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ports: vec![0],
            ..RelayConfig::default()
        };
        let mut server = RelayServer::new(keypair, config);
        let addrs = server.bind().await.unwrap();
        (server, addrs[0], relay_key)
    }

    async fn handshake(addr: SocketAddr, relay_key: &PublicKey) -> (TcpStream, SessionKeys) {
        let client = Keypair::generate();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let (state, request) = ClientHandshake::initiate(client.secret_key(), relay_key).unwrap();
        stream.write_all(&request).await.unwrap();

        let mut response = [0u8; SERVER_HANDSHAKE_SIZE];
        stream.read_exact(&mut response).await.unwrap();
        (stream, state.finalize(&response).unwrap())
    }

    async fn read_frame(stream: &mut TcpStream, cipher: &SalsaBox, nonce: &Nonce) -> Vec<u8> {
        let mut prefix = [0u8; 2];
        stream.read_exact(&mut prefix).await.unwrap();
        let mut body = vec![0u8; u16::from_be_bytes(prefix) as usize];
        stream.read_exact(&mut body).await.unwrap();
        open(cipher, nonce, &body).unwrap()
    }

    #[tokio::test]
    async fn test_handshake_ping_pong_confirms_connection() {
        let (server, addr, relay_key) = ephemeral_relay().await;
        let (mut stream, mut keys) = handshake(addr, &relay_key).await;

        let ping = seal(&keys.send_cipher, &keys.send_nonce, &ping_packet(42)).unwrap();
        stream.write_all(&ping).await.unwrap();
        keys.send_nonce.increment();

        let reply = read_frame(&mut stream, &keys.recv_cipher, &keys.recv_nonce).await;
        keys.recv_nonce.increment();
        assert_eq!(reply, pong_packet(42));
        assert_eq!(server.confirmed_count(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_registry_keyed_by_client_key() {
        let (server, addr, relay_key) = ephemeral_relay().await;

        let client = Keypair::generate();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let (state, request) =
            ClientHandshake::initiate(client.secret_key(), &relay_key).unwrap();
        stream.write_all(&request).await.unwrap();
        let mut response = [0u8; SERVER_HANDSHAKE_SIZE];
        stream.read_exact(&mut response).await.unwrap();
        let mut keys = state.finalize(&response).unwrap();

        assert!(server.connection(client.public_key()).is_none());

        let ping = seal(&keys.send_cipher, &keys.send_nonce, &ping_packet(7)).unwrap();
        stream.write_all(&ping).await.unwrap();
        keys.send_nonce.increment();
        // The pong proves the inbound pipeline ran, so promotion is done.
        let reply = read_frame(&mut stream, &keys.recv_cipher, &keys.recv_nonce).await;
        assert_eq!(reply, pong_packet(7));

        let handle = server.connection(client.public_key()).unwrap();
        assert_eq!(handle.status(), ConnectionStatus::Confirmed);
        assert_eq!(handle.peer_key(), Some(client.public_key()));
    }

    #[tokio::test]
    async fn test_tampered_frame_closes_connection() {
        let (_server, addr, relay_key) = ephemeral_relay().await;
        let (mut stream, keys) = handshake(addr, &relay_key).await;

        let mut frame = seal(&keys.send_cipher, &keys.send_nonce, &ping_packet(1)).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        stream.write_all(&frame).await.unwrap();

        // The relay drops the socket; depending on timing the client sees
        // a clean EOF or a reset.
        let mut buf = [0u8; 1];
        let n = stream.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }
}
