//! Shared connection registries.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::connection::ConnectionHandle;

/// A shared map from key to [`ConnectionHandle`].
///
/// The relay keeps two: pending connections keyed by socket address, and
/// confirmed connections keyed by the peer's public key. The registry is
/// a plain store; moving a handle between the two is the caller's job.
///
/// Operations are short lock-and-release critical sections, so they are
/// callable from synchronous hook code.
pub struct Registry<K> {
    inner: Arc<RwLock<HashMap<K, ConnectionHandle>>>,
}

impl<K> Clone for Registry<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Registry<K> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a handle, returning the one it displaced if any.
    pub fn insert(&self, key: K, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.write().insert(key, handle)
    }

    /// Look up a handle by key.
    pub fn get(&self, key: &K) -> Option<ConnectionHandle> {
        self.read().get(key).cloned()
    }

    /// Remove and return the handle for `key`.
    pub fn remove(&self, key: &K) -> Option<ConnectionHandle> {
        self.write().remove(key)
    }

    /// Copy out the current entries.
    ///
    /// Iteration works on the snapshot; the registry is never locked
    /// across caller code.
    pub fn snapshot(&self) -> Vec<(K, ConnectionHandle)>
    where
        K: Clone,
    {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, ConnectionHandle>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, ConnectionHandle>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SecureConnection;
    use crate::core::{NoopHooks, NullHandler};
    use crate::crypto::Keypair;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::{TcpListener, TcpStream};

    async fn sample_handle() -> ConnectionHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer_addr) = listener.accept().await.unwrap();
        SecureConnection::new(
            stream,
            peer_addr,
            Keypair::generate().secret_key().clone(),
            Arc::new(NoopHooks),
            Arc::new(NullHandler),
        )
        .handle()
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry: Registry<SocketAddr> = Registry::new();
        let handle = sample_handle().await;
        let key = handle.peer_addr();

        assert!(registry.is_empty());
        assert!(registry.insert(key, handle).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&key).is_some());
        assert!(registry.remove(&key).is_some());
        assert!(registry.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_the_map() {
        let registry: Registry<SocketAddr> = Registry::new();
        let handle = sample_handle().await;
        let key = handle.peer_addr();
        registry.insert(key, handle);

        let snapshot = registry.snapshot();
        registry.remove(&key);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, key);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let registry: Registry<SocketAddr> = Registry::new();
        let view = registry.clone();
        let handle = sample_handle().await;
        let key = handle.peer_addr();

        registry.insert(key, handle);
        assert_eq!(view.len(), 1);
        view.remove(&key);
        assert!(registry.is_empty());
    }
}
