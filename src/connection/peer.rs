//! Per-remote-peer records inside a secure connection.
//!
//! The routing table maps peer public keys to connection-id bookkeeping.
//! Filling it (routing requests, slot assignment) is an extension point
//! outside this core; the data structure is defined here and exposed
//! through [`ConnectionHandle::routing`](super::ConnectionHandle::routing).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crypto_box::PublicKey;

use crate::crypto::PublicKeyBytes;

use super::ConnectionStatus;

/// Record for one routed remote peer.
#[derive(Debug, Clone)]
pub struct PeerConnInfo {
    /// The peer's long-term public key.
    pub public_key: PublicKey,
    /// Local slot index for this peer.
    pub index: u32,
    /// Peer status as last observed.
    pub status: ConnectionStatus,
    /// Connection id the *peer* assigned for the reverse direction.
    pub peer_id: u8,
}

/// Routing table of a secure connection, keyed by peer public key bytes.
///
/// Cheaply cloneable; clones share the underlying table.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    inner: Arc<Mutex<HashMap<PublicKeyBytes, PeerConnInfo>>>,
}

impl RoutingTable {
    /// Create an empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `info.public_key`.
    pub fn insert(&self, info: PeerConnInfo) -> Option<PeerConnInfo> {
        self.guard().insert(*info.public_key.as_bytes(), info)
    }

    /// Look up the record for a peer key.
    pub fn get(&self, key: &PublicKeyBytes) -> Option<PeerConnInfo> {
        self.guard().get(key).cloned()
    }

    /// Remove the record for a peer key.
    pub fn remove(&self, key: &PublicKeyBytes) -> Option<PeerConnInfo> {
        self.guard().remove(key)
    }

    /// Number of routed peers.
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<PublicKeyBytes, PeerConnInfo>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn info(index: u32, peer_id: u8) -> PeerConnInfo {
        PeerConnInfo {
            public_key: Keypair::generate().public_key().clone(),
            index,
            status: ConnectionStatus::NoStatus,
            peer_id,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let table = RoutingTable::new();
        let record = info(3, 17);
        let key = *record.public_key.as_bytes();

        assert!(table.insert(record).is_none());
        let found = table.get(&key).unwrap();
        assert_eq!(found.index, 3);
        assert_eq!(found.peer_id, 17);
    }

    #[test]
    fn test_insert_replaces_existing() {
        let table = RoutingTable::new();
        let mut record = info(1, 16);
        let key = *record.public_key.as_bytes();
        table.insert(record.clone());

        record.status = ConnectionStatus::Confirmed;
        let old = table.insert(record).unwrap();
        assert_eq!(old.status, ConnectionStatus::NoStatus);
        assert_eq!(table.get(&key).unwrap().status, ConnectionStatus::Confirmed);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_clones_share_the_table() {
        let table = RoutingTable::new();
        let clone = table.clone();
        let record = info(0, 20);
        let key = *record.public_key.as_bytes();

        table.insert(record);
        assert!(clone.get(&key).is_some());
        clone.remove(&key);
        assert!(table.is_empty());
    }
}
