//! ConnectionRegistry: the authoritative set of live connection handles.
//!
//! A handle is present if and only if the hosting layer has signalled "open"
//! for it and has not yet signalled "close" or "error".  The registry knows
//! nothing about message content and performs no logging.
//!
//! # Concurrency
//!
//! Membership lives in a `HashMap` behind a `std::sync::RwLock`.  Every
//! critical section is a single map operation or a clone of the values, so
//! the lock is held for microseconds and can be taken from OS threads and
//! Tokio tasks alike.
//!
//! [`snapshot`](ConnectionRegistry::snapshot) copies the current handles out
//! of the map and releases the lock before anyone iterates.  Iteration is
//! therefore *weakly consistent*:
//!
//! - a handle added after the snapshot was taken is not in it;
//! - a handle removed after the snapshot was taken is still in it, and a
//!   delivery attempt to it simply fails;
//! - no handle appears twice, because the map is keyed by [`ConnectionId`].
//!
//! # Lock poisoning
//!
//! `add` and `remove` are idempotent set updates, so they keep working on a
//! poisoned lock.  `snapshot` reports [`RegistryError::Poisoned`] instead.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::connection::{Connection, ConnectionId};

type ConnectionMap = HashMap<ConnectionId, Arc<dyn Connection>>;

/// Error type for registry reads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection registry lock poisoned by a panicked writer")]
    Poisoned,
}

/// Thread-safe set of live connections, keyed by [`ConnectionId`].
///
/// Construct one per process and share it as `Arc<ConnectionRegistry>`.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<ConnectionMap>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a handle.
    ///
    /// If a handle with the same id is already present the existing entry is
    /// kept and `false` is returned.
    pub fn add(&self, handle: Arc<dyn Connection>) -> bool {
        let id = handle.id();
        match self.write().entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// Removes the handle with `id`.
    ///
    /// Returns `false` (and does nothing) if it was not present, so close and
    /// error notifications for the same connection can both call this.
    pub fn remove(&self, id: ConnectionId) -> bool {
        // The guard is released at the end of this statement, so a last
        // reference is dropped outside the lock.
        let removed = self.write().remove(&id);
        removed.is_some()
    }

    /// Returns `true` if a handle with `id` is currently registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.read().contains_key(&id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copies the current membership into a [`Snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] if a thread panicked while holding
    /// the registry lock.
    pub fn snapshot(&self) -> Result<Snapshot, RegistryError> {
        let connections = self
            .connections
            .read()
            .map_err(|_| RegistryError::Poisoned)?;
        Ok(Snapshot {
            handles: connections.values().cloned().collect(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ConnectionMap> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConnectionMap> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn poison_for_test(&self) {
        let _guard = self.write();
        panic!("poisoning the connection registry lock");
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Point-in-time copy of registry membership.
///
/// Holding a snapshot does not hold the registry lock.
#[derive(Clone, Default)]
pub struct Snapshot {
    handles: Vec<Arc<dyn Connection>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<dyn Connection>> {
        self.handles.iter()
    }

    /// Identities of every handle in the snapshot, in iteration order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.handles.iter().map(|h| h.id()).collect()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

impl IntoIterator for Snapshot {
    type Item = Arc<dyn Connection>;
    type IntoIter = std::vec::IntoIter<Arc<dyn Connection>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Arc<dyn Connection>;
    type IntoIter = std::slice::Iter<'a, Arc<dyn Connection>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.iter()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingConnection;

    fn make_handle() -> (ConnectionId, Arc<dyn Connection>) {
        let conn = RecordingConnection::new();
        let id = conn.id();
        let handle: Arc<dyn Connection> = Arc::new(conn);
        (id, handle)
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_add_inserts_handle() {
        let registry = ConnectionRegistry::new();
        let (id, handle) = make_handle();
        assert!(registry.add(handle));
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_same_handle_twice_keeps_one_entry() {
        let registry = ConnectionRegistry::new();
        let (_, handle) = make_handle();
        assert!(registry.add(Arc::clone(&handle)));
        assert!(!registry.add(handle), "second add must report no insertion");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_add_keeps_existing_entry_on_id_collision() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let first = Arc::new(RecordingConnection::with_id(id));
        let second = Arc::new(RecordingConnection::with_id(id));
        registry.add(first.clone());
        registry.add(second.clone());

        let snapshot = registry.snapshot().unwrap();
        for handle in &snapshot {
            handle.send_text("probe").unwrap();
        }
        assert_eq!(first.sent(), vec!["probe".to_string()]);
        assert!(second.sent().is_empty());
    }

    #[test]
    fn test_remove_deletes_handle() {
        let registry = ConnectionRegistry::new();
        let (id, handle) = make_handle();
        registry.add(handle);
        assert!(registry.remove(id));
        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_twice_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let (id, handle) = make_handle();
        registry.add(handle);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_remove_unknown_handle_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let (_, handle) = make_handle();
        registry.add(handle);
        assert!(!registry.remove(ConnectionId::new()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_mutation() {
        let registry = ConnectionRegistry::new();
        let (a, handle_a) = make_handle();
        let (_, handle_b) = make_handle();
        registry.add(handle_a);

        let snapshot = registry.snapshot().unwrap();
        registry.remove(a);
        registry.add(handle_b);

        assert_eq!(snapshot.ids(), vec![a]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_into_iter_yields_every_handle() {
        let registry = ConnectionRegistry::new();
        let mut expected = Vec::new();
        for _ in 0..5 {
            let (id, handle) = make_handle();
            expected.push(id);
            registry.add(handle);
        }

        let mut seen: Vec<ConnectionId> = registry
            .snapshot()
            .unwrap()
            .into_iter()
            .map(|h| h.id())
            .collect();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_poisoned_lock_fails_snapshot_but_not_mutation() {
        let registry = Arc::new(ConnectionRegistry::new());
        let poisoner = Arc::clone(&registry);
        let _ = std::thread::spawn(move || poisoner.poison_for_test()).join();

        assert_eq!(registry.snapshot().unwrap_err(), RegistryError::Poisoned);

        let (id, handle) = make_handle();
        assert!(registry.add(handle));
        assert!(registry.remove(id));
    }

    /// Handle whose last reference panics when dropped.
    struct PanicsOnDrop {
        id: ConnectionId,
    }

    impl Connection for PanicsOnDrop {
        fn id(&self) -> ConnectionId {
            self.id
        }

        fn send_text(&self, _text: &str) -> Result<(), crate::connection::DeliveryFailure> {
            Ok(())
        }
    }

    impl Drop for PanicsOnDrop {
        fn drop(&mut self) {
            panic!("connection handle dropped");
        }
    }

    #[test]
    fn test_remove_drops_last_reference_outside_the_lock() {
        let registry = Arc::new(ConnectionRegistry::new());
        let id = ConnectionId::new();
        assert!(registry.add(Arc::new(PanicsOnDrop { id })));

        // The registry holds the only reference, so `remove` runs the panicking drop.
        let remover = Arc::clone(&registry);
        let result = std::thread::spawn(move || remover.remove(id)).join();
        assert!(result.is_err());

        // A panic after the guard is released must not poison the lock.
        let snapshot = registry.snapshot().unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_debug_output_reports_length() {
        let registry = ConnectionRegistry::new();
        let (_, handle) = make_handle();
        registry.add(handle);
        assert_eq!(format!("{registry:?}"), "ConnectionRegistry { len: 1 }");
    }
}
