//! Handle-indexed entity tables.
//!
//! Every engine in the core (tweens, sprite animations, sprites, state
//! machines, bus subscriptions) stores its entities in a [`HandleTable`]
//! and hands out [`Handle`]s instead of references.
//!
//! Handles are issued from a monotonically increasing counter that starts at
//! 1 and is never reset, not even by [`HandleTable::drain`]. A handle whose
//! entry was removed simply fails lookup; it can never start pointing at a
//! different entity later on.
//!
//! Entries are kept in a `BTreeMap`, so iteration visits them in creation
//! order. Update passes rely on that for deterministic callback order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a table-resident entity.
///
/// `0` is never issued and can be used by callers as a "no handle" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    /// Rebuild a handle from the raw integer a script or caller holds.
    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    /// The raw integer value, as exposed to scripts.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owning table of entities addressed by [`Handle`].
#[derive(Debug)]
pub struct HandleTable<T> {
    entries: BTreeMap<Handle, T>,
    next: u64,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next: 1,
        }
    }

    /// Store `value` under a freshly issued handle.
    pub fn insert(&mut self, value: T) -> Handle {
        let handle = Handle(self.next);
        self.next += 1;
        self.entries.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.entries.get_mut(&handle)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.entries.remove(&handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the live handles, in creation order.
    ///
    /// Update passes iterate this snapshot rather than the table so that
    /// callbacks may insert or remove entries while the pass is running.
    pub fn handles(&self) -> Vec<Handle> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.entries.iter().map(|(h, v)| (*h, v))
    }

    /// Remove every entry whose value matches `predicate`, returning them.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<(Handle, T)> {
        let doomed: Vec<Handle> = self
            .entries
            .iter()
            .filter(|(_, v)| predicate(v))
            .map(|(h, _)| *h)
            .collect();
        doomed
            .into_iter()
            .filter_map(|h| self.entries.remove(&h).map(|v| (h, v)))
            .collect()
    }

    /// Empty the table. The handle counter keeps its value.
    pub fn drain(&mut self) -> Vec<(Handle, T)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_handle_is_one() {
        let mut table = HandleTable::new();
        assert_eq!(table.insert("a").raw(), 1);
        assert_eq!(table.insert("b").raw(), 2);
    }

    #[test]
    fn test_removed_handle_fails_lookup() {
        let mut table = HandleTable::new();
        let h = table.insert(10);
        assert_eq!(table.remove(h), Some(10));
        assert!(table.get(h).is_none());
        assert!(!table.contains(h));
        assert!(table.remove(h).is_none());
    }

    #[test]
    fn test_handles_never_reused_after_remove() {
        let mut table = HandleTable::new();
        let a = table.insert(1);
        table.remove(a);
        let b = table.insert(2);
        assert_ne!(a, b);
        assert!(table.get(a).is_none());
    }

    #[test]
    fn test_drain_keeps_counter() {
        let mut table = HandleTable::new();
        let a = table.insert('x');
        let b = table.insert('y');
        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert!(table.is_empty());
        let c = table.insert('z');
        assert!(c > a && c > b);
    }

    #[test]
    fn test_handles_in_creation_order() {
        let mut table = HandleTable::new();
        let hs: Vec<Handle> = (0..5).map(|i| table.insert(i)).collect();
        table.remove(hs[2]);
        assert_eq!(table.handles(), vec![hs[0], hs[1], hs[3], hs[4]]);
    }

    #[test]
    fn test_remove_where() {
        let mut table = HandleTable::new();
        for i in 0..6 {
            table.insert(i);
        }
        let removed = table.remove_where(|v| v % 2 == 0);
        assert_eq!(removed.len(), 3);
        assert_eq!(table.len(), 3);
        assert!(table.iter().all(|(_, v)| v % 2 == 1));
    }

    #[test]
    fn test_handle_serializes_as_integer() {
        let json = serde_json::to_string(&Handle::from_raw(42)).unwrap();
        assert_eq!(json, "42");
    }
}
