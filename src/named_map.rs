//! NamedMap: insertion-ordered storage keyed by instance name, with stable handles.

use core::hash::BuildHasher;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Stable reference to a live entry. Stale handles never resolve, even if
/// the underlying slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn name<'a, V, S>(&self, map: &'a NamedMap<V, S>) -> Option<&'a str>
    where
        S: BuildHasher,
    {
        map.handle_name(*self)
    }

    pub fn value<'a, V, S>(&self, map: &'a NamedMap<V, S>) -> Option<&'a V>
    where
        S: BuildHasher,
    {
        map.handle_value(*self)
    }

    pub fn value_mut<'a, V, S>(&self, map: &'a mut NamedMap<V, S>) -> Option<&'a mut V>
    where
        S: BuildHasher,
    {
        map.handle_value_mut(*self)
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    name: String,
    value: V,
    hash: u64,
}

/// Map from names to values that iterates in insertion order.
///
/// Names are unique; a second insert under a live name is rejected.
#[derive(Clone)]
pub struct NamedMap<V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<V>>,
    order: Vec<DefaultKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("an entry named `{0}` already exists")]
    DuplicateName(String),
}

impl<V> NamedMap<V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<V> Default for NamedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over entries in insertion order.
pub struct Iter<'a, V> {
    order: core::slice::Iter<'a, DefaultKey>,
    slots: &'a SlotMap<DefaultKey, Entry<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Handle, &'a str, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = *self.order.next()?;
        self.slots
            .get(k)
            .map(|e| (Handle::new(k), e.name.as_str(), &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<V, S> NamedMap<V, S>
where
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            index: HashTable::new(),
            hasher,
            slots: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    fn make_hash(&self, name: &str) -> u64 {
        self.hasher.hash_one(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<Handle> {
        let hash = self.make_hash(name);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.name == name)
                    .unwrap_or(false)
            })
            .map(|&k| Handle::new(k))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.find(name).and_then(|h| self.handle_value(h))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        let h = self.find(name)?;
        self.handle_value_mut(h)
    }

    /// Append `value` under `name`. The entry is placed last in iteration order.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Result<Handle, InsertError> {
        let name = name.into();
        let hash = self.make_hash(&name);
        match self.index.entry(
            hash,
            |&kk| self.slots.get(kk).map(|e| e.name == name).unwrap_or(false),
            |&kk| self.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateName(name)),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let k = self.slots.insert(Entry { name, value, hash });
                let _ = v.insert(k);
                self.order.push(k);
                Ok(Handle::new(k))
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<(String, V)> {
        let h = self.find(name)?;
        self.remove_handle(h)
    }

    pub fn remove_handle(&mut self, handle: Handle) -> Option<(String, V)> {
        let k = handle.raw_handle();
        let entry = self.slots.remove(k)?;

        if let Ok(occupied) = self.index.find_entry(entry.hash, |&kk| kk == k) {
            occupied.remove();
        }
        self.order.retain(|&kk| kk != k);

        Some((entry.name, entry.value))
    }

    pub(crate) fn handle_name(&self, h: Handle) -> Option<&str> {
        self.slots.get(h.raw_handle()).map(|e| e.name.as_str())
    }

    pub(crate) fn handle_value(&self, h: Handle) -> Option<&V> {
        self.slots.get(h.raw_handle()).map(|e| &e.value)
    }

    pub(crate) fn handle_value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.slots.get_mut(h.raw_handle()).map(|e| &mut e.value)
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            order: self.order.iter(),
            slots: &self.slots,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(_, n, _)| n)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, _, v)| v)
    }
}

impl<V: core::fmt::Debug, S: BuildHasher> core::fmt::Debug for NamedMap<V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(_, n, v)| (n, v)))
            .finish()
    }
}

/// Two maps are equal when they hold equal values under the same names in
/// the same order. Handles are not compared.
impl<V: PartialEq, S: BuildHasher> PartialEq for NamedMap<V, S> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((_, na, va), (_, nb, vb))| na == nb && va == vb)
    }
}
