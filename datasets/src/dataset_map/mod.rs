//! An ordered `name -> commit-address` mapping behind two on-disk encodings
//! sharing one logical interface. Never leak the encoding past [`Format`] —
//! callers get a [`DatasetMap`] and never see which variant backs it.

mod classic;
mod refmap;

pub use classic::Classic;
pub use refmap::Refmap;

use crate::chunk_store::{ChunkStore, Format};
use crate::errors::DatasetsResult;
use crate::hash::Hash;
use std::collections::BTreeMap;

/// Either on-disk encoding, dispatched uniformly. Mutation methods operate
/// on an in-memory snapshot; [`DatasetMap::serialize`] is the only method
/// that touches the store for writes.
#[derive(Debug, Clone)]
pub enum DatasetMap {
    Classic(Classic),
    Refmap(Refmap),
}

impl DatasetMap {
    /// An empty map of the given encoding — used when the chunk store's
    /// root is `Hash::EMPTY`.
    pub fn empty(format: Format) -> Self {
        match format {
            Format::Classic => DatasetMap::Classic(Classic::empty()),
            Format::Refmap => DatasetMap::Refmap(Refmap::empty()),
        }
    }

    /// Loads the map rooted at `root` using `format`'s decoder. Returns an
    /// empty map if `root` is `Hash::EMPTY`.
    pub fn load(store: &dyn ChunkStore, format: Format, root: Hash) -> DatasetsResult<Self> {
        if root.is_empty() {
            return Ok(Self::empty(format));
        }
        match format {
            Format::Classic => Ok(DatasetMap::Classic(Classic::load(store, root)?)),
            Format::Refmap => Ok(DatasetMap::Refmap(Refmap::load(store, root)?)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DatasetMap::Classic(m) => m.len(),
            DatasetMap::Refmap(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries in sorted-by-name order.
    pub fn iter_all(&self) -> Box<dyn Iterator<Item = (&str, Hash)> + '_> {
        match self {
            DatasetMap::Classic(m) => m.iter_all(),
            DatasetMap::Refmap(m) => m.iter_all(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Hash> {
        match self {
            DatasetMap::Classic(m) => m.lookup(name),
            DatasetMap::Refmap(m) => m.lookup(name),
        }
    }

    pub fn set(&mut self, name: &str, hash: Hash) {
        match self {
            DatasetMap::Classic(m) => m.set(name, hash),
            DatasetMap::Refmap(m) => m.set(name, hash),
        }
    }

    pub fn delete(&mut self, name: &str) {
        match self {
            DatasetMap::Classic(m) => m.delete(name),
            DatasetMap::Refmap(m) => m.delete(name),
        }
    }

    /// `true` iff the current entry for `name` equals `expected`
    /// (`Hash::EMPTY` means "entry absent").
    pub fn compare_and_set_entry(&mut self, name: &str, expected: Hash, new: Hash) -> bool {
        let current = self.lookup(name).unwrap_or(Hash::EMPTY);
        if current != expected {
            return false;
        }
        self.set(name, new);
        true
    }

    /// Writes self to the chunk store and returns its address.
    pub fn serialize(&self, store: &dyn ChunkStore) -> DatasetsResult<Hash> {
        match self {
            DatasetMap::Classic(m) => m.serialize(store),
            DatasetMap::Refmap(m) => m.serialize(store),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            DatasetMap::Classic(_) => Format::Classic,
            DatasetMap::Refmap(_) => Format::Refmap,
        }
    }
}

/// The common in-memory representation both encodings wrap: an ordered
/// `name -> Hash` map plus whatever serialization each encoding layers on
/// top. Kept internal so both sibling modules can share lookup/set/delete
/// without duplicating `BTreeMap` plumbing.
#[derive(Debug, Clone, Default)]
pub(super) struct SortedEntries(pub BTreeMap<String, Hash>);

impl SortedEntries {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn lookup(&self, name: &str) -> Option<Hash> {
        self.0.get(name).copied()
    }
    pub fn set(&mut self, name: &str, hash: Hash) {
        self.0.insert(name.to_string(), hash);
    }
    pub fn delete(&mut self, name: &str) {
        self.0.remove(name);
    }
    pub fn iter_all(&self) -> Box<dyn Iterator<Item = (&str, Hash)> + '_> {
        Box::new(self.0.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}
