//! The classic encoding: a persistent sorted map stored as a two-level tree
//! of chunks. Entries are split into contiguous, bounded leaf chunks; a
//! single root index chunk maps each leaf's first key to that leaf's
//! address. The root index chunk's own hash is the map's address returned
//! by [`Classic::serialize`].

use super::SortedEntries;
use crate::chunk_store::{Chunk, ChunkStore, Format};
use crate::errors::{DatasetsError, DatasetsResult};
use crate::hash::Hash;
use serde::{Deserialize, Serialize};

/// Maximum entries per leaf chunk before a new leaf is started. Small
/// enough to exercise the multi-leaf path in tests, large enough that a
/// handful of datasets fits in one leaf.
const LEAF_SIZE: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Leaf {
    entries: Vec<(String, Hash)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RootIndex {
    /// `(first key in leaf, leaf chunk address)`, sorted by first key.
    leaves: Vec<(String, Hash)>,
}

#[derive(Debug, Clone, Default)]
pub struct Classic(pub(super) SortedEntries);

impl Classic {
    pub fn empty() -> Self {
        Self(SortedEntries::default())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn lookup(&self, name: &str) -> Option<Hash> {
        self.0.lookup(name)
    }
    pub fn set(&mut self, name: &str, hash: Hash) {
        self.0.set(name, hash)
    }
    pub fn delete(&mut self, name: &str) {
        self.0.delete(name)
    }
    pub fn iter_all(&self) -> Box<dyn Iterator<Item = (&str, Hash)> + '_> {
        self.0.iter_all()
    }

    pub fn load(store: &dyn ChunkStore, root: Hash) -> DatasetsResult<Self> {
        let index_bytes = store
            .get(root)?
            .ok_or_else(|| DatasetsError::Malformed(format!("classic root index {root} not found")))?;
        let index: RootIndex =
            bincode::deserialize(&index_bytes).map_err(|e| DatasetsError::Malformed(format!("classic root index: {e}")))?;

        let mut entries = SortedEntries::default();
        for (_, leaf_addr) in &index.leaves {
            let leaf_bytes = store
                .get(*leaf_addr)?
                .ok_or_else(|| DatasetsError::Malformed(format!("classic leaf {leaf_addr} not found")))?;
            let leaf: Leaf = bincode::deserialize(&leaf_bytes).map_err(|e| DatasetsError::Malformed(format!("classic leaf: {e}")))?;
            for (name, hash) in leaf.entries {
                entries.set(&name, hash);
            }
        }
        Ok(Self(entries))
    }

    pub fn serialize(&self, store: &dyn ChunkStore) -> DatasetsResult<Hash> {
        let mut leaves = Vec::new();
        let all: Vec<(String, Hash)> = self.0.iter_all().map(|(n, h)| (n.to_string(), h)).collect();

        if all.is_empty() {
            let index = RootIndex { leaves: Vec::new() };
            return write_chunk(store, &index);
        }

        for block in all.chunks(LEAF_SIZE) {
            let leaf = Leaf { entries: block.to_vec() };
            let leaf_hash = write_chunk(store, &leaf)?;
            leaves.push((block[0].0.clone(), leaf_hash));
        }
        let index = RootIndex { leaves };
        write_chunk(store, &index)
    }
}

fn write_chunk<T: Serialize>(store: &dyn ChunkStore, value: &T) -> DatasetsResult<Hash> {
    let bytes = bincode::serialize(value).expect("classic map node serialization is infallible for in-memory values");
    let chunk = Chunk::new(bytes);
    let hash = chunk.hash;
    store.put(chunk)?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::MemoryChunkStore;

    #[test]
    fn round_trips_across_multiple_leaves() {
        let store = MemoryChunkStore::new(Format::Classic);
        let mut m = Classic::empty();
        for i in 0..(LEAF_SIZE * 3 + 5) {
            m.set(&format!("refs/heads/branch-{i:04}"), crate::hash::digest(format!("c{i}").as_bytes()));
        }
        let addr = m.serialize(&store).unwrap();
        let loaded = Classic::load(&store, addr).unwrap();
        assert_eq!(loaded.len(), m.len());
        assert_eq!(loaded.lookup("refs/heads/branch-0000"), m.lookup("refs/heads/branch-0000"));
        assert_eq!(loaded.lookup("refs/heads/branch-0199"), m.lookup("refs/heads/branch-0199"));
    }

    #[test]
    fn empty_map_serializes_and_reloads_empty() {
        let store = MemoryChunkStore::new(Format::Classic);
        let m = Classic::empty();
        let addr = m.serialize(&store).unwrap();
        let loaded = Classic::load(&store, addr).unwrap();
        assert_eq!(loaded.len(), 0);
    }

    #[test]
    fn iteration_order_is_sorted_by_name() {
        let mut m = Classic::empty();
        m.set("b", crate::hash::digest(b"b"));
        m.set("a", crate::hash::digest(b"a"));
        m.set("c", crate::hash::digest(b"c"));
        let names: Vec<_> = m.iter_all().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
