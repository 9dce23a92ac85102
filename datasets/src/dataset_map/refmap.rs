//! The flat refmap encoding: one flat chunk holding every entry, sorted by
//! name, whose own hash *is* the map's address:
//!
//! ```text
//! count:u32 | repeat(count): [name_len:u16 | name:utf8 | addr:20B]
//! ```
//!
//! Hand-rolled and little-endian throughout; no flatbuffers dependency.

use super::SortedEntries;
use crate::chunk_store::{Chunk, ChunkStore, Format};
use crate::errors::{DatasetsError, DatasetsResult};
use crate::hash::{Hash, HASH_SIZE};
use itertools::Itertools;

#[derive(Debug, Clone, Default)]
pub struct Refmap(pub(super) SortedEntries);

impl Refmap {
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
        let bytes = store
            .get(root)?
            .ok_or_else(|| DatasetsError::Malformed(format!("refmap chunk {root} not found")))?;
        Self::decode(&bytes)
    }

    pub fn serialize(&self, store: &dyn ChunkStore) -> DatasetsResult<Hash> {
        let chunk = Chunk::new(self.encode());
        let hash = chunk.hash;
        store.put(chunk)?;
        Ok(hash)
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.0.len() as u32).to_le_bytes());
        for (name, addr) in self.0.iter_all() {
            let name_bytes = name.as_bytes();
            out.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
            out.extend_from_slice(name_bytes);
            out.extend_from_slice(addr.as_bytes());
        }
        out
    }

    fn decode(bytes: &[u8]) -> DatasetsResult<Self> {
        let malformed = |msg: &str| DatasetsError::Malformed(format!("refmap: {msg}"));
        if bytes.len() < 4 {
            return Err(malformed("truncated count"));
        }
        let count = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let mut pos = 4;
        let mut raw = Vec::with_capacity(count);
        for _ in 0..count {
            if bytes.len() < pos + 2 {
                return Err(malformed("truncated name_len"));
            }
            let name_len = u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap()) as usize;
            pos += 2;
            if bytes.len() < pos + name_len + HASH_SIZE {
                return Err(malformed("truncated entry"));
            }
            let name = std::str::from_utf8(&bytes[pos..pos + name_len]).map_err(|_| malformed("invalid utf8 name"))?.to_string();
            pos += name_len;
            let mut addr = [0u8; HASH_SIZE];
            addr.copy_from_slice(&bytes[pos..pos + HASH_SIZE]);
            pos += HASH_SIZE;
            raw.push((name, Hash::from_bytes(addr)));
        }
        if pos != bytes.len() {
            return Err(malformed("trailing bytes after last entry"));
        }
        // Entries are sorted by name on the wire; a decoder that silently
        // re-sorted a scrambled payload would mask the kind of corruption
        // this check exists to catch.
        if raw.iter().tuple_windows().any(|((a, _), (b, _))| a >= b) {
            return Err(malformed("entries are not strictly sorted by name"));
        }
        let mut entries = SortedEntries::default();
        for (name, hash) in raw {
            entries.set(&name, hash);
        }
        Ok(Self(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::MemoryChunkStore;

    #[test]
    fn round_trips_through_serialize_and_load() {
        let store = MemoryChunkStore::new(Format::Refmap);
        let mut m = Refmap::empty();
        m.set("refs/heads/main", crate::hash::digest(b"c1"));
        m.set("refs/tags/v1", crate::hash::digest(b"c2"));
        let addr = m.serialize(&store).unwrap();
        let loaded = Refmap::load(&store, addr).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.lookup("refs/heads/main"), m.lookup("refs/heads/main"));
        let names: Vec<_> = loaded.iter_all().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["refs/heads/main", "refs/tags/v1"]);
    }

    #[test]
    fn delete_removes_entry() {
        let mut m = Refmap::empty();
        m.set("a", crate::hash::digest(b"1"));
        m.delete("a");
        assert_eq!(m.lookup("a"), None);
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn decode_rejects_truncated_bytes() {
        assert!(Refmap::decode(&[1, 0, 0, 0]).is_err());
    }

    #[test]
    fn decode_rejects_out_of_order_entries() {
        // `encode` always emits in sorted order, so a scrambled payload has
        // to be built by hand rather than produced by the encoder itself.
        let scrambled = {
            let mut out = Vec::new();
            out.extend_from_slice(&2u32.to_le_bytes());
            for (name, hash) in [("b", crate::hash::digest(b"b")), ("a", crate::hash::digest(b"a"))] {
                out.extend_from_slice(&(name.len() as u16).to_le_bytes());
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(hash.as_bytes());
            }
            out
        };
        assert!(Refmap::decode(&scrambled).is_err());
    }
}
