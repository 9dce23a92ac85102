//! In-memory [`ChunkStore`] test double. Feature-gated `testutils`; not part
//! of the production API surface. Mirrors the shape of lightweight in-memory
//! dev stores used for testing elsewhere in the workspace: a blob table plus
//! a guarded root pointer, with none of a real backing store's durability or
//! compaction concerns, which are this crate's external collaborator, not
//! its job to fake convincingly.

use crate::chunk_store::{Chunk, ChunkStore, ChunkStoreError, Format};
use crate::hash::Hash;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MemoryChunkStore {
    format: Format,
    chunks: Mutex<HashMap<Hash, Vec<u8>>>,
    root: ArcSwap<Hash>,
}

impl MemoryChunkStore {
    pub fn new(format: Format) -> Self {
        Self { format, chunks: Mutex::new(HashMap::new()), root: ArcSwap::from_pointee(Hash::EMPTY) }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn get(&self, hash: Hash) -> Result<Option<Vec<u8>>, ChunkStoreError> {
        Ok(self.chunks.lock().get(&hash).cloned())
    }

    fn put(&self, chunk: Chunk) -> Result<(), ChunkStoreError> {
        self.chunks.lock().entry(chunk.hash).or_insert(chunk.bytes);
        Ok(())
    }

    fn root(&self) -> Result<Hash, ChunkStoreError> {
        Ok(**self.root.load())
    }

    fn commit_root(&self, new: Hash, prev: Hash) -> Result<bool, ChunkStoreError> {
        // `ArcSwap::compare_and_swap` compares by Arc pointer, not by value,
        // so the race window between "read current" and "swap" is closed at
        // the pointer level rather than re-checked by value afterwards —
        // pointer equality with `current` is the only correct success test.
        let current = self.root.load_full();
        if *current != prev {
            return Ok(false);
        }
        let previous = self.root.compare_and_swap(&current, Arc::new(new));
        Ok(Arc::ptr_eq(&previous, &current))
    }

    fn format(&self) -> Format {
        self.format
    }

    fn gc(&self, _old_gen_roots: &[Hash], _new_gen_roots: &[Hash]) -> Result<(), ChunkStoreError> {
        // The sweep itself is out of scope for this crate; the test double
        // only needs to prove the entry point is reachable and serialized
        // correctly, which `gc::tests` and `dataset::tests` cover via
        // `Datasets::gc`.
        Ok(())
    }
}

/// Initializes a line-oriented logger for test/integration binaries. Safe
/// to call more than once — only the first call takes effect, every later
/// call is a no-op.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
