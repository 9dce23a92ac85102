//! Thin typed read/write helpers over a [`ChunkStore`], used by the commit
//! graph and dataset-map layers. No caching layer of its own — caching a
//! content-addressed store is a pure performance concern that belongs to
//! the (external) `ChunkStore` implementation, not here.

use crate::chunk_store::{Chunk, ChunkStore};
use crate::errors::{DatasetsError, DatasetsResult};
use crate::hash::Hash;
use crate::object::{ClosureRef, Head, ParentsClosureMap};

pub fn load_head(store: &dyn ChunkStore, hash: Hash) -> DatasetsResult<Option<Head>> {
    if hash.is_empty() {
        return Ok(None);
    }
    match store.get(hash)? {
        Some(bytes) => Ok(Some(Head::decode(&bytes)?)),
        None => Ok(None),
    }
}

pub fn put_head(store: &dyn ChunkStore, head: &Head) -> DatasetsResult<Hash> {
    let chunk = Chunk::new(head.encode());
    let hash = chunk.hash;
    store.put(chunk)?;
    Ok(hash)
}

pub fn load_closure(store: &dyn ChunkStore, r: ClosureRef) -> DatasetsResult<ParentsClosureMap> {
    match store.get(r.target)? {
        Some(bytes) => bincode::deserialize(&bytes).map_err(|e| DatasetsError::Malformed(format!("parents closure: {e}"))),
        None => Err(DatasetsError::Malformed(format!("parents closure {} not found", r.target))),
    }
}

pub fn put_closure(store: &dyn ChunkStore, map: &ParentsClosureMap) -> DatasetsResult<ClosureRef> {
    let bytes = bincode::serialize(map).expect("ParentsClosureMap serialization is infallible for in-memory values");
    let chunk = Chunk::new(bytes);
    let hash = chunk.hash;
    store.put(chunk)?;
    Ok(ClosureRef::new(hash))
}
