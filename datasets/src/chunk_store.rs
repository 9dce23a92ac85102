use crate::hash::Hash;
use std::fmt;

/// Encoding discriminator for the [`crate::dataset_map::DatasetMap`], fixed
/// for a store's lifetime. The core dispatches on this uniformly and never
/// mixes encodings within one database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Persistent sorted tree of chunks.
    Classic,
    /// Flat, single-chunk list of `(name, Hash)` pairs.
    Refmap,
}

/// An immutable `(Hash, bytes)` pair. `hash` always equals `digest(&bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub hash: Hash,
    pub bytes: Vec<u8>,
}

impl Chunk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { hash: crate::hash::digest(&bytes), bytes }
    }
}

/// A poll-based cancellation signal, checked between CAS attempts and before
/// every chunk store call. Modeled after the `triggered` crate's listener
/// shape used elsewhere in this workspace for shutdown signaling, but kept
/// as a plain trait so callers can wire in whatever deadline/cancellation
/// primitive their runtime uses.
pub trait CancellationToken: Send + Sync {
    fn is_canceled(&self) -> bool;
}

/// Never cancels. The default for callers that don't need cooperative
/// cancellation.
pub struct NeverCanceled;

impl CancellationToken for NeverCanceled {
    fn is_canceled(&self) -> bool {
        false
    }
}

/// External content-addressed blob store with an atomic root-swap
/// primitive. Deliberately out of scope for this crate to implement: the
/// registry core only consumes this contract. See [`crate::testutils`] for
/// an in-memory implementation used by this crate's own tests.
pub trait ChunkStore: Send + Sync {
    /// Reads a chunk by address. Returns `None` on miss — absence is not an
    /// error.
    fn get(&self, hash: Hash) -> Result<Option<Vec<u8>>, ChunkStoreError>;

    /// Writes a chunk, keyed by its own content address. Idempotent.
    fn put(&self, chunk: Chunk) -> Result<(), ChunkStoreError>;

    /// Current root hash. `Hash::EMPTY` denotes an empty database.
    fn root(&self) -> Result<Hash, ChunkStoreError>;

    /// Atomically swaps the root from `prev` to `new`. Returns `true` iff
    /// the store's root was exactly `prev` at the moment of the swap.
    fn commit_root(&self, new: Hash, prev: Hash) -> Result<bool, ChunkStoreError>;

    /// The encoding this store was initialized with.
    fn format(&self) -> Format;

    /// Forwards a reachable-root set to the store's GC. The core adds no
    /// policy beyond serializing this call against concurrent `commit_root`
    /// swaps (see [`crate::gc`]).
    fn gc(&self, old_gen_roots: &[Hash], new_gen_roots: &[Hash]) -> Result<(), ChunkStoreError>;
}

/// Opaque error surfaced by a [`ChunkStore`] implementation.
#[derive(Debug)]
pub struct ChunkStoreError(pub Box<dyn std::error::Error + Send + Sync>);

impl fmt::Display for ChunkStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ChunkStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl From<ChunkStoreError> for crate::errors::DatasetsError {
    fn from(e: ChunkStoreError) -> Self {
        crate::errors::DatasetsError::ChunkStore(e.0)
    }
}
