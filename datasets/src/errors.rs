use crate::hash::Hash;
use thiserror::Error;

/// Error kinds surfaced by the registry core to callers.
///
/// Every variant is a distinguished, caller-observable failure mode (see
/// the error table in the design doc); the CAS loop in [`crate::root_update`]
/// retries on none of them directly — it retries only on the chunk store's
/// own "stale prev" rejection, which never reaches this enum.
#[derive(Error, Debug)]
pub enum DatasetsError {
    /// A working-set or root-level CAS precondition did not match the
    /// caller's last-observed hash. Not retried by the core.
    #[error("optimistic lock failed: expected {expected}, found {found}")]
    OptimisticLockFailed { expected: Hash, found: Hash },

    /// The requested advance is not a fast-forward of the current head.
    #[error("merge needed: {0} is not an ancestor of the requested update")]
    MergeNeeded(Hash),

    /// The new head equals the dataset's existing head.
    #[error("already committed: head is already {0}")]
    AlreadyCommitted(Hash),

    /// Dataset name failed the identifier grammar.
    #[error("invalid dataset id: {0:?}")]
    InvalidDatasetId(String),

    /// Attempted to overwrite a dataset with a head of a different variant.
    #[error("type mismatch: dataset {0:?} cannot change head variant")]
    TypeMismatch(String),

    /// Attempted to update an existing tag.
    #[error("immutable tag: {0:?} already exists")]
    ImmutableTag(String),

    /// A structural validator rejected a candidate object.
    #[error("malformed object: {0}")]
    Malformed(String),

    /// The dataset referenced does not exist.
    #[error("dataset not found: {0:?}")]
    DatasetNotFound(String),

    /// Underlying chunk store I/O failure.
    #[error("chunk store error: {0}")]
    ChunkStore(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// The calling context was canceled.
    #[error("operation canceled")]
    Canceled,
}

pub type DatasetsResult<T> = std::result::Result<T, DatasetsError>;

impl DatasetsError {
    /// True for error kinds the root-update engine retries internally —
    /// which is none of them. Every variant that reaches this type is
    /// surfaced directly; only the chunk store's own stale-prev rejection
    /// triggers a silent retry, and that rejection never gets wrapped into
    /// a `DatasetsError` at all.
    pub fn is_retryable_by_engine(&self) -> bool {
        false
    }
}
