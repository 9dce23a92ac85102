//! Commit / tag / working-set objects — the three possible dataset heads.

use crate::errors::{DatasetsError, DatasetsResult};
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Opaque struct payload attached to every head object. Serialization of
/// the application-level commit value itself is out of scope for this
/// crate; `Meta` is the one structured field the core reads and writes
/// directly (e.g. for display/debugging), modeled as a small string map
/// that every layer except the one that wrote it treats as opaque.
pub type Meta = BTreeMap<String, String>;

/// A typed reference to another object, addressed by content hash. The
/// phantom marker exists purely to keep "a ref to a Commit" and "a ref to an
/// opaque Value" from being interchangeable at the call site — there is no
/// runtime cost and no data beyond the hash.
pub struct Ref<T> {
    pub target: Hash,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    pub const fn new(target: Hash) -> Self {
        Self { target, _marker: PhantomData }
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Ref<T> {}
impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}
impl<T> Eq for Ref<T> {}
impl<T> std::hash::Hash for Ref<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.target.hash(state)
    }
}
impl<T> std::fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ref({:?})", self.target)
    }
}
impl<T> Serialize for Ref<T> {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.target.as_bytes().serialize(s)
    }
}
impl<'de, T> Deserialize<'de> for Ref<T> {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let bytes = <[u8; crate::hash::HASH_SIZE]>::deserialize(d)?;
        Ok(Ref::new(Hash::from_bytes(bytes)))
    }
}

/// Marker type for refs that point at the application-opaque value payload.
#[derive(Debug)]
pub struct ValueKind;
/// Marker type for refs that point at a [`Commit`].
#[derive(Debug)]
pub struct CommitKind;
/// Marker type for refs that point at a parents-closure map chunk.
#[derive(Debug)]
pub struct ClosureKind;

pub type ValueRef = Ref<ValueKind>;
pub type CommitRef = Ref<CommitKind>;
pub type ClosureRef = Ref<ClosureKind>;

/// The transitive-ancestor index used by [`crate::commit_graph`] for
/// sub-linear common-ancestor queries. Keyed by `(height, hash)` of each
/// indexed commit, mapping to that commit's direct parent refs.
///
/// Once a database stops attaching a closure to a commit (because some
/// parent lacked one), no descendant reintroduces one — this is an
/// intended degradation, not a bug, and callers must not "repair" it.
pub type ParentsClosureMap = BTreeMap<(u64, Hash), Vec<CommitRef>>;

/// An immutable commit: a value, its parent commits, and an optional
/// transitive-ancestor closure used to accelerate common-ancestor queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub value: ValueRef,
    pub parents: Vec<CommitRef>,
    pub parents_closure: Option<ClosureRef>,
    /// 0 for a root commit, `1 + max(parent heights)` otherwise. An
    /// internal bookkeeping field, not part of the stable wire schema;
    /// carried so `parents_closure` keys have something to key on without
    /// re-deriving height via a separate store round-trip on every query.
    pub height: u64,
    pub meta: Meta,
}

/// An immutable alias to a commit. Tags are never overwritten once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub commit_ref: CommitRef,
    pub meta: Meta,
}

/// A mutable-per-update object holding an in-progress working + staged
/// root. Overwritten wholesale on every update; the old chunk becomes
/// GC-eligible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingSet {
    pub working_root: ValueRef,
    pub staged_root: Option<ValueRef>,
    pub merge_state: Option<Meta>,
    pub meta: Meta,
}

/// One of the three possible dataset heads. A dataset's variant is fixed
/// for its lifetime and must never change across updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Head {
    Commit(Commit),
    Tag(Tag),
    WorkingSet(WorkingSet),
}

/// Discriminant-only view of [`Head`], used to check type invariance
/// without cloning the whole object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadKind {
    Commit,
    Tag,
    WorkingSet,
}

impl Head {
    pub fn kind(&self) -> HeadKind {
        match self {
            Head::Commit(_) => HeadKind::Commit,
            Head::Tag(_) => HeadKind::Tag,
            Head::WorkingSet(_) => HeadKind::WorkingSet,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Head::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Head::Tag(t) => Some(t),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Head serialization is infallible for in-memory values")
    }

    pub fn decode(bytes: &[u8]) -> DatasetsResult<Self> {
        bincode::deserialize(bytes).map_err(|e| DatasetsError::Malformed(format!("head object: {e}")))
    }
}

/// Structural validator: `true` iff `head` is a well-formed `Commit`.
/// Well-formed here means only "parses as a `Commit`" — ancestor
/// dereferencing is the caller's job ([`validate_tag`] does it for tags).
pub fn is_commit(head: &Head) -> bool {
    matches!(head, Head::Commit(_))
}

pub fn is_tag(head: &Head) -> bool {
    matches!(head, Head::Tag(_))
}

pub fn is_working_set(head: &Head) -> bool {
    matches!(head, Head::WorkingSet(_))
}

/// Dereferences `tag.commit_ref` through `load` and asserts it resolves to
/// a `Commit`. A target that resolves to something other than a commit, or
/// to nothing at all, is folded into the same `Malformed` error rather than
/// kept as distinct unreachable cases.
pub fn validate_tag(tag: &Tag, load: impl FnOnce(Hash) -> DatasetsResult<Option<Head>>) -> DatasetsResult<()> {
    match load(tag.commit_ref.target)? {
        Some(Head::Commit(_)) => Ok(()),
        Some(_) => Err(DatasetsError::Malformed(format!("tag commit_ref {} does not resolve to a commit", tag.commit_ref.target))),
        None => Err(DatasetsError::Malformed(format!("tag commit_ref {} does not resolve to any object", tag.commit_ref.target))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;

    #[test]
    fn head_round_trips_through_encode_decode() {
        let commit = Commit {
            value: ValueRef::new(digest(b"v1")),
            parents: vec![],
            parents_closure: None,
            height: 0,
            meta: Meta::new(),
        };
        let head = Head::Commit(commit);
        let bytes = head.encode();
        let decoded = Head::decode(&bytes).unwrap();
        assert!(is_commit(&decoded));
    }

    #[test]
    fn kind_discriminates_variants() {
        let tag = Head::Tag(Tag { commit_ref: CommitRef::new(digest(b"c1")), meta: Meta::new() });
        assert_eq!(tag.kind(), HeadKind::Tag);
        assert!(is_tag(&tag));
        assert!(!is_commit(&tag));
    }
}
