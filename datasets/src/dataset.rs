//! Dataset API (C5): per-dataset operations layered over the root-update
//! engine. `Datasets` is the façade callers hold: it wraps the shared chunk
//! store and exposes one method per externally-visible operation, each of
//! which dispatches into the commit-graph primitives (`commit_graph`) and
//! the root-update engine (`root_update`).

use crate::chunk_store::{CancellationToken, ChunkStore, NeverCanceled};
use crate::commit_graph::{build_new_commit, find_common_ancestor_bounded, merge_needed, CommitOpts};
use crate::config::Config;
use crate::dataset_map::DatasetMap;
use crate::errors::{DatasetsError, DatasetsResult};
use crate::gc::PruningLock;
use crate::hash::Hash;
use crate::object::{validate_tag, CommitRef, Head, HeadKind, Meta, Tag, ValueRef, WorkingSet};
use crate::objstore::{load_head, put_head};
use crate::root_update;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Dataset identifier grammar. Names are validated against a fixed regex;
/// this crate is the registry core, not the enclosing system that ultimately
/// owns the grammar, so it fixes a conservative ref-style pattern of its
/// own: a non-empty sequence of `/`-separated components, each starting
/// with an alphanumeric and otherwise drawn from `[A-Za-z0-9_.-]`, e.g.
/// `refs/heads/main`, `refs/tags/v1`, `workingSets/alice/feature-x`.
static DATASET_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*(/[A-Za-z0-9][A-Za-z0-9_.-]*)*$").unwrap());

/// Validates `id` against the dataset identifier grammar.
pub fn validate_dataset_id(id: &str) -> DatasetsResult<()> {
    if DATASET_ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(DatasetsError::InvalidDatasetId(id.to_string()))
    }
}

/// A dataset handle: an id plus its last-observed head. Every [`Datasets`]
/// method returns a refreshed `Dataset` reflecting the post-update state.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: String,
    /// `Hash::EMPTY` iff the dataset does not currently exist.
    pub head_addr: Hash,
    pub head: Option<Head>,
}

impl Dataset {
    pub fn exists(&self) -> bool {
        self.head.is_some()
    }
}

/// Options accepted by [`Datasets::tag`].
#[derive(Debug, Default, Clone)]
pub struct TagOpts {
    pub meta: Meta,
}

/// The registry façade. `Send + Sync`, since every field it holds is either
/// an `Arc` or a thread-safe primitive; callers wrap it in an `Arc` of their
/// own to share one instance across threads.
pub struct Datasets {
    store: Arc<dyn ChunkStore>,
    cancel: Arc<dyn CancellationToken>,
    pruning: PruningLock,
    config: Config,
}

impl Datasets {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self::with_config(store, Arc::new(NeverCanceled), Config::default())
    }

    pub fn with_config(store: Arc<dyn ChunkStore>, cancel: Arc<dyn CancellationToken>, config: Config) -> Self {
        Self { store, cancel, pruning: PruningLock::new(), config }
    }

    fn update<F>(&self, edit: F) -> DatasetsResult<()>
    where
        F: FnMut(&mut DatasetMap) -> DatasetsResult<()>,
    {
        let _guard = self.pruning.read();
        root_update::update(self.store.as_ref(), self.cancel.as_ref(), &self.config.retry, edit)
    }

    fn find_common_ancestor(&self, a: Hash, b: Hash) -> DatasetsResult<(Option<CommitRef>, bool)> {
        find_common_ancestor_bounded(self.store.as_ref(), self.cancel.as_ref(), a, b, self.config.max_traversal_nodes)
    }

    /// Lists every dataset name in the current root snapshot, sorted.
    /// An empty root yields an empty list; this read is not serialized
    /// against concurrent writers.
    pub fn datasets(&self) -> DatasetsResult<Vec<String>> {
        let root = self.store.root()?;
        let map = DatasetMap::load(self.store.as_ref(), self.store.format(), root)?;
        Ok(map.iter_all().map(|(name, _)| name.to_string()).collect())
    }

    /// Loads `id`'s current head, if any, from a single snapshot of the root.
    pub fn get_dataset(&self, id: &str) -> DatasetsResult<Dataset> {
        validate_dataset_id(id)?;
        let root = self.store.root()?;
        let map = DatasetMap::load(self.store.as_ref(), self.store.format(), root)?;
        let head_addr = map.lookup(id).unwrap_or(Hash::EMPTY);
        let head = load_head(self.store.as_ref(), head_addr)?;
        Ok(Dataset { id: id.to_string(), head_addr, head })
    }

    /// Unconditional (admin) retarget of `ds` to `new_head_addr`, which must
    /// resolve to a `Commit` or `Tag`. Fails with [`DatasetsError::TypeMismatch`]
    /// if `ds` already exists with a head of a different variant.
    pub fn set_head(&self, ds: &Dataset, new_head_addr: Hash) -> DatasetsResult<Dataset> {
        validate_dataset_id(&ds.id)?;
        let new_head = load_head(self.store.as_ref(), new_head_addr)?
            .ok_or_else(|| DatasetsError::Malformed(format!("set_head target {new_head_addr} does not resolve to any object")))?;
        match &new_head {
            Head::Commit(_) => {}
            Head::Tag(tag) => validate_tag(tag, |h| load_head(self.store.as_ref(), h))?,
            Head::WorkingSet(_) => {
                return Err(DatasetsError::Malformed("set_head target must be a commit or tag, not a working set".to_string()))
            }
        }
        let new_kind = new_head.kind();
        let id = ds.id.clone();
        let store = self.store.clone();
        self.update(move |map| {
            if let Some(existing_addr) = map.lookup(&id) {
                let existing = load_head(store.as_ref(), existing_addr)?
                    .ok_or_else(|| DatasetsError::Malformed(format!("existing head {existing_addr} not found")))?;
                if existing.kind() != new_kind {
                    return Err(DatasetsError::TypeMismatch(id.clone()));
                }
            }
            map.set(&id, new_head_addr);
            Ok(())
        })?;
        info!("set_head: {} -> {new_head_addr}", ds.id);
        self.get_dataset(&ds.id)
    }

    /// Advances a commit-typed dataset to `new_head_addr`, a descendant of
    /// its current head. Returns [`DatasetsError::MergeNeeded`] if `new_head_addr`
    /// is not a fast-forward. A repeat fast-forward to the same target is a
    /// no-op: the internal `AlreadyCommitted` is swallowed rather than surfaced.
    pub fn fast_forward(&self, ds: &Dataset, new_head_addr: Hash) -> DatasetsResult<Dataset> {
        validate_dataset_id(&ds.id)?;
        let new_head = load_head(self.store.as_ref(), new_head_addr)?
            .ok_or_else(|| DatasetsError::Malformed(format!("fast_forward target {new_head_addr} does not resolve to any object")))?;
        if new_head.as_commit().is_none() {
            return Err(DatasetsError::Malformed("fast_forward target must be a commit".to_string()));
        }

        let current_addr = ds.head_addr;
        let (ancestor, found) = self.find_common_ancestor(current_addr, new_head_addr)?;
        let ancestor_hash = ancestor.map(|r| r.target).unwrap_or(Hash::EMPTY);
        if !found || merge_needed(current_addr, ancestor_hash, new_head_addr) {
            return Err(DatasetsError::MergeNeeded(current_addr));
        }

        let id = ds.id.clone();
        match self.update(move |map| do_commit(&id, map, current_addr, new_head_addr)) {
            Ok(()) => {}
            Err(DatasetsError::AlreadyCommitted(h)) => {
                debug!("fast_forward: {} already at {h}, treating as success", ds.id);
            }
            Err(e) => return Err(e),
        }
        self.get_dataset(&ds.id)
    }

    /// Builds a new commit for `value` against `ds`'s last-observed head and
    /// advances the dataset to it. Unlike [`Datasets::fast_forward`],
    /// `AlreadyCommitted` surfaces rather than being swallowed.
    pub fn commit(&self, ds: &Dataset, value: ValueRef, opts: CommitOpts) -> DatasetsResult<Dataset> {
        validate_dataset_id(&ds.id)?;
        let current_head_hash = current_commit_head_hash(ds)?;

        let commit = build_new_commit(self.store.as_ref(), current_head_hash, value, opts)?;
        let new_addr = put_head(self.store.as_ref(), &Head::Commit(commit))?;

        let id = ds.id.clone();
        self.update(move |map| do_commit(&id, map, current_head_hash, new_addr))?;
        info!("commit: {} -> {new_addr}", ds.id);
        self.get_dataset(&ds.id)
    }

    /// Creates an immutable tag pointing at `commit_addr`. Fails with
    /// [`DatasetsError::ImmutableTag`] if `ds` already exists — tags are
    /// never overwritten once created.
    pub fn tag(&self, ds: &Dataset, commit_addr: Hash, opts: TagOpts) -> DatasetsResult<Dataset> {
        validate_dataset_id(&ds.id)?;
        let tag = Tag { commit_ref: CommitRef::new(commit_addr), meta: opts.meta };
        validate_tag(&tag, |h| load_head(self.store.as_ref(), h))?;
        let new_addr = put_head(self.store.as_ref(), &Head::Tag(tag))?;

        let id = ds.id.clone();
        self.update(move |map| {
            if map.lookup(&id).is_some() {
                return Err(DatasetsError::ImmutableTag(id.clone()));
            }
            map.set(&id, new_addr);
            Ok(())
        })?;
        info!("tag: {} -> {new_addr}", ds.id);
        self.get_dataset(&ds.id)
    }

    /// Name-scoped CAS update of a working-set entry: succeeds only if the
    /// entry's current address equals `prev_hash` (empty meaning "absent").
    /// A mismatch surfaces [`DatasetsError::OptimisticLockFailed`] immediately
    /// — this path is never retried by [`crate::root_update::update`], since
    /// the mismatch comes from inside the edit closure, not from the chunk
    /// store's own CAS rejection. If `ds` already exists with a non-working-set
    /// head, fails with [`DatasetsError::TypeMismatch`] rather than silently
    /// converting it.
    pub fn update_working_set(&self, ds: &Dataset, spec: WorkingSet, prev_hash: Hash) -> DatasetsResult<Dataset> {
        validate_dataset_id(&ds.id)?;
        let new_addr = put_head(self.store.as_ref(), &Head::WorkingSet(spec))?;

        let id = ds.id.clone();
        let store = self.store.clone();
        self.update(move |map| {
            let current = map.lookup(&id).unwrap_or(Hash::EMPTY);
            if current != prev_hash {
                return Err(DatasetsError::OptimisticLockFailed { expected: prev_hash, found: current });
            }
            if !current.is_empty() {
                let existing = load_head(store.as_ref(), current)?
                    .ok_or_else(|| DatasetsError::Malformed(format!("existing head {current} not found")))?;
                if existing.kind() != HeadKind::WorkingSet {
                    return Err(DatasetsError::TypeMismatch(id.clone()));
                }
            }
            map.set(&id, new_addr);
            Ok(())
        })?;
        self.get_dataset(&ds.id)
    }

    /// Atomically advances a commit-typed dataset and a working-set dataset
    /// in one root transition: the only multi-entry atomic primitive the
    /// core exposes. Both preconditions — the working-set
    /// name-CAS and the commit fast-forward check — are evaluated inside the
    /// same edit closure, so either both entries move or neither does.
    #[allow(clippy::too_many_arguments)]
    pub fn commit_with_working_set(
        &self,
        commit_ds: &Dataset,
        ws_ds: &Dataset,
        value: ValueRef,
        ws_spec: WorkingSet,
        prev_ws_hash: Hash,
        opts: CommitOpts,
    ) -> DatasetsResult<(Dataset, Dataset)> {
        validate_dataset_id(&commit_ds.id)?;
        validate_dataset_id(&ws_ds.id)?;
        let current_commit_hash = current_commit_head_hash(commit_ds)?;

        let commit = build_new_commit(self.store.as_ref(), current_commit_hash, value, opts)?;
        let new_commit_addr = put_head(self.store.as_ref(), &Head::Commit(commit))?;
        let new_ws_addr = put_head(self.store.as_ref(), &Head::WorkingSet(ws_spec))?;

        let commit_id = commit_ds.id.clone();
        let ws_id = ws_ds.id.clone();
        let store = self.store.clone();
        let cancel = self.cancel.clone();
        let max_traversal_nodes = self.config.max_traversal_nodes;

        self.update(move |map| {
            let current_ws = map.lookup(&ws_id).unwrap_or(Hash::EMPTY);
            if current_ws != prev_ws_hash {
                return Err(DatasetsError::OptimisticLockFailed { expected: prev_ws_hash, found: current_ws });
            }
            if !current_ws.is_empty() {
                let existing_ws = load_head(store.as_ref(), current_ws)?
                    .ok_or_else(|| DatasetsError::Malformed(format!("existing head {current_ws} not found")))?;
                if existing_ws.kind() != HeadKind::WorkingSet {
                    return Err(DatasetsError::TypeMismatch(ws_id.clone()));
                }
            }

            let current_commit = map.lookup(&commit_id).unwrap_or(Hash::EMPTY);
            if !current_commit.is_empty() {
                let (ancestor, found) =
                    find_common_ancestor_bounded(store.as_ref(), cancel.as_ref(), current_commit, new_commit_addr, max_traversal_nodes)?;
                let ancestor_hash = ancestor.map(|r| r.target).unwrap_or(Hash::EMPTY);
                if !found || merge_needed(current_commit, ancestor_hash, new_commit_addr) {
                    return Err(DatasetsError::MergeNeeded(current_commit));
                }
            } else if !current_commit_hash.is_empty() {
                return Err(DatasetsError::MergeNeeded(current_commit_hash));
            }

            map.set(&commit_id, new_commit_addr);
            map.set(&ws_id, new_ws_addr);
            Ok(())
        })?;

        Ok((self.get_dataset(&commit_ds.id)?, self.get_dataset(&ws_ds.id)?))
    }

    /// Removes `ds`'s entry. Idempotent across both repeat calls and
    /// internal CAS retries of a single call: the first observation of the
    /// entry's value within this call is fixed, and every subsequent
    /// invocation of the edit closure (via retry) must observe a state
    /// consistent with it, else [`DatasetsError::MergeNeeded`].
    pub fn delete(&self, ds: &Dataset) -> DatasetsResult<()> {
        validate_dataset_id(&ds.id)?;
        let id = ds.id.clone();
        let mut first_observed: Option<Hash> = None;
        self.update(move |map| {
            let current = map.lookup(&id).unwrap_or(Hash::EMPTY);
            let expected = *first_observed.get_or_insert(current);
            if current.is_empty() {
                return if expected.is_empty() { Ok(()) } else { Err(DatasetsError::MergeNeeded(current)) };
            }
            if current != expected {
                return Err(DatasetsError::MergeNeeded(current));
            }
            map.delete(&id);
            Ok(())
        })
    }

    /// Forwards reachable-root sets to the chunk store's GC, serialized
    /// against concurrent [`Datasets`] updates via the internal pruning lock.
    pub fn gc(&self, old_gen_roots: &[Hash], new_gen_roots: &[Hash]) -> DatasetsResult<()> {
        let _guard = self.pruning.write();
        self.store.gc(old_gen_roots, new_gen_roots)?;
        Ok(())
    }
}

/// The shared edit logic used by [`Datasets::commit`],
/// [`Datasets::fast_forward`], and the commit half of
/// [`Datasets::commit_with_working_set`].
fn do_commit(id: &str, map: &mut DatasetMap, expected_current: Hash, new_addr: Hash) -> DatasetsResult<()> {
    match map.lookup(id) {
        Some(current) if current != expected_current => Err(DatasetsError::MergeNeeded(current)),
        Some(current) if current == new_addr => Err(DatasetsError::AlreadyCommitted(current)),
        None if !expected_current.is_empty() => Err(DatasetsError::MergeNeeded(expected_current)),
        _ => {
            map.set(id, new_addr);
            Ok(())
        }
    }
}

fn current_commit_head_hash(ds: &Dataset) -> DatasetsResult<Hash> {
    match &ds.head {
        Some(Head::Commit(_)) => Ok(ds.head_addr),
        Some(_) => Err(DatasetsError::TypeMismatch(ds.id.clone())),
        None => Ok(Hash::EMPTY),
    }
}
