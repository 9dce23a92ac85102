//! Commit graph primitives (C3): building and validating commit objects,
//! the parents-closure index, and common-ancestor queries.

use crate::chunk_store::{CancellationToken, ChunkStore};
use crate::errors::{DatasetsError, DatasetsResult};
use crate::hash::Hash;
use crate::object::{Commit, CommitRef, Meta, ParentsClosureMap, ValueRef};
use crate::objstore::{load_closure, load_head, put_closure};
use log::warn;
use std::collections::{HashMap, HashSet, VecDeque};

/// Caps how many commits a single [`find_common_ancestor`] call will visit
/// per side before giving up and reporting "not found". The BFS must be
/// bounded; the exact bound is an implementation choice, not an externally
/// observable contract.
pub const MAX_TRAVERSAL_NODES: usize = 1_000_000;

/// Options accepted by [`build_new_commit`].
#[derive(Debug, Default, Clone)]
pub struct CommitOpts {
    /// Explicit parent set. Empty means "infer from the dataset's current
    /// head".
    pub parents: Vec<CommitRef>,
    pub meta: Meta,
}

/// Builds a new, unwritten `Commit` object for `value` against
/// `current_head` (the dataset's last-observed head hash, or `Hash::EMPTY`
/// if the dataset doesn't exist yet).
///
/// Returns `Err(MergeNeeded)` if `opts.parents` is non-empty and does not
/// include the current head: *some* explicit parent must equal the current
/// head by target hash.
pub fn build_new_commit(
    store: &dyn ChunkStore,
    current_head: Hash,
    value: ValueRef,
    opts: CommitOpts,
) -> DatasetsResult<Commit> {
    let parents = if !opts.parents.is_empty() {
        if !current_head.is_empty() && !opts.parents.iter().any(|p| p.target == current_head) {
            return Err(DatasetsError::MergeNeeded(current_head));
        }
        opts.parents
    } else if current_head.is_empty() {
        Vec::new()
    } else {
        vec![CommitRef::new(current_head)]
    };

    let loaded_parents: Vec<Commit> = parents
        .iter()
        .map(|p| {
            load_head(store, p.target)?
                .and_then(|h| h.as_commit().cloned())
                .ok_or_else(|| DatasetsError::Malformed(format!("parent {} does not resolve to a commit", p.target)))
        })
        .collect::<DatasetsResult<_>>()?;

    let height = loaded_parents.iter().map(|c| c.height + 1).max().unwrap_or(0);
    let parents_closure = build_parents_closure(store, &parents, &loaded_parents)?;

    Ok(Commit { value, parents, parents_closure, height, meta: opts.meta })
}

fn build_parents_closure(
    store: &dyn ChunkStore,
    parent_refs: &[CommitRef],
    parents: &[Commit],
) -> DatasetsResult<Option<crate::object::ClosureRef>> {
    if parents.is_empty() {
        return Ok(None);
    }

    // Step 4: once any ancestor stopped tracking a closure, propagate that
    // degradation forward verbatim — never "repair" it on a later commit.
    if parents.iter().any(|p| !p.parents.is_empty() && p.parents_closure.is_none()) {
        return Ok(None);
    }

    // Step 1: seed from the first parent's closure.
    let mut merged: ParentsClosureMap = match parents[0].parents_closure {
        Some(r) => load_closure(store, r)?,
        None => ParentsClosureMap::new(),
    };

    // Step 2: merge in only the keys each additional parent adds that the
    // base doesn't already have.
    for p in &parents[1..] {
        if let Some(r) = p.parents_closure {
            let other = load_closure(store, r)?;
            for (k, v) in other {
                merged.entry(k).or_insert(v);
            }
        }
    }

    // Step 3: index each parent itself.
    for (parent_ref, parent) in parent_refs.iter().zip(parents.iter()) {
        merged.insert((parent.height, parent_ref.target), parent.parents.clone());
    }

    Ok(Some(put_closure(store, &merged)?))
}

/// `true` iff `ancestor` is not `current` — i.e. `current` is not on the
/// history of the candidate `new` advance. `new` is accepted for call-site
/// symmetry but unused: the decision depends only on whether the
/// fast-forward search landed back on `current`.
pub fn merge_needed(current: Hash, ancestor: Hash, _new: Hash) -> bool {
    ancestor != current
}

/// Bounded BFS over parent refs, preferring the `parents_closure` index
/// when present, to find the deepest commit that is an ancestor of both
/// `a` and `b` (or of one by the other, in the fast-forward case).
///
/// Returns `(Some(ancestor), true)` on success. Returns `(None, false)` if
/// no common ancestor exists, or if the traversal bound
/// ([`MAX_TRAVERSAL_NODES`]) is reached first — the two are
/// indistinguishable to the caller by design; this is a black-box
/// queryable operation, not a certificate of non-existence.
pub fn find_common_ancestor(store: &dyn ChunkStore, cancel: &dyn CancellationToken, a: Hash, b: Hash) -> DatasetsResult<(Option<CommitRef>, bool)> {
    find_common_ancestor_bounded(store, cancel, a, b, MAX_TRAVERSAL_NODES)
}

/// Same as [`find_common_ancestor`] but with an explicit traversal bound,
/// used by [`crate::dataset::Datasets`] to honor a caller-supplied
/// [`crate::config::Config::max_traversal_nodes`] instead of the built-in
/// default. Polls `cancel` on every node visited, at both store boundaries
/// (`load_head`/`load_closure`) and between BFS steps, per spec §5's
/// "every closure/ancestry traversal" suspension point.
pub fn find_common_ancestor_bounded(
    store: &dyn ChunkStore,
    cancel: &dyn CancellationToken,
    a: Hash,
    b: Hash,
    max_nodes: usize,
) -> DatasetsResult<(Option<CommitRef>, bool)> {
    if a == b {
        return Ok((Some(CommitRef::new(a)), true));
    }
    let ancestors_a = collect_ancestors(store, cancel, a, max_nodes)?;
    if ancestors_a.contains_key(&b) {
        return Ok((Some(CommitRef::new(b)), true));
    }

    let mut best: Option<(u64, Hash)> = None;
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(b);
    visited.insert(b);

    while let Some(h) = queue.pop_front() {
        if cancel.is_canceled() {
            return Err(DatasetsError::Canceled);
        }
        if visited.len() > max_nodes {
            warn!("find_common_ancestor: traversal bound reached for ({a}, {b})");
            break;
        }
        if let Some(&height) = ancestors_a.get(&h) {
            if best.map(|(bh, _)| height > bh).unwrap_or(true) {
                best = Some((height, h));
            }
            // Closure-indexed ancestors are a flat set with no further
            // parent edges to walk on this branch of the search.
            continue;
        }
        let Some(head) = load_head(store, h)? else { continue };
        let Some(commit) = head.as_commit() else { continue };
        if let Some(closure_ref) = commit.parents_closure {
            if cancel.is_canceled() {
                return Err(DatasetsError::Canceled);
            }
            let closure = load_closure(store, closure_ref)?;
            for (&(height, hash), _) in &closure {
                if ancestors_a.contains_key(&hash) {
                    if best.map(|(bh, _)| height > bh).unwrap_or(true) {
                        best = Some((height, hash));
                    }
                } else if visited.insert(hash) {
                    queue.push_back(hash);
                }
            }
        }
        for p in &commit.parents {
            if visited.insert(p.target) {
                queue.push_back(p.target);
            }
        }
    }

    match best {
        Some((_, hash)) => Ok((Some(CommitRef::new(hash)), true)),
        None => Ok((None, false)),
    }
}

/// Collects every ancestor hash of `from` (inclusive) reachable by walking
/// `parents` edges, short-circuiting through `parents_closure` indices
/// whenever present. Maps each ancestor to its `height`. Polls `cancel`
/// once per node and once more before each `load_closure` round-trip.
fn collect_ancestors(store: &dyn ChunkStore, cancel: &dyn CancellationToken, from: Hash, max_nodes: usize) -> DatasetsResult<HashMap<Hash, u64>> {
    let mut heights = HashMap::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(from);
    visited.insert(from);

    while let Some(h) = queue.pop_front() {
        if cancel.is_canceled() {
            return Err(DatasetsError::Canceled);
        }
        if visited.len() > max_nodes {
            warn!("collect_ancestors: traversal bound reached at {from}");
            break;
        }
        let Some(head) = load_head(store, h)? else { continue };
        let Some(commit) = head.as_commit() else { continue };
        heights.insert(h, commit.height);

        if let Some(closure_ref) = commit.parents_closure {
            if cancel.is_canceled() {
                return Err(DatasetsError::Canceled);
            }
            let closure = load_closure(store, closure_ref)?;
            for (&(height, hash), _) in &closure {
                heights.insert(hash, height);
            }
        }
        for p in &commit.parents {
            if visited.insert(p.target) {
                queue.push_back(p.target);
            }
        }
    }

    Ok(heights)
}
