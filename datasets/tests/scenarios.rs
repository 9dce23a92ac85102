//! End-to-end scenarios exercised against the public `Datasets` façade over
//! `MemoryChunkStore`, rather than as unit tests embedded next to the
//! implementation.

use datasets::commit_graph::CommitOpts;
use datasets::testutils::{init_test_logger, MemoryChunkStore};
use datasets::{digest, Dataset, Datasets, DatasetsError, DatasetsResult, Format, Hash, Meta, TagOpts, ValueRef};
use std::sync::Arc;
use std::thread;

fn new_registry() -> Datasets {
    init_test_logger();
    Datasets::new(Arc::new(MemoryChunkStore::new(Format::Refmap)))
}

fn value(bytes: &[u8]) -> ValueRef {
    ValueRef::new(digest(bytes))
}

/// Scenario 1: create and advance.
#[test]
fn create_and_advance() {
    let ds = new_registry();
    let main = ds.get_dataset("refs/heads/main").unwrap();

    let main = ds.commit(&main, value(b"V1"), CommitOpts::default()).unwrap();
    let c1 = main.head.as_ref().unwrap().as_commit().unwrap();
    assert_eq!(c1.value, value(b"V1"));
    assert!(c1.parents.is_empty());

    let main = ds.commit(&main, value(b"V2"), CommitOpts::default()).unwrap();
    let c2 = main.head.as_ref().unwrap().as_commit().unwrap();
    assert_eq!(c2.value, value(b"V2"));
    assert_eq!(c2.parents.len(), 1);
}

/// Scenario 2: fast-forward rejects divergence.
#[test]
fn fast_forward_rejects_divergence() {
    let ds = new_registry();
    let main = ds.get_dataset("refs/heads/main").unwrap();
    let main = ds.commit(&main, value(b"C1"), CommitOpts::default()).unwrap();
    let c1 = main.head_addr;

    let branch = ds.get_dataset("refs/heads/scratch").unwrap();
    let opts = |parent: Hash| CommitOpts { parents: vec![datasets::CommitRef::new(parent)], meta: Meta::new() };
    let c2a = ds.commit(&branch, value(b"C2a"), opts(c1)).unwrap().head_addr;
    let c2b = ds.commit(&branch, value(b"C2b"), opts(c1)).unwrap().head_addr;

    let main = ds.fast_forward(&main, c2a).unwrap();
    assert_eq!(main.head_addr, c2a);

    let err = ds.fast_forward(&main, c2b).unwrap_err();
    assert!(matches!(err, DatasetsError::MergeNeeded(_)));
}

/// Scenario 3: tag immutability.
#[test]
fn tag_immutability() {
    let ds = new_registry();
    let main = ds.get_dataset("refs/heads/main").unwrap();
    let main = ds.commit(&main, value(b"C1"), CommitOpts::default()).unwrap();
    let c1 = main.head_addr;
    let main = ds.commit(&main, value(b"C2"), CommitOpts::default()).unwrap();
    let c2 = main.head_addr;

    let v1 = ds.get_dataset("refs/tags/v1").unwrap();
    ds.tag(&v1, c1, TagOpts::default()).unwrap();

    let v1 = ds.get_dataset("refs/tags/v1").unwrap();
    let err = ds.tag(&v1, c2, TagOpts::default()).unwrap_err();
    assert!(matches!(err, DatasetsError::ImmutableTag(_)));
}

/// Scenario 4: cross-type rewrite forbidden.
#[test]
fn cross_type_rewrite_forbidden() {
    let ds = new_registry();
    let main = ds.get_dataset("refs/heads/main").unwrap();
    let main = ds.commit(&main, value(b"C1"), CommitOpts::default()).unwrap();
    let c1 = main.head_addr;
    let main = ds.commit(&main, value(b"C2"), CommitOpts::default()).unwrap();
    let c2 = main.head_addr;

    let t = ds.get_dataset("refs/tags/t").unwrap();
    let t = ds.tag(&t, c1, TagOpts::default()).unwrap();

    let err = ds.set_head(&t, c2).unwrap_err();
    assert!(matches!(err, DatasetsError::TypeMismatch(_)));
}

/// Scenario 5: atomic commit + working set.
#[test]
fn atomic_commit_with_working_set() {
    let ds = new_registry();
    let main = ds.get_dataset("refs/heads/main").unwrap();
    let main = ds.commit(&main, value(b"C1"), CommitOpts::default()).unwrap();

    let ws = ds.get_dataset("workingSets/main").unwrap();
    let w0 = datasets::WorkingSet { working_root: value(b"W0"), staged_root: None, merge_state: None, meta: Meta::new() };
    let ws = ds.update_working_set(&ws, w0, Hash::EMPTY).unwrap();
    let w0_addr = ws.head_addr;

    let w1 = datasets::WorkingSet { working_root: value(b"W1"), staged_root: None, merge_state: None, meta: Meta::new() };
    let (main2, ws2) = ds.commit_with_working_set(&main, &ws, value(b"V"), w1.clone(), w0_addr, CommitOpts::default()).unwrap();
    assert_ne!(main2.head_addr, main.head_addr);
    assert_ne!(ws2.head_addr, w0_addr);

    let err = ds.commit_with_working_set(&main2, &ws2, value(b"V2"), w1, w0_addr, CommitOpts::default()).unwrap_err();
    assert!(matches!(err, DatasetsError::OptimisticLockFailed { .. }));
}

/// Scenario 6: invalid id.
#[test]
fn invalid_dataset_id() {
    let ds = new_registry();
    let err = ds.get_dataset("has spaces").unwrap_err();
    assert!(matches!(err, DatasetsError::InvalidDatasetId(_)));
}

/// Boundary: empty root yields an empty dataset list.
#[test]
fn empty_root_yields_empty_dataset_list() {
    let ds = new_registry();
    assert!(ds.datasets().unwrap().is_empty());
}

/// Boundary: two concurrent commits on *independent* datasets from the
/// same starting root both eventually succeed, each via its own CAS
/// retries, with exactly one root transition per successful commit.
#[test]
fn independent_dataset_commits_both_succeed_under_contention() {
    let ds = new_registry();
    let main = ds.get_dataset("refs/heads/main").unwrap();
    ds.commit(&main, value(b"seed"), CommitOpts::default()).unwrap();

    thread::scope(|scope| {
        let ds_a = &ds;
        let ds_b = &ds;
        let a = scope.spawn(move || {
            let h = ds_a.get_dataset("refs/heads/a").unwrap();
            ds_a.commit(&h, value(b"a1"), CommitOpts::default())
        });
        let b = scope.spawn(move || {
            let h = ds_b.get_dataset("refs/heads/b").unwrap();
            ds_b.commit(&h, value(b"b1"), CommitOpts::default())
        });
        let ra: DatasetsResult<Dataset> = a.join().unwrap();
        let rb: DatasetsResult<Dataset> = b.join().unwrap();
        assert!(ra.is_ok());
        assert!(rb.is_ok());
    });

    assert_eq!(ds.get_dataset("refs/heads/a").unwrap().head.unwrap().as_commit().unwrap().value, value(b"a1"));
    assert_eq!(ds.get_dataset("refs/heads/b").unwrap().head.unwrap().as_commit().unwrap().value, value(b"b1"));
}

/// Boundary: two concurrent commits racing on the *same* dataset with the
/// same last-observed head — exactly one wins, the other observes
/// `MergeNeeded` against the head the winner just installed.
#[test]
fn same_dataset_commits_race_to_exactly_one_winner() {
    let ds = new_registry();
    let main = ds.get_dataset("refs/heads/main").unwrap();
    let main = ds.commit(&main, value(b"seed"), CommitOpts::default()).unwrap();

    let (ra, rb) = thread::scope(|scope| {
        let main_a = main.clone();
        let main_b = main.clone();
        let ds_a = &ds;
        let ds_b = &ds;
        let a = scope.spawn(move || ds_a.commit(&main_a, value(b"racer-a"), CommitOpts::default()));
        let b = scope.spawn(move || ds_b.commit(&main_b, value(b"racer-b"), CommitOpts::default()));
        (a.join().unwrap(), b.join().unwrap())
    });

    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1, "exactly one racer must win");
    let (winner, loser_err) = match (ra, rb) {
        (Ok(w), Err(e)) => (w, e),
        (Err(e), Ok(w)) => (w, e),
        other => panic!("expected exactly one winner and one MergeNeeded loser, got {other:?}"),
    };
    // The loser observes the winner's freshly-installed head as the
    // dataset's current value, which no longer matches the last-observed
    // head (`main.head_addr`) it raced from.
    assert!(matches!(loser_err, DatasetsError::MergeNeeded(h) if h == winner.head_addr));
    assert_ne!(winner.head_addr, main.head_addr);
}

/// Boundary: a working-set update with a stale `prev_hash` fails with
/// `OptimisticLockFailed` and is never retried (the mismatch originates
/// inside the edit closure, not from the chunk store's own CAS).
#[test]
fn working_set_update_with_wrong_prev_hash_is_not_retried() {
    let ds = new_registry();
    let ws = ds.get_dataset("workingSets/solo").unwrap();
    let spec = datasets::WorkingSet { working_root: value(b"w"), staged_root: None, merge_state: None, meta: Meta::new() };
    let err = ds.update_working_set(&ws, spec, digest(b"not-the-real-prev")).unwrap_err();
    assert!(matches!(err, DatasetsError::OptimisticLockFailed { .. }));
}
