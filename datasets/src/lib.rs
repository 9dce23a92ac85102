//! A versioned, content-addressed dataset registry.
//!
//! This crate is the hard engineering center of a larger version-controlled
//! database: a transactional root-update loop over a [`chunk_store::ChunkStore`]
//! (an external, content-addressed blob store the crate only consumes), a
//! [`dataset_map::DatasetMap`] abstraction over two on-disk encodings, a
//! git-like commit/tag/working-set object model ([`object`], [`commit_graph`]),
//! and the [`dataset::Datasets`] façade that layered products (a SQL engine, a
//! CLI, replication) build on for correctness.
//!
//! Object serialization for the application-level commit/tag payload, the
//! chunk store itself, and GC's traversal are out of scope. This crate
//! specifies only the contracts it needs from them
//! ([`chunk_store::ChunkStore`]) and the entry point it exposes to them
//! ([`dataset::Datasets::gc`]).

pub mod chunk_store;
pub mod commit_graph;
pub mod config;
pub mod dataset;
pub mod dataset_map;
pub mod errors;
pub mod gc;
pub mod hash;
pub mod object;
mod objstore;
pub mod root_update;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

pub use chunk_store::{CancellationToken, Chunk, ChunkStore, ChunkStoreError, Format, NeverCanceled};
pub use config::{Config, RetryPolicy};
pub use dataset::{validate_dataset_id, Dataset, Datasets, TagOpts};
pub use dataset_map::DatasetMap;
pub use errors::{DatasetsError, DatasetsResult};
pub use hash::{digest, Hash, HASH_SIZE};
pub use object::{
    is_commit, is_tag, is_working_set, validate_tag, Commit, CommitRef, ClosureRef, Head, HeadKind, Meta, ParentsClosureMap, Ref, Tag,
    ValueRef, WorkingSet,
};
