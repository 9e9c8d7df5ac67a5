use core::num::NonZeroU64;
use indexmap::{IndexMap as _IndexMap, IndexSet as _IndexSet};
use rustc_hash::FxBuildHasher;

/// Position of a job inside its graph, in `add_job` order.
///
/// Indices are dense and stable until the graph is reset.
pub type JobIndex = u32;

/// Process-unique identity of a `JobGraph`, used to reject tokens that were
/// issued by a different graph.
pub type GraphId = NonZeroU64;

/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
/// `IndexSet` type with fast hasher.
pub type IndexSet<T> = _IndexSet<T, FxBuildHasher>;

/// Producer index → set of consumer indices.
///
/// The set deduplicates repeated edge declarations, so a job's indegree is
/// the number of distinct producers pointing at it.
pub(crate) type Links = IndexMap<JobIndex, IndexSet<JobIndex>>;
