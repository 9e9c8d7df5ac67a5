//! Dependency-graph job scheduler with lock-free dependency resolution.
//!
//! Callers record jobs and precedence links into a [`JobGraph`], then submit
//! the graph for parallel execution on a [`JobExecutor`]. The scheduler:
//! - Runs a job only after every declared predecessor has completed, with
//!   the predecessors' side effects visible to it.
//! - Runs everything that is not ordered by a link in parallel.
//! - Compiles the recorded topology once and reuses it, so a graph can be
//!   submitted repeatedly, concurrently with itself, and from inside one of
//!   its own jobs.
//! - Resolves dependencies with per-run atomic counters only; no lock is
//!   taken on the completion path.
//!
//! Key modules:
//! - `graph`: the recording API (`JobGraph`, `DetachedJobGraph`), topology
//!   compilation with cycle detection, and the per-run dispatch/completion
//!   protocol.
//! - `job`: job bodies (`JobWork`), descriptors, and the `JobToken` edge
//!   API.
//! - `executor`: the `JobExecutor` boundary, a rayon-backed implementation,
//!   and the lazily started process-wide default.
//! - `event`: `JobGraphEvent`, a reusable completion signal.
//! - `config`: executor settings and their environment override.
//!
//! Quick start:
//! 1. Create a `JobGraph` and record jobs with `add_job`.
//! 2. Order them with `JobToken::precedes` / `JobToken::succeeds`.
//! 3. `submit` with a `JobGraphEvent` and `wait` on it.
//!
//! ```
//! use jobgraph::{event::JobGraphEvent, graph::JobGraph, job::JobDescriptor};
//!
//! let mut graph = JobGraph::new("frame");
//! let simulate = graph.add_job(JobDescriptor::new("simulate", "physics"), || {});
//! let render = graph.add_job(JobDescriptor::new("render", "gfx"), || {});
//! simulate.precedes(&mut graph, [render]);
//!
//! let done = JobGraphEvent::new("frame done");
//! graph.submit(Some(&done));
//! done.wait();
//! ```
//!
//! Misuse such as mutating a graph while it runs, submitting a cyclic graph
//! or reusing an event whose signal was never consumed is a programmer error
//! and panics at the offending call.
//!
//! [`JobGraph`]: graph::JobGraph
//! [`JobExecutor`]: executor::JobExecutor

/// Executor settings.
///
/// `ExecutorConfig` describes the worker pool of a `RayonExecutor`; the
/// default executor reads it from the environment.
pub mod config;
/// Reusable completion signal.
pub mod event;
/// The worker-pool boundary.
///
/// Defines `JobExecutor`, the only capability the scheduler needs from a
/// thread pool, the rayon-backed `RayonExecutor`, `default_executor`, and
/// the process-wide job graph switch.
pub mod executor;
/// Job graph recording, compilation and execution.
///
/// Contains the recording API, the compile step (cycle detection and
/// successor classification) and the per-run dispatch/completion protocol
/// with memory fences that uphold the happens-before relation between a job
/// and its successors.
pub mod graph;
/// Job bodies, descriptors and tokens.
pub mod job;
mod sync;
/// Index, identity and map aliases shared across the crate.
pub mod types;
