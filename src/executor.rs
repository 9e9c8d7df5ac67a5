use crate::config::ExecutorConfig;
use derive_more::Debug;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Ready-to-run unit handed to an executor.
///
/// It runs one job and then performs that job's completion bookkeeping, which
/// may enqueue further dispatches on the same executor.
pub type Dispatch = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool that job graph runs are dispatched onto.
///
/// Implementations must run every enqueued dispatch exactly once, on any
/// thread, at some point after `enqueue` is called. `enqueue` is called
/// concurrently from the submitting thread and from worker threads, and may
/// be called from inside a running dispatch.
pub trait JobExecutor: Send + Sync {
    fn enqueue(&self, dispatch: Dispatch);
}

/// Error returned when an executor cannot be constructed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// The worker threads could not be spawned.
    #[error("failed to build job executor thread pool")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// [`JobExecutor`] backed by a dedicated rayon thread pool.
///
/// A panicking job aborts the process, which is rayon's policy for
/// `spawn`ed work.
#[derive(Debug)]
pub struct RayonExecutor {
    #[debug(skip)]
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    /// Spawn the worker threads described by `config`.
    ///
    /// # Errors
    /// If the operating system refuses to spawn a worker thread.
    pub fn new(config: &ExecutorConfig) -> Result<Self, ExecutorError> {
        let prefix = config.thread_name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(move |index| format!("{prefix}-{index}"))
            .build()?;
        tracing::debug!(
            num_threads = pool.current_num_threads(),
            prefix = %config.thread_name_prefix,
            "job executor started"
        );
        Ok(Self { pool })
    }

    /// Number of worker threads in the pool.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl JobExecutor for RayonExecutor {
    #[inline]
    fn enqueue(&self, dispatch: Dispatch) {
        self.pool.spawn(dispatch);
    }
}

static DEFAULT_EXECUTOR: OnceLock<Arc<RayonExecutor>> = OnceLock::new();
static JOB_GRAPH_ACTIVE: OnceLock<AtomicBool> = OnceLock::new();

/// Configuration of the process-wide state; a malformed environment override
/// is logged and ignored.
fn config_from_env() -> ExecutorConfig {
    ExecutorConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(%err, "ignoring job executor configuration from environment");
        ExecutorConfig::default()
    })
}

fn job_graph_switch() -> &'static AtomicBool {
    JOB_GRAPH_ACTIVE.get_or_init(|| AtomicBool::new(config_from_env().job_graph_active))
}

/// Process-wide switch telling callers whether to route work through job
/// graphs.
///
/// The scheduler itself never consults it: a graph submitted while the switch
/// is off still runs. Callers that keep a non-graph fallback path check it
/// before recording. Seeded on first use from [`ExecutorConfig::from_env`].
#[must_use]
pub fn is_job_graph_active() -> bool {
    job_graph_switch().load(Ordering::Relaxed)
}

/// Flip the process-wide job graph switch.
pub fn set_job_graph_active(active: bool) {
    let previous = job_graph_switch().swap(active, Ordering::Relaxed);
    if previous != active {
        tracing::debug!(active, "job graph switch changed");
    }
}

/// Process-wide executor used by `submit` when no executor is given.
///
/// Built on first use from [`ExecutorConfig::from_env`]; a malformed
/// environment override is logged and ignored. The pool lives until the
/// process exits.
///
/// # Panics
/// If the worker threads cannot be spawned.
pub fn default_executor() -> Arc<dyn JobExecutor> {
    let executor = DEFAULT_EXECUTOR.get_or_init(|| {
        let executor = RayonExecutor::new(&config_from_env())
            .unwrap_or_else(|err| panic!("failed to start the default job executor: {err}"));
        Arc::new(executor)
    });
    Arc::clone(executor) as Arc<dyn JobExecutor>
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_graph_switch_can_be_flipped() {
        set_job_graph_active(false);
        assert!(!is_job_graph_active());
        set_job_graph_active(true);
        assert!(is_job_graph_active());
    }
}
