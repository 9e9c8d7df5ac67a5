mod compile;
mod run;

/// Error returned by [`JobGraph::validate`] when the recorded links cannot
/// be scheduled.
pub use crate::graph::compile::GraphError;
use crate::{
    event::JobGraphEvent,
    executor::{JobExecutor, default_executor},
    graph::{compile::CompiledTopology, run::CompiledJobGraph},
    job::{Job, JobDescriptor, JobToken, JobWork},
    types::{GraphId, IndexSet, JobIndex, Links},
};
use core::sync::atomic::{AtomicU64, Ordering};
use derive_more::Debug;
use std::{
    borrow::Cow,
    sync::{Arc, OnceLock},
};

/// Recording side of the scheduler.
///
/// Jobs are added with [`add_job`](Self::add_job) and ordered with
/// [`JobToken::precedes`] / [`JobToken::succeeds`]. [`submit`](Self::submit)
/// compiles the recorded topology on first use, caches it, and starts a run
/// without blocking. The same graph may be submitted again at any time,
/// including while earlier runs are still executing and from inside one of
/// its own jobs; every run gets its own counters and shares the compiled
/// topology read-only.
///
/// Recording operations and [`reset`](Self::reset) require that no run of
/// the graph is in flight. Breaking that rule is a programmer error and
/// panics.
#[must_use]
#[derive(Debug)]
pub struct JobGraph {
    name: Arc<str>,
    id: GraphId,
    /// Bumped by `reset` so tokens from before the reset are rejected.
    generation: u32,
    jobs: Vec<Job>,
    links: Links,
    #[debug(skip)]
    compiled: OnceLock<Arc<CompiledTopology>>,
}

/// A graph whose recorded jobs will be owned by the run it is submitted
/// with.
///
/// Obtained from [`JobGraph::detach`]. Submitting consumes it; the run frees
/// the jobs as soon as it completes, so nothing has to be kept alive by the
/// caller.
#[must_use]
#[derive(Debug)]
pub struct DetachedJobGraph {
    name: Arc<str>,
    jobs: Vec<Job>,
    links: Links,
}

fn next_graph_id() -> GraphId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    GraphId::new(NEXT.fetch_add(1, Ordering::Relaxed)).expect("next_graph_id")
}

impl JobGraph {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let name: Cow<'static, str> = name.into();
        Self {
            name: Arc::from(&*name),
            id: next_graph_id(),
            generation: 0,
            jobs: Vec::new(),
            links: Links::default(),
            compiled: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of recorded jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Whether any run submitted from this graph is still executing.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.compiled
            .get()
            .is_some_and(|topology| topology.is_in_flight())
    }

    /// Drop every job and link, returning the graph to an empty recordable
    /// state. Tokens issued before the reset become invalid.
    ///
    /// # Panics
    /// If a run of the graph is in flight.
    pub fn reset(&mut self) {
        self.begin_mutation("reset");
        self.jobs.clear();
        self.links.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Record a job and return the token addressing it.
    ///
    /// # Panics
    /// If a run of the graph is in flight.
    pub fn add_job(&mut self, descriptor: JobDescriptor, work: impl JobWork) -> JobToken {
        self.begin_mutation("add a job to");
        let index = JobIndex::try_from(self.jobs.len()).expect("JobGraph::add_job: [1]");
        self.jobs.push(Job::new(descriptor, work));
        JobToken {
            graph: self.id,
            generation: self.generation,
            index,
        }
    }

    /// Record one job per element of `works`, all sharing `descriptor`.
    /// Tokens are returned in iteration order.
    ///
    /// # Panics
    /// If a run of the graph is in flight.
    pub fn add_jobs<W: JobWork>(
        &mut self,
        descriptor: &JobDescriptor,
        works: impl IntoIterator<Item = W>,
    ) -> Vec<JobToken> {
        works
            .into_iter()
            .map(|work| self.add_job(descriptor.clone(), work))
            .collect()
    }

    /// Check that every recorded job can eventually run.
    ///
    /// `submit` performs the same check and panics on failure; this is the
    /// non-fatal variant. A successful check is cached and reused by the
    /// next `submit`.
    ///
    /// # Errors
    /// If the links contain a cycle.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.compiled.get().is_none() {
            let topology = self.compile()?;
            // Losing the race against a concurrent `submit` is fine: both
            // compiled the same recording.
            let _ = self.compiled.set(Arc::new(topology));
        }
        Ok(())
    }

    /// Hand the recorded jobs over to the next run.
    ///
    /// The returned graph can only be submitted once; the run it starts
    /// becomes the sole owner of the jobs and releases them when it
    /// completes.
    ///
    /// # Panics
    /// If a run of the graph is in flight.
    pub fn detach(mut self) -> DetachedJobGraph {
        self.begin_mutation("detach");
        DetachedJobGraph {
            name: Arc::clone(&self.name),
            jobs: std::mem::take(&mut self.jobs),
            links: std::mem::take(&mut self.links),
        }
    }

    /// Start a run on the process-wide default executor.
    ///
    /// Returns as soon as the jobs without predecessors have been enqueued.
    /// `event`, if given, is signaled when the last job completes.
    ///
    /// # Panics
    /// If the links contain a cycle, or if `event` holds an unconsumed
    /// signal. An event may be attached to several unfinished runs at once;
    /// it is signaled when the last of them completes.
    pub fn submit(&self, event: Option<&JobGraphEvent>) {
        self.submit_on(default_executor(), event);
    }

    /// Same as [`submit`](Self::submit), dispatching onto `executor`.
    ///
    /// # Panics
    /// Same conditions as [`submit`](Self::submit).
    pub fn submit_on(&self, executor: Arc<dyn JobExecutor>, event: Option<&JobGraphEvent>) {
        let topology = self.compiled.get_or_init(|| {
            Arc::new(
                self.compile()
                    .unwrap_or_else(|err| panic!("cannot submit job graph: {err}")),
            )
        });
        CompiledJobGraph::launch(Arc::clone(topology), executor, event, false);
    }

    /// Record `from → to`.
    pub(crate) fn link(&mut self, from: JobToken, to: JobToken) {
        self.check_token(from);
        self.check_token(to);
        assert_ne!(
            from.index, to.index,
            "job {} of graph `{}` cannot precede itself",
            from.index, self.name
        );
        self.begin_mutation("link jobs of");
        self.links
            .entry(from.index)
            .or_insert_with(IndexSet::default)
            .insert(to.index);
    }

    fn check_token(&self, token: JobToken) {
        assert_eq!(
            token.graph, self.id,
            "token for job {} was issued by another graph than `{}`",
            token.index, self.name
        );
        assert_eq!(
            token.generation, self.generation,
            "token for job {} of graph `{}` was issued before the graph was reset",
            token.index, self.name
        );
    }

    /// Assert no run is in flight and drop the cached compilation, which
    /// no longer matches the recording once it changes.
    fn begin_mutation(&mut self, action: &str) {
        if let Some(topology) = self.compiled.take() {
            assert!(
                !topology.is_in_flight(),
                "cannot {action} job graph `{}` while a run of it is in flight",
                self.name
            );
        }
    }

    fn compile(&self) -> Result<CompiledTopology, GraphError> {
        CompiledTopology::compile(Arc::clone(&self.name), self.jobs.clone(), &self.links)
    }
}

impl DetachedJobGraph {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the run on the process-wide default executor, transferring the
    /// jobs to it.
    ///
    /// # Panics
    /// Same conditions as [`JobGraph::submit`].
    pub fn submit(self, event: Option<&JobGraphEvent>) {
        self.submit_on(default_executor(), event);
    }

    /// Same as [`submit`](Self::submit), dispatching onto `executor`.
    ///
    /// # Panics
    /// Same conditions as [`JobGraph::submit`].
    pub fn submit_on(self, executor: Arc<dyn JobExecutor>, event: Option<&JobGraphEvent>) {
        let Self { name, jobs, links } = self;
        let topology = CompiledTopology::compile(name, jobs, &links)
            .unwrap_or_else(|err| panic!("cannot submit job graph: {err}"));
        CompiledJobGraph::launch(Arc::new(topology), executor, event, true);
    }
}
