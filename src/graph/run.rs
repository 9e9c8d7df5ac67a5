use crate::{
    event::JobGraphEvent,
    executor::JobExecutor,
    graph::compile::CompiledTopology,
    sync::{AtomicU32, AtomicUsize, Ordering, fence},
    types::JobIndex,
};
use derive_more::Debug;
use std::sync::Arc;

/// Per-submission execution state of a compiled topology.
///
/// Every dispatched job holds an `Arc` to it. The thread that completes the
/// last job finalizes the run; the state itself is freed when the last of
/// those `Arc`s is dropped. A detached run holds the only remaining reference
/// to its topology, so the job storage goes with it.
#[derive(Debug)]
pub(crate) struct CompiledJobGraph {
    topology: Arc<CompiledTopology>,
    #[debug(skip)]
    executor: Arc<dyn JobExecutor>,
    /// Remaining predecessor counts of the jobs with several predecessors,
    /// indexed by their counter slot.
    pending: Box<[PendingSlot]>,
    /// Jobs of this run that have not completed yet.
    outstanding: AtomicUsize,
    event: Option<JobGraphEvent>,
    detached: bool,
}

#[must_use]
#[derive(Debug)]
#[repr(align(128))]
struct PendingSlot {
    /// Number of predecessors that haven't finished yet.
    predecessors_left: AtomicU32,
}

impl CompiledJobGraph {
    /// Start a run of `topology` on `executor`.
    ///
    /// All run-state is initialized on the calling thread before the first
    /// job is enqueued. An empty topology completes before this returns.
    pub(crate) fn launch(
        topology: Arc<CompiledTopology>,
        executor: Arc<dyn JobExecutor>,
        event: Option<&JobGraphEvent>,
        detached: bool,
    ) {
        if let Some(event) = event {
            event.arm();
        }
        topology.begin_run();
        let pending = topology
            .shared_counts()
            .iter()
            .map(|&predecessors| PendingSlot {
                predecessors_left: AtomicU32::new(predecessors),
            })
            .collect();
        let run = Arc::new(Self {
            outstanding: AtomicUsize::new(topology.jobs().len()),
            topology,
            executor,
            pending,
            event: event.cloned(),
            detached,
        });
        tracing::debug!(
            graph = run.topology.name(),
            jobs = run.topology.jobs().len(),
            roots = run.topology.roots().len(),
            detached,
            "submitting job graph"
        );
        if run.topology.jobs().is_empty() {
            run.finish();
            return;
        }
        for &root in run.topology.roots() {
            run.dispatch(root);
        }
    }

    fn dispatch(self: &Arc<Self>, index: JobIndex) {
        let run = Arc::clone(self);
        self.executor.enqueue(Box::new(move || run.execute(index)));
    }

    /// Run `index`, then every successor this thread makes ready that is
    /// not handed back to the executor.
    ///
    /// Per completed job:
    /// - Owned successors are ready immediately.
    /// - For shared successors a Release fence publishes the job's effects,
    ///   then each counter is decremented (Relaxed). The thread observing a
    ///   counter reach zero issues an Acquire fence before dispatching, so
    ///   the successor sees the effects of all its predecessors.
    /// - One ready successor is kept to run on this thread; the others are
    ///   enqueued.
    /// - Finally the run's outstanding counter is decremented; whoever takes
    ///   it to zero finalizes the run.
    fn execute(self: Arc<Self>, index: JobIndex) {
        let mut current = Some(index);
        while let Some(index) = current.take() {
            let layout = &self.topology.jobs()[index as usize];
            layout.job.run(self.topology.name());

            let mut ready = |successor: JobIndex| {
                tracing::trace!(
                    graph = self.topology.name(),
                    job = successor,
                    "job ready"
                );
                if let Some(previous) = current.replace(successor) {
                    self.dispatch(previous);
                }
            };
            for &successor in layout.owned_successors.iter() {
                ready(successor);
            }
            if !layout.shared_successors.is_empty() {
                fence(Ordering::Release);
            }
            for &successor in layout.shared_successors.iter() {
                let slot = &self.pending[successor.slot as usize];
                if slot.predecessors_left.fetch_sub(1, Ordering::Relaxed) == 1 {
                    fence(Ordering::Acquire);
                    ready(successor.job);
                }
            }

            if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
                assert!(current.is_none(), "CompiledJobGraph::execute");
                self.finish();
            }
        }
    }

    /// Finalize the run. Called exactly once, by the thread that completed
    /// the last job.
    fn finish(&self) {
        tracing::debug!(
            graph = self.topology.name(),
            detached = self.detached,
            "job graph run completed"
        );
        // Must precede the signal: a woken waiter may mutate the graph at once.
        self.topology.end_run();
        if let Some(event) = &self.event {
            event.signal();
        }
    }
}
