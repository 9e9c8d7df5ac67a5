use crate::{
    graph::JobGraph,
    types::{GraphId, JobIndex},
};
use derive_more::{Debug, Display};
use std::{borrow::Cow, sync::Arc};

/// Body of a job.
///
/// A job may run once per submission of its graph, and several submissions
/// may be in flight at the same time, so the body is invoked through a
/// shared reference. Any `Fn() + Send + Sync + 'static` closure is a
/// `JobWork`.
pub trait JobWork: Send + Sync + 'static {
    /// Execute the body.
    fn run(&self);
}

impl<F> JobWork for F
where
    F: Fn() + Send + Sync + 'static,
{
    #[inline]
    fn run(&self) {
        self()
    }
}

/// Diagnostic metadata attached to a job.
///
/// The scheduler never interprets it; it only surfaces in tracing spans and
/// assertion messages.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
#[display("{name} ({category})")]
pub struct JobDescriptor {
    /// Human-readable job name.
    pub name: Cow<'static, str>,
    /// Free-form grouping such as a subsystem name.
    pub category: Cow<'static, str>,
}

impl JobDescriptor {
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        category: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }
}

/// A recorded unit of work: a descriptor plus a type-erased body.
#[derive(Debug, Clone)]
pub struct Job {
    descriptor: JobDescriptor,
    #[debug(skip)]
    work: Arc<dyn JobWork>,
}

impl Job {
    pub(crate) fn new(descriptor: JobDescriptor, work: impl JobWork) -> Self {
        Self {
            descriptor,
            work: Arc::new(work),
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    /// Run the body inside a `job` tracing span.
    pub(crate) fn run(&self, graph: &str) {
        let Self { descriptor, work } = self;
        tracing::trace_span!(
            "job",
            graph,
            name = %descriptor.name,
            category = %descriptor.category,
        )
        .in_scope(|| work.run());
    }
}

/// Handle to a job recorded in a [`JobGraph`].
///
/// Tokens only serve to declare precedence edges while the graph is being
/// recorded. A token is rejected by any other graph and by its own graph
/// once that graph has been reset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct JobToken {
    pub(crate) graph: GraphId,
    pub(crate) generation: u32,
    pub(crate) index: JobIndex,
}

impl JobToken {
    /// Position of the job in its graph.
    #[must_use]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Declare that this job must complete before each of `successors`
    /// starts.
    ///
    /// Declaring an edge that already exists has no effect.
    ///
    /// # Panics
    /// If any token belongs to another graph or predates its last reset, if
    /// a token is linked to itself, or if `graph` has a run in flight.
    pub fn precedes(
        self,
        graph: &mut JobGraph,
        successors: impl IntoIterator<Item = JobToken>,
    ) -> Self {
        for successor in successors {
            graph.link(self, successor);
        }
        self
    }

    /// Declare that each of `predecessors` must complete before this job
    /// starts.
    ///
    /// # Panics
    /// Same conditions as [`JobToken::precedes`].
    pub fn succeeds(
        self,
        graph: &mut JobGraph,
        predecessors: impl IntoIterator<Item = JobToken>,
    ) -> Self {
        for predecessor in predecessors {
            graph.link(predecessor, self);
        }
        self
    }
}
