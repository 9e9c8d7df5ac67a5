use crate::{
    job::Job,
    sync::{AtomicUsize, Ordering},
    types::{JobIndex, Links},
};
use std::{collections::VecDeque, sync::Arc};
use thiserror::Error;

/// Error produced when a recorded graph cannot be compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// The links contain at least one cycle. `jobs` names every job that can
    /// never become ready: the jobs on a cycle and everything downstream of
    /// one.
    #[error("job graph `{graph}` contains a dependency cycle through: {}", .jobs.join(", "))]
    Cycle { graph: String, jobs: Vec<String> },
}

/// Immutable, execution-ready form of a recorded graph.
///
/// Shared by `Arc` between the recording `JobGraph` and every run submitted
/// from it, so any number of runs can read it concurrently.
#[derive(Debug)]
pub(crate) struct CompiledTopology {
    name: Arc<str>,
    jobs: Box<[JobLayout]>,
    /// Jobs without predecessors, in recording order.
    roots: Box<[JobIndex]>,
    /// Predecessor count of every job with more than one predecessor,
    /// indexed by [`SharedSuccessor::slot`]. A run allocates one counter per
    /// entry; all other jobs need none.
    shared_counts: Box<[u32]>,
    /// Runs of this topology that have not completed yet.
    runs_in_flight: AtomicUsize,
}

#[derive(Debug)]
pub(crate) struct JobLayout {
    pub(crate) job: Job,
    /// Successors whose only predecessor is this job. They are ready as soon
    /// as this job completes, without touching any shared counter.
    pub(crate) owned_successors: Box<[JobIndex]>,
    /// Successors with more than one predecessor. Each is ready once the last
    /// of its predecessors has decremented its counter.
    pub(crate) shared_successors: Box<[SharedSuccessor]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SharedSuccessor {
    pub(crate) job: JobIndex,
    /// Position of the job's counter in a run's counter array.
    pub(crate) slot: u32,
}

impl CompiledTopology {
    /// Build the topology, checking that every job can eventually become
    /// ready.
    ///
    /// # Errors
    /// If the links contain a cycle.
    ///
    /// # Panics
    /// If a link refers to a job that does not exist. Impossible unless the
    /// recording API is bypassed.
    pub(crate) fn compile(
        name: Arc<str>,
        jobs: Vec<Job>,
        links: &Links,
    ) -> Result<Self, GraphError> {
        let mut indegree = vec![0_u32; jobs.len()];
        for successors in links.values() {
            for &successor in successors {
                let slot = &mut indegree[successor as usize];
                *slot = slot.checked_add(1).expect("CompiledTopology::compile: [1]");
            }
        }

        // Kahn's algorithm. Only used to prove the graph drains completely;
        // execution order is decided at runtime by the counters.
        let roots: Box<[JobIndex]> = indegree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(idx, _)| JobIndex::try_from(idx).expect("CompiledTopology::compile: [2]"))
            .collect();
        let mut remaining = indegree.clone();
        let mut queue: VecDeque<JobIndex> = roots.iter().copied().collect();
        let mut drained = 0_usize;
        while let Some(job) = queue.pop_front() {
            drained += 1;
            let Some(successors) = links.get(&job) else {
                continue;
            };
            for &successor in successors {
                let left = &mut remaining[successor as usize];
                *left -= 1;
                if *left == 0 {
                    queue.push_back(successor);
                }
            }
        }
        if drained != jobs.len() {
            let jobs = remaining
                .iter()
                .zip(&jobs)
                .filter(|&(&left, _)| left != 0)
                .map(|(_, job)| job.descriptor().name.to_string())
                .collect();
            return Err(GraphError::Cycle {
                graph: name.to_string(),
                jobs,
            });
        }

        let mut slots = vec![u32::MAX; jobs.len()];
        let mut shared_counts: Vec<u32> = vec![];
        for (idx, &degree) in indegree.iter().enumerate() {
            if degree > 1 {
                slots[idx] = u32::try_from(shared_counts.len())
                    .expect("CompiledTopology::compile: [3]");
                shared_counts.push(degree);
            }
        }

        let jobs: Box<[JobLayout]> = jobs
            .into_iter()
            .enumerate()
            .map(|(idx, job)| {
                let idx = JobIndex::try_from(idx).expect("CompiledTopology::compile: [4]");
                let mut owned_successors = vec![];
                let mut shared_successors = vec![];
                for &successor in links.get(&idx).into_iter().flatten() {
                    if indegree[successor as usize] == 1 {
                        owned_successors.push(successor);
                    } else {
                        assert!(
                            indegree[successor as usize] > 1,
                            "CompiledTopology::compile: [5]"
                        );
                        shared_successors.push(SharedSuccessor {
                            job: successor,
                            slot: slots[successor as usize],
                        });
                    }
                }
                // Sort successors' indexes to achieve better cache locality.
                owned_successors.sort_unstable();
                shared_successors.sort_unstable_by_key(|successor| successor.job);
                JobLayout {
                    job,
                    owned_successors: owned_successors.into_boxed_slice(),
                    shared_successors: shared_successors.into_boxed_slice(),
                }
            })
            .collect();

        tracing::debug!(
            graph = %name,
            jobs = jobs.len(),
            links = indegree.iter().map(|&d| d as usize).sum::<usize>(),
            roots = roots.len(),
            shared = shared_counts.len(),
            "compiled job graph"
        );
        Ok(Self {
            name,
            jobs,
            roots,
            shared_counts: shared_counts.into_boxed_slice(),
            runs_in_flight: AtomicUsize::new(0),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn jobs(&self) -> &[JobLayout] {
        &self.jobs
    }

    pub(crate) fn roots(&self) -> &[JobIndex] {
        &self.roots
    }

    pub(crate) fn shared_counts(&self) -> &[u32] {
        &self.shared_counts
    }

    /// Whether a run of this topology is still executing.
    ///
    /// Acquire pairs with the Release in [`Self::end_run`], so once this
    /// returns `false` every job of every finished run has completed.
    pub(crate) fn is_in_flight(&self) -> bool {
        self.runs_in_flight.load(Ordering::Acquire) != 0
    }

    pub(crate) fn begin_run(&self) {
        self.runs_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn end_run(&self) {
        let previous = self.runs_in_flight.fetch_sub(1, Ordering::Release);
        assert_ne!(previous, 0, "CompiledTopology::end_run");
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::{job::JobDescriptor, types::IndexSet};

    fn jobs(names: &[&'static str]) -> Vec<Job> {
        names
            .iter()
            .map(|&name| Job::new(JobDescriptor::new(name, "test"), || {}))
            .collect()
    }

    fn links(edges: &[(JobIndex, JobIndex)]) -> Links {
        let mut links = Links::default();
        for &(from, to) in edges {
            links.entry(from).or_insert_with(IndexSet::default).insert(to);
        }
        links
    }

    #[test]
    fn successors_are_split_by_predecessor_count() {
        //   A     B
        //    \   / \
        //      C    E
        //      |
        //      D
        let topology = CompiledTopology::compile(
            Arc::from("split"),
            jobs(&["A", "B", "C", "D", "E"]),
            &links(&[(0, 2), (1, 2), (2, 3), (1, 4)]),
        )
        .expect("acyclic");

        assert_eq!(topology.roots(), &[0, 1]);
        let layouts = topology.jobs();
        let join = SharedSuccessor { job: 2, slot: 0 };
        assert_eq!(&*layouts[0].owned_successors, &[] as &[JobIndex]);
        assert_eq!(&*layouts[0].shared_successors, &[join]);
        assert_eq!(&*layouts[1].owned_successors, &[4]);
        assert_eq!(&*layouts[1].shared_successors, &[join]);
        assert_eq!(&*layouts[2].owned_successors, &[3]);
        assert_eq!(topology.shared_counts(), &[2]);
        assert!(!topology.is_in_flight());
    }

    #[test]
    fn only_joins_get_a_counter_slot() {
        // A -> B -> D, A -> C -> D, C -> E, B -> E, E -> F
        let topology = CompiledTopology::compile(
            Arc::from("slots"),
            jobs(&["A", "B", "C", "D", "E", "F"]),
            &links(&[(0, 1), (0, 2), (1, 3), (2, 3), (2, 4), (1, 4), (4, 5)]),
        )
        .expect("acyclic");

        assert_eq!(topology.shared_counts(), &[2, 2]);
        let layouts = topology.jobs();
        assert_eq!(
            &*layouts[1].shared_successors,
            &[
                SharedSuccessor { job: 3, slot: 0 },
                SharedSuccessor { job: 4, slot: 1 },
            ]
        );
        assert_eq!(&*layouts[4].owned_successors, &[5]);
        assert!(layouts[4].shared_successors.is_empty());
    }

    #[test]
    fn cycle_reports_every_job_that_cannot_start() {
        // A -> B -> C -> B, C -> D
        let err = CompiledTopology::compile(
            Arc::from("cyclic"),
            jobs(&["A", "B", "C", "D"]),
            &links(&[(0, 1), (1, 2), (2, 1), (2, 3)]),
        )
        .unwrap_err();

        assert_eq!(
            err,
            GraphError::Cycle {
                graph: "cyclic".to_owned(),
                jobs: vec!["B".to_owned(), "C".to_owned(), "D".to_owned()],
            }
        );
        assert_eq!(
            err.to_string(),
            "job graph `cyclic` contains a dependency cycle through: B, C, D"
        );
    }

    #[test]
    fn empty_graph_compiles_without_roots() {
        let topology = CompiledTopology::compile(Arc::from("empty"), vec![], &Links::default())
            .expect("empty");
        assert!(topology.jobs().is_empty());
        assert!(topology.roots().is_empty());
    }
}
