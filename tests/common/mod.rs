#![allow(dead_code)]

use jobgraph::{
    config::ExecutorConfig,
    executor::{Dispatch, JobExecutor, RayonExecutor},
    job::JobDescriptor,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, Once},
};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs are captured per test and only shown for failing tests. Enable
/// levels with e.g. `RUST_LOG=jobgraph=trace cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

pub fn desc(name: &'static str) -> JobDescriptor {
    JobDescriptor::new(name, "test")
}

/// Small dedicated pool so tests don't depend on the machine's core count.
pub fn pool(num_threads: usize) -> Arc<RayonExecutor> {
    let config = ExecutorConfig::default()
        .with_num_threads(num_threads)
        .with_thread_name_prefix("jobgraph-test");
    Arc::new(RayonExecutor::new(&config).expect("test pool"))
}

/// Executor that only queues dispatches; the test decides when they run.
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<VecDeque<Dispatch>>,
}

impl ManualExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of dispatches waiting to run.
    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Run the oldest queued dispatch. Returns `false` if there was none.
    pub fn run_next(&self) -> bool {
        // The lock must not be held while running: the dispatch enqueues.
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(dispatch) => {
                dispatch();
                true
            }
            None => false,
        }
    }

    /// Run the most recently queued dispatch first.
    pub fn run_newest(&self) -> bool {
        let next = self.queue.lock().unwrap().pop_back();
        match next {
            Some(dispatch) => {
                dispatch();
                true
            }
            None => false,
        }
    }

    /// Run queued dispatches until the queue stays empty.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl JobExecutor for ManualExecutor {
    fn enqueue(&self, dispatch: Dispatch) {
        self.queue.lock().unwrap().push_back(dispatch);
    }
}

/// Shared ordered log that job bodies append to.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<&'static str>>>);

impl Log {
    pub fn push(&self, entry: &'static str) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    /// Job body appending `entry`.
    pub fn writer(&self, entry: &'static str) -> impl Fn() + Send + Sync + 'static {
        let log = self.clone();
        move || log.push(entry)
    }
}
