use crate::sync::{Condvar, Mutex, unpoison};
use derive_more::Debug;
use std::{borrow::Cow, sync::Arc};

#[derive(Debug, Default)]
struct EventState {
    /// Runs submitted with the event that have not completed yet.
    attached: usize,
    /// Every attached run completed; not consumed by `wait` yet.
    signaled: bool,
}

#[derive(Debug)]
struct EventInner {
    name: Cow<'static, str>,
    state: Mutex<EventState>,
    #[debug(skip)]
    signaled: Condvar,
}

/// Reusable completion signal for a job graph run.
///
/// The event behaves like a binary semaphore: it is signaled once every run
/// submitted with it has completed, and [`wait`](Self::wait) (or a
/// successful [`try_wait`](Self::try_wait)) consumes that signal. Clones
/// share the same state, so a clone can be handed to another thread to wait
/// on.
///
/// Several runs may be attached at once, e.g. a job that submits a nested
/// graph with the event its own run was submitted with; a single `wait` then
/// covers all of them. An event can be reused for any number of submissions
/// as long as every signal is consumed before the event is submitted again.
#[derive(Debug, Clone)]
pub struct JobGraphEvent {
    inner: Arc<EventInner>,
}

impl JobGraphEvent {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: Arc::new(EventInner {
                name: name.into(),
                state: Mutex::new(EventState::default()),
                signaled: Condvar::new(),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Block until every run this event was submitted with completes, then
    /// consume the signal.
    ///
    /// Returns immediately if the signal is already pending.
    pub fn wait(&self) {
        let EventInner {
            state, signaled, ..
        } = &*self.inner;
        let mut state = unpoison(state.lock());
        while !state.signaled {
            state = unpoison(signaled.wait(state));
        }
        state.signaled = false;
    }

    /// Non-blocking variant of [`wait`](Self::wait): consume the signal if
    /// it is pending.
    ///
    /// Returns whether a signal was consumed. Polling this in a loop is the
    /// way to build a bounded wait; after it returns `true` the event is
    /// ready for the next submission.
    #[must_use]
    pub fn try_wait(&self) -> bool {
        let mut state = unpoison(self.inner.state.lock());
        std::mem::take(&mut state.signaled)
    }

    /// Non-blocking peek: whether every attached run completed and the
    /// signal has not been consumed yet. Does not consume the signal.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        unpoison(self.inner.state.lock()).signaled
    }

    /// Attach the event to a run that is about to be dispatched.
    ///
    /// # Panics
    /// If the event holds a signal that nobody consumed; the new run's
    /// signal would be lost in it.
    pub(crate) fn arm(&self) {
        let mut state = unpoison(self.inner.state.lock());
        assert!(
            !state.signaled,
            "job graph event `{}` submitted again before its previous signal was consumed",
            self.inner.name
        );
        state.attached += 1;
    }

    /// Detach a completed run. The last attached run signals the event.
    pub(crate) fn signal(&self) {
        let EventInner {
            name,
            state,
            signaled,
        } = &*self.inner;
        {
            let mut state = unpoison(state.lock());
            assert_ne!(
                state.attached, 0,
                "job graph event `{name}` signaled without being armed"
            );
            state.attached -= 1;
            if state.attached != 0 {
                return;
            }
            state.signaled = true;
        }
        signaled.notify_all();
    }
}
