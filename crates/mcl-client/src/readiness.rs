//! Startup readiness barrier.
//!
//! The stream consumer marks each configuration index as it arrives. The
//! first time every index has been seen the barrier opens, exactly once.
//! If the consumer dies first, the barrier fails instead so `connect` does
//! not wait forever.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{ClientError, Result};

/// Which configuration indices have arrived at least once.
#[derive(Debug)]
pub(crate) struct Coverage {
    seen: Vec<bool>,
    missing: usize,
}

impl Coverage {
    pub(crate) fn new(count: u16) -> Self {
        Self {
            seen: vec![false; usize::from(count)],
            missing: usize::from(count),
        }
    }

    /// Record `index`. Returns true only on the call that completes coverage.
    pub(crate) fn mark(&mut self, index: u16) -> bool {
        match self.seen.get_mut(usize::from(index)) {
            Some(seen) if !*seen => {
                *seen = true;
                self.missing -= 1;
                self.missing == 0
            }
            _ => false,
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.missing == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Pending,
    Ready,
    Failed(String),
}

#[derive(Debug)]
pub(crate) struct Readiness {
    state: Mutex<State>,
    changed: Condvar,
}

impl Readiness {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending),
            changed: Condvar::new(),
        }
    }

    /// Open the barrier. Returns false if it was already settled.
    pub(crate) fn open(&self) -> bool {
        self.settle(State::Ready)
    }

    /// Release waiters with an error. Ignored once the barrier has opened.
    pub(crate) fn fail(&self, reason: impl Into<String>) -> bool {
        self.settle(State::Failed(reason.into()))
    }

    fn settle(&self, next: State) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != State::Pending {
            return false;
        }
        *state = next;
        self.changed.notify_all();
        true
    }

    /// Block until the barrier settles or `timeout` elapses.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match &*state {
                State::Ready => return Ok(()),
                State::Failed(reason) => return Err(ClientError::Disconnected(reason.clone())),
                State::Pending => {}
            }

            state = match deadline {
                None => self
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ClientError::Timeout(timeout.unwrap_or_default()));
                    }
                    self.changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn coverage_completes_once_despite_duplicates() {
        let mut coverage = Coverage::new(3);
        assert!(!coverage.mark(0));
        assert!(!coverage.mark(0));
        assert!(!coverage.mark(2));
        assert!(!coverage.mark(99));
        assert!(!coverage.is_complete());
        assert!(coverage.mark(1));
        assert!(coverage.is_complete());
        assert!(!coverage.mark(1));
        assert!(!coverage.mark(0));
    }

    #[test]
    fn empty_coverage_is_complete() {
        assert!(Coverage::new(0).is_complete());
    }

    #[test]
    fn opens_exactly_once() {
        let readiness = Readiness::new();
        assert!(readiness.open());
        assert!(!readiness.open());
        assert!(!readiness.fail("late"));
        readiness.wait(Some(Duration::from_millis(1))).unwrap();
    }

    #[test]
    fn waiter_released_by_other_thread() {
        let readiness = Arc::new(Readiness::new());
        let opener = Arc::clone(&readiness);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            opener.open()
        });
        readiness.wait(None).unwrap();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn failure_releases_waiter_with_disconnect() {
        let readiness = Readiness::new();
        readiness.fail("read channel closed");
        let err = readiness.wait(None).unwrap_err();
        assert!(matches!(err, ClientError::Disconnected(reason) if reason == "read channel closed"));
    }

    #[test]
    fn timeout_when_nothing_arrives() {
        let readiness = Readiness::new();
        let err = readiness.wait(Some(Duration::from_millis(20))).unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
    }
}
