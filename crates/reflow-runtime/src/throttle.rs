#![forbid(unsafe_code)]

//! Timer-based coalescing throttle.
//!
//! Bounds how often an action runs in response to bursts of invocations:
//! the first invocation schedules the action one delay window out, and
//! every further invocation inside that window coalesces into the already
//! scheduled run. The trailing run is guaranteed; no invocation is dropped
//! forever.
//!
//! The primitive is scheduler-agnostic: it defers through
//! [`Host::schedule`] rather than any particular event-loop API, so it
//! works under any cooperative single-threaded driver, including the
//! manual clock in `reflow-harness`.
//!
//! # Invariants
//!
//! 1. The action runs at most once per delay window.
//! 2. An invocation with no run pending always produces a run after one
//!    delay.
//! 3. Invoking from within the action schedules a fresh run (this is how
//!    the refresh loop re-invokes itself).
//!
//! [`Host::schedule`]: reflow_core::Host::schedule

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use reflow_core::Host;

/// Coalesces calls to an action into at most one run per delay window.
pub struct Throttle {
    host: Rc<dyn Host>,
    delay: Duration,
    /// True while a run is scheduled and not yet delivered.
    pending: Rc<Cell<bool>>,
    action: Rc<dyn Fn()>,
}

impl Throttle {
    /// Wrap `action` with a coalescing window of `delay`.
    pub fn new(host: Rc<dyn Host>, delay: Duration, action: Rc<dyn Fn()>) -> Self {
        Self {
            host,
            delay,
            pending: Rc::new(Cell::new(false)),
            action,
        }
    }

    /// Request a run of the action.
    ///
    /// Schedules the action `delay` from now unless a run is already
    /// pending, in which case the request coalesces into it.
    pub fn invoke(&self) {
        if self.pending.replace(true) {
            return;
        }
        let pending = Rc::clone(&self.pending);
        let action = Rc::clone(&self.action);
        // Clear `pending` before running so the action itself can request
        // the next window.
        self.host.schedule(
            self.delay,
            Box::new(move || {
                pending.set(false);
                action();
            }),
        );
    }

    /// Whether a run is currently scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// The coalescing window.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("delay", &self.delay)
            .field("pending", &self.pending.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_harness::SimHost;

    fn counting_throttle(host: &SimHost, delay_ms: u64) -> (Throttle, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0u32));
        let runs_clone = Rc::clone(&runs);
        let throttle = Throttle::new(
            host.as_host(),
            Duration::from_millis(delay_ms),
            Rc::new(move || runs_clone.set(runs_clone.get() + 1)),
        );
        (throttle, runs)
    }

    #[test]
    fn burst_within_window_runs_once() {
        let host = SimHost::new();
        let (throttle, runs) = counting_throttle(&host, 20);

        for _ in 0..10 {
            throttle.invoke();
        }
        assert!(throttle.is_pending());
        assert_eq!(runs.get(), 0);

        host.advance(Duration::from_millis(20));
        assert_eq!(runs.get(), 1);
        assert!(!throttle.is_pending());
    }

    #[test]
    fn trailing_run_is_guaranteed_after_each_window() {
        let host = SimHost::new();
        let (throttle, runs) = counting_throttle(&host, 20);

        throttle.invoke();
        host.advance(Duration::from_millis(20));
        assert_eq!(runs.get(), 1);

        throttle.invoke();
        throttle.invoke();
        host.advance(Duration::from_millis(20));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn no_run_without_invocation() {
        let host = SimHost::new();
        let (_throttle, runs) = counting_throttle(&host, 20);
        host.advance(Duration::from_millis(200));
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn action_can_reinvoke_itself() {
        let host = SimHost::new();
        let runs = Rc::new(Cell::new(0u32));
        let slot: Rc<Cell<Option<Rc<Throttle>>>> = Rc::new(Cell::new(None));

        let runs_clone = Rc::clone(&runs);
        let slot_clone = Rc::clone(&slot);
        let throttle = Rc::new(Throttle::new(
            host.as_host(),
            Duration::from_millis(20),
            Rc::new(move || {
                runs_clone.set(runs_clone.get() + 1);
                // Chain two windows, then stop.
                if runs_clone.get() < 2 {
                    if let Some(throttle) = slot_clone.take() {
                        throttle.invoke();
                        slot_clone.set(Some(throttle));
                    }
                }
            }),
        ));
        slot.set(Some(Rc::clone(&throttle)));

        throttle.invoke();
        host.advance(Duration::from_millis(20));
        assert_eq!(runs.get(), 1);
        // The re-invocation from inside the action lands one window later.
        host.advance(Duration::from_millis(20));
        assert_eq!(runs.get(), 2);
        host.advance(Duration::from_millis(200));
        assert_eq!(runs.get(), 2);
    }
}
