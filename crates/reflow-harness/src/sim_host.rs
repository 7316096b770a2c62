#![forbid(unsafe_code)]

//! Simulated host with a manual clock.
//!
//! [`SimHost`] implements the full `Host` seam deterministically: signals
//! fire only when a test emits them, and scheduled callbacks run only when
//! the test advances the clock. Timers created while the clock advances
//! (for example by a refresh pass re-requesting itself) still run within
//! the same `advance` call if their deadline falls inside it, so a whole
//! refresh chain can be driven with one generous advance.
//!
//! Listener storage is introspectable, which is what the
//! no-dangling-listener tests are built on: after an observer disconnects,
//! every count attributable to it must be back to zero.
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use reflow_harness::SimHost;
//!
//! let host = SimHost::new();
//! let window = host.window(1);
//! let fired = Rc::new(std::cell::Cell::new(false));
//! let fired_clone = Rc::clone(&fired);
//! let guard = host.subscribe_resize(window, Rc::new(move || fired_clone.set(true)));
//! host.emit_resize(window);
//! assert!(fired.get());
//! drop(guard);
//! host.emit_resize(window);
//! assert_eq!(host.resize_listener_count(window), 0);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use reflow_core::{
    Host, SignalGuard, SignalListener, StructureWatchOptions, TargetHandle, TransitionEvent,
    TransitionListener, WindowHandle,
};

struct Timer {
    deadline: Duration,
    seq: u64,
    callback: Box<dyn FnOnce()>,
}

struct SimState {
    dom_available: bool,
    structure_watch_supported: bool,
    now: Duration,
    next_id: u64,
    timers: Vec<Timer>,
    target_windows: HashMap<TargetHandle, WindowHandle>,
    resize: Vec<(u64, WindowHandle, SignalListener)>,
    transition: Vec<(u64, WindowHandle, TransitionListener)>,
    legacy: Vec<(u64, WindowHandle, SignalListener)>,
    structure: Vec<(u64, StructureWatchOptions, SignalListener)>,
}

impl SimState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Deterministic [`Host`] for tests.
///
/// Clones share state, so a test can keep one handle for driving the
/// clock and hand another to the controller.
#[derive(Clone)]
pub struct SimHost {
    state: Rc<RefCell<SimState>>,
}

impl SimHost {
    /// DOM available, structural watch supported.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(true, true)
    }

    /// No DOM-capable environment at all.
    #[must_use]
    pub fn headless() -> Self {
        Self::with_capabilities(false, false)
    }

    /// DOM available, but the structural watch mechanism is missing, so
    /// consumers must fall back to the legacy subtree-modified signal.
    #[must_use]
    pub fn without_structure_watch() -> Self {
        Self::with_capabilities(true, false)
    }

    fn with_capabilities(dom_available: bool, structure_watch_supported: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState {
                dom_available,
                structure_watch_supported,
                now: Duration::ZERO,
                next_id: 0,
                timers: Vec::new(),
                target_windows: HashMap::new(),
                resize: Vec::new(),
                transition: Vec::new(),
                legacy: Vec::new(),
                structure: Vec::new(),
            })),
        }
    }

    /// This host as a shared trait object.
    #[must_use]
    pub fn as_host(&self) -> Rc<dyn Host> {
        Rc::new(self.clone())
    }

    /// A window handle. Windows need no registration; any raw value works.
    #[must_use]
    pub fn window(&self, raw: u64) -> WindowHandle {
        WindowHandle::new(raw)
    }

    /// Mint a fresh target owned by `window`.
    #[must_use]
    pub fn target_in(&self, window: WindowHandle) -> TargetHandle {
        let mut state = self.state.borrow_mut();
        let target = TargetHandle::new(state.next_id());
        state.target_windows.insert(target, window);
        target
    }

    // ── Clock ───────────────────────────────────────────────────────────

    /// Current simulated time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Advance the clock by `delta`, running every timer whose deadline
    /// falls inside the advanced span, in deadline order (scheduling order
    /// for equal deadlines). Timers scheduled by the callbacks themselves
    /// also run when they land inside the span.
    pub fn advance(&self, delta: Duration) {
        let deadline_cap = self.state.borrow().now + delta;
        loop {
            let due = {
                let mut state = self.state.borrow_mut();
                let next = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.deadline <= deadline_cap)
                    .min_by_key(|(_, timer)| (timer.deadline, timer.seq))
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let timer = state.timers.remove(index);
                        state.now = state.now.max(timer.deadline);
                        Some(timer)
                    }
                    None => None,
                }
            };
            // Run outside the borrow: the callback may subscribe, emit, or
            // schedule again.
            match due {
                Some(timer) => (timer.callback)(),
                None => break,
            }
        }
        self.state.borrow_mut().now = deadline_cap;
    }

    /// Number of timers waiting for the clock.
    #[must_use]
    pub fn pending_timer_count(&self) -> usize {
        self.state.borrow().timers.len()
    }

    // ── Signal emission ─────────────────────────────────────────────────

    /// Fire `window`'s resize signal.
    pub fn emit_resize(&self, window: WindowHandle) {
        let listeners: Vec<SignalListener> = {
            let state = self.state.borrow();
            state
                .resize
                .iter()
                .filter(|(_, w, _)| *w == window)
                .map(|(_, _, listener)| Rc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener();
        }
    }

    /// Fire a transition-completion event on `window`'s document.
    pub fn emit_transition_end(&self, window: WindowHandle, event: &TransitionEvent) {
        let listeners: Vec<TransitionListener> = {
            let state = self.state.borrow();
            state
                .transition
                .iter()
                .filter(|(_, w, _)| *w == window)
                .map(|(_, _, listener)| Rc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener(event);
        }
    }

    /// Fire every live structural watcher.
    pub fn emit_structure_change(&self) {
        let listeners: Vec<SignalListener> = {
            let state = self.state.borrow();
            state
                .structure
                .iter()
                .map(|(_, _, listener)| Rc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener();
        }
    }

    /// Fire the legacy subtree-modified signal on `window`'s document.
    pub fn emit_subtree_modified(&self, window: WindowHandle) {
        let listeners: Vec<SignalListener> = {
            let state = self.state.borrow();
            state
                .legacy
                .iter()
                .filter(|(_, w, _)| *w == window)
                .map(|(_, _, listener)| Rc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener();
        }
    }

    // ── Introspection ───────────────────────────────────────────────────

    #[must_use]
    pub fn resize_listener_count(&self, window: WindowHandle) -> usize {
        self.state
            .borrow()
            .resize
            .iter()
            .filter(|(_, w, _)| *w == window)
            .count()
    }

    #[must_use]
    pub fn transition_listener_count(&self, window: WindowHandle) -> usize {
        self.state
            .borrow()
            .transition
            .iter()
            .filter(|(_, w, _)| *w == window)
            .count()
    }

    #[must_use]
    pub fn legacy_listener_count(&self, window: WindowHandle) -> usize {
        self.state
            .borrow()
            .legacy
            .iter()
            .filter(|(_, w, _)| *w == window)
            .count()
    }

    /// Number of live structural watchers across the whole document.
    #[must_use]
    pub fn structure_watch_count(&self) -> usize {
        self.state.borrow().structure.len()
    }

    /// Options of the most recently created live structural watcher.
    #[must_use]
    pub fn structure_watch_options(&self) -> Option<StructureWatchOptions> {
        self.state
            .borrow()
            .structure
            .last()
            .map(|(_, options, _)| *options)
    }

    /// Every live listener of every kind.
    #[must_use]
    pub fn total_listener_count(&self) -> usize {
        let state = self.state.borrow();
        state.resize.len() + state.transition.len() + state.legacy.len() + state.structure.len()
    }

    // ── Subscription plumbing ───────────────────────────────────────────

    /// Subscribe a resize listener directly (what `Host::on_resize` does).
    pub fn subscribe_resize(&self, window: WindowHandle, listener: SignalListener) -> SignalGuard {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.resize.push((id, window, listener));
            id
        };
        let state = Rc::clone(&self.state);
        SignalGuard::on_drop(move || {
            state.borrow_mut().resize.retain(|(lid, _, _)| *lid != id);
        })
    }

    fn subscribe_transition(
        &self,
        window: WindowHandle,
        listener: TransitionListener,
    ) -> SignalGuard {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.transition.push((id, window, listener));
            id
        };
        let state = Rc::clone(&self.state);
        SignalGuard::on_drop(move || {
            state.borrow_mut().transition.retain(|(lid, _, _)| *lid != id);
        })
    }

    fn subscribe_structure(
        &self,
        options: StructureWatchOptions,
        listener: SignalListener,
    ) -> SignalGuard {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.structure.push((id, options, listener));
            id
        };
        let state = Rc::clone(&self.state);
        SignalGuard::on_drop(move || {
            state.borrow_mut().structure.retain(|(lid, _, _)| *lid != id);
        })
    }

    fn subscribe_legacy(&self, window: WindowHandle, listener: SignalListener) -> SignalGuard {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.legacy.push((id, window, listener));
            id
        };
        let state = Rc::clone(&self.state);
        SignalGuard::on_drop(move || {
            state.borrow_mut().legacy.retain(|(lid, _, _)| *lid != id);
        })
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SimHost {
    fn dom_available(&self) -> bool {
        self.state.borrow().dom_available
    }

    fn supports_structure_watch(&self) -> bool {
        self.state.borrow().structure_watch_supported
    }

    fn window_of(&self, target: TargetHandle) -> WindowHandle {
        self.state
            .borrow()
            .target_windows
            .get(&target)
            .copied()
            .unwrap_or(WindowHandle::DETACHED)
    }

    fn on_resize(&self, window: WindowHandle, listener: SignalListener) -> SignalGuard {
        self.subscribe_resize(window, listener)
    }

    fn on_transition_end(
        &self,
        window: WindowHandle,
        listener: TransitionListener,
    ) -> SignalGuard {
        self.subscribe_transition(window, listener)
    }

    fn watch_structure(
        &self,
        options: StructureWatchOptions,
        listener: SignalListener,
    ) -> SignalGuard {
        self.subscribe_structure(options, listener)
    }

    fn on_subtree_modified(&self, window: WindowHandle, listener: SignalListener) -> SignalGuard {
        self.subscribe_legacy(window, listener)
    }

    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        let mut state = self.state.borrow_mut();
        let deadline = state.now + delay;
        let seq = state.next_id();
        state.timers.push(Timer {
            deadline,
            seq,
            callback,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn timers_run_in_deadline_order() {
        let host = SimHost::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, delay_ms) in [("b", 30u64), ("a", 10), ("c", 50)] {
            let order = Rc::clone(&order);
            host.schedule(
                Duration::from_millis(delay_ms),
                Box::new(move || order.borrow_mut().push(label)),
            );
        }
        host.advance(Duration::from_millis(100));
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
        assert_eq!(host.pending_timer_count(), 0);
    }

    #[test]
    fn equal_deadlines_run_in_scheduling_order() {
        let host = SimHost::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            host.schedule(
                Duration::from_millis(20),
                Box::new(move || order.borrow_mut().push(label)),
            );
        }
        host.advance(Duration::from_millis(20));
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn advance_stops_at_the_cap() {
        let host = SimHost::new();
        let fired = Rc::new(Cell::new(false));
        let fired_clone = Rc::clone(&fired);
        host.schedule(
            Duration::from_millis(30),
            Box::new(move || fired_clone.set(true)),
        );

        host.advance(Duration::from_millis(29));
        assert!(!fired.get());
        host.advance(Duration::from_millis(1));
        assert!(fired.get());
    }

    #[test]
    fn timers_scheduled_during_advance_run_within_the_span() {
        let host = SimHost::new();
        let runs = Rc::new(Cell::new(0u32));

        let runs_outer = Rc::clone(&runs);
        let host_clone = host.clone();
        host.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                runs_outer.set(runs_outer.get() + 1);
                let runs_inner = Rc::clone(&runs_outer);
                host_clone.schedule(
                    Duration::from_millis(10),
                    Box::new(move || runs_inner.set(runs_inner.get() + 1)),
                );
            }),
        );

        host.advance(Duration::from_millis(25));
        assert_eq!(runs.get(), 2);
        assert_eq!(host.now(), Duration::from_millis(25));
    }

    #[test]
    fn emission_reaches_only_the_right_window() {
        let host = SimHost::new();
        let first = host.window(1);
        let second = host.window(2);
        let hits = Rc::new(Cell::new(0u32));

        let hits_clone = Rc::clone(&hits);
        let _guard = host.subscribe_resize(first, Rc::new(move || hits_clone.set(hits_clone.get() + 1)));

        host.emit_resize(second);
        assert_eq!(hits.get(), 0);
        host.emit_resize(first);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn dropping_a_guard_removes_the_listener() {
        let host = SimHost::new();
        let window = host.window(1);
        let guard = host.subscribe_resize(window, Rc::new(|| {}));
        assert_eq!(host.resize_listener_count(window), 1);
        drop(guard);
        assert_eq!(host.resize_listener_count(window), 0);
    }

    #[test]
    fn targets_resolve_to_their_window() {
        let host = SimHost::new();
        let window = host.window(7);
        let target = host.target_in(window);
        assert_eq!(host.window_of(target), window);
        assert_eq!(
            host.window_of(TargetHandle::new(9999)),
            WindowHandle::DETACHED
        );
    }
}
