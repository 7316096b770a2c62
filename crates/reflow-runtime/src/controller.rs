#![forbid(unsafe_code)]

//! The refresh controller: registry, signal wiring, and the refresh loop.
//!
//! # Design
//!
//! One controller coordinates every observer on its thread. It folds four
//! noisy native signals (window resize, transition completion, the
//! structural watch, and the legacy subtree-modified fallback) into a
//! single throttled refresh protocol:
//!
//! ```text
//! native signal ──► transition filter (transition events only)
//!                        │
//!                        ▼
//!                  refresh() [throttled]
//!                        │
//!                        ▼
//!              pass: gather all ─► broadcast active
//!                        │
//!                        └── any observer active? ─► refresh() again
//! ```
//!
//! A pass can only surface changes caused by effects of the previous pass
//! (a transition still in flight, a callback that resized something), so
//! the chain converges once the layout settles.
//!
//! # Invariants
//!
//! 1. An observer appears at most once in the registry.
//! 2. Within a pass, every `gather_active` completes before any
//!    `broadcast_active` begins.
//! 3. At most one structural watcher exists at any time, shared by all
//!    connected observers.
//! 4. A connected observer holds exactly one resize and one
//!    transition-end subscription; dropping its connection entry removes
//!    both.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | no DOM-capable environment | connect/disconnect are silent no-ops |
//! | structural watch unsupported | legacy subtree-modified fallback |
//! | re-register / re-remove an observer | silent no-op |
//! | observer never quiesces | refresh chain keeps re-running (caller responsibility, see [`Observer`]) |

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use reflow_core::{
    Host, Observer, SignalGuard, StructureWatchOptions, TargetHandle, TransitionEvent,
    WindowHandle,
};

use crate::throttle::Throttle;
use crate::transition::affects_geometry;

/// Tuning knobs for a controller instance.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Coalescing window for `refresh`. Signal bursts inside one window
    /// collapse into a single pass. Default: 20 ms.
    pub refresh_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_millis(20),
        }
    }
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// `refresh()` invocations, counted before throttle coalescing.
    pub refresh_requests: u64,
    /// Update passes actually run.
    pub passes: u64,
    /// Total `broadcast_active` deliveries across all passes.
    pub broadcasts: u64,
}

/// Identity of an observer handle, by allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ObserverKey(usize);

impl ObserverKey {
    fn of(observer: &Rc<dyn Observer>) -> Self {
        Self(Rc::as_ptr(observer) as *const () as usize)
    }
}

/// Native subscriptions held on behalf of one connected observer.
///
/// Dropping the entry tears all of them down; the legacy guard is present
/// only when this observer installed the fallback.
struct Connection {
    window: WindowHandle,
    _resize: SignalGuard,
    _transition: SignalGuard,
    legacy: Option<SignalGuard>,
}

#[derive(Default)]
struct RegistryState {
    observers: Vec<Rc<dyn Observer>>,
    connections: FxHashMap<ObserverKey, Connection>,
    /// The single structural watcher, shared across all observers.
    structure_watch: Option<SignalGuard>,
}

#[derive(Default)]
struct StatCounters {
    refresh_requests: Cell<u64>,
    passes: Cell<u64>,
    broadcasts: Cell<u64>,
}

/// Coordinates re-measurement of observed elements.
///
/// Most embedders use the per-thread instance from
/// [`RefreshController::instance`]; tests construct isolated instances
/// over a harness host with [`RefreshController::new`].
pub struct RefreshController {
    host: Rc<dyn Host>,
    throttle: Throttle,
    state: RefCell<RegistryState>,
    stats: StatCounters,
    /// Back-reference handed to signal listeners. Listeners hold the
    /// controller weakly so host-side listener storage cannot keep a
    /// dropped controller alive.
    weak_self: Weak<RefreshController>,
}

impl RefreshController {
    /// Isolated controller over `host` with default configuration.
    pub fn new(host: Rc<dyn Host>) -> Rc<Self> {
        Self::with_config(host, ControllerConfig::default())
    }

    /// Isolated controller over `host` with explicit configuration.
    pub fn with_config(host: Rc<dyn Host>, config: ControllerConfig) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let chain = {
                let weak = weak.clone();
                Rc::new(move || {
                    if let Some(controller) = weak.upgrade() {
                        controller.run_pass_and_continue();
                    }
                }) as Rc<dyn Fn()>
            };
            Self {
                throttle: Throttle::new(Rc::clone(&host), config.refresh_delay, chain),
                host,
                state: RefCell::new(RegistryState::default()),
                stats: StatCounters::default(),
                weak_self: weak.clone(),
            }
        })
    }

    /// Register `observer` and connect native signals for it.
    ///
    /// Idempotent: re-adding a registered observer, or one that is already
    /// connected, is a no-op. `target` is only used to resolve the window
    /// whose signals cover the observer.
    pub fn add_observer(&self, observer: &Rc<dyn Observer>, target: TargetHandle) {
        {
            let mut state = self.state.borrow_mut();
            if !state.observers.iter().any(|o| Rc::ptr_eq(o, observer)) {
                state.observers.push(Rc::clone(observer));
            }
        }
        self.connect(observer, target);
    }

    /// Unregister `observer` and remove the native signals installed on
    /// its behalf.
    ///
    /// Removing an unregistered observer is a silent no-op.
    pub fn remove_observer(&self, observer: &Rc<dyn Observer>, target: TargetHandle) {
        {
            let mut state = self.state.borrow_mut();
            if let Some(index) = state
                .observers
                .iter()
                .position(|o| Rc::ptr_eq(o, observer))
            {
                state.observers.remove(index);
            }
        }
        self.disconnect(observer, target);
    }

    /// Request a refresh pass.
    ///
    /// Throttled: requests inside one delay window collapse into a single
    /// pass, and the trailing pass is guaranteed once the window closes.
    /// Observer implementations call this after staging a newly observed
    /// target; every native signal routes here as well.
    pub fn refresh(&self) {
        self.stats
            .refresh_requests
            .set(self.stats.refresh_requests.get() + 1);
        self.throttle.invoke();
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Whether native signals are currently installed for `observer`.
    #[must_use]
    pub fn is_connected(&self, observer: &Rc<dyn Observer>) -> bool {
        self.state
            .borrow()
            .connections
            .contains_key(&ObserverKey::of(observer))
    }

    /// Whether the shared structural watcher is currently live.
    #[must_use]
    pub fn has_structure_watch(&self) -> bool {
        self.state.borrow().structure_watch.is_some()
    }

    /// Snapshot of the controller's counters.
    #[must_use]
    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            refresh_requests: self.stats.refresh_requests.get(),
            passes: self.stats.passes.get(),
            broadcasts: self.stats.broadcasts.get(),
        }
    }

    /// Throttled continuation: one pass, then re-request while changes
    /// keep surfacing.
    fn run_pass_and_continue(&self) {
        if self.update_observers() {
            self.refresh();
        }
    }

    /// One full pass over the registry.
    ///
    /// Gathers every observer before broadcasting any, so a broadcast
    /// callback that synchronously mutates the environment cannot corrupt
    /// another observer's in-flight measurement. Returns true iff any
    /// observer had pending changes.
    fn update_observers(&self) -> bool {
        // Snapshot so callbacks can re-enter add/remove without
        // invalidating the iteration.
        let observers: Vec<Rc<dyn Observer>> = self.state.borrow().observers.clone();

        let mut active: SmallVec<[Rc<dyn Observer>; 4]> = SmallVec::new();
        for observer in &observers {
            observer.gather_active();
            if observer.has_active() {
                active.push(Rc::clone(observer));
            }
        }
        for observer in &active {
            observer.broadcast_active();
        }

        self.stats.passes.set(self.stats.passes.get() + 1);
        self.stats
            .broadcasts
            .set(self.stats.broadcasts.get() + active.len() as u64);
        trace!(
            registered = observers.len(),
            active = active.len(),
            "refresh pass"
        );
        !active.is_empty()
    }

    /// Install native signals for `observer`, keyed off `target`'s owning
    /// window. No-op without a DOM-capable environment or when already
    /// connected.
    fn connect(&self, observer: &Rc<dyn Observer>, target: TargetHandle) {
        if !self.host.dom_available() {
            return;
        }
        let key = ObserverKey::of(observer);
        if self.state.borrow().connections.contains_key(&key) {
            return;
        }

        let window = self.host.window_of(target);

        let resize = {
            let weak = self.weak_self.clone();
            self.host.on_resize(
                window,
                Rc::new(move || {
                    if let Some(controller) = weak.upgrade() {
                        controller.refresh();
                    }
                }),
            )
        };

        let transition = {
            let weak = self.weak_self.clone();
            self.host.on_transition_end(
                window,
                Rc::new(move |event: &TransitionEvent| {
                    if let Some(controller) = weak.upgrade() {
                        controller.on_transition_end(event);
                    }
                }),
            )
        };

        let legacy = if self.host.supports_structure_watch() {
            // One watcher for the whole process: release the previous one
            // before installing the replacement.
            self.state.borrow_mut().structure_watch = None;
            let weak = self.weak_self.clone();
            let watcher = self.host.watch_structure(
                StructureWatchOptions::document_wide(),
                Rc::new(move || {
                    if let Some(controller) = weak.upgrade() {
                        controller.refresh();
                    }
                }),
            );
            self.state.borrow_mut().structure_watch = Some(watcher);
            None
        } else {
            debug!(
                window = window.raw(),
                "structural watch unavailable, installing subtree-modified fallback"
            );
            let weak = self.weak_self.clone();
            Some(self.host.on_subtree_modified(
                window,
                Rc::new(move || {
                    if let Some(controller) = weak.upgrade() {
                        controller.refresh();
                    }
                }),
            ))
        };

        self.state.borrow_mut().connections.insert(
            key,
            Connection {
                window,
                _resize: resize,
                _transition: transition,
                legacy,
            },
        );
        debug!(window = window.raw(), "observer connected");
    }

    /// Remove the native signals installed for `observer`. No-op without a
    /// DOM-capable environment or when not connected.
    fn disconnect(&self, observer: &Rc<dyn Observer>, target: TargetHandle) {
        if !self.host.dom_available() {
            return;
        }
        let key = ObserverKey::of(observer);
        let connection = {
            let mut state = self.state.borrow_mut();
            let connection = state.connections.remove(&key);
            if connection.is_some() {
                // Any disconnect tears the shared watcher down, even while
                // other observers remain connected; their structural
                // coverage lapses until the next connect re-creates it.
                state.structure_watch = None;
            }
            connection
        };
        if let Some(connection) = connection {
            debug!(
                window = connection.window.raw(),
                target = target.raw(),
                legacy = connection.legacy.is_some(),
                "observer disconnected"
            );
        }
        // `connection` drops here, outside the registry borrow, removing
        // the resize, transition, and legacy subscriptions.
    }

    fn on_transition_end(&self, event: &TransitionEvent) {
        if affects_geometry(event.property_name()) {
            self.refresh();
        }
    }
}

impl std::fmt::Debug for RefreshController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RefreshController")
            .field("observers", &state.observers.len())
            .field("connected", &state.connections.len())
            .field("structure_watch", &state.structure_watch.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_harness::{CallLog, ScriptedObserver, SimHost};

    fn quiet_observer(log: &CallLog, name: &str) -> Rc<dyn Observer> {
        ScriptedObserver::quiet(log, name)
    }

    #[test]
    fn registry_rejects_duplicates() {
        let host = SimHost::new();
        let controller = RefreshController::new(host.as_host());
        let log = CallLog::new();
        let observer = quiet_observer(&log, "o1");
        let target = host.target_in(host.window(1));

        controller.add_observer(&observer, target);
        controller.add_observer(&observer, target);
        controller.add_observer(&observer, target);

        assert_eq!(controller.observer_count(), 1);
        assert!(controller.is_connected(&observer));
    }

    #[test]
    fn distinct_observers_register_independently() {
        let host = SimHost::new();
        let controller = RefreshController::new(host.as_host());
        let log = CallLog::new();
        let first = quiet_observer(&log, "o1");
        let second = quiet_observer(&log, "o2");
        let target = host.target_in(host.window(1));

        controller.add_observer(&first, target);
        controller.add_observer(&second, target);
        assert_eq!(controller.observer_count(), 2);

        controller.remove_observer(&first, target);
        assert_eq!(controller.observer_count(), 1);
        assert!(!controller.is_connected(&first));
        assert!(controller.is_connected(&second));
    }

    #[test]
    fn removing_unregistered_observer_is_a_no_op() {
        let host = SimHost::new();
        let controller = RefreshController::new(host.as_host());
        let log = CallLog::new();
        let observer = quiet_observer(&log, "o1");
        let target = host.target_in(host.window(1));

        controller.remove_observer(&observer, target);
        assert_eq!(controller.observer_count(), 0);
        assert!(!controller.is_connected(&observer));
    }

    #[test]
    fn headless_environment_registers_without_connecting() {
        let host = SimHost::headless();
        let controller = RefreshController::new(host.as_host());
        let log = CallLog::new();
        let observer = quiet_observer(&log, "o1");
        let target = host.target_in(host.window(1));

        controller.add_observer(&observer, target);
        assert_eq!(controller.observer_count(), 1);
        assert!(!controller.is_connected(&observer));
        assert!(!controller.has_structure_watch());

        controller.remove_observer(&observer, target);
        assert_eq!(controller.observer_count(), 0);
    }

    #[test]
    fn legacy_fallback_installed_when_structure_watch_unsupported() {
        let host = SimHost::without_structure_watch();
        let controller = RefreshController::new(host.as_host());
        let log = CallLog::new();
        let observer = quiet_observer(&log, "o1");
        let window = host.window(1);
        let target = host.target_in(window);

        controller.add_observer(&observer, target);
        assert!(!controller.has_structure_watch());
        assert_eq!(host.legacy_listener_count(window), 1);

        controller.remove_observer(&observer, target);
        assert_eq!(host.legacy_listener_count(window), 0);
    }

    #[test]
    fn stats_track_requests_and_passes() {
        let host = SimHost::new();
        let controller = RefreshController::new(host.as_host());
        let log = CallLog::new();
        let observer = quiet_observer(&log, "o1");
        let target = host.target_in(host.window(1));
        controller.add_observer(&observer, target);

        controller.refresh();
        controller.refresh();
        host.advance(Duration::from_millis(20));

        let stats = controller.stats();
        assert_eq!(stats.refresh_requests, 2);
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.broadcasts, 0);
    }
}
