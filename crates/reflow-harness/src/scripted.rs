#![forbid(unsafe_code)]

//! Observer doubles with a shared call log.
//!
//! A [`ScriptedObserver`] reports pending changes for a scripted number of
//! passes and records every contract call into a [`CallLog`] shared by all
//! doubles in a test, so cross-observer ordering (gather-all before
//! broadcast-any) can be asserted directly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reflow_core::Observer;

/// One recorded contract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Gather,
    HasActive,
    Broadcast,
}

/// Shared, ordered record of contract calls across observers.
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<(String, Call)>>>,
}

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, observer: &str, call: Call) {
        self.entries.borrow_mut().push((observer.to_owned(), call));
    }

    /// All entries so far, in call order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Call)> {
        self.entries.borrow().clone()
    }

    /// Drain the log, returning everything recorded since the last drain.
    pub fn take(&self) -> Vec<(String, Call)> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    /// How many times `observer` received `call`.
    #[must_use]
    pub fn count(&self, observer: &str, call: Call) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(name, recorded)| name == observer && *recorded == call)
            .count()
    }
}

impl std::fmt::Debug for CallLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallLog")
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}

/// Scripted implementation of the observer contract.
///
/// `gather_active` stages a pending change while the script has passes
/// left; `broadcast_active` consumes the staged state. A quiet observer
/// never stages anything.
pub struct ScriptedObserver {
    name: String,
    log: CallLog,
    /// Remaining passes that will stage a pending change.
    active_passes: Cell<u32>,
    staged: Cell<bool>,
}

impl ScriptedObserver {
    /// Observer that never has pending changes.
    #[must_use]
    pub fn quiet(log: &CallLog, name: &str) -> Rc<Self> {
        Self::active_for(log, name, 0)
    }

    /// Observer whose first `passes` gathers stage a pending change.
    #[must_use]
    pub fn active_for(log: &CallLog, name: &str, passes: u32) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_owned(),
            log: log.clone(),
            active_passes: Cell::new(passes),
            staged: Cell::new(false),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make the next `passes` gathers stage a pending change again.
    pub fn reactivate(&self, passes: u32) {
        self.active_passes.set(self.active_passes.get() + passes);
    }
}

impl Observer for ScriptedObserver {
    fn gather_active(&self) {
        self.log.record(&self.name, Call::Gather);
        let remaining = self.active_passes.get();
        if remaining > 0 {
            self.active_passes.set(remaining - 1);
            self.staged.set(true);
        } else {
            self.staged.set(false);
        }
    }

    fn has_active(&self) -> bool {
        self.log.record(&self.name, Call::HasActive);
        self.staged.get()
    }

    fn broadcast_active(&self) {
        self.log.record(&self.name, Call::Broadcast);
        self.staged.set(false);
    }
}

impl std::fmt::Debug for ScriptedObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedObserver")
            .field("name", &self.name)
            .field("active_passes", &self.active_passes.get())
            .field("staged", &self.staged.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_observer_never_stages() {
        let log = CallLog::new();
        let observer = ScriptedObserver::quiet(&log, "q");
        observer.gather_active();
        assert!(!observer.has_active());
        assert_eq!(log.count("q", Call::Gather), 1);
        assert_eq!(log.count("q", Call::HasActive), 1);
        assert_eq!(log.count("q", Call::Broadcast), 0);
    }

    #[test]
    fn scripted_passes_deplete() {
        let log = CallLog::new();
        let observer = ScriptedObserver::active_for(&log, "o", 2);

        observer.gather_active();
        assert!(observer.has_active());
        observer.broadcast_active();

        observer.gather_active();
        assert!(observer.has_active());
        observer.broadcast_active();

        observer.gather_active();
        assert!(!observer.has_active());
    }

    #[test]
    fn broadcast_consumes_staged_state() {
        let log = CallLog::new();
        let observer = ScriptedObserver::active_for(&log, "o", 1);
        observer.gather_active();
        assert!(observer.has_active());
        observer.broadcast_active();
        assert!(!observer.has_active());
    }

    #[test]
    fn log_preserves_cross_observer_order() {
        let log = CallLog::new();
        let first = ScriptedObserver::quiet(&log, "a");
        let second = ScriptedObserver::quiet(&log, "b");
        first.gather_active();
        second.gather_active();
        let entries = log.take();
        assert_eq!(
            entries,
            vec![
                ("a".to_owned(), Call::Gather),
                ("b".to_owned(), Call::Gather)
            ]
        );
        assert!(log.entries().is_empty());
    }
}
