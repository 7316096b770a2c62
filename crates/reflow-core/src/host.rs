#![forbid(unsafe_code)]

//! The environment seam.
//!
//! # Design
//!
//! The refresh controller never talks to a platform directly. Window
//! resolution, native signal subscription, and deferred scheduling all go
//! through [`Host`]. Production embedders implement it over their
//! platform bindings; the test harness implements it over a manual clock.
//!
//! # Signals
//!
//! | Signal | Scope | Delivered on |
//! |--------|-------|--------------|
//! | resize | window | viewport size changes |
//! | transition end | window's document | CSS transition completion |
//! | structural watch | entire document | attribute / child-list / character-data changes |
//! | subtree modified | window's document | legacy fallback for the above |
//!
//! The structural watch is the preferred mechanism; hosts that lack it
//! report `supports_structure_watch() == false` and the controller falls
//! back to the legacy subtree-modified signal. Hosts with no DOM at all
//! report `dom_available() == false`, which turns every lifecycle
//! operation into a total no-op.

use std::time::Duration;

use crate::handle::{TargetHandle, WindowHandle};
use crate::signal::{SignalGuard, SignalListener, StructureWatchOptions, TransitionListener};

/// Environment capabilities the refresh controller is built over.
///
/// All subscription methods hand back a [`SignalGuard`]; dropping the
/// guard removes the listener. Implementations must tolerate guards
/// outliving the host state they point into.
pub trait Host {
    /// Whether a DOM-capable environment is present at all.
    fn dom_available(&self) -> bool;

    /// Whether the native structural-mutation watch mechanism exists.
    fn supports_structure_watch(&self) -> bool;

    /// Resolve the window owning `target`.
    ///
    /// Targets that belong to no window resolve to
    /// [`WindowHandle::DETACHED`].
    fn window_of(&self, target: TargetHandle) -> WindowHandle;

    /// Subscribe to `window`'s resize signal.
    fn on_resize(&self, window: WindowHandle, listener: SignalListener) -> SignalGuard;

    /// Subscribe to transition-completion events on `window`'s document.
    fn on_transition_end(
        &self,
        window: WindowHandle,
        listener: TransitionListener,
    ) -> SignalGuard;

    /// Create a structural watch over the entire document.
    ///
    /// Only meaningful when [`supports_structure_watch`] returns true;
    /// hosts without the mechanism return an inert guard.
    ///
    /// [`supports_structure_watch`]: Host::supports_structure_watch
    fn watch_structure(
        &self,
        options: StructureWatchOptions,
        listener: SignalListener,
    ) -> SignalGuard;

    /// Subscribe to the legacy subtree-modified signal on `window`'s
    /// document.
    fn on_subtree_modified(&self, window: WindowHandle, listener: SignalListener) -> SignalGuard;

    /// Run `callback` once after `delay` elapses.
    ///
    /// This is the timer source for the refresh throttle. Delivery order
    /// for equal deadlines must be scheduling order.
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>);
}

/// Host for environments with no DOM.
///
/// Every capability check is negative, every subscription is inert, and
/// scheduled callbacks are dropped: with no event loop there is no later
/// moment to deliver them, and no signal ever fires that would need one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl NullHost {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Host for NullHost {
    fn dom_available(&self) -> bool {
        false
    }

    fn supports_structure_watch(&self) -> bool {
        false
    }

    fn window_of(&self, _target: TargetHandle) -> WindowHandle {
        WindowHandle::DETACHED
    }

    fn on_resize(&self, _window: WindowHandle, _listener: SignalListener) -> SignalGuard {
        SignalGuard::inert()
    }

    fn on_transition_end(
        &self,
        _window: WindowHandle,
        _listener: TransitionListener,
    ) -> SignalGuard {
        SignalGuard::inert()
    }

    fn watch_structure(
        &self,
        _options: StructureWatchOptions,
        _listener: SignalListener,
    ) -> SignalGuard {
        SignalGuard::inert()
    }

    fn on_subtree_modified(&self, _window: WindowHandle, _listener: SignalListener) -> SignalGuard {
        SignalGuard::inert()
    }

    fn schedule(&self, _delay: Duration, _callback: Box<dyn FnOnce()>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn null_host_reports_no_capabilities() {
        let host = NullHost::new();
        assert!(!host.dom_available());
        assert!(!host.supports_structure_watch());
        assert_eq!(host.window_of(TargetHandle::new(1)), WindowHandle::DETACHED);
    }

    #[test]
    fn null_host_subscriptions_are_inert() {
        let host = NullHost::new();
        let listener: SignalListener = Rc::new(|| panic!("listener must never fire"));
        drop(host.on_resize(WindowHandle::DETACHED, Rc::clone(&listener)));
        drop(host.on_subtree_modified(WindowHandle::DETACHED, Rc::clone(&listener)));
        drop(host.watch_structure(StructureWatchOptions::document_wide(), listener));
        host.schedule(Duration::from_millis(1), Box::new(|| panic!("timer must never fire")));
    }
}
