#![forbid(unsafe_code)]

//! Per-thread controller instance.
//!
//! The controller is single-threaded state; one instance per thread serves
//! every observer on that thread. It is created lazily on first access and
//! lives for the rest of the thread. There is no teardown: nothing in the
//! protocol ever needs the shared instance to go away.
//!
//! Embedders install their platform host once at startup with
//! [`set_default_host`]; without one, the instance runs over
//! [`NullHost`](reflow_core::NullHost) and every lifecycle operation is a
//! total no-op. Tests needing hermetic state construct isolated instances
//! with [`RefreshController::new`] instead.

use std::cell::RefCell;
use std::rc::Rc;

use reflow_core::{Host, NullHost};

use crate::controller::RefreshController;

thread_local! {
    static DEFAULT_HOST: RefCell<Option<Rc<dyn Host>>> = const { RefCell::new(None) };
    static INSTANCE: RefCell<Option<Rc<RefreshController>>> = const { RefCell::new(None) };
}

/// Install the host a future first [`RefreshController::instance`] call
/// on this thread will be built over.
///
/// Has no effect on an instance that already exists; the shared instance
/// keeps the host it was created with.
pub fn set_default_host(host: Rc<dyn Host>) {
    DEFAULT_HOST.with(|slot| *slot.borrow_mut() = Some(host));
}

impl RefreshController {
    /// The shared per-thread controller, created lazily on first call.
    #[must_use]
    pub fn instance() -> Rc<RefreshController> {
        INSTANCE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(existing) = slot.as_ref() {
                return Rc::clone(existing);
            }
            let host = DEFAULT_HOST
                .with(|h| h.borrow().clone())
                .unwrap_or_else(|| Rc::new(NullHost::new()) as Rc<dyn Host>);
            let controller = RefreshController::new(host);
            *slot = Some(Rc::clone(&controller));
            controller
        })
    }
}
