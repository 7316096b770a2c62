#![forbid(unsafe_code)]

//! Runtime: the throttled refresh loop and observer lifecycle for Reflow.
//!
//! # Role in Reflow
//! `reflow-runtime` owns the [`RefreshController`]: the per-thread
//! coordinator that registers observers, installs native change signals
//! through a [`Host`](reflow_core::Host), and drives the
//! gather / has-pending / broadcast protocol whenever anything that could
//! affect layout happens.
//!
//! # Primary responsibilities
//! - **Registry + lifecycle**: `add_observer` / `remove_observer`, both
//!   idempotent and total.
//! - **Signal subscriber**: resize, transition-end, and structural watch
//!   with legacy subtree-modified fallback, installed per connected
//!   observer and removed by RAII on disconnect.
//! - **Refresh loop**: throttled, self-re-invoking passes that run until
//!   the layout quiesces.
//! - **Transition filter**: only geometry-plausible transition properties
//!   trigger a refresh.
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use reflow_core::{NullHost, Observer};
//! use reflow_runtime::RefreshController;
//!
//! struct Probe;
//! impl Observer for Probe {
//!     fn gather_active(&self) {}
//!     fn has_active(&self) -> bool {
//!         false
//!     }
//!     fn broadcast_active(&self) {}
//! }
//!
//! let controller = RefreshController::new(Rc::new(NullHost::new()));
//! let observer: Rc<dyn Observer> = Rc::new(Probe);
//! controller.add_observer(&observer, reflow_core::TargetHandle::new(1));
//! assert_eq!(controller.observer_count(), 1);
//! ```

pub mod controller;
pub mod instance;
pub mod throttle;
pub mod transition;

pub use controller::{ControllerConfig, ControllerStats, RefreshController};
pub use instance::set_default_host;
pub use throttle::Throttle;
pub use transition::affects_geometry;
