#![forbid(unsafe_code)]

//! Core: the seam types for Reflow's refresh coordination.
//!
//! # Role in Reflow
//! `reflow-core` is the boundary layer. It owns the [`Host`] abstraction
//! (window resolution, native signal subscription, structural watch,
//! deferred scheduling), the [`Observer`] capability contract, and the
//! opaque handles and RAII guards the runtime trades in.
//!
//! # Primary responsibilities
//! - **Host**: the environment seam the controller subscribes through.
//! - **Observer**: the gather / has-pending / broadcast contract.
//! - **SignalGuard**: RAII removal of native subscriptions.
//! - **Handles**: opaque target and window references.
//!
//! # How it fits in the system
//! The runtime (`reflow-runtime`) drives registered observers through a
//! throttled refresh loop wired to host signals. The harness
//! (`reflow-harness`) implements [`Host`] deterministically for tests.
//! Neither the host nor the controller ever measures geometry; that stays
//! with observer implementations.

pub mod handle;
pub mod host;
pub mod observer;
pub mod signal;

pub use handle::{TargetHandle, WindowHandle};
pub use host::{Host, NullHost};
pub use observer::Observer;
pub use signal::{
    MutationKinds, SignalGuard, SignalListener, StructureWatchOptions, TransitionEvent,
    TransitionListener,
};
