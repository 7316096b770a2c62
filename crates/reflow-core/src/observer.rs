#![forbid(unsafe_code)]

//! The observer capability contract.
//!
//! An observer tracks one or more targets and knows how to measure them;
//! the controller knows nothing about measurement. Each refresh pass drives
//! every registered observer through the same three-step protocol:
//!
//! 1. [`gather_active`](Observer::gather_active): recompute and stage
//!    pending change state.
//! 2. [`has_active`](Observer::has_active): report whether anything is
//!    staged.
//! 3. [`broadcast_active`](Observer::broadcast_active): deliver staged
//!    changes to the observer's own callback.
//!
//! The controller guarantees that within a pass every observer finishes
//! gathering before any observer broadcasts, so a broadcast callback that
//! synchronously mutates the environment cannot corrupt another observer's
//! in-flight measurement.

/// External collaborator driven by the refresh loop.
///
/// All three operations must be safe to call on every pass, including
/// passes where nothing changed.
///
/// # Caller responsibility
///
/// The refresh loop re-runs as long as any observer keeps reporting
/// pending changes. An implementation that never reaches a quiescent
/// `has_active() == false` state keeps the chain alive indefinitely; the
/// controller does not guard against this.
pub trait Observer {
    /// Recompute and stage pending change state for this observer's
    /// targets.
    fn gather_active(&self);

    /// Whether staged changes are waiting to be delivered.
    fn has_active(&self) -> bool;

    /// Deliver staged changes to the observer's callback.
    fn broadcast_active(&self);
}
