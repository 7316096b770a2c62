#![forbid(unsafe_code)]

//! Test harness for Reflow: a deterministic host and observer doubles.
//!
//! # Role in Reflow
//! Everything the controller does is driven by host signals and timers, so
//! testing it hermetically means owning both. [`SimHost`] implements the
//! `Host` seam over a manual clock with introspectable listener storage;
//! [`ScriptedObserver`] implements the observer contract with scripted
//! pending-change behavior and records every call into a shared
//! [`CallLog`].

pub mod scripted;
pub mod sim_host;

pub use scripted::{Call, CallLog, ScriptedObserver};
pub use sim_host::SimHost;
