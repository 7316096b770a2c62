#![forbid(unsafe_code)]

//! Signal payloads, subscription guards, and structural-watch options.
//!
//! # Design
//!
//! Subscription removal is RAII: every `Host` subscription method returns a
//! [`SignalGuard`] whose drop tears the listener down. The runtime keeps
//! guards alive for exactly as long as the matching observer is connected,
//! which makes dangling listeners unrepresentable rather than merely
//! avoided.

use std::rc::Rc;

use bitflags::bitflags;

/// Plain notification listener (resize, structural change, legacy
/// subtree-modified).
pub type SignalListener = Rc<dyn Fn()>;

/// Listener for transition-completion events.
pub type TransitionListener = Rc<dyn Fn(&TransitionEvent)>;

/// A transition-completion notification.
///
/// Only the CSS property name matters to the runtime; hosts may omit it
/// when the underlying event carries none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionEvent {
    pub property_name: Option<String>,
}

impl TransitionEvent {
    /// Event for a named CSS property.
    #[must_use]
    pub fn for_property(name: impl Into<String>) -> Self {
        Self {
            property_name: Some(name.into()),
        }
    }

    /// The property name, or the empty string when the event carried none.
    #[must_use]
    pub fn property_name(&self) -> &str {
        self.property_name.as_deref().unwrap_or("")
    }
}

bitflags! {
    /// Kinds of document structure change a structural watch reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MutationKinds: u8 {
        /// Element attribute changes.
        const ATTRIBUTES = 1 << 0;
        /// Child insertion and removal.
        const CHILD_LIST = 1 << 1;
        /// Text node content changes.
        const CHARACTER_DATA = 1 << 2;
    }
}

/// Configuration for a structural watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureWatchOptions {
    pub kinds: MutationKinds,
    /// Observe the full subtree rather than only direct children.
    pub subtree: bool,
}

impl StructureWatchOptions {
    /// Full coverage of the entire document: attributes, child list, and
    /// character data, at full subtree depth. This is the only
    /// configuration the refresh controller installs; no narrower signal
    /// reliably captures every layout-affecting change.
    #[must_use]
    pub const fn document_wide() -> Self {
        Self {
            kinds: MutationKinds::all(),
            subtree: true,
        }
    }
}

impl Default for StructureWatchOptions {
    fn default() -> Self {
        Self::document_wide()
    }
}

/// RAII guard for a native signal subscription.
///
/// Dropping the guard removes the underlying listener. Guards returned by
/// environments without the corresponding mechanism are inert.
#[must_use = "dropping a SignalGuard removes the subscription"]
pub struct SignalGuard {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl SignalGuard {
    /// Guard that runs `teardown` when dropped.
    pub fn on_drop(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Guard with no teardown action.
    #[must_use]
    pub fn inert() -> Self {
        Self { teardown: None }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl std::fmt::Debug for SignalGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalGuard")
            .field("armed", &self.teardown.is_some())
            .finish()
    }
}
