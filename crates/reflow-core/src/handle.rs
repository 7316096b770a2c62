#![forbid(unsafe_code)]

//! Opaque element and window handles.
//!
//! Hosts mint these; the runtime only forwards them. A [`TargetHandle`]
//! identifies an observed element and is used for exactly one thing:
//! resolving the window whose signals cover it.

/// Opaque reference to an observed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u64);

impl TargetHandle {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Opaque reference to the window owning a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(u64);

impl WindowHandle {
    /// The window a detached or host-less target resolves to.
    pub const DETACHED: WindowHandle = WindowHandle(0);

    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}
