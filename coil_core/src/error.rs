//! Fault values raised by managers and block bodies.
//!
//! A [`Fault`] is the failure currency of the protocol: manager hooks raise
//! them, block bodies raise them, and `release` receives them inside a
//! failed [`Outcome`](crate::Outcome). Faults carry a kind tag and a
//! message; they deliberately hold no backtrace or source chain so they can
//! be cloned into outcomes and compared in tests.

use thiserror::Error;

/// A failure raised by a manager hook or a block body.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
#[error("{kind}: {message}")]
pub struct Fault {
    /// Classification tag, e.g. `"ValueError"` or `"IoError"`.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

impl Fault {
    /// Creates a fault with an explicit kind.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates a generic runtime fault.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new("RuntimeError", message)
    }

    /// Returns true if the fault carries the given kind tag.
    #[must_use]
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

// ============================================================================
// Tests
// ============================================================================
