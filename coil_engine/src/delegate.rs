//! The delegation forwarder.
//!
//! Plain suspension, delegated iteration, and delegated awaited
//! computations are three faces of one capability: something that can be
//! resumed with a value and either suspends again, finishes, or fails.
//! [`Suspendable`] is that capability; the forwarder is written once
//! against it rather than per variant.
//!
//! The forwarder itself adds no logic beyond interposition. When an inner
//! suspendable yields, the *outer* frame treats that as its own suspension
//! (its suspend pass runs before the value travels up); when the outer
//! frame is resumed, its resume pass runs before the input travels down.
//! Inner completions and failures pass through unchanged.

use crate::error::EngineResult;
use crate::frame::ResumeResult;
use coil_core::Value;
use std::fmt;

// ============================================================================
// Suspendable
// ============================================================================

/// Anything that can be suspended and resumed, producing/consuming values.
pub trait Suspendable {
    /// Resumes with an input value.
    fn resume(&mut self, input: Value) -> ResumeResult;

    /// Tears down without resuming; open bindings are released with a
    /// cancellation outcome.
    fn cancel(&mut self) -> EngineResult<()>;

    /// True once the suspendable will never run again.
    fn is_finished(&self) -> bool;
}

// ============================================================================
// Forward Signal
// ============================================================================

/// What a delegation step told the outer frame.
#[derive(Debug)]
pub enum ForwardSignal {
    /// The inner suspendable yielded; the outer frame must now suspend too,
    /// forwarding the value upward.
    Suspended(Value),
    /// The inner suspendable completed with a result; delegation is over.
    Finished(Value),
    /// The inner suspendable failed; the error is forwarded unchanged.
    Failed(crate::error::EngineError),
}

// ============================================================================
// Delegation
// ============================================================================

/// An active delegation to an inner suspendable.
pub struct Delegation {
    inner: Box<dyn Suspendable>,
}

impl Delegation {
    /// Begins delegating to `inner`.
    #[must_use]
    pub fn new(inner: Box<dyn Suspendable>) -> Self {
        Self { inner }
    }

    /// Drives the inner suspendable one step with `input` and classifies
    /// the result for the outer frame.
    pub fn step(&mut self, input: Value) -> ForwardSignal {
        match self.inner.resume(input) {
            ResumeResult::Yielded(value) => ForwardSignal::Suspended(value),
            ResumeResult::Completed(value) => ForwardSignal::Finished(value),
            ResumeResult::Failed(err) => ForwardSignal::Failed(err),
        }
    }

    /// Cancels the inner suspendable.
    pub fn cancel(&mut self) -> EngineResult<()> {
        self.inner.cancel()
    }
}

impl fmt::Debug for Delegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegation")
            .field("finished", &self.inner.is_finished())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
