//! Engine error types.
//!
//! One enum covers the whole failure taxonomy: acquisition failures (block
//! never entered), hook failures (dispatch pass aborted, frame force-torn
//! down), body and release failures (unwound with suppression semantics),
//! protocol misuse, and malformed programs. Failures arising inside a
//! delegated frame are forwarded unchanged, so they need no variant of
//! their own.

use crate::state::FrameState;
use coil_core::Fault;
use coil_program::ShapeError;
use thiserror::Error;

/// The result type used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// An error surfaced by frame execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A manager's `acquire` faulted; its block was never entered.
    #[error("acquisition failed: {0}")]
    Acquisition(Fault),

    /// An `on_suspend` hook faulted. The pass was aborted and every active
    /// binding was released; faults swallowed during that forced teardown
    /// are carried here rather than dropped.
    #[error("suspend hook failed: {fault}")]
    SuspendHook {
        /// The hook fault.
        fault: Fault,
        /// Faults raised by `release` during the forced teardown.
        teardown: Vec<Fault>,
    },

    /// An `on_resume` hook faulted. Same forced-teardown policy as
    /// [`EngineError::SuspendHook`].
    #[error("resume hook failed: {fault}")]
    ResumeHook {
        /// The hook fault.
        fault: Fault,
        /// Faults raised by `release` during the forced teardown.
        teardown: Vec<Fault>,
    },

    /// The block body faulted and no manager suppressed it.
    #[error("{0}")]
    Body(Fault),

    /// A `release` call faulted during unwinding or completion.
    #[error("release failed: {0}")]
    Release(Fault),

    /// `resume` or `throw` called on a terminal frame.
    #[error("frame is not resumable from state {state}")]
    NotResumable {
        /// The state the frame was in.
        state: FrameState,
    },

    /// The frame is already executing (reentrant call).
    #[error("frame is already executing")]
    AlreadyRunning,

    /// The program references a manager slot that was not supplied.
    #[error("program references manager slot {slot} but only {provided} were supplied")]
    MissingManager {
        /// Highest slot the program references.
        slot: usize,
        /// Number of slots supplied.
        provided: usize,
    },

    /// The program references a delegation child that was not supplied.
    #[error("program references child {child} but only {provided} were supplied")]
    MissingChild {
        /// Highest child index the program references.
        child: usize,
        /// Number of children supplied.
        provided: usize,
    },

    /// The program failed structural validation.
    #[error("malformed block program: {0}")]
    Malformed(#[from] ShapeError),
}

impl EngineError {
    /// The underlying fault, for variants that carry one.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Acquisition(fault) | Self::Body(fault) | Self::Release(fault) => Some(fault),
            Self::SuspendHook { fault, .. } | Self::ResumeHook { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Returns true for a suspend- or resume-hook failure.
    #[must_use]
    pub fn is_hook_failure(&self) -> bool {
        matches!(self, Self::SuspendHook { .. } | Self::ResumeHook { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_acquisition() {
        let err = EngineError::Acquisition(Fault::new("IoError", "denied"));
        assert_eq!(err.to_string(), "acquisition failed: IoError: denied");
    }

    #[test]
    fn test_display_body_is_bare_fault() {
        let err = EngineError::Body(Fault::runtime("boom"));
        assert_eq!(err.to_string(), "RuntimeError: boom");
    }

    #[test]
    fn test_display_not_resumable() {
        let err = EngineError::NotResumable {
            state: FrameState::Completed,
        };
        assert_eq!(
            err.to_string(),
            "frame is not resumable from state COMPLETED"
        );
    }

    #[test]
    fn test_fault_accessor() {
        let fault = Fault::runtime("x");
        assert_eq!(
            EngineError::Body(fault.clone()).fault(),
            Some(&fault)
        );
        assert_eq!(
            EngineError::SuspendHook {
                fault: fault.clone(),
                teardown: vec![],
            }
            .fault(),
            Some(&fault)
        );
        assert_eq!(EngineError::AlreadyRunning.fault(), None);
    }

    #[test]
    fn test_is_hook_failure() {
        let fault = Fault::runtime("x");
        assert!(
            EngineError::ResumeHook {
                fault: fault.clone(),
                teardown: vec![],
            }
            .is_hook_failure()
        );
        assert!(!EngineError::Body(fault).is_hook_failure());
    }

    #[test]
    fn test_shape_error_converts() {
        let err: EngineError = ShapeError::ExitWithoutEnter { at: 3 }.into();
        assert!(matches!(err, EngineError::Malformed(_)));
        assert!(err.to_string().contains("no matching enter"));
    }
}
