//! The suspension dispatcher.
//!
//! Two pure passes over a stack snapshot, holding no state of their own:
//!
//! - **Suspend pass**: `on_suspend` top to bottom (most recently entered
//!   binding first).
//! - **Resume pass**: `on_resume` bottom to top (least recently entered
//!   binding first).
//!
//! Bindings without the relevant hook are skipped. A hook fault aborts the
//! rest of the pass; the dispatcher reports how far it got and leaves all
//! cleanup policy to the engine. No I/O happens here and nothing is
//! mutated except the managers' own state through their hooks.

use crate::stack::ResourceStack;
use coil_core::Fault;
use tracing::trace;

// ============================================================================
// Hook Fault
// ============================================================================

/// A fault raised by a hook partway through a dispatch pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFault {
    /// Snapshot index of the binding whose hook faulted (0 = bottom).
    pub depth: usize,
    /// The fault the hook raised.
    pub fault: Fault,
}

// ============================================================================
// Passes
// ============================================================================

/// Invokes `on_suspend` on every hooked binding, most recently entered
/// first. Aborts at the first fault.
pub fn suspend_pass(stack: &ResourceStack) -> Result<(), HookFault> {
    for (depth, binding) in stack.snapshot().iter().enumerate().rev() {
        if !binding.has_suspend_hook() {
            continue;
        }
        trace!(depth, "suspend hook");
        if let Err(fault) = binding.manager().borrow_mut().on_suspend() {
            return Err(HookFault { depth, fault });
        }
    }
    Ok(())
}

/// Invokes `on_resume` on every hooked binding, least recently entered
/// first. Aborts at the first fault.
pub fn resume_pass(stack: &ResourceStack) -> Result<(), HookFault> {
    for (depth, binding) in stack.snapshot().iter().enumerate() {
        if !binding.has_resume_hook() {
            continue;
        }
        trace!(depth, "resume hook");
        if let Err(fault) = binding.manager().borrow_mut().on_resume() {
            return Err(HookFault { depth, fault });
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
