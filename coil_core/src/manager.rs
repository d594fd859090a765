//! The scoped-resource manager protocol.
//!
//! A manager is any value exposing the acquire/release contract. Managers
//! that care about suspension additionally implement `on_suspend` and
//! `on_resume` and advertise them through [`ScopedManager::hooks`]; the
//! defaults are no-ops, so a manager written against the pre-existing
//! contract behaves identically whether or not a suspension occurs inside
//! its block.
//!
//! # Hook contract
//!
//! - `on_suspend` is called once per suspension while the binding is open,
//!   most recently entered binding first.
//! - `on_resume` mirrors it, least recently entered binding first. Every
//!   suspend call is paired with exactly one resume call before `release`,
//!   unless the frame is cancelled while suspended, in which case `release`
//!   still runs and `on_resume` does not.
//! - Hooks must be fast, synchronous, and must not themselves suspend.
//!
//! # Asynchronous managers
//!
//! Managers whose own acquire/release may themselves suspend are outside
//! this protocol. Whether they need separate hook methods or can reuse the
//! synchronous ones is deliberately unresolved; [`HookSet`] reserves the
//! `ASYNC_SUSPEND`/`ASYNC_RESUME` bits as the extension point, and no engine
//! path inspects them.

use crate::error::Fault;
use crate::outcome::Outcome;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// Hook Set
// ============================================================================

/// Packed advertisement of which optional hooks a manager implements.
///
/// Recorded on a binding at acquisition time so the dispatcher can skip
/// hook-less bindings without dynamic probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookSet(u8);

impl HookSet {
    /// No optional hooks; the pre-existing acquire/release contract only.
    pub const NONE: Self = Self(0);
    /// The manager implements `on_suspend`.
    pub const SUSPEND: Self = Self(0b0001);
    /// The manager implements `on_resume`.
    pub const RESUME: Self = Self(0b0010);
    /// Both synchronous hooks.
    pub const BOTH: Self = Self(0b0011);
    /// Reserved: asynchronous suspend hook (unresolved extension point).
    pub const ASYNC_SUSPEND: Self = Self(0b0100);
    /// Reserved: asynchronous resume hook (unresolved extension point).
    pub const ASYNC_RESUME: Self = Self(0b1000);

    /// Returns true if this set contains all bits of `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of self and other.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the raw bits.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for HookSet {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

// ============================================================================
// Scoped Manager
// ============================================================================

/// A shared, single-threaded handle to a manager.
///
/// One manager instance may be passed into several frames, each opening its
/// own binding on it; the protocol places no synchronization obligation on
/// the manager beyond its own reentrancy contract.
pub type ManagerHandle = Rc<RefCell<dyn ScopedManager>>;

/// The scoped-resource manager contract.
pub trait ScopedManager {
    /// Short label used in trace output.
    fn name(&self) -> &str {
        "<manager>"
    }

    /// Enters the resource. The returned value is bound for the lifetime of
    /// the block. A fault here means the block is never entered.
    fn acquire(&mut self) -> Result<Value, Fault>;

    /// Exits the resource. Called exactly once per successful `acquire`, on
    /// every exit path. Returning `Ok(true)` for a failed outcome suppresses
    /// the failure, stopping its propagation at this binding.
    fn release(&mut self, outcome: &Outcome) -> Result<bool, Fault>;

    /// Advertises which optional hooks this manager implements.
    fn hooks(&self) -> HookSet {
        HookSet::NONE
    }

    /// Called when the owning frame suspends while this binding is open.
    /// Must not itself suspend.
    fn on_suspend(&mut self) -> Result<(), Fault> {
        Ok(())
    }

    /// Called when the owning frame resumes while this binding is open.
    /// Must not itself suspend.
    fn on_resume(&mut self) -> Result<(), Fault> {
        Ok(())
    }
}

/// Wraps a manager into a shared handle.
#[must_use]
pub fn handle<M: ScopedManager + 'static>(manager: M) -> ManagerHandle {
    Rc::new(RefCell::new(manager))
}

// ============================================================================
// Tests
// ============================================================================
