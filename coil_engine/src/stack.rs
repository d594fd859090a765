//! The per-frame resource stack.
//!
//! An ordered stack of active bindings, most recently entered last. The
//! stack reflects exactly the lexically-active scoped-resource blocks at
//! the owning frame's current point of execution: a binding is pushed only
//! after its manager's `acquire` has returned successfully, and popping is
//! coupled to `release` so a binding cannot leave the stack without its
//! manager being told why.
//!
//! Stacks are shallow in practice; the first few bindings live inline.

use coil_core::{Fault, HookSet, ManagerHandle, Outcome, Value};
use smallvec::SmallVec;
use std::fmt;
use tracing::trace;

/// Bindings stored inline before spilling to the heap.
pub const INLINE_BINDINGS: usize = 4;

// ============================================================================
// Binding
// ============================================================================

/// One active acquisition of a manager, tracked on a frame's stack.
///
/// The hook set is recorded once, at acquisition time. For a binding whose
/// block was statically classified as unable to suspend, the manager's
/// hooks are never even queried: the binding is a lightweight exempt
/// marker and the dispatcher skips it.
pub struct Binding {
    manager: ManagerHandle,
    bound: Value,
    hooks: HookSet,
    exempt: bool,
    continuation: u32,
}

impl Binding {
    /// Creates a binding. `continuation` is the op index execution resumes
    /// at if this binding's manager suppresses a failure.
    #[must_use]
    pub fn new(
        manager: ManagerHandle,
        bound: Value,
        hooks: HookSet,
        exempt: bool,
        continuation: u32,
    ) -> Self {
        Self {
            manager,
            bound,
            hooks,
            exempt,
            continuation,
        }
    }

    /// The manager behind this binding.
    #[inline]
    pub fn manager(&self) -> &ManagerHandle {
        &self.manager
    }

    /// The value `acquire` returned.
    #[inline]
    pub fn bound(&self) -> Value {
        self.bound
    }

    /// True if the block was classified as unable to suspend.
    #[inline]
    pub fn is_exempt(&self) -> bool {
        self.exempt
    }

    /// Where execution continues if this binding suppresses a failure.
    #[inline]
    pub fn continuation(&self) -> u32 {
        self.continuation
    }

    /// True if the dispatcher should call `on_suspend` for this binding.
    #[inline]
    pub fn has_suspend_hook(&self) -> bool {
        !self.exempt && self.hooks.contains(HookSet::SUSPEND)
    }

    /// True if the dispatcher should call `on_resume` for this binding.
    #[inline]
    pub fn has_resume_hook(&self) -> bool {
        !self.exempt && self.hooks.contains(HookSet::RESUME)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("bound", &self.bound)
            .field("hooks", &self.hooks)
            .field("exempt", &self.exempt)
            .field("continuation", &self.continuation)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Resource Stack
// ============================================================================

/// The ordered stack of active bindings owned by one frame.
#[derive(Debug)]
pub struct ResourceStack {
    entries: SmallVec<[Binding; INLINE_BINDINGS]>,
}

impl ResourceStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }

    /// Number of open bindings.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no bindings are open.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes a binding. Callers must only do this after the manager's
    /// `acquire` has returned successfully.
    #[inline]
    pub fn push(&mut self, binding: Binding) {
        self.entries.push(binding);
    }

    /// Read-only view of the bindings, least recently entered first.
    /// The dispatcher operates on this; it never mutates the stack.
    #[inline]
    pub fn snapshot(&self) -> &[Binding] {
        &self.entries
    }

    /// The continuation index of the most recently entered binding.
    #[inline]
    pub fn top_continuation(&self) -> Option<u32> {
        self.entries.last().map(Binding::continuation)
    }

    /// Pops the most recently entered binding, calling `release(outcome)`
    /// on its manager before removing it. Returns `None` on an empty
    /// stack, otherwise the release result (`Ok(true)` = suppress).
    ///
    /// The binding is destroyed regardless of whether `release` faulted;
    /// this is the guaranteed-release contract for every exit path.
    pub fn pop_release(&mut self, outcome: &Outcome) -> Option<Result<bool, Fault>> {
        let binding = self.entries.pop()?;
        trace!(depth = self.entries.len(), %outcome, "releasing binding");
        let result = binding.manager().borrow_mut().release(outcome);
        Some(result)
    }
}

impl Default for ResourceStack {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coil_core::{ScopedManager, manager::handle};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        outcomes: Rc<RefCell<Vec<Outcome>>>,
        fail_release: bool,
        suppress: bool,
    }

    impl ScopedManager for Recorder {
        fn acquire(&mut self) -> Result<Value, Fault> {
            Ok(Value::int(7))
        }

        fn release(&mut self, outcome: &Outcome) -> Result<bool, Fault> {
            self.outcomes.borrow_mut().push(outcome.clone());
            if self.fail_release {
                return Err(Fault::runtime("release failed"));
            }
            Ok(self.suppress)
        }

        fn hooks(&self) -> HookSet {
            HookSet::BOTH
        }
    }

    fn recorder(
        outcomes: &Rc<RefCell<Vec<Outcome>>>,
        fail_release: bool,
        suppress: bool,
    ) -> ManagerHandle {
        handle(Recorder {
            outcomes: Rc::clone(outcomes),
            fail_release,
            suppress,
        })
    }

    fn binding(manager: ManagerHandle, hooks: HookSet, exempt: bool) -> Binding {
        Binding::new(manager, Value::int(7), hooks, exempt, 9)
    }

    #[test]
    fn test_empty_stack() {
        let mut stack = ResourceStack::new();
        assert!(stack.is_empty());
        assert_eq!(stack.len(), 0);
        assert!(stack.snapshot().is_empty());
        assert!(stack.top_continuation().is_none());
        assert!(stack.pop_release(&Outcome::Normal).is_none());
    }

    #[test]
    fn test_push_order_is_entry_order() {
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let mut stack = ResourceStack::new();
        stack.push(Binding::new(
            recorder(&outcomes, false, false),
            Value::int(7),
            HookSet::BOTH,
            false,
            1,
        ));
        stack.push(Binding::new(
            recorder(&outcomes, false, false),
            Value::int(7),
            HookSet::BOTH,
            false,
            2,
        ));

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.snapshot()[0].continuation(), 1);
        assert_eq!(stack.snapshot()[1].continuation(), 2);
        assert_eq!(stack.top_continuation(), Some(2));
    }

    #[test]
    fn test_pop_release_passes_outcome() {
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let mut stack = ResourceStack::new();
        stack.push(binding(
            recorder(&outcomes, false, false),
            HookSet::NONE,
            false,
        ));

        let result = stack.pop_release(&Outcome::Cancelled).unwrap();
        assert_eq!(result, Ok(false));
        assert!(stack.is_empty());
        assert_eq!(outcomes.borrow().as_slice(), &[Outcome::Cancelled]);
    }

    #[test]
    fn test_pop_release_reports_suppression() {
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let mut stack = ResourceStack::new();
        stack.push(binding(
            recorder(&outcomes, false, true),
            HookSet::NONE,
            false,
        ));

        let result = stack
            .pop_release(&Outcome::Failed(Fault::runtime("boom")))
            .unwrap();
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn test_pop_release_removes_binding_even_on_fault() {
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let mut stack = ResourceStack::new();
        stack.push(binding(
            recorder(&outcomes, true, false),
            HookSet::NONE,
            false,
        ));

        let result = stack.pop_release(&Outcome::Normal).unwrap();
        assert!(result.is_err());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_binding_hook_flags() {
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let b = binding(recorder(&outcomes, false, false), HookSet::SUSPEND, false);
        assert!(b.has_suspend_hook());
        assert!(!b.has_resume_hook());
        assert!(!b.is_exempt());
    }

    #[test]
    fn test_exempt_binding_has_no_hooks() {
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let b = binding(recorder(&outcomes, false, false), HookSet::BOTH, true);
        assert!(b.is_exempt());
        assert!(!b.has_suspend_hook());
        assert!(!b.has_resume_hook());
    }

    #[test]
    fn test_binding_bound_value() {
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let b = binding(recorder(&outcomes, false, false), HookSet::NONE, false);
        assert_eq!(b.bound(), Value::int(7));
    }
}
