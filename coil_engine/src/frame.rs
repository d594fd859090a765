//! The frame execution engine.
//!
//! A `Frame` is one activation of a block program. It owns the resource
//! stack for its lexically-active blocks and drives the whole protocol:
//!
//! - On `Enter`, acquire the manager and push a binding (or, for blocks the
//!   classifier proved unable to suspend, a lightweight exempt marker).
//! - Before yielding control, run the dispatcher's suspend pass; after
//!   being resumed, run the resume pass before any host code continues.
//! - On completion, failure, or cancellation, release every open binding
//!   in reverse-entry order, with the failure outcome when there is one.
//! - While delegating, an inner suspension suspends this frame too: the
//!   inner frame suspends first, then this frame's suspend pass runs, and
//!   on resumption this frame's resume pass runs before the input is
//!   forwarded down.
//!
//! A failure unwinding through the stack may be suppressed by any
//! binding's `release`; execution then continues after that binding's
//! block. Hook failures are different: the dispatch pass aborts, every
//! active binding is force-released without suppression, and the original
//! hook fault is surfaced with the swallowed teardown faults attached.

use crate::delegate::{Delegation, ForwardSignal, Suspendable};
use crate::dispatch;
use crate::error::{EngineError, EngineResult};
use crate::stack::{Binding, ResourceStack};
use crate::state::{FrameHeader, FrameState};
use coil_core::{Fault, HookSet, ManagerHandle, Outcome, Value};
use coil_program::{BlockCode, CodeShape, Op, classify};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

// ============================================================================
// Resume Result
// ============================================================================

/// What a `resume` (or `throw`) call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeResult {
    /// The frame suspended, yielding a value.
    Yielded(Value),
    /// The frame ran to completion with a result.
    Completed(Value),
    /// The frame failed; it will never run again.
    Failed(EngineError),
}

impl ResumeResult {
    /// Returns true if the frame suspended.
    #[inline]
    pub fn is_yielded(&self) -> bool {
        matches!(self, Self::Yielded(_))
    }

    /// Returns true if the frame completed normally.
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns true if the frame failed.
    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The yielded value, if any.
    #[inline]
    pub fn yielded(&self) -> Option<Value> {
        match self {
            Self::Yielded(value) => Some(*value),
            _ => None,
        }
    }

    /// The completion result, if any.
    #[inline]
    pub fn completed(&self) -> Option<Value> {
        match self {
            Self::Completed(value) => Some(*value),
            _ => None,
        }
    }

    /// The failure, if any.
    #[inline]
    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One activation of a block program.
pub struct Frame {
    code: Rc<BlockCode>,
    shape: CodeShape,
    slots: Vec<ManagerHandle>,
    children: Vec<Option<Box<dyn Suspendable>>>,
    delegation: Option<Delegation>,
    stack: ResourceStack,
    header: FrameHeader,
    acc: Value,
}

impl Frame {
    /// Creates a frame over `code` with its manager slot table.
    ///
    /// The program is validated and classified here, once; a malformed
    /// program or a missing slot is rejected before anything runs.
    pub fn new(code: Rc<BlockCode>, slots: Vec<ManagerHandle>) -> EngineResult<Self> {
        Self::with_children(code, slots, Vec::new())
    }

    /// Creates a frame that can delegate to the given children.
    pub fn with_children(
        code: Rc<BlockCode>,
        slots: Vec<ManagerHandle>,
        children: Vec<Box<dyn Suspendable>>,
    ) -> EngineResult<Self> {
        let shape = classify::analyze(&code)?;
        if slots.len() < shape.slots_used() {
            return Err(EngineError::MissingManager {
                slot: shape.slots_used() - 1,
                provided: slots.len(),
            });
        }
        if children.len() < shape.children_used() {
            return Err(EngineError::MissingChild {
                child: shape.children_used() - 1,
                provided: children.len(),
            });
        }
        Ok(Self {
            code,
            shape,
            slots,
            children: children.into_iter().map(Some).collect(),
            delegation: None,
            stack: ResourceStack::new(),
            header: FrameHeader::new(),
            acc: Value::none(),
        })
    }

    /// The program name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.code.name
    }

    /// Current execution state.
    #[inline]
    pub fn state(&self) -> FrameState {
        self.header.state()
    }

    /// Number of currently open bindings.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Resumes the frame with an input value.
    ///
    /// Valid from `Ready` (first start) or `Suspended`. On resumption the
    /// dispatcher's resume pass runs over the open bindings before any
    /// block code continues; while delegating, the input is forwarded down
    /// into the inner frame only after that pass succeeds.
    pub fn resume(&mut self, input: Value) -> ResumeResult {
        match self.header.state() {
            FrameState::Ready => {
                trace!(frame = self.name(), "starting");
                self.header.set_state(FrameState::Running);
                self.acc = input;
                self.run(0)
            }
            FrameState::Suspended => {
                let ip = self.header.resume_ip();
                trace!(frame = self.name(), ip, "resuming");
                self.header.set_state(FrameState::Running);
                if let Err(err) = self.run_resume_pass() {
                    return ResumeResult::Failed(err);
                }
                self.acc = input;
                if self.delegation.is_some() {
                    self.step_delegation(ip, input)
                } else {
                    self.run(ip)
                }
            }
            FrameState::Running => ResumeResult::Failed(EngineError::AlreadyRunning),
            state => ResumeResult::Failed(EngineError::NotResumable { state }),
        }
    }

    /// Injects a failure at the current suspension point.
    ///
    /// From `Suspended`, the resume pass runs first — the failure lands
    /// lexically inside every open block, so their managers must be
    /// re-entered — and then unwinds with normal suppression semantics.
    /// From `Ready`, the frame is torn down before ever running.
    pub fn throw(&mut self, fault: Fault) -> ResumeResult {
        match self.header.state() {
            FrameState::Ready => {
                trace!(frame = self.name(), %fault, "thrown into unstarted frame");
                self.header.fail();
                ResumeResult::Failed(EngineError::Body(fault))
            }
            FrameState::Suspended => {
                self.header.set_state(FrameState::Running);
                if let Err(err) = self.run_resume_pass() {
                    return ResumeResult::Failed(err);
                }
                if let Some(mut delegation) = self.delegation.take() {
                    if let Err(err) = delegation.cancel() {
                        debug!(
                            frame = self.name(),
                            error = %err,
                            "delegated frame teardown failed during throw"
                        );
                    }
                }
                self.fail_with(EngineError::Body(fault))
            }
            FrameState::Running => ResumeResult::Failed(EngineError::AlreadyRunning),
            state => ResumeResult::Failed(EngineError::NotResumable { state }),
        }
    }

    /// Tears down a suspended (or never-started) frame.
    ///
    /// No resume pass runs: every open binding is released innermost-first
    /// with `Outcome::Cancelled` and no `on_resume` call. Teardown always
    /// runs to the bottom of the stack; the first release failure is
    /// surfaced after it finishes. Cancelling a terminal frame is a no-op.
    pub fn cancel(&mut self) -> EngineResult<()> {
        match self.header.state() {
            FrameState::Ready => {
                self.header.complete();
                Ok(())
            }
            FrameState::Suspended => {
                trace!(frame = self.name(), "cancelling");
                let mut first_err: Option<EngineError> = None;
                if let Some(mut delegation) = self.delegation.take() {
                    if let Err(err) = delegation.cancel() {
                        debug!(
                            frame = self.name(),
                            error = %err,
                            "delegated frame cancellation failed"
                        );
                        first_err = Some(err);
                    }
                }
                while let Some(result) = self.stack.pop_release(&Outcome::Cancelled) {
                    if let Err(fault) = result {
                        debug!(
                            frame = self.name(),
                            %fault,
                            "release failed during cancellation"
                        );
                        if first_err.is_none() {
                            first_err = Some(EngineError::Release(fault));
                        }
                    }
                }
                match first_err {
                    Some(err) => {
                        self.header.fail();
                        Err(err)
                    }
                    None => {
                        self.header.complete();
                        Ok(())
                    }
                }
            }
            FrameState::Running => Err(EngineError::AlreadyRunning),
            FrameState::Completed | FrameState::Failed => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    fn run(&mut self, mut ip: u32) -> ResumeResult {
        let code = Rc::clone(&self.code);
        loop {
            let Some(op) = code.op(ip) else {
                // Fell off the end: implicit completion.
                return self.complete(Value::none());
            };
            trace!(frame = self.name(), ip, op = %op, "executing");
            match op {
                Op::Enter { slot } => match self.enter_block(ip, *slot) {
                    Ok(()) => ip += 1,
                    Err(err) => return self.fail_with(err),
                },
                Op::Exit => {
                    let Some(result) = self.stack.pop_release(&Outcome::Normal) else {
                        // Balanced by classification.
                        unreachable!("exit with no open block");
                    };
                    match result {
                        // Nothing to suppress on a normal exit.
                        Ok(_) => ip += 1,
                        Err(fault) => return self.fail_with(EngineError::Release(fault)),
                    }
                }
                Op::Yield(value) => return self.suspend_at(ip + 1, *value),
                Op::YieldAcc => {
                    let value = self.acc;
                    return self.suspend_at(ip + 1, value);
                }
                Op::Delegate { child } => {
                    let Some(inner) = self.children[*child as usize].take() else {
                        // Single use per child, enforced by classification.
                        unreachable!("child delegated twice");
                    };
                    self.delegation = Some(Delegation::new(inner));
                    return self.step_delegation(ip, Value::none());
                }
                Op::Fail(fault) => {
                    let fault = fault.clone();
                    return self.fail_with(EngineError::Body(fault));
                }
                Op::Return(value) => return self.complete(*value),
                Op::ReturnAcc => {
                    let value = self.acc;
                    return self.complete(value);
                }
            }
        }
    }

    fn enter_block(&mut self, ip: u32, slot: u8) -> EngineResult<()> {
        let manager = Rc::clone(&self.slots[slot as usize]);
        let bound = manager
            .borrow_mut()
            .acquire()
            .map_err(EngineError::Acquisition)?;
        let Some(span) = self.shape.span_at_enter(ip) else {
            unreachable!("every enter op has a span");
        };
        let exempt = !span.may_suspend;
        let continuation = span.continuation();
        // Exempt blocks never have their hooks queried at all.
        let hooks = if exempt {
            HookSet::NONE
        } else {
            manager.borrow().hooks()
        };
        trace!(frame = self.name(), slot, exempt, "block entered");
        self.stack
            .push(Binding::new(manager, bound, hooks, exempt, continuation));
        Ok(())
    }

    /// Suspends the frame: suspend pass, then park at `resume_ip`.
    fn suspend_at(&mut self, resume_ip: u32, value: Value) -> ResumeResult {
        if let Err(hook) = dispatch::suspend_pass(&self.stack) {
            debug!(
                frame = self.name(),
                fault = %hook.fault,
                "suspend hook failed; forcing teardown"
            );
            let teardown = self.force_teardown(&Outcome::Failed(hook.fault.clone()));
            self.header.fail();
            return ResumeResult::Failed(EngineError::SuspendHook {
                fault: hook.fault,
                teardown,
            });
        }
        self.header.suspend(resume_ip);
        trace!(frame = self.name(), resume_ip, "suspended");
        ResumeResult::Yielded(value)
    }

    /// Drives the active delegation one step with `input`.
    ///
    /// `ip` is the index of the `Delegate` op; the frame parks on it while
    /// the inner suspendable is suspended.
    fn step_delegation(&mut self, ip: u32, input: Value) -> ResumeResult {
        let Some(mut delegation) = self.delegation.take() else {
            unreachable!("no active delegation");
        };
        match delegation.step(input) {
            ForwardSignal::Suspended(value) => {
                // Inner frame suspended first; now interpose our own pass.
                self.delegation = Some(delegation);
                self.suspend_at(ip, value)
            }
            ForwardSignal::Finished(value) => {
                self.acc = value;
                self.run(ip + 1)
            }
            ForwardSignal::Failed(err) => self.fail_with(err),
        }
    }

    /// Releases all remaining bindings normally and completes the frame.
    fn complete(&mut self, value: Value) -> ResumeResult {
        while let Some(result) = self.stack.pop_release(&Outcome::Normal) {
            if let Err(fault) = result {
                // The completion value is abandoned; the release failure
                // unwinds through the remaining bindings instead.
                return self.fail_with(EngineError::Release(fault));
            }
        }
        self.header.complete();
        trace!(frame = self.name(), %value, "completed");
        ResumeResult::Completed(value)
    }

    /// Runs the resume pass, forcing teardown if a hook faults.
    fn run_resume_pass(&mut self) -> EngineResult<()> {
        if let Err(hook) = dispatch::resume_pass(&self.stack) {
            debug!(
                frame = self.name(),
                fault = %hook.fault,
                "resume hook failed; forcing teardown"
            );
            let teardown = self.force_teardown(&Outcome::Failed(hook.fault.clone()));
            self.header.fail();
            return Err(EngineError::ResumeHook {
                fault: hook.fault,
                teardown,
            });
        }
        Ok(())
    }

    /// Unwinds `err` through the open bindings, innermost first.
    ///
    /// A binding whose manager suppresses the failure stops propagation
    /// and execution continues after its block. A fault from `release`
    /// replaces the surfaced error (the displaced one is logged, per the
    /// never-silently-dropped policy) and keeps unwinding.
    fn fail_with(&mut self, err: EngineError) -> ResumeResult {
        let mut err = err;
        let mut fault = outcome_fault(&err);
        loop {
            let Some(continuation) = self.stack.top_continuation() else {
                self.header.fail();
                trace!(frame = self.name(), error = %err, "failed");
                return ResumeResult::Failed(err);
            };
            let Some(result) = self.stack.pop_release(&Outcome::Failed(fault.clone())) else {
                unreachable!("continuation implies an open binding");
            };
            match result {
                Ok(true) => {
                    trace!(frame = self.name(), continuation, "failure suppressed");
                    return self.run(continuation);
                }
                Ok(false) => {}
                Err(release_fault) => {
                    debug!(
                        frame = self.name(),
                        displaced = %err,
                        "release failed while unwinding"
                    );
                    err = EngineError::Release(release_fault.clone());
                    fault = release_fault;
                }
            }
        }
    }

    /// Releases every open binding with `outcome`, honoring no suppression
    /// and collecting (rather than surfacing) any faults. Used after a
    /// hook failure, when the frame is already doomed.
    fn force_teardown(&mut self, outcome: &Outcome) -> Vec<Fault> {
        let mut swallowed = Vec::new();
        if let Some(mut delegation) = self.delegation.take() {
            if let Err(err) = delegation.cancel() {
                debug!(
                    frame = self.name(),
                    error = %err,
                    "delegated frame teardown failed"
                );
                swallowed.push(outcome_fault(&err));
            }
        }
        while let Some(result) = self.stack.pop_release(outcome) {
            if let Err(fault) = result {
                debug!(
                    frame = self.name(),
                    %fault,
                    "release failed during forced teardown"
                );
                swallowed.push(fault);
            }
        }
        swallowed
    }
}

/// The fault to hand to `release` while unwinding `err`.
fn outcome_fault(err: &EngineError) -> Fault {
    err.fault()
        .cloned()
        .unwrap_or_else(|| Fault::new("EngineError", err.to_string()))
}

impl Suspendable for Frame {
    fn resume(&mut self, input: Value) -> ResumeResult {
        Frame::resume(self, input)
    }

    fn cancel(&mut self) -> EngineResult<()> {
        Frame::cancel(self)
    }

    fn is_finished(&self) -> bool {
        self.header.state().is_terminal()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("name", &self.code.name)
            .field("header", &self.header)
            .field("depth", &self.stack.len())
            .field("delegating", &self.delegation.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
