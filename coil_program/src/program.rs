//! Block-body programs.
//!
//! A block body is rendered as an explicit state machine: a flat op
//! sequence in which every suspension point is a numbered op index. The
//! engine resumes a frame by jumping straight to the saved index, so no
//! native stack suspension is needed and the set of suspension points is
//! known exactly before execution.
//!
//! Programs are straight-line: there are no jumps, so every op executes at
//! most once per frame activation. That is all the scoped-resource protocol
//! needs, and it keeps the classifier exact rather than heuristic.

use coil_core::{Fault, Value};
use std::fmt;

// ============================================================================
// Ops
// ============================================================================

/// One instruction of a block body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Enter a scoped-resource block: acquire the manager in `slot` and push
    /// a binding. If acquisition faults, the block is never entered.
    Enter {
        /// Index into the frame's manager slot table.
        slot: u8,
    },
    /// Exit the innermost open block: release its binding normally.
    Exit,
    /// Suspend, yielding a constant to the caller.
    Yield(Value),
    /// Suspend, yielding the accumulator (the most recently sent value).
    YieldAcc,
    /// Delegate execution to a child suspendable until it finishes; its
    /// yields suspend this frame transparently.
    Delegate {
        /// Index into the frame's child table.
        child: u8,
    },
    /// Raise a failure in the block body.
    Fail(Fault),
    /// Complete the frame with a constant result.
    Return(Value),
    /// Complete the frame with the accumulator as result.
    ReturnAcc,
}

impl Op {
    /// Returns true if this op is a suspension point: a location where the
    /// frame may yield control while blocks are open.
    ///
    /// `Delegate` counts unconditionally; anything that might delegate is
    /// treated as might-suspend.
    #[inline]
    pub const fn is_suspension_point(&self) -> bool {
        matches!(self, Self::Yield(_) | Self::YieldAcc | Self::Delegate { .. })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter { slot } => write!(f, "enter {slot}"),
            Self::Exit => f.write_str("exit"),
            Self::Yield(v) => write!(f, "yield {v}"),
            Self::YieldAcc => f.write_str("yield acc"),
            Self::Delegate { child } => write!(f, "delegate {child}"),
            Self::Fail(fault) => write!(f, "fail {fault}"),
            Self::Return(v) => write!(f, "return {v}"),
            Self::ReturnAcc => f.write_str("return acc"),
        }
    }
}

// ============================================================================
// Block Code
// ============================================================================

/// A compiled block-body program.
///
/// Immutable once built; shared by reference between the frame that executes
/// it and the shape computed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCode {
    /// Program name, used in trace output.
    pub name: String,
    /// The op sequence. Falling off the end completes the frame with `None`.
    pub ops: Vec<Op>,
}

impl BlockCode {
    /// Creates a program from a name and op sequence.
    #[must_use]
    pub fn new(name: impl Into<String>, ops: Vec<Op>) -> Self {
        Self {
            name: name.into(),
            ops,
        }
    }

    /// Gets the op at `index`, if in range.
    #[inline]
    pub fn op(&self, index: u32) -> Option<&Op> {
        self.ops.get(index as usize)
    }

    /// Number of ops.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the program is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent builder for block programs.
///
/// ```
/// use coil_core::Value;
/// use coil_program::BlockCodeBuilder;
///
/// let code = BlockCodeBuilder::new("pair")
///     .enter(0)
///     .enter(1)
///     .yield_value(Value::int(1))
///     .exit()
///     .exit()
///     .build();
/// assert_eq!(code.len(), 5);
/// ```
#[derive(Debug)]
pub struct BlockCodeBuilder {
    name: String,
    ops: Vec<Op>,
}

impl BlockCodeBuilder {
    /// Creates a builder for a named program.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ops: Vec::new(),
        }
    }

    /// Emits `Enter { slot }`.
    #[must_use]
    pub fn enter(mut self, slot: u8) -> Self {
        self.ops.push(Op::Enter { slot });
        self
    }

    /// Emits `Exit`.
    #[must_use]
    pub fn exit(mut self) -> Self {
        self.ops.push(Op::Exit);
        self
    }

    /// Emits `Yield(value)`.
    #[must_use]
    pub fn yield_value(mut self, value: Value) -> Self {
        self.ops.push(Op::Yield(value));
        self
    }

    /// Emits `YieldAcc`.
    #[must_use]
    pub fn yield_acc(mut self) -> Self {
        self.ops.push(Op::YieldAcc);
        self
    }

    /// Emits `Delegate { child }`.
    #[must_use]
    pub fn delegate(mut self, child: u8) -> Self {
        self.ops.push(Op::Delegate { child });
        self
    }

    /// Emits `Fail(fault)`.
    #[must_use]
    pub fn fail(mut self, fault: Fault) -> Self {
        self.ops.push(Op::Fail(fault));
        self
    }

    /// Emits `Return(value)`.
    #[must_use]
    pub fn ret(mut self, value: Value) -> Self {
        self.ops.push(Op::Return(value));
        self
    }

    /// Emits `ReturnAcc`.
    #[must_use]
    pub fn ret_acc(mut self) -> Self {
        self.ops.push(Op::ReturnAcc);
        self
    }

    /// Finalizes the program.
    #[must_use]
    pub fn build(self) -> BlockCode {
        BlockCode::new(self.name, self.ops)
    }
}

// ============================================================================
// Tests
// ============================================================================
