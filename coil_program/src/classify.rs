//! Static block classification.
//!
//! Runs once per program, before any frame executes it. Two jobs:
//!
//! 1. **Structure validation** — every `Exit` matches an open `Enter`, every
//!    block is closed, and no child is delegated to twice (programs are
//!    straight-line, so a second delegation could never find the child).
//! 2. **Suspension classification** — for each block, whether a suspension
//!    point is lexically reachable while the block is open. `Delegate`
//!    counts unconditionally: anything that might delegate is treated as
//!    might-suspend.
//!
//! Blocks classified as cannot-suspend are exempted from all dispatcher
//! overhead: the engine pushes a marker binding and never queries the
//! manager's hooks. This is strictly a cost optimization; exempt blocks can
//! never observe a suspension, so skipping their hooks changes nothing.

use crate::program::{BlockCode, Op};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Maximum number of blocks per program (span ids are u16).
pub const MAX_BLOCKS: usize = u16::MAX as usize;

// ============================================================================
// Shape Errors
// ============================================================================

/// A structural defect found during classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// An `Exit` op with no open block.
    #[error("exit at op {at} has no matching enter")]
    ExitWithoutEnter {
        /// Index of the offending op.
        at: u32,
    },

    /// A block left open at the end of the program.
    #[error("block entered at op {enter} is never exited")]
    UnclosedBlock {
        /// Index of the unmatched `Enter`.
        enter: u32,
    },

    /// The same child delegated to more than once.
    #[error("child {child} delegated twice, second time at op {at}")]
    ChildReused {
        /// The reused child index.
        child: u8,
        /// Index of the second `Delegate`.
        at: u32,
    },

    /// More blocks than span ids can address.
    #[error("program has {count} blocks, the limit is {MAX_BLOCKS}")]
    TooManyBlocks {
        /// Number of blocks found.
        count: usize,
    },
}

// ============================================================================
// Block Spans
// ============================================================================

/// One scoped-resource block of a program: its extent and classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// Op index of the `Enter`.
    pub enter: u32,
    /// Op index of the matching `Exit`.
    pub exit: u32,
    /// Manager slot the block binds.
    pub slot: u8,
    /// Whether a suspension point is reachable while the block is open.
    pub may_suspend: bool,
}

impl BlockSpan {
    /// The op index execution continues at when the block is left, either
    /// normally or because its manager suppressed a failure.
    #[inline]
    pub const fn continuation(&self) -> u32 {
        self.exit + 1
    }
}

// ============================================================================
// Code Shape
// ============================================================================

/// The classifier's output for one program.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeShape {
    spans: Vec<BlockSpan>,
    by_enter: FxHashMap<u32, u16>,
    slots_used: usize,
    children_used: usize,
    suspension_points: usize,
}

impl CodeShape {
    /// All block spans, in entry order.
    #[inline]
    pub fn blocks(&self) -> &[BlockSpan] {
        &self.spans
    }

    /// Number of blocks.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.spans.len()
    }

    /// The span of the block entered at `op_index`, if any.
    #[inline]
    pub fn span_at_enter(&self, op_index: u32) -> Option<&BlockSpan> {
        self.by_enter
            .get(&op_index)
            .map(|&id| &self.spans[id as usize])
    }

    /// Whether the block entered at `op_index` may suspend. `None` if no
    /// block is entered there.
    #[inline]
    pub fn may_suspend_at(&self, op_index: u32) -> Option<bool> {
        self.span_at_enter(op_index).map(|span| span.may_suspend)
    }

    /// One past the highest manager slot the program references.
    #[inline]
    pub fn slots_used(&self) -> usize {
        self.slots_used
    }

    /// One past the highest child index the program references.
    #[inline]
    pub fn children_used(&self) -> usize {
        self.children_used
    }

    /// Number of statically-known suspension points.
    #[inline]
    pub fn suspension_points(&self) -> usize {
        self.suspension_points
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Validates a program's block structure and classifies its blocks.
pub fn analyze(code: &BlockCode) -> Result<CodeShape, ShapeError> {
    let mut spans: Vec<BlockSpan> = Vec::new();
    let mut open: Vec<u16> = Vec::new();
    let mut seen_children: Vec<u8> = Vec::new();
    let mut slots_used = 0usize;
    let mut children_used = 0usize;
    let mut suspension_points = 0usize;

    for (index, op) in code.ops.iter().enumerate() {
        let at = index as u32;
        match *op {
            Op::Enter { slot } => {
                if spans.len() >= MAX_BLOCKS {
                    return Err(ShapeError::TooManyBlocks {
                        count: spans.len() + 1,
                    });
                }
                let id = spans.len() as u16;
                spans.push(BlockSpan {
                    enter: at,
                    exit: at, // patched when the Exit is found
                    slot,
                    may_suspend: false,
                });
                open.push(id);
                slots_used = slots_used.max(slot as usize + 1);
            }
            Op::Exit => {
                let id = open.pop().ok_or(ShapeError::ExitWithoutEnter { at })?;
                spans[id as usize].exit = at;
            }
            Op::Delegate { child } => {
                if seen_children.contains(&child) {
                    return Err(ShapeError::ChildReused { child, at });
                }
                seen_children.push(child);
                children_used = children_used.max(child as usize + 1);
                suspension_points += 1;
                for &id in &open {
                    spans[id as usize].may_suspend = true;
                }
            }
            Op::Yield(_) | Op::YieldAcc => {
                suspension_points += 1;
                for &id in &open {
                    spans[id as usize].may_suspend = true;
                }
            }
            Op::Fail(_) | Op::Return(_) | Op::ReturnAcc => {}
        }
    }

    if let Some(&id) = open.first() {
        return Err(ShapeError::UnclosedBlock {
            enter: spans[id as usize].enter,
        });
    }

    let by_enter = spans
        .iter()
        .enumerate()
        .map(|(id, span)| (span.enter, id as u16))
        .collect::<FxHashMap<_, _>>();

    Ok(CodeShape {
        spans,
        by_enter,
        slots_used,
        children_used,
        suspension_points,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::BlockCodeBuilder;
    use coil_core::{Fault, Value};

    // ════════════════════════════════════════════════════════════════════════
    // Structure Validation Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_empty_program() {
        let code = BlockCodeBuilder::new("empty").build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.block_count(), 0);
        assert_eq!(shape.slots_used(), 0);
        assert_eq!(shape.children_used(), 0);
        assert_eq!(shape.suspension_points(), 0);
    }

    #[test]
    fn test_exit_without_enter() {
        let code = BlockCodeBuilder::new("bad").exit().build();
        assert_eq!(
            analyze(&code),
            Err(ShapeError::ExitWithoutEnter { at: 0 })
        );
    }

    #[test]
    fn test_unclosed_block() {
        let code = BlockCodeBuilder::new("bad")
            .enter(0)
            .yield_value(Value::int(1))
            .build();
        assert_eq!(analyze(&code), Err(ShapeError::UnclosedBlock { enter: 0 }));
    }

    #[test]
    fn test_unclosed_reports_outermost() {
        let code = BlockCodeBuilder::new("bad").enter(0).enter(1).exit().build();
        // The inner block is closed; the outer one at op 0 is not.
        assert_eq!(analyze(&code), Err(ShapeError::UnclosedBlock { enter: 0 }));
    }

    #[test]
    fn test_child_reuse_rejected() {
        let code = BlockCodeBuilder::new("bad").delegate(0).delegate(0).build();
        assert_eq!(
            analyze(&code),
            Err(ShapeError::ChildReused { child: 0, at: 1 })
        );
    }

    #[test]
    fn test_distinct_children_accepted() {
        let code = BlockCodeBuilder::new("ok").delegate(0).delegate(1).build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.children_used(), 2);
        assert_eq!(shape.suspension_points(), 2);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Span Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_single_block_span() {
        let code = BlockCodeBuilder::new("g")
            .enter(3)
            .yield_value(Value::int(1))
            .exit()
            .build();
        let shape = analyze(&code).unwrap();

        assert_eq!(shape.block_count(), 1);
        let span = shape.span_at_enter(0).unwrap();
        assert_eq!(span.enter, 0);
        assert_eq!(span.exit, 2);
        assert_eq!(span.slot, 3);
        assert_eq!(span.continuation(), 3);
        assert_eq!(shape.slots_used(), 4);
    }

    #[test]
    fn test_nested_spans() {
        let code = BlockCodeBuilder::new("g")
            .enter(0)
            .enter(1)
            .yield_value(Value::int(1))
            .exit()
            .exit()
            .build();
        let shape = analyze(&code).unwrap();

        assert_eq!(shape.block_count(), 2);
        let outer = shape.span_at_enter(0).unwrap();
        let inner = shape.span_at_enter(1).unwrap();
        assert_eq!(outer.exit, 4);
        assert_eq!(inner.exit, 3);
    }

    #[test]
    fn test_sequential_spans() {
        let code = BlockCodeBuilder::new("g")
            .enter(0)
            .exit()
            .enter(1)
            .exit()
            .build();
        let shape = analyze(&code).unwrap();

        assert_eq!(shape.block_count(), 2);
        assert_eq!(shape.span_at_enter(0).unwrap().exit, 1);
        assert_eq!(shape.span_at_enter(2).unwrap().exit, 3);
        assert!(shape.span_at_enter(1).is_none());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Classification Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_block_with_yield_may_suspend() {
        let code = BlockCodeBuilder::new("g")
            .enter(0)
            .yield_value(Value::int(1))
            .exit()
            .build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.may_suspend_at(0), Some(true));
    }

    #[test]
    fn test_block_without_yield_cannot_suspend() {
        let code = BlockCodeBuilder::new("g")
            .enter(0)
            .ret(Value::int(1))
            .exit()
            .build();
        // Return inside the block: no suspension point while it is open.
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.may_suspend_at(0), Some(false));
    }

    #[test]
    fn test_yield_outside_block_does_not_mark() {
        let code = BlockCodeBuilder::new("g")
            .yield_value(Value::int(1))
            .enter(0)
            .exit()
            .yield_value(Value::int(2))
            .build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.may_suspend_at(1), Some(false));
        assert_eq!(shape.suspension_points(), 2);
    }

    #[test]
    fn test_delegate_is_conservatively_suspending() {
        let code = BlockCodeBuilder::new("g").enter(0).delegate(0).exit().build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.may_suspend_at(0), Some(true));
    }

    #[test]
    fn test_yield_acc_marks_open_blocks() {
        let code = BlockCodeBuilder::new("g").enter(0).yield_acc().exit().build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.may_suspend_at(0), Some(true));
    }

    #[test]
    fn test_inner_yield_marks_all_open_blocks() {
        let code = BlockCodeBuilder::new("g")
            .enter(0)
            .enter(1)
            .yield_value(Value::int(1))
            .exit()
            .exit()
            .build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.may_suspend_at(0), Some(true));
        assert_eq!(shape.may_suspend_at(1), Some(true));
    }

    #[test]
    fn test_mixed_suspending_and_exempt_blocks() {
        let code = BlockCodeBuilder::new("g")
            .enter(0)
            .exit()
            .enter(1)
            .yield_value(Value::int(1))
            .exit()
            .build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.may_suspend_at(0), Some(false));
        assert_eq!(shape.may_suspend_at(2), Some(true));
    }

    #[test]
    fn test_fail_is_not_a_suspension_point() {
        let code = BlockCodeBuilder::new("g")
            .enter(0)
            .fail(Fault::runtime("boom"))
            .exit()
            .build();
        let shape = analyze(&code).unwrap();
        assert_eq!(shape.may_suspend_at(0), Some(false));
        assert_eq!(shape.suspension_points(), 0);
    }
}
