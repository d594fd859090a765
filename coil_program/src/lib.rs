//! Block programs for the coil engine.
//!
//! This crate is the compile/build-time side of the protocol: the
//! instruction set for block bodies and the static classifier that
//! validates block structure and decides, ahead of execution, which
//! scoped-resource blocks can contain a suspension point.
//!
//! # Architecture
//!
//! ```text
//! Op sequence → Structure Validation → Suspension Classification → CodeShape
//! ```
//!
//! # Key Types
//!
//! - [`BlockCode`] - A named block-body program
//! - [`Op`] - The block-body instruction set
//! - [`BlockCodeBuilder`] - Fluent API for program construction
//! - [`CodeShape`] - Per-block spans and suspendability, computed once
//!
//! # Example
//!
//! ```
//! use coil_core::Value;
//! use coil_program::{BlockCodeBuilder, classify};
//!
//! let code = BlockCodeBuilder::new("example")
//!     .enter(0)
//!     .yield_value(Value::int(1))
//!     .exit()
//!     .build();
//!
//! let shape = classify::analyze(&code).unwrap();
//! assert_eq!(shape.block_count(), 1);
//! assert!(shape.blocks()[0].may_suspend);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod program;

pub use classify::{BlockSpan, CodeShape, ShapeError};
pub use program::{BlockCode, BlockCodeBuilder, Op};
