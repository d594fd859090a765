//! # Coil Core
//!
//! Core types for the coil scoped-resource protocol.
//!
//! This crate provides the foundational building blocks shared by the
//! program and engine crates:
//!
//! - **Value System**: Compact values yielded, sent, and bound through frames
//! - **Manager Protocol**: The acquire/release contract with optional
//!   suspend/resume hooks
//! - **Outcomes**: The normal/failed/cancelled signal passed to `release`
//! - **Faults**: Lightweight failure values raised by hooks and block bodies

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod manager;
pub mod outcome;
pub mod value;

pub use error::Fault;
pub use manager::{HookSet, ManagerHandle, ScopedManager};
pub use outcome::Outcome;
pub use value::Value;

/// Coil runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
