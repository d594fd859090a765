//! Suspension-aware frame execution engine.
//!
//! This crate executes block programs as resumable frames and keeps
//! scoped-resource blocks correctly scoped across suspension points: every
//! time control leaves or re-enters a frame, the managers of the blocks
//! open at that point are notified in nested order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                        Frame                         │
//! ├──────────────────────────────────────────────────────┤
//! │  BlockCode + CodeShape   (what to run, block spans)  │
//! │  FrameHeader             (state + resume index)      │
//! │  ResourceStack           (active bindings)           │
//! │  Delegation slot         (inner frame, if any)       │
//! ├──────────────────────────────────────────────────────┤
//! │  suspend:  dispatcher walks stack top → bottom       │
//! │  resume:   dispatcher walks stack bottom → top       │
//! │  delegate: inner suspension suspends this frame too  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Ordering guarantee
//!
//! For bindings A entered before B on one stack, A's suspend hook fires
//! after B's and A's resume hook fires before B's. This holds across
//! delegation: `enter M; delegate inner` produces the same hook sequence
//! as inlining the inner program under `M`.

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::new_without_default)]

pub mod delegate;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod stack;
pub mod state;

pub use delegate::{Delegation, ForwardSignal, Suspendable};
pub use dispatch::{HookFault, resume_pass, suspend_pass};
pub use error::{EngineError, EngineResult};
pub use frame::{Frame, ResumeResult};
pub use stack::{Binding, INLINE_BINDINGS, ResourceStack};
pub use state::{FrameHeader, FrameState};
