//! Shared test doubles: a recording probe manager.
//!
//! Every probe writes `label.event` strings into a shared log, so ordering
//! assertions read as the expected hook sequence verbatim.

#![allow(dead_code)]

use coil_core::manager::handle;
use coil_core::{Fault, HookSet, ManagerHandle, Outcome, ScopedManager, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared event log.
pub type Log = Rc<RefCell<Vec<String>>>;

/// Creates an empty log.
pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Snapshots the log contents.
pub fn events(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// A configurable recording manager.
pub struct Probe {
    label: &'static str,
    log: Log,
    hooks: HookSet,
    suppress: bool,
    fail_acquire: bool,
    fail_suspend: bool,
    fail_resume: bool,
    fail_release: bool,
}

impl Probe {
    /// A probe with both hooks and no failure modes.
    pub fn new(label: &'static str, log: &Log) -> Self {
        Self {
            label,
            log: Rc::clone(log),
            hooks: HookSet::BOTH,
            suppress: false,
            fail_acquire: false,
            fail_suspend: false,
            fail_resume: false,
            fail_release: false,
        }
    }

    /// Advertises no hooks: the pre-existing acquire/release contract only.
    pub fn hookless(mut self) -> Self {
        self.hooks = HookSet::NONE;
        self
    }

    /// `release` suppresses failed outcomes.
    pub fn suppressing(mut self) -> Self {
        self.suppress = true;
        self
    }

    /// `acquire` faults.
    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    /// `on_suspend` faults.
    pub fn failing_suspend(mut self) -> Self {
        self.fail_suspend = true;
        self
    }

    /// `on_resume` faults.
    pub fn failing_resume(mut self) -> Self {
        self.fail_resume = true;
        self
    }

    /// `release` faults.
    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Wraps into a shared handle.
    pub fn into_handle(self) -> ManagerHandle {
        handle(self)
    }

    fn record(&self, event: &str) {
        self.log.borrow_mut().push(format!("{}.{event}", self.label));
    }
}

impl ScopedManager for Probe {
    fn name(&self) -> &str {
        self.label
    }

    fn acquire(&mut self) -> Result<Value, Fault> {
        self.record("acquire");
        if self.fail_acquire {
            return Err(Fault::new("AcquireError", format!("{} denied", self.label)));
        }
        Ok(Value::int(1))
    }

    fn release(&mut self, outcome: &Outcome) -> Result<bool, Fault> {
        let tag = match outcome {
            Outcome::Normal => "normal",
            Outcome::Failed(_) => "failed",
            Outcome::Cancelled => "cancelled",
        };
        self.record(&format!("release:{tag}"));
        if self.fail_release {
            return Err(Fault::new(
                "ReleaseError",
                format!("{} stuck", self.label),
            ));
        }
        Ok(self.suppress && outcome.is_failed())
    }

    fn hooks(&self) -> HookSet {
        self.hooks
    }

    fn on_suspend(&mut self) -> Result<(), Fault> {
        self.record("suspend");
        if self.fail_suspend {
            return Err(Fault::new(
                "SuspendError",
                format!("{} suspend failed", self.label),
            ));
        }
        Ok(())
    }

    fn on_resume(&mut self) -> Result<(), Fault> {
        self.record("resume");
        if self.fail_resume {
            return Err(Fault::new(
                "ResumeError",
                format!("{} resume failed", self.label),
            ));
        }
        Ok(())
    }
}
