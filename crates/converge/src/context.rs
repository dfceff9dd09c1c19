//! Progress and confirmation callbacks.
//!
//! These traits let the engine report execution progress and ask for
//! confirmation without depending on any terminal UI implementation.

use crate::diff::ChangeAction;
use crate::types::{Address, ApplyResult};
use anyhow::Result;

/// Progress callback for plan execution
pub trait ProgressCallback: Send {
    /// Called when a phase of changes begins ("destroy", "apply", "rollback")
    fn on_phase_start(&mut self, count: usize, phase: &str);

    /// Called when a single change starts
    fn on_change_start(&mut self, address: &Address, action: ChangeAction);

    /// Called when a change completes
    fn on_change_complete(&mut self, address: &Address, result: &ApplyResult);

    /// Called when a phase completes
    fn on_phase_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&mut self, _count: usize, _phase: &str) {}
    fn on_change_start(&mut self, _address: &Address, _action: ChangeAction) {}
    fn on_change_complete(&mut self, _address: &Address, _result: &ApplyResult) {}
    fn on_phase_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
