//! Progress indicators for the forja CLI.

use converge::{Address, ApplyResult, ChangeAction, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a progress bar for a batch of operations
pub fn bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {msg}")
            .expect("valid progress template")
            .progress_chars("=> "),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Progress callback driving an indicatif bar during plan execution
pub struct ApplyProgress {
    enabled: bool,
    bar: Option<ProgressBar>,
}

impl ApplyProgress {
    /// Pass `enabled = false` for quiet runs; every callback becomes a no-op.
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_phase_start(&mut self, count: usize, phase: &str) {
        if self.enabled {
            self.bar = Some(bar(count as u64, phase));
        }
    }

    fn on_change_start(&mut self, address: &Address, action: ChangeAction) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{action} {address}"));
        }
    }

    fn on_change_complete(&mut self, address: &Address, result: &ApplyResult) {
        if let Some(bar) = &self.bar {
            let marker = match result {
                ApplyResult::Failed { .. } => "✗",
                _ => "✓",
            };
            bar.set_message(format!("{address} {marker}"));
            bar.inc(1);
        }
    }

    fn on_phase_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
