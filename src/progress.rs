//! Progress observers for wordlist generation and cracking.

use indicatif::ProgressBar;

use crate::crack::CrackState;

/// Receives generation progress as `(percent, label)`.
pub trait Progress: Send + Sync {
    fn update(&self, percent: f64, message: &str);
}

impl<F> Progress for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn update(&self, percent: f64, message: &str) {
        self(percent, message)
    }
}

/// Receives cracking progress as `(percent, estimated attempts)`.
pub trait CrackProgress: Send + Sync {
    fn update(&self, percent: f64, attempts: u64);

    /// Called on every orchestrator state transition.
    fn state_changed(&self, _state: CrackState) {}

    /// Forwarded generation progress while the orchestrator builds a wordlist.
    fn generation(&self, _percent: f64, _message: &str) {}
}

impl<F> CrackProgress for F
where
    F: Fn(f64, u64) + Send + Sync,
{
    fn update(&self, percent: f64, attempts: u64) {
        self(percent, attempts)
    }
}

/// Observer that drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&self, _percent: f64, _message: &str) {}
}

impl CrackProgress for NoProgress {
    fn update(&self, _percent: f64, _attempts: u64) {}
}

/// indicatif bar fed with percentages.
///
/// [`BarProgress::new`] shows the percentage itself; [`BarProgress::entries`]
/// maps it onto a known candidate count.
pub struct BarProgress {
    bar: ProgressBar,
    len: u64,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(crate::percent_progress_style());
        Self { bar, len: 100 }
    }

    pub fn entries(total: u64) -> Self {
        let len = total.max(1);
        let bar = ProgressBar::new(len);
        bar.set_style(crate::default_progress_style());
        Self { bar, len }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn set_percent(&self, percent: f64) {
        let fraction = percent.clamp(0.0, 100.0) / 100.0;
        self.bar.set_position((fraction * self.len as f64).round() as u64);
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for BarProgress {
    fn update(&self, percent: f64, message: &str) {
        self.set_percent(percent);
        self.bar.set_message(message.to_string());
    }
}

impl CrackProgress for BarProgress {
    fn update(&self, percent: f64, attempts: u64) {
        self.set_percent(percent);
        self.bar.set_message(format!("~{} attempts", attempts));
    }

    fn state_changed(&self, state: CrackState) {
        self.bar.set_prefix(state.as_str());
    }

    fn generation(&self, percent: f64, message: &str) {
        Progress::update(self, percent, message);
    }
}
