use std::sync::Arc;

/// One progress update: how far the job is, in `[0, 1]`, and what it is doing.
#[derive(Clone, Debug, PartialEq)]
pub struct EnsembleProgress {
    pub fraction: f32,
    pub phase: String,
}

pub type ProgressCallback = Arc<dyn Fn(&EnsembleProgress) + Send + Sync + 'static>;

/// Per-run progress channel. Fractions never go backwards within a run.
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: f32,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: 0.0,
        }
    }

    pub fn emit(&mut self, fraction: f32, phase: impl Into<String>) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            self.last
        };
        self.last = self.last.max(fraction);

        if let Some(cb) = &self.callback {
            cb(&EnsembleProgress {
                fraction: self.last,
                phase: phase.into(),
            });
        }
    }
}
