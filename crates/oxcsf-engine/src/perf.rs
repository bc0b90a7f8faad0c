//! Windowed performance tracking for the trial loops.

/// Aggregates per-trial losses and emits a summary once per window.
#[derive(Debug)]
pub struct PerfTracker {
    window: u32,
    count: u32,
    train_sum: f64,
    test_sum: f64,
    saw_test: bool,
}

/// One window's averages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfSummary {
    /// Trials completed so far.
    pub trials: u32,
    /// Mean training loss over the window.
    pub train: f64,
    /// Mean test loss over the window, when test samples were scored.
    pub test: Option<f64>,
}

impl PerfTracker {
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            count: 0,
            train_sum: 0.0,
            test_sum: 0.0,
            saw_test: false,
        }
    }

    /// Records one trial's losses; returns the summary when a window
    /// completes.
    pub fn record(&mut self, trials: u32, train: f64, test: Option<f64>) -> Option<PerfSummary> {
        self.count += 1;
        self.train_sum += train;
        if let Some(test) = test {
            self.test_sum += test;
            self.saw_test = true;
        }
        if self.count < self.window {
            return None;
        }
        let summary = PerfSummary {
            trials,
            train: self.train_sum / f64::from(self.count),
            test: self
                .saw_test
                .then(|| self.test_sum / f64::from(self.count)),
        };
        self.count = 0;
        self.train_sum = 0.0;
        self.test_sum = 0.0;
        self.saw_test = false;
        Some(summary)
    }
}

/// Prints one window's summary and the population shape.
pub(crate) fn print_summary(summary: &PerfSummary, num_macros: usize, total_num: u32) {
    match summary.test {
        Some(test) => eprintln!(
            "trials {:>8}: train {:.5}  test {:.5}  macros {num_macros}  num {total_num}",
            summary.trials, summary.train, test,
        ),
        None => eprintln!(
            "trials {:>8}: train {:.5}  macros {num_macros}  num {total_num}",
            summary.trials, summary.train,
        ),
    }
}
