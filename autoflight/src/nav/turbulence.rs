//! Turbulence estimation from vertical-speed scatter.
//!
//! Keeps a rolling window of the most recent vertical-speed samples and
//! grades turbulence severity from the standard deviation and the largest
//! jump between adjacent samples. The severity feeds the autopilot-state
//! snapshot for UI display; the control loop does not change gains on it.

use std::collections::VecDeque;

/// Number of vertical-speed samples in the rolling window.
pub const WINDOW_SIZE: usize = 10;

/// Minimum samples before a severity other than 0 is reported.
const MIN_SAMPLES: usize = 3;

/// Turbulence severity monitor.
#[derive(Debug, Default)]
pub struct TurbulenceMonitor {
    samples: VecDeque<f64>,
}

impl TurbulenceMonitor {
    /// Create an empty monitor.
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_SIZE),
        }
    }

    /// Record a vertical-speed sample (fpm).
    pub fn record(&mut self, vertical_speed_fpm: f64) {
        if self.samples.len() == WINDOW_SIZE {
            self.samples.pop_front();
        }
        self.samples.push_back(vertical_speed_fpm);
    }

    /// Severity on a 0..=3 scale.
    ///
    /// | Level | Condition                      |
    /// |-------|--------------------------------|
    /// | 3     | sigma > 500 or jump > 1000 fpm |
    /// | 2     | sigma > 250 or jump > 500 fpm  |
    /// | 1     | sigma > 100 or jump > 200 fpm  |
    /// | 0     | otherwise, or < 3 samples      |
    pub fn severity(&self) -> u8 {
        if self.samples.len() < MIN_SAMPLES {
            return 0;
        }

        let sigma = self.std_dev();
        let jump = self.max_adjacent_delta();

        if sigma > 500.0 || jump > 1000.0 {
            3
        } else if sigma > 250.0 || jump > 500.0 {
            2
        } else if sigma > 100.0 || jump > 200.0 {
            1
        } else {
            0
        }
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Drop all samples (e.g. after a long telemetry gap).
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    fn std_dev(&self) -> f64 {
        let n = self.samples.len() as f64;
        let mean = self.samples.iter().sum::<f64>() / n;
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / n;
        variance.sqrt()
    }

    fn max_adjacent_delta(&self) -> f64 {
        self.samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|(a, b)| (b - a).abs())
            .fold(0.0, f64::max)
    }
}
