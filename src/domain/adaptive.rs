//! Rolling percentile thresholds over normalized volatility samples.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 100;
/// Largest trailing window a tracker may be configured with.
pub const MAX_WINDOW: usize = 100_000;
pub const LOW_PERCENTILE: f64 = 30.0;
pub const HIGH_PERCENTILE: f64 = 70.0;

/// Trailing window of samples exposing p30/p70 cutoffs.
///
/// Until the window holds `capacity` samples the configured default pair is
/// returned instead of computed percentiles.
#[derive(Debug, Clone)]
pub struct AdaptiveThresholds {
    capacity: usize,
    default: (f64, f64),
    percentiles: (f64, f64),
    samples: VecDeque<f64>,
}

impl AdaptiveThresholds {
    pub fn new(capacity: usize, default: (f64, f64)) -> Self {
        Self {
            capacity,
            default,
            percentiles: (LOW_PERCENTILE, HIGH_PERCENTILE),
            samples: VecDeque::new(),
        }
    }

    /// Use percentiles other than 30/70 for the low/high cutoffs.
    pub fn with_percentiles(mut self, low: f64, high: f64) -> Self {
        self.percentiles = (low, high);
        self
    }

    /// Push a sample, evicting the oldest beyond capacity. Non-finite samples are ignored.
    pub fn update(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// (low, high) cutoffs, or the default pair while warming up.
    pub fn thresholds(&self) -> (f64, f64) {
        if !self.is_warm() {
            return self.default;
        }
        let sorted = self.sorted();
        (
            interpolate(&sorted, self.percentiles.0),
            interpolate(&sorted, self.percentiles.1),
        )
    }

    /// Percentile `p` in [0, 100] of the current window, `None` when empty.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(interpolate(&self.sorted(), p))
    }

    pub fn is_warm(&self) -> bool {
        self.capacity > 0 && self.samples.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted
    }
}

/// Linear interpolation between closest ranks, rank = p/100 * (n - 1).
fn interpolate(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
