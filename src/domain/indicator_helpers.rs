//! Shared incremental building blocks for the indicator calculators.

use std::collections::VecDeque;

/// Fixed-length trailing window of samples.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::new(),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.values.len() == self.capacity
    }

    pub fn oldest(&self) -> Option<f64> {
        self.values.front().copied()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Mean of the window, summed directly on every call so flat input gives
    /// an exactly flat mean.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Population standard deviation of the window.
    pub fn population_stddev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self
            .values
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / self.values.len() as f64;
        Some(var.sqrt())
    }
}

/// Exponential average seeded with the simple mean of the first `period`
/// samples, then `ema = x * k + ema * (1 - k)` with `k = 2 / (n + 1)`.
#[derive(Debug, Clone)]
pub struct EmaState {
    period: usize,
    k: f64,
    seen: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl EmaState {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seen: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn push(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        match self.value {
            Some(prev) => {
                self.value = Some(x * self.k + prev * (1.0 - self.k));
            }
            None => {
                self.seen += 1;
                self.seed_sum += x;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Wilder smoothing: seeded with the mean of the first `period` samples,
/// then `avg = (prev * (n - 1) + x) / n`.
#[derive(Debug, Clone)]
pub struct WilderAverage {
    period: usize,
    seen: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl WilderAverage {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            seen: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn push(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        let n = self.period as f64;
        match self.value {
            Some(prev) => {
                self.value = Some((prev * (n - 1.0) + x) / n);
            }
            None => {
                self.seen += 1;
                self.seed_sum += x;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / n);
                }
            }
        }
        self.value
    }
}
