//! Accumulates the output error of a training pass.
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// How the accumulated squared error is reported.
pub enum ErrorMode {
    /// Mean squared error over all output values.
    Mse,
    /// Root of the mean squared error.
    Rms,
    /// Sum of squared errors, halved.
    Ess,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
/// Running sum of squared output errors.
///
/// Gradient workers each keep one; the solver merges them after the barrier.
pub struct ErrorCalculation {
    global_error: f64,
    set_size: usize,
}

impl ErrorCalculation {
    /// Add the errors of one record.
    pub fn update(&mut self, actual: &[f64], ideal: &[f64]) {
        for (a, i) in actual.iter().zip(ideal) {
            let delta = i - a;
            self.global_error += delta * delta;
        }
        self.set_size += ideal.len();
    }

    /// Add the errors accumulated by another calculation.
    pub fn merge(&mut self, other: &ErrorCalculation) {
        self.global_error += other.global_error;
        self.set_size += other.set_size;
    }

    /// Forget all accumulated errors.
    pub fn reset(&mut self) {
        self.global_error = 0f64;
        self.set_size = 0;
    }

    /// Number of output values seen.
    pub fn set_size(&self) -> usize {
        self.set_size
    }

    /// The accumulated error in the requested mode. `0` if nothing was seen.
    pub fn calculate(&self, mode: ErrorMode) -> f64 {
        if self.set_size == 0 {
            return 0f64;
        }
        let mse = self.global_error / self.set_size as f64;
        match mode {
            ErrorMode::Mse => mse,
            ErrorMode::Rms => mse.sqrt(),
            ErrorMode::Ess => self.global_error / 2f64,
        }
    }
}

impl fmt::Display for ErrorCalculation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MSE {:.6} over {} values", self.calculate(ErrorMode::Mse), self.set_size)
    }
}
