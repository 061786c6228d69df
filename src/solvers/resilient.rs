//! Resilient propagation, in the iRPROP+ variant.
//!
//! RPROP ignores the magnitude of the gradient and only looks at its sign. Every weight keeps
//! its own step size, which grows while the gradient keeps its sign and shrinks when the sign
//! flips (the last step jumped over a minimum). In the iRPROP+ variant a sign flip also reverts
//! the last step, but only if the overall error got worse.
//!
//! RPROP needs no learning rate and converges quickly on small to medium datasets, which makes
//! it a good default for full-batch training.
use crate::error::Result;
use crate::solvers::{check_state_shape, IUpdateRule, UpdateContext};

/// Gradients closer to zero than this count as zero.
pub const DEFAULT_ZERO_TOLERANCE: f64 = 1e-17;
/// Step size every weight starts with.
pub const DEFAULT_INITIAL_UPDATE: f64 = 0.1;
/// Largest step size.
pub const DEFAULT_MAX_STEP: f64 = 50f64;
/// Smallest step size.
pub const DEFAULT_MIN_STEP: f64 = 1e-6;
/// Factor applied to the step size while the gradient keeps its sign.
pub const POSITIVE_ETA: f64 = 1.2;
/// Factor applied to the step size when the gradient changes its sign.
pub const NEGATIVE_ETA: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
/// The history of a [Resilient][1] rule.
/// [1]: ./struct.Resilient.html
pub struct ResilientState {
    /// Gradient of the previous iteration (zeroed after a sign flip).
    pub last_gradient: Vec<f64>,
    /// Current step size per weight.
    pub update_values: Vec<f64>,
    /// Weight change of the previous iteration.
    pub last_weight_change: Vec<f64>,
    /// Error of the previous iteration.
    pub last_error: f64,
}

#[derive(Debug, Clone)]
/// Resilient propagation (iRPROP+).
pub struct Resilient {
    initial_update: f64,
    max_step: f64,
    last_gradient: Vec<f64>,
    update_values: Vec<f64>,
    last_weight_change: Vec<f64>,
    last_error: f64,
}

impl Default for Resilient {
    fn default() -> Resilient {
        Resilient::new(DEFAULT_INITIAL_UPDATE, DEFAULT_MAX_STEP)
    }
}

impl Resilient {
    /// Create a rule with the given initial and maximal step sizes.
    pub fn new(initial_update: f64, max_step: f64) -> Resilient {
        Resilient {
            initial_update: initial_update,
            max_step: max_step,
            last_gradient: Vec::new(),
            update_values: Vec::new(),
            last_weight_change: Vec::new(),
            last_error: f64::INFINITY,
        }
    }

    fn sign(value: f64) -> f64 {
        if value.abs() < DEFAULT_ZERO_TOLERANCE {
            0f64
        } else if value > 0f64 {
            1f64
        } else {
            -1f64
        }
    }
}

impl IUpdateRule for Resilient {
    type State = ResilientState;

    fn init(&mut self, weight_count: usize) {
        self.last_gradient = vec![0f64; weight_count];
        self.update_values = vec![self.initial_update; weight_count];
        self.last_weight_change = vec![0f64; weight_count];
        self.last_error = f64::INFINITY;
    }

    fn apply(&mut self, context: &UpdateContext, weights: &mut [f64], gradients: &[f64]) {
        for (i, weight) in weights.iter_mut().enumerate() {
            let gradient = gradients[i];
            let change = Self::sign(gradient * self.last_gradient[i]);
            let weight_change;

            if change > 0f64 {
                let delta = (self.update_values[i] * POSITIVE_ETA).min(self.max_step);
                weight_change = Self::sign(gradient) * delta;
                self.update_values[i] = delta;
                self.last_gradient[i] = gradient;
            } else if change < 0f64 {
                self.update_values[i] = (self.update_values[i] * NEGATIVE_ETA).max(DEFAULT_MIN_STEP);
                weight_change = if context.error > self.last_error { -self.last_weight_change[i] } else { 0f64 };
                self.last_gradient[i] = 0f64;
            } else {
                weight_change = Self::sign(gradient) * self.update_values[i];
                self.last_gradient[i] = gradient;
            }

            self.last_weight_change[i] = weight_change;
            *weight += weight_change;
        }
        self.last_error = context.error;
    }

    fn pause(&self) -> ResilientState {
        ResilientState {
            last_gradient: self.last_gradient.clone(),
            update_values: self.update_values.clone(),
            last_weight_change: self.last_weight_change.clone(),
            last_error: self.last_error,
        }
    }

    fn resume(&mut self, state: ResilientState) -> Result<()> {
        check_state_shape(self.update_values.len(),
                          &[&state.last_gradient, &state.update_values, &state.last_weight_change])?;
        self.last_gradient = state.last_gradient;
        self.update_values = state.update_values;
        self.last_weight_change = state.last_weight_change;
        self.last_error = state.last_error;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "resilient"
    }
}
