//! Adaptive moment estimation.
//!
//! Keeps running averages of the gradient (first moment) and of its square (second moment) per
//! weight, and scales every step by their bias-corrected ratio:
//!
//! ```text
//! m = beta1 * m + (1 - beta1) * gradient
//! v = beta2 * v + (1 - beta2) * gradient^2
//! weight += learning_rate * m_hat / (sqrt(v_hat) + epsilon)
//! ```
//!
//! The learning rate comes from the solver's learning rate policy.
use crate::error::Result;
use crate::solvers::{check_state_shape, IUpdateRule, UpdateContext};

#[derive(Debug, Clone, PartialEq)]
/// The history of an [Adam][1] rule.
/// [1]: ./struct.Adam.html
pub struct AdamState {
    /// First moment per weight.
    pub m: Vec<f64>,
    /// Second moment per weight.
    pub v: Vec<f64>,
    /// Number of updates applied.
    pub t: u64,
}

#[derive(Debug, Clone)]
/// Adam update rule.
pub struct Adam {
    /// Decay of the first moment.
    ///
    /// Default: 0.9
    pub beta1: f64,
    /// Decay of the second moment.
    ///
    /// Default: 0.999
    pub beta2: f64,
    /// Added to the denominator to avoid division by zero.
    ///
    /// Default: 1e-8
    pub epsilon: f64,
    m: Vec<f64>,
    v: Vec<f64>,
    t: u64,
}

impl Default for Adam {
    fn default() -> Adam {
        Adam {
            beta1: 0.9f64,
            beta2: 0.999f64,
            epsilon: 1e-8f64,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }
}

impl IUpdateRule for Adam {
    type State = AdamState;

    fn init(&mut self, weight_count: usize) {
        self.m = vec![0f64; weight_count];
        self.v = vec![0f64; weight_count];
        self.t = 0;
    }

    fn apply(&mut self, context: &UpdateContext, weights: &mut [f64], gradients: &[f64]) {
        self.t += 1;
        let correction1 = 1f64 - self.beta1.powi(self.t as i32);
        let correction2 = 1f64 - self.beta2.powi(self.t as i32);
        for (i, weight) in weights.iter_mut().enumerate() {
            let gradient = gradients[i];
            self.m[i] = self.beta1 * self.m[i] + (1f64 - self.beta1) * gradient;
            self.v[i] = self.beta2 * self.v[i] + (1f64 - self.beta2) * gradient * gradient;
            let m_hat = self.m[i] / correction1;
            let v_hat = self.v[i] / correction2;
            *weight += context.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }

    fn pause(&self) -> AdamState {
        AdamState { m: self.m.clone(), v: self.v.clone(), t: self.t }
    }

    fn resume(&mut self, state: AdamState) -> Result<()> {
        check_state_shape(self.m.len(), &[&state.m, &state.v])?;
        self.m = state.m;
        self.v = state.v;
        self.t = state.t;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}
