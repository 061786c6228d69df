//! Applies the nonlinear TanH function.
//!
//! Non-linearity activation function: y = sinh(x) / cosh(x)
//!
//! Symmetric around zero, so networks with negative targets usually train better with TanH than
//! with Sigmoid.
use super::IActivation;

#[derive(Debug, Copy, Clone)]
/// TanH Activation
pub struct TanH;

impl IActivation for TanH {
    fn activate(&self, values: &mut [f64]) {
        for value in values.iter_mut() {
            *value = value.tanh();
        }
    }

    fn derivative(&self, _before: f64, after: f64) -> f64 {
        1f64 - after * after
    }
}
