//! Applies the nonlinear Rectified Linear Unit.
//!
//! Non-linearity activation function: y = max(0, x)
//!
//! This is generally the preferred choice over Sigmod or TanH.
//! The max function used in ReLU is usually faster to compute than the exponentiation
//! needed in a Sigmoid layer.
use super::IActivation;

#[derive(Debug, Copy, Clone)]
/// ReLU Activation
pub struct ReLU;

impl IActivation for ReLU {
    fn activate(&self, values: &mut [f64]) {
        for value in values.iter_mut() {
            if *value < 0f64 {
                *value = 0f64;
            }
        }
    }

    fn derivative(&self, before: f64, _after: f64) -> f64 {
        if before > 0f64 { 1f64 } else { 0f64 }
    }
}
