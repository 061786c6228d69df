//! Passes the weighted sums through unchanged.
//!
//! Used for the input layer, and for output layers of regression networks.
use super::IActivation;

#[derive(Debug, Copy, Clone)]
/// Linear (identity) Activation
pub struct Linear;

impl IActivation for Linear {
    fn activate(&self, _values: &mut [f64]) {}

    fn derivative(&self, _before: f64, _after: f64) -> f64 {
        1f64
    }
}
