//! Applies the nonlinear Log-Sigmoid function.
//!
//! Non-linearity activation function: y = (1 + e^(-x))^(-1)
//!
//! A classic choice in neural networks, and the default for hidden and output layers of a flat
//! network. But you might consider using ReLU as an alternative.
//!
//! ReLU, compared to Sigmoid
//!
//! * reduces the likelyhood of vanishing gradients
//! * increases the likelyhood of a more beneficial sparse representation
//! * can be computed faster
use super::IActivation;

#[derive(Debug, Copy, Clone)]
/// Sigmoid Activation
pub struct Sigmoid;

impl IActivation for Sigmoid {
    fn activate(&self, values: &mut [f64]) {
        for value in values.iter_mut() {
            *value = 1f64 / (1f64 + (-*value).exp());
        }
    }

    fn derivative(&self, _before: f64, after: f64) -> f64 {
        after * (1f64 - after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_of_zero_is_half() {
        let mut values = [0f64, 1f64, 2f64];
        Sigmoid.activate(&mut values);
        assert_eq!(values[0], 0.5f64);
        assert!((values[1] - 0.7310585786300049f64).abs() < 1e-12);
        assert!((values[2] - 0.8807970779778823f64).abs() < 1e-12);
    }
}
