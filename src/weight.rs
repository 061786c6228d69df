//! Provides initialization of network weights.
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq)]
/// Enum for specifing the type of Filler.
pub enum FillerType {
    /// Fills the weights with a constant `value` (all values are the same).
    Constant {
        /// The value that will be used to fill the weights.
        value: f64,
    },
    /// Fills the weights with values drawn uniformly from `[low, high)`.
    Uniform {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (exclusive).
        high: f64,
    },
    /// Fills the weights based on the paper:
    ///
    /// `[Bengio and Glorot 2010]: Understanding the difficulty of training deep feedforward neural networks.`
    ///
    /// Also known as Xavier filler. The fan-in and fan-out are taken from the layer transition
    /// the weights belong to.
    Glorot,
}

impl FillerType {
    /// Uses a filler as specified by this FillerType to fill the weights of one layer transition.
    ///
    /// `num_inputs` counts the source neurons (including bias and context neurons),
    /// `num_outputs` the target neurons.
    pub fn fill<R: Rng + ?Sized>(&self, weights: &mut [f64], num_inputs: usize, num_outputs: usize, rng: &mut R) -> Result<()> {
        match *self {
            FillerType::Constant { value } => {
                Self::fill_constant(weights, value);
                Ok(())
            }
            FillerType::Uniform { low, high } => Self::fill_uniform(weights, low, high, rng),
            FillerType::Glorot => Self::fill_glorot(weights, num_inputs, num_outputs, rng),
        }
    }

    /// Directly use the [Constant Filler](#variant.Constant).
    pub fn fill_constant(weights: &mut [f64], value: f64) {
        for e in weights.iter_mut() {
            *e = value;
        }
    }

    /// Directly use the [Uniform Filler](#variant.Uniform).
    pub fn fill_uniform<R: Rng + ?Sized>(weights: &mut [f64], low: f64, high: f64, rng: &mut R) -> Result<()> {
        if !(low < high) {
            return Err(Error::InvalidConfig(format!("uniform filler needs low < high, got [{}, {})", low, high)));
        }
        let between = Uniform::new(low, high);
        for e in weights.iter_mut() {
            *e = between.sample(rng);
        }
        Ok(())
    }

    /// Directly use the [Glorot Filler](#variant.Glorot).
    pub fn fill_glorot<R: Rng + ?Sized>(weights: &mut [f64], num_inputs: usize, num_outputs: usize, rng: &mut R) -> Result<()> {
        if num_inputs + num_outputs == 0 {
            return Err(Error::InvalidConfig("glorot filler needs at least one connected neuron".to_owned()));
        }
        let init_range = (6f64 / (num_inputs as f64 + num_outputs as f64)).sqrt();
        Self::fill_uniform(weights, -init_range, init_range, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn glorot_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut weights = vec![0f64; 64];
        FillerType::Glorot.fill(&mut weights, 4, 2, &mut rng).unwrap();
        let range = 1f64;
        assert!(weights.iter().all(|w| w.abs() <= range));
        assert!(weights.iter().any(|w| *w != 0f64));
    }

    #[test]
    fn uniform_rejects_empty_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut weights = vec![0f64; 4];
        let filler = FillerType::Uniform { low: 1f64, high: 1f64 };
        assert!(filler.fill(&mut weights, 1, 1, &mut rng).is_err());
    }
}
