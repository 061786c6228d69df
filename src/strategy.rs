//! Provides strategies that watch a [Solver][solver] between iterations.
//!
//! A strategy sees the error of the iteration that just ran and may change the solver's
//! configuration, reinitialize the network's weights or ask the solver to stop. Strategies run
//! in the order they were added.
//!
//! [solver]: ../solver/struct.Solver.html
use std::fmt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use crate::error::{Error, Result};
use crate::network::FlatNetwork;
use crate::solver::SolverConfig;
use crate::weight::FillerType;

/// What a strategy may look at and change between iterations.
pub struct StrategyContext<'a> {
    /// Number of iterations run so far.
    pub iteration: usize,
    /// Error of the last iteration, `NaN` before the first one.
    pub error: f64,
    /// Error of the iteration before, infinite if there was none.
    pub last_error: f64,
    /// Configuration of the solver. Changes apply from the next iteration on.
    pub config: &'a mut SolverConfig,
    /// The network being trained.
    pub network: &'a mut FlatNetwork,
    reset: bool,
    stop: bool,
}

impl<'a> StrategyContext<'a> {
    /// Create a context for one round of strategy calls.
    pub fn new(iteration: usize, error: f64, last_error: f64,
               config: &'a mut SolverConfig, network: &'a mut FlatNetwork) -> StrategyContext<'a> {
        StrategyContext {
            iteration: iteration,
            error: error,
            last_error: last_error,
            config: config,
            network: network,
            reset: false,
            stop: false,
        }
    }

    /// Tell the solver the weights were reinitialized, so the update rule's history is stale.
    pub fn request_reset(&mut self) {
        self.reset = true;
    }

    /// Ask the solver to end training after this iteration.
    pub fn request_stop(&mut self) {
        self.stop = true;
    }

    /// Whether a strategy reinitialized the weights.
    pub fn reset_requested(&self) -> bool {
        self.reset
    }

    /// Whether a strategy asked to stop.
    pub fn stop_requested(&self) -> bool {
        self.stop
    }

    /// Relative improvement of the last iteration over the one before.
    ///
    /// `None` while there is nothing to compare.
    pub fn improvement(&self) -> Option<f64> {
        if self.error.is_finite() && self.last_error.is_finite() && self.last_error > 0f64 {
            Some((self.last_error - self.error) / self.last_error)
        } else {
            None
        }
    }
}

impl<'a> fmt::Debug for StrategyContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StrategyContext")
            .field("iteration", &self.iteration)
            .field("error", &self.error)
            .field("last_error", &self.last_error)
            .field("network", &self.network.name)
            .field("reset", &self.reset)
            .field("stop", &self.stop)
            .finish()
    }
}

/// A policy consulted by the solver around every iteration.
pub trait IStrategy: Send + fmt::Debug {
    /// Called before the gradient workers run.
    fn pre_iteration(&mut self, _context: &mut StrategyContext) -> Result<()> {
        Ok(())
    }

    /// Called after the weights were updated.
    fn post_iteration(&mut self, context: &mut StrategyContext) -> Result<()>;

    /// Name used in log output.
    fn name(&self) -> &'static str;
}

#[derive(Debug)]
/// Reinitializes the weights when training stalls.
///
/// An iteration stalls if it improves the error by less than `required_improvement`
/// (relative to the previous error). After more than `cycles` stalled iterations in a row the
/// network is refilled with `filler`.
pub struct ResetOnStall {
    /// Smallest relative improvement that does not count as a stall.
    pub required_improvement: f64,
    /// Number of stalled iterations that are tolerated.
    pub cycles: usize,
    /// Filler used to reinitialize the weights.
    pub filler: FillerType,
    rng: StdRng,
    bad_cycles: usize,
}

impl ResetOnStall {
    /// Create a strategy that reinitializes with the [Glorot filler][1].
    /// [1]: ../weight/enum.FillerType.html#variant.Glorot
    pub fn new(required_improvement: f64, cycles: usize) -> ResetOnStall {
        ResetOnStall {
            required_improvement: required_improvement,
            cycles: cycles,
            filler: FillerType::Glorot,
            rng: StdRng::from_entropy(),
            bad_cycles: 0,
        }
    }

    /// Use a seeded random generator, for reproducible resets.
    pub fn with_seed(mut self, seed: u64) -> ResetOnStall {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Use `filler` to reinitialize the weights.
    pub fn with_filler(mut self, filler: FillerType) -> ResetOnStall {
        self.filler = filler;
        self
    }
}

impl IStrategy for ResetOnStall {
    fn post_iteration(&mut self, context: &mut StrategyContext) -> Result<()> {
        let improvement = match context.improvement() {
            Some(improvement) => improvement,
            None => return Ok(()),
        };
        if improvement < self.required_improvement {
            self.bad_cycles += 1;
        } else {
            self.bad_cycles = 0;
        }
        if self.bad_cycles > self.cycles {
            info!("'{}' stalled for {} iterations at error {:.6}, reinitializing weights",
                  context.network.name, self.bad_cycles, context.error);
            context.network.randomize(&self.filler, &mut self.rng)?;
            context.request_reset();
            self.bad_cycles = 0;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "reset-on-stall"
    }
}

#[derive(Debug, Copy, Clone)]
/// Adapts the learning rate to the error trend.
///
/// Multiplies the base learning rate by `decay` whenever the error rises and by `growth`
/// whenever it falls.
pub struct AdaptiveLearningRate {
    /// Multiplier applied when the error rises.
    ///
    /// Default: 0.5
    pub decay: f64,
    /// Multiplier applied when the error falls.
    ///
    /// Default: 1.05
    pub growth: f64,
}

impl Default for AdaptiveLearningRate {
    fn default() -> AdaptiveLearningRate {
        AdaptiveLearningRate { decay: 0.5f64, growth: 1.05f64 }
    }
}

impl AdaptiveLearningRate {
    /// Create a strategy with the given multipliers.
    pub fn new(decay: f64, growth: f64) -> Result<AdaptiveLearningRate> {
        if !(decay > 0f64 && decay < 1f64) || !(growth >= 1f64) {
            return Err(Error::InvalidConfig(format!("adaptive learning rate needs 0 < decay < 1 <= growth, got {} and {}",
                                                    decay, growth)));
        }
        Ok(AdaptiveLearningRate { decay: decay, growth: growth })
    }
}

impl IStrategy for AdaptiveLearningRate {
    fn post_iteration(&mut self, context: &mut StrategyContext) -> Result<()> {
        let improvement = match context.improvement() {
            Some(improvement) => improvement,
            None => return Ok(()),
        };
        let before = context.config.base_lr;
        if improvement < 0f64 {
            context.config.base_lr *= self.decay;
            debug!("Error of '{}' rose, learning rate {} -> {}", context.network.name, before, context.config.base_lr);
        } else {
            context.config.base_lr *= self.growth;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "adaptive-learning-rate"
    }
}

#[derive(Debug, Copy, Clone)]
/// Asks the solver to stop when training stalls.
///
/// Stops after more than `tolerate` iterations in a row improved the error by less than
/// `min_improvement` (relative to the previous error).
pub struct StopOnStall {
    /// Smallest relative improvement that does not count as a stall.
    pub min_improvement: f64,
    /// Number of stalled iterations that are tolerated.
    pub tolerate: usize,
    stalled: usize,
}

impl StopOnStall {
    /// Create a strategy with the given thresholds.
    pub fn new(min_improvement: f64, tolerate: usize) -> StopOnStall {
        StopOnStall { min_improvement: min_improvement, tolerate: tolerate, stalled: 0 }
    }
}

impl IStrategy for StopOnStall {
    fn post_iteration(&mut self, context: &mut StrategyContext) -> Result<()> {
        match context.improvement() {
            Some(improvement) if improvement < self.min_improvement => self.stalled += 1,
            Some(_) => self.stalled = 0,
            None => return Ok(()),
        }
        if self.stalled > self.tolerate {
            info!("'{}' stalled for {} iterations at error {:.6}, stopping",
                  context.network.name, self.stalled, context.error);
            context.request_stop();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stop-on-stall"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationType;
    use crate::data::MemoryTrainingSet;
    use crate::network::NetworkConfig;
    use crate::solver::Solver;
    use crate::solvers::Momentum;

    // a learning rate of zero never changes the error
    fn frozen_solver() -> Solver<Momentum> {
        let cfg = NetworkConfig::feedforward("frozen", &[1, 2, 1], ActivationType::Sigmoid);
        let network = FlatNetwork::with_weights(&cfg, vec![0.2f64; 7]).unwrap();
        let data = MemoryTrainingSet::from_slices(&[vec![0f64], vec![1f64]], &[vec![1f64], vec![0f64]]).unwrap();
        let config = SolverConfig { base_lr: 0f64, momentum: 0f64, threads: 1, ..SolverConfig::default() };
        Solver::from_config(network, Box::new(data), Momentum::new(), &config).unwrap()
    }

    #[test]
    fn reset_on_stall_refills_weights() {
        let mut solver = frozen_solver();
        solver.add_strategy(Box::new(ResetOnStall::new(0.01f64, 2).with_seed(3)));
        let before = solver.network().weights().to_vec();
        for _ in 0..3 {
            solver.iteration().unwrap();
        }
        assert_eq!(solver.network().weights(), &before[..]);
        solver.iteration().unwrap();
        assert!(solver.network().weights() != &before[..]);
    }

    #[test]
    fn stop_on_stall_flags_the_solver() {
        let mut solver = frozen_solver();
        solver.add_strategy(Box::new(StopOnStall::new(1e-6f64, 1)));
        let report = solver.train(100, 0f64).unwrap();
        assert!(solver.should_stop());
        assert_eq!(report.iterations, 3);
        assert!(!report.converged);
    }

    #[test]
    fn adaptive_rate_follows_the_error() {
        let cfg = NetworkConfig::feedforward("rate", &[1, 1], ActivationType::Linear);
        let mut network = FlatNetwork::from_config(&cfg).unwrap();
        let mut config = SolverConfig::default();
        let mut strategy = AdaptiveLearningRate::new(0.5f64, 1.1f64).unwrap();
        {
            let mut context = StrategyContext::new(2, 2f64, 1f64, &mut config, &mut network);
            strategy.post_iteration(&mut context).unwrap();
        }
        assert!((config.base_lr - 0.35f64).abs() < 1e-12);
        {
            let mut context = StrategyContext::new(3, 0.5f64, 1f64, &mut config, &mut network);
            strategy.post_iteration(&mut context).unwrap();
        }
        assert!((config.base_lr - 0.385f64).abs() < 1e-12);
        assert!(AdaptiveLearningRate::new(1.5f64, 1f64).is_err());
    }
}
