//! Provides the Solver that trains a [FlatNetwork][network] with a given update rule.
//!
//! One [iteration][iteration] of a Solver runs in three steps:
//!
//! 1. the training data is split into contiguous [partitions][partition], one per
//!    [GradientWorker][worker], and every worker computes the gradients of its records against
//!    the same read-only view of the weights,
//! 2. the solver waits for all workers, then sums their gradients and errors in worker order,
//! 3. the reduced gradient is clipped and regularized if configured, and handed to the
//!    [update rule][rules], which is the only code that writes to the weights.
//!
//! Workers never see a partially applied update, since the weights are only written after every
//! worker has returned its view.
//!
//! [network]: ../network/struct.FlatNetwork.html
//! [iteration]: ./struct.Solver.html#method.iteration
//! [partition]: ../util/struct.Partition.html
//! [worker]: ./gradient_worker/struct.GradientWorker.html
//! [rules]: ../solvers/index.html

pub mod error_calculation;
pub mod gradient_worker;

pub use self::error_calculation::{ErrorCalculation, ErrorMode};
pub use self::gradient_worker::{GradientOutcome, GradientWorker};

use std::thread;
use std::time::{Duration, Instant};
use crossbeam_channel::{self, RecvTimeoutError};
use crate::data::{check_fit, TrainingSet};
use crate::error::{Error, Result};
use crate::math;
use crate::network::FlatNetwork;
use crate::solvers::{IUpdateRule, UpdateContext};
use crate::strategy::{IStrategy, StrategyContext};
use crate::util::{partition, resolve_threads};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Lifecycle of a [Solver][1].
/// [1]: ./struct.Solver.html
pub enum SolverState {
    /// Between iterations.
    Idle,
    /// Gradient workers are running.
    Iterating,
    /// A worker was lost; the solver can not iterate anymore.
    Terminated,
}

#[derive(Debug, Copy, Clone, PartialEq)]
/// Result of [Solver::train][1].
/// [1]: ./struct.Solver.html#method.train
pub struct TrainingReport {
    /// Number of iterations run by this call.
    pub iterations: usize,
    /// Error of the last iteration.
    pub error: f64,
    /// Whether the target error was reached.
    pub converged: bool,
}

#[derive(Debug)]
/// Solver that trains a [FlatNetwork][1] on a [TrainingSet][2].
/// [1]: ../network/struct.FlatNetwork.html
/// [2]: ../data/trait.TrainingSet.html
pub struct Solver<U: IUpdateRule> {
    network: FlatNetwork,
    /// The update rule applied to the reduced gradient.
    rule: U,
    config: SolverConfig,

    workers: Vec<Option<GradientWorker>>,
    gradients: Vec<f64>,
    strategies: Vec<Box<dyn IStrategy>>,

    state: SolverState,
    /// The current iteration / number of times weights have been updated
    iter: usize,
    error: f64,
    last_error: f64,
    stop: bool,
}

impl<U: IUpdateRule> Solver<U> {
    /// Create Solver from [SolverConfig][1]
    /// [1]: ./struct.SolverConfig.html
    ///
    /// Checks that `training` fits the network, splits it into one partition per worker and
    /// opens an additional handle on the data for every worker but the first.
    pub fn from_config(network: FlatNetwork, training: Box<dyn TrainingSet>, mut rule: U, config: &SolverConfig) -> Result<Solver<U>> {
        config.validate()?;
        check_fit(training.as_ref(), network.input_count(), network.output_count())?;

        let records = training.count();
        let threads = if network.topology().has_context() {
            if config.threads != 1 {
                debug!("'{}' has context neurons, training it with a single gradient worker", network.name);
            }
            1
        } else {
            resolve_threads(config.threads, records)
        };
        let partitions = partition(records, threads)?;
        let mut handles = Vec::with_capacity(partitions.len());
        for _ in 1..partitions.len() {
            handles.push(training.open_additional()?);
        }
        handles.insert(0, training);

        let workers = partitions.iter().zip(handles).enumerate()
            .map(|(index, (partition, handle))| Some(GradientWorker::new(index, &network, handle, *partition)))
            .collect::<Vec<_>>();

        rule.init(network.weight_count());
        info!("Initializing {} solver for '{}': {} records over {} gradient workers",
              rule.name(), network.name, records, workers.len());

        Ok(Solver {
            gradients: vec![0f64; network.weight_count()],
            network: network,
            rule: rule,
            config: config.clone(),
            workers: workers,
            strategies: Vec::new(),
            state: SolverState::Idle,
            iter: 0,
            error: f64::NAN,
            last_error: f64::INFINITY,
            stop: false,
        })
    }

    /// Add a strategy that is consulted before and after every iteration.
    pub fn add_strategy(&mut self, strategy: Box<dyn IStrategy>) {
        debug!("Adding strategy {} to solver for '{}'", strategy.name(), self.network.name);
        self.strategies.push(strategy);
    }

    /// Run one training iteration and return the error measured during its pass.
    ///
    /// The error belongs to the weights the iteration started with.
    pub fn iteration(&mut self) -> Result<f64> {
        if self.state == SolverState::Terminated {
            return Err(Error::Terminated);
        }
        self.run_strategies(true)?;

        self.state = SolverState::Iterating;
        let error = match self.calculate_gradients() {
            Ok(error) => error,
            Err(err) => {
                if self.state != SolverState::Terminated {
                    self.state = SolverState::Idle;
                }
                return Err(err);
            }
        };
        self.apply_update(error);
        self.last_error = self.error;
        self.error = error;
        self.iter += 1;
        self.state = SolverState::Idle;
        trace!("Iteration {} of '{}': error {:.8}", self.iter, self.network.name, error);

        self.run_strategies(false)?;
        Ok(error)
    }

    /// Run iterations until the error drops to `target_error`, a strategy asks to stop, or
    /// `max_iterations` were run.
    pub fn train(&mut self, max_iterations: usize, target_error: f64) -> Result<TrainingReport> {
        let mut report = TrainingReport { iterations: 0, error: self.error, converged: false };
        while report.iterations < max_iterations {
            report.error = self.iteration()?;
            report.iterations += 1;
            if report.error <= target_error {
                report.converged = true;
                break;
            }
            if self.should_stop() {
                info!("Training of '{}' stopped by strategy after {} iterations", self.network.name, self.iter);
                break;
            }
        }
        Ok(report)
    }

    /// Run every gradient worker against the current weights and reduce their results.
    ///
    /// Returns the error of the pass. The summed gradient is available through
    /// [gradients][1] afterwards.
    /// Worker failures are reported after all workers finished, the one with the lowest index
    /// first.
    ///
    /// [1]: #method.gradients
    pub fn calculate_gradients(&mut self) -> Result<f64> {
        if self.state == SolverState::Terminated {
            return Err(Error::Terminated);
        }
        let results = if self.workers.len() == 1 && self.config.worker_timeout.is_none() {
            let weights = self.network.weights();
            let worker = self.workers[0].as_mut().ok_or(Error::Terminated)?;
            vec![Some(worker.run_guarded(weights))]
        } else {
            self.run_parallel()?
        };

        let mut error = ErrorCalculation::default();
        let mut failure = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(outcome)) => error.merge(&outcome.error),
                Some(Err(err)) => {
                    error!("Gradient worker {} of '{}' failed: {}", index, self.network.name, err);
                    if failure.is_none() {
                        failure = Some(Error::Worker { index: index, source: Box::new(err) });
                    }
                }
                None => {
                    self.state = SolverState::Terminated;
                    return Err(Error::Terminated);
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        math::zero(&mut self.gradients);
        for worker in self.workers.iter().flatten() {
            math::axpy(1f64, worker.gradients(), &mut self.gradients);
        }
        Ok(error.calculate(self.config.error_mode))
    }

    fn run_parallel(&mut self) -> Result<Vec<Option<Result<GradientOutcome>>>> {
        let count = self.workers.len();
        let (sender, receiver) = crossbeam_channel::unbounded();

        for slot in self.workers.iter_mut() {
            let mut worker = match slot.take() {
                Some(worker) => worker,
                None => {
                    self.state = SolverState::Terminated;
                    return Err(Error::Terminated);
                }
            };
            let weights = self.network.weights_view();
            let sender = sender.clone();
            let spawned = thread::Builder::new()
                .name(format!("gradient-worker-{}", worker.index()))
                .spawn(move || {
                    let result = worker.run_guarded(&weights);
                    drop(weights);
                    let _ = sender.send((worker, result));
                });
            if let Err(err) = spawned {
                self.state = SolverState::Terminated;
                return Err(Error::Spawn(err));
            }
        }
        drop(sender);

        let deadline = self.config.worker_timeout.map(|timeout| Instant::now() + timeout);
        let mut results = (0..count).map(|_| None).collect::<Vec<_>>();
        for _ in 0..count {
            let received = match deadline {
                Some(deadline) => receiver.recv_deadline(deadline),
                None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((worker, result)) => {
                    let index = worker.index();
                    results[index] = Some(result);
                    self.workers[index] = Some(worker);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let waited = self.config.worker_timeout.unwrap_or_default();
                    error!("Gradient workers of '{}' did not finish within {:?}, terminating solver",
                           self.network.name, waited);
                    self.state = SolverState::Terminated;
                    return Err(Error::WorkerTimeout { waited: waited });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.state = SolverState::Terminated;
                    return Err(Error::Terminated);
                }
            }
        }
        Ok(results)
    }

    fn apply_update(&mut self, error: f64) {
        self.clip_gradients();
        self.regularize();

        let context = UpdateContext {
            iteration: self.iter,
            learning_rate: self.config.get_learning_rate(self.iter),
            momentum: self.config.momentum,
            error: error,
            last_error: self.error,
        };
        self.rule.apply(&context, self.network.weights_mut(), &self.gradients);
    }

    /// Clip gradients when they exceed [SolverConfig.clip_gradients][1].
    /// [1]: ./struct.SolverConfig.html
    fn clip_gradients(&mut self) {
        if let Some(clip_threshold) = self.config.clip_gradients {
            let l2norm_diff = math::sumsq(&self.gradients).sqrt();
            if l2norm_diff > clip_threshold {
                let scale_factor = clip_threshold / l2norm_diff;
                debug!("Gradient clipping: scaling down gradients (L2 norm {} > {}) by scale factor {}",
                       l2norm_diff, clip_threshold, scale_factor);
                math::scal(scale_factor, &mut self.gradients);
            }
        }
    }

    /// L2 weight decay, pulling every weight towards zero.
    fn regularize(&mut self) {
        if let Some(decay) = self.config.weight_decay {
            math::axpy(-decay, self.network.weights(), &mut self.gradients);
        }
    }

    fn run_strategies(&mut self, before: bool) -> Result<()> {
        if self.strategies.is_empty() {
            return Ok(());
        }
        let mut context = StrategyContext::new(self.iter, self.error, self.last_error, &mut self.config, &mut self.network);
        for strategy in self.strategies.iter_mut() {
            if before {
                strategy.pre_iteration(&mut context)?;
            } else {
                strategy.post_iteration(&mut context)?;
            }
        }
        let (reset, stop) = (context.reset_requested(), context.stop_requested());
        if reset {
            info!("Resetting {} history of '{}' after weight reset", self.rule.name(), self.network.name);
            self.rule.init(self.network.weight_count());
            self.last_error = f64::INFINITY;
        }
        self.stop |= stop;
        Ok(())
    }

    /// Whether the update rule supports [pause][1] and [resume][2].
    /// [1]: #method.pause
    /// [2]: #method.resume
    pub fn can_continue(&self) -> bool {
        self.rule.can_continue()
    }

    /// Capture the update rule's history, to continue training later.
    pub fn pause(&self) -> U::State {
        info!("Pausing {} solver for '{}' at iteration {}", self.rule.name(), self.network.name, self.iter);
        self.rule.pause()
    }

    /// Restore history captured by [pause][1].
    ///
    /// Fails if the state was captured for a different number of weights.
    /// [1]: #method.pause
    pub fn resume(&mut self, state: U::State) -> Result<()> {
        self.rule.resume(state)?;
        info!("Resumed {} solver for '{}'", self.rule.name(), self.network.name);
        Ok(())
    }

    /// Whether a strategy asked to end training.
    pub fn should_stop(&self) -> bool {
        self.stop
    }

    /// Returns the network trained by the solver.
    ///
    /// This is the recommended method to get a usable trained network.
    pub fn network(&self) -> &FlatNetwork {
        &self.network
    }

    /// Returns the network trained by the solver.
    ///
    /// This is the recommended method to get a trained network,
    /// if you want to alter the network. Keep in mind that altering the network
    /// might render the solver unusable and continuing training the network with it will yield
    /// unexpected results.
    pub fn mut_network(&mut self) -> &mut FlatNetwork {
        &mut self.network
    }

    /// Consume the solver and return the trained network.
    pub fn into_network(self) -> FlatNetwork {
        self.network
    }

    /// Error of the last iteration, `NaN` before the first one.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// The reduced gradient of the last pass.
    pub fn gradients(&self) -> &[f64] {
        &self.gradients
    }

    /// The update rule.
    pub fn rule(&self) -> &U {
        &self.rule
    }

    /// Current state of the solver.
    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Number of iterations run so far.
    pub fn iter(&self) -> usize {
        self.iter
    }

    /// The configuration in use.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Mutable access to the configuration, e.g. to change the learning rate between iterations.
    ///
    /// The number of threads is fixed when the solver is created.
    pub fn mut_config(&mut self) -> &mut SolverConfig {
        &mut self.config
    }

    /// Number of gradient workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

#[derive(Debug, Clone)]
/// Configuration for a Solver
pub struct SolverConfig {
    /// The learning rate policy to be used.
    ///
    /// Default: Fixed
    pub lr_policy: LRPolicy,
    /// The base learning rate.
    ///
    /// Default: 0.7
    pub base_lr: f64,
    /// gamma as used in the calculation of most learning rate policies.
    ///
    /// Default: 0.1
    pub gamma: f64,
    /// The stepsize used in Step learning policies.
    ///
    /// Default: 10
    pub stepsize: usize,
    /// The threshold for clipping gradients.
    ///
    /// Gradient values will be scaled to their [L2 norm][1] of length `clip_gradients`
    /// if their L2 norm is larger than `clip_gradients`.
    /// If set to `None` gradients will not be clipped.
    ///
    /// [1]: https://en.wikipedia.org/wiki/Norm_(mathematics)#Euclidean_norm
    ///
    /// Default: None
    pub clip_gradients: Option<f64>,
    /// The global [weight decay][1] multiplier for L2 [regularization][2].
    /// [1]: http://www.alglib.net/dataanalysis/improvinggeneralization.php#header3
    /// [2]: https://cs231n.github.io/neural-networks-2/#reg
    ///
    /// If set to `None` no regularization will be performed.
    ///
    /// Default: None
    pub weight_decay: Option<f64>,
    /// The [momentum][1] multiplier for the [Momentum rule][2].
    /// [1]: https://en.wikipedia.org/wiki/Stochastic_gradient_descent#Momentum
    /// [2]: ../solvers/sgd/momentum/index.html
    ///
    /// The value should always be between 0 and 1 and dictates how much of the previous
    /// weight update will be added to the current one.
    ///
    /// Default: 0.9
    pub momentum: f64,
    /// Number of gradient workers. `0` starts one per core.
    ///
    /// Never more workers than records are started. Networks with context neurons always
    /// train with a single worker, since every record depends on the context the records
    /// before it left behind.
    ///
    /// A single worker runs on the calling thread unless a [worker_timeout][1] is set.
    /// [1]: #structfield.worker_timeout
    ///
    /// Default: 0
    pub threads: usize,
    /// How long to wait for the gradient workers of one iteration.
    ///
    /// If the workers do not finish in time, the iteration fails with
    /// [WorkerTimeout][1] and the solver is terminated.
    /// If set to `None` the solver waits indefinitely.
    ///
    /// [1]: ../error/enum.Error.html#variant.WorkerTimeout
    ///
    /// Default: None
    pub worker_timeout: Option<Duration>,
    /// How the error of an iteration is reported.
    ///
    /// Default: Mse
    pub error_mode: ErrorMode,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            lr_policy: LRPolicy::Fixed,
            base_lr: 0.7f64,
            gamma: 0.1f64,
            stepsize: 10,

            clip_gradients: None,
            weight_decay: None,

            momentum: 0.9f64,

            threads: 0,
            worker_timeout: None,
            error_mode: ErrorMode::Mse,
        }
    }
}

impl SolverConfig {
    /// Return the learning rate for a supplied iteration.
    ///
    /// The way the learning rate is calculated depends on the configured [LRPolicy][1].
    ///
    /// [1]: ./enum.LRPolicy.html
    ///
    /// Used by the [Solver][2] to calculate the learning rate for the current iteration.
    /// The calculated learning rate has a different effect on training dependent on what
    /// [update rule][3] you are using.
    ///
    /// [2]: ./struct.Solver.html
    /// [3]: ../solvers/index.html
    pub fn get_learning_rate(&self, iter: usize) -> f64 {
        match self.lr_policy {
            LRPolicy::Fixed => self.base_lr,
            LRPolicy::Step => {
                let current_step = self.step(iter);
                self.base_lr * self.gamma.powi(current_step as i32)
            }
            LRPolicy::Exp => self.base_lr * self.gamma.powi(iter as i32),
        }
    }

    /// Return current step at iteration `iter`.
    ///
    /// Small helper for learning rate calculation.
    fn step(&self, iter: usize) -> usize {
        iter / self.stepsize.max(1)
    }

    fn validate(&self) -> Result<()> {
        if !self.base_lr.is_finite() {
            return Err(Error::InvalidConfig(format!("base_lr must be finite, got {}", self.base_lr)));
        }
        if self.lr_policy == LRPolicy::Step && self.stepsize == 0 {
            return Err(Error::InvalidConfig("step learning rate policy needs a stepsize > 0".to_owned()));
        }
        if let Some(clip) = self.clip_gradients {
            if !(clip > 0f64) {
                return Err(Error::InvalidConfig(format!("clip_gradients must be positive, got {}", clip)));
            }
        }
        if let Some(decay) = self.weight_decay {
            if !(decay >= 0f64) {
                return Err(Error::InvalidConfig(format!("weight_decay must not be negative, got {}", decay)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Learning Rate Policy for a [Solver][1]
/// [1]: ./struct.Solver.html
///
/// The variables mentioned below are defined in the [SolverConfig][2] apart from
/// iter, which is the current iteration of the solver, that is supplied as a parameter
/// for the learning rate calculation.
///
/// [2]: ./struct.SolverConfig.html
pub enum LRPolicy {
    /// always return base_lr
    Fixed,
    /// learning rate decays every `step` iterations.
    /// return base_lr * gamma ^ (floor(iter / step))
    Step,
    /// return base_lr * gamma ^ iter
    Exp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationType;
    use crate::data::MemoryTrainingSet;
    use crate::network::NetworkConfig;
    use crate::solvers::Momentum;

    fn solver(config: &SolverConfig) -> Solver<Momentum> {
        let cfg = NetworkConfig::feedforward("unit", &[1, 2, 1], ActivationType::Sigmoid);
        let network = FlatNetwork::with_weights(&cfg, vec![0.5f64; 7]).unwrap();
        let data = MemoryTrainingSet::from_slices(&[vec![0f64], vec![1f64], vec![0.5f64]],
                                                  &[vec![1f64], vec![0f64], vec![0.5f64]]).unwrap();
        Solver::from_config(network, Box::new(data), Momentum::new(), config).unwrap()
    }

    #[test]
    fn never_more_workers_than_records() {
        let config = SolverConfig { threads: 8, ..SolverConfig::default() };
        assert_eq!(solver(&config).worker_count(), 3);
    }

    #[test]
    fn clipping_bounds_the_gradient_norm() {
        let config = SolverConfig { threads: 1, clip_gradients: Some(1e-3f64), ..SolverConfig::default() };
        let mut solver = solver(&config);
        solver.calculate_gradients().unwrap();
        solver.clip_gradients();
        assert!(math::sumsq(solver.gradients()).sqrt() <= 1e-3f64 + 1e-12f64);
    }

    #[test]
    fn weight_decay_pulls_towards_zero() {
        let config = SolverConfig { threads: 1, weight_decay: Some(0.1f64), ..SolverConfig::default() };
        let mut solver = solver(&config);
        solver.calculate_gradients().unwrap();
        let before = solver.gradients().to_vec();
        solver.regularize();
        for (b, a) in before.iter().zip(solver.gradients()) {
            assert!((b - 0.05f64 - a).abs() < 1e-12);
        }
    }

    #[test]
    fn context_networks_use_one_worker() {
        let cfg = NetworkConfig::elman("unit", 1, 2, 1, ActivationType::TanH);
        let network = FlatNetwork::with_weights(&cfg, vec![0.3f64; 11]).unwrap();
        let data = MemoryTrainingSet::from_slices(&[vec![0f64], vec![1f64], vec![0.5f64]],
                                                  &[vec![1f64], vec![0f64], vec![0.5f64]]).unwrap();
        let config = SolverConfig { threads: 3, ..SolverConfig::default() };
        let solver = Solver::from_config(network, Box::new(data), Momentum::new(), &config).unwrap();
        assert_eq!(solver.worker_count(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = NetworkConfig::feedforward("unit", &[1, 1], ActivationType::Linear);
        let network = FlatNetwork::from_config(&cfg).unwrap();
        let data = MemoryTrainingSet::from_slices(&[vec![0f64]], &[vec![1f64]]).unwrap();
        let config = SolverConfig { clip_gradients: Some(-1f64), ..SolverConfig::default() };
        assert!(matches!(Solver::from_config(network, Box::new(data), Momentum::new(), &config),
                         Err(Error::InvalidConfig(_))));
    }
}
