//! Provides the units of work the training manager dispatches.
use std::fmt;
use crate::concurrent::performer::PerformerContext;
use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::network::FlatNetwork;
use crate::solver::{Solver, SolverConfig};
use crate::solvers::IUpdateRule;
use crate::util::{new_arclock, ArcLock};

/// An independently runnable unit of training work.
pub trait ITrainingJob: Send + fmt::Debug {
    /// Name used in log output and errors.
    fn name(&self) -> &str;

    /// Run the job to completion on the performer described by `context`.
    fn perform(&mut self, context: &PerformerContext) -> Result<()>;
}

#[derive(Debug, Clone)]
/// What a finished [TrainingJob][1] publishes.
/// [1]: ./struct.TrainingJob.html
pub struct TrainingOutcome {
    /// The trained network.
    pub network: FlatNetwork,
    /// Error of the last iteration.
    pub error: f64,
    /// Number of iterations run.
    pub iterations: usize,
    /// Whether the target error was reached.
    pub converged: bool,
}

#[derive(Debug)]
/// Trains one network to convergence with a [Solver][1].
///
/// The solver uses as many gradient workers as the performer offers threads. The result is
/// published through the handle returned by [outcome][2], since the manager consumes the job.
///
/// [1]: ../../solver/struct.Solver.html
/// [2]: #method.outcome
pub struct TrainingJob<U: IUpdateRule> {
    name: String,
    network: Option<FlatNetwork>,
    training: Option<Box<dyn TrainingSet>>,
    rule: Option<U>,
    config: SolverConfig,
    max_iterations: usize,
    target_error: f64,
    outcome: ArcLock<Option<TrainingOutcome>>,
}

impl<U: IUpdateRule> TrainingJob<U> {
    /// Create a job training `network` on `training` until the error drops to `target_error`
    /// or `max_iterations` were run.
    pub fn new(name: &str,
               network: FlatNetwork,
               training: Box<dyn TrainingSet>,
               rule: U,
               config: &SolverConfig,
               max_iterations: usize,
               target_error: f64) -> TrainingJob<U> {
        TrainingJob {
            name: name.to_owned(),
            network: Some(network),
            training: Some(training),
            rule: Some(rule),
            config: config.clone(),
            max_iterations: max_iterations,
            target_error: target_error,
            outcome: new_arclock(None),
        }
    }

    /// Handle that holds the [TrainingOutcome][1] once the job is done.
    /// [1]: ./struct.TrainingOutcome.html
    pub fn outcome(&self) -> ArcLock<Option<TrainingOutcome>> {
        self.outcome.clone()
    }
}

impl<U: IUpdateRule> ITrainingJob for TrainingJob<U> {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(&mut self, context: &PerformerContext) -> Result<()> {
        let (network, training, rule) = match (self.network.take(), self.training.take(), self.rule.take()) {
            (Some(network), Some(training), Some(rule)) => (network, training, rule),
            _ => return Err(Error::InvalidConfig(format!("training job '{}' was already performed", self.name))),
        };
        let mut config = self.config.clone();
        config.threads = context.threads;

        let mut solver = Solver::from_config(network, training, rule, &config)?;
        let report = solver.train(self.max_iterations, self.target_error)?;
        info!("Job '{}' finished after {} iterations with error {:.6}{}",
              self.name, report.iterations, report.error,
              if report.converged { "" } else { " (target not reached)" });

        *self.outcome.write()? = Some(TrainingOutcome {
            network: solver.into_network(),
            error: report.error,
            iterations: report.iterations,
            converged: report.converged,
        });
        Ok(())
    }
}
