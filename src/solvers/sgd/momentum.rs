//! A [Stochastic Gradient Descent with Momentum][1]
//! [1]: https://en.wikipedia.org/wiki/Stochastic_gradient_descent#Momentum
//!
//! Momentum in solving neural networks works similar to
//! they way it does in physics.
//! If you travel into a a direction with a high velocity,
//! it becomes very hard to change (or reverse)
//! the direction in which you are moving.
//!
//! Similarly when adjusting weights during solving,
//! keeping a part of the previous weight update can make solving faster,
//! since if you keep adjusting the weights
//! into the same direction you will reach the optimum faster.
//! It also makes solving more stable.
//!
//! Every weight is updated as
//!
//! ```text
//! delta = learning_rate * gradient + momentum * last_delta
//! weight += delta
//! ```
use crate::error::Result;
use crate::math;
use crate::solvers::{check_state_shape, IUpdateRule, UpdateContext};

#[derive(Debug, Clone, PartialEq)]
/// The history of a [Momentum][1] rule.
/// [1]: ./struct.Momentum.html
pub struct MomentumState {
    /// The weight update of the previous iteration.
    pub last_delta: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
/// Gradient Descent with Momentum, also known as plain backpropagation.
///
/// See [module description][1] for more information.
/// [1]: ./index.html
pub struct Momentum {
    /// The weight update from the previous iteration for each weight.
    history: Vec<f64>,
}

impl Momentum {
    /// Create a new Momentum rule. The history is allocated by the solver.
    pub fn new() -> Momentum {
        Momentum { history: Vec::new() }
    }
}

impl IUpdateRule for Momentum {
    type State = MomentumState;

    fn init(&mut self, weight_count: usize) {
        self.history = vec![0f64; weight_count];
    }

    fn apply(&mut self, context: &UpdateContext, weights: &mut [f64], gradients: &[f64]) {
        // history = learning_rate * gradients + momentum * history
        math::axpby(context.learning_rate, gradients, context.momentum, &mut self.history);
        math::axpy(1f64, &self.history, weights);
    }

    fn pause(&self) -> MomentumState {
        MomentumState { last_delta: self.history.clone() }
    }

    fn resume(&mut self, state: MomentumState) -> Result<()> {
        check_state_shape(self.history.len(), &[&state.last_delta])?;
        self.history = state.last_delta;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "momentum"
    }
}
