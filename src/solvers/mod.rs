//! Provides the update rules that turn gradients into weight changes.
//!
//! The optimal state of a neural network would be the one where
//! for any given input to the network, it would produce an output perfectly
//! matching the target function. In that state the error function would have its
//! [global minimum][minimum].
//! This statement can also be reversed to *if we manage to minimize
//! the error function of the network, we map the target function*.
//!
//! We can change the way a network works by adjusting its individual
//! [weights][weight]. So to optimize the network we want to adjust
//! the weights in a way that the error function will be minimized.
//! If we want to know how to correctly adjust a single weight,
//! we have to get to know the effect of that weight
//! on the error function (= the *gradient*).
//! This is what the gradient workers of a [Solver][solver] compute via
//! [*backpropagation*][backprop].
//!
//! All update rules share that pipeline and only differ in the last step:
//! how the weight update is computed from the reduced gradient.
//!
//! - [Momentum][momentum]: plain backpropagation with a learning rate and momentum.
//! - [Resilient][resilient]: resilient propagation (iRPROP+), which only looks at gradient signs.
//! - [Adam][adam]: adaptive moment estimation.
//!
//! Every rule can hand out its state between iterations, so training can be paused and resumed.
//!
//! [solver]: ../solver/struct.Solver.html
//! [weight]: https://en.wikipedia.org/wiki/Synaptic_weight
//! [minimum]: http://mathworld.wolfram.com/GlobalMinimum.html
//! [backprop]: https://en.wikipedia.org/wiki/Backpropagation
//! [momentum]: ./sgd/momentum/struct.Momentum.html
//! [resilient]: ./resilient/struct.Resilient.html
//! [adam]: ./adam/struct.Adam.html

pub use self::adam::{Adam, AdamState};
pub use self::resilient::{Resilient, ResilientState};
pub use self::sgd::{Momentum, MomentumState};

pub mod adam;
pub mod resilient;
pub mod sgd;

use std::fmt;
use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq)]
/// What the solver knows about the current iteration when it applies an update.
pub struct UpdateContext {
    /// Number of updates applied so far.
    pub iteration: usize,
    /// Learning rate for this iteration, according to the configured policy.
    pub learning_rate: f64,
    /// Momentum multiplier.
    pub momentum: f64,
    /// Error measured during this iteration's pass.
    pub error: f64,
    /// Error measured during the previous iteration's pass.
    pub last_error: f64,
}

/// Implementation of a specific update rule.
///
/// The second phase of [backpropagation learning][1]: given the gradient summed over the whole
/// training set, change the weights.
///
/// [1]: https://en.wikipedia.org/wiki/Backpropagation#Phase_2:_Weight_update
pub trait IUpdateRule: Send + fmt::Debug {
    /// The state needed to continue training after a pause.
    type State: Clone + fmt::Debug + Send;

    /// Allocate (or reset) the rule's history for `weight_count` weights.
    fn init(&mut self, weight_count: usize);

    /// Change `weights` according to `gradients`.
    fn apply(&mut self, context: &UpdateContext, weights: &mut [f64], gradients: &[f64]);

    /// Whether [pause][1] captures everything needed to resume.
    /// [1]: #tymethod.pause
    fn can_continue(&self) -> bool {
        true
    }

    /// Capture the rule's history.
    fn pause(&self) -> Self::State;

    /// Restore history captured by [pause][1], checking it fits the current weights.
    /// [1]: #tymethod.pause
    fn resume(&mut self, state: Self::State) -> Result<()>;

    /// Name used in log output.
    fn name(&self) -> &'static str;
}

/// Checks that every history buffer of a paused state has one value per weight.
pub(crate) fn check_state_shape(weight_count: usize, buffers: &[&[f64]]) -> Result<()> {
    for buffer in buffers {
        if buffer.len() != weight_count {
            return Err(Error::ResumeShapeMismatch { expected: weight_count, actual: buffer.len() });
        }
    }
    Ok(())
}
