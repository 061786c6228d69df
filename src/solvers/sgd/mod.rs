//! Provides [IUpdateRule][1] implementations based on [Stochastic Gradient Descent][2].
//! [1]: ../trait.IUpdateRule.html
//! [2]: https://en.wikipedia.org/wiki/Stochastic_gradient_descent
//!
//! The solvers reduce gradients over the whole training set before updating, so the descent
//! here is batch gradient descent; the name is kept for the family of rules.

pub use self::momentum::{Momentum, MomentumState};

pub mod momentum;
