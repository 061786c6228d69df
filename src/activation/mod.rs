//! Provides nonlinear activation functions for the layers of a flat network.
//!
//! Every layer of a [FlatNetwork][1] carries one activation function, applied element-wise to
//! the weighted sums of its neurons. Thanks to the nonlinearity of the activation functions, we
//! can 'learn' and detect nonlinearities in our (complex) datasets.
//!
//! Training needs the derivative of each function as well. It is expressed in terms of both the
//! value before activation (the weighted sum) and after activation (the neuron output), so each
//! function can use whichever is cheaper.
//!
//! The activation function is also sometimes called transfer function.
//!
//! [1]: ../network/struct.FlatNetwork.html
pub use self::linear::Linear;
pub use self::relu::ReLU;
pub use self::sigmoid::Sigmoid;
pub use self::tanh::TanH;

pub mod linear;
pub mod relu;
pub mod sigmoid;
pub mod tanh;

/// An element-wise activation function and its derivative.
pub trait IActivation {
    /// Applies the function in place to every value of `values`.
    fn activate(&self, values: &mut [f64]);

    /// The derivative at a neuron, given its weighted sum `before` and its output `after`.
    fn derivative(&self, before: f64, after: f64) -> f64;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// All available activation functions.
///
/// Stored per layer inside a flat network; dispatches to the [IActivation][1] implementations.
/// [1]: ./trait.IActivation.html
pub enum ActivationType {
    /// Identity. See [Linear][1].
    /// [1]: ./linear/struct.Linear.html
    Linear,
    /// Logistic sigmoid. See [Sigmoid][1].
    /// [1]: ./sigmoid/struct.Sigmoid.html
    Sigmoid,
    /// Hyperbolic tangent. See [TanH][1].
    /// [1]: ./tanh/struct.TanH.html
    TanH,
    /// Rectified linear unit. See [ReLU][1].
    /// [1]: ./relu/struct.ReLU.html
    ReLU,
}

impl ActivationType {
    fn function(&self) -> &'static dyn IActivation {
        match *self {
            ActivationType::Linear => &Linear,
            ActivationType::Sigmoid => &Sigmoid,
            ActivationType::TanH => &TanH,
            ActivationType::ReLU => &ReLU,
        }
    }
}

impl IActivation for ActivationType {
    fn activate(&self, values: &mut [f64]) {
        self.function().activate(values)
    }

    fn derivative(&self, before: f64, after: f64) -> f64 {
        self.function().derivative(before, after)
    }
}
