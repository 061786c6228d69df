//! flatnet is the training core of feed-forward neural networks, built around a flat, array
//! based network representation and parallel gradient computation.
//!
//! ## Architecture
//!
//! A [FlatNetwork][network] keeps its whole topology in a handful of contiguous arrays: neuron
//! counts and offsets per layer, one weight array for every layer transition and one output
//! buffer for every neuron. Forward and backward passes run over these arrays without
//! allocating, and context neurons give the networks limited recurrence (Elman and Jordan
//! networks).
//!
//! Training data is read through the [TrainingSet][data] trait, which hands out records by
//! index and can open independent handles for parallel readers.
//!
//! The learning happens at the [Solver][solver]. Every iteration splits the training set into
//! partitions, runs one [GradientWorker][worker] per partition on its own thread against a
//! read-only view of the weights, sums their gradients and applies an [update rule][solvers]:
//! plain backpropagation with momentum, resilient propagation or Adam. [Strategies][strategy]
//! can watch the error between iterations and adapt the learning rate, reinitialize a stalled
//! network or stop training.
//!
//! On top of that, the [ConcurrentTrainingManager][concurrent] runs many independent training
//! jobs (e.g. the candidates of a hyperparameter sweep) across the available CPU cores and
//! accelerator devices.
//!
//! [network]: ./network/index.html
//! [data]: ./data/index.html
//! [solver]: ./solver/index.html
//! [worker]: ./solver/gradient_worker/index.html
//! [solvers]: ./solvers/index.html
//! [strategy]: ./strategy/index.html
//! [concurrent]: ./concurrent/index.html
//!
//! ## Examples
//!
//! ```
//! # extern crate flatnet;
//! # use flatnet::activation::ActivationType;
//! # use flatnet::data::MemoryTrainingSet;
//! # use flatnet::network::{FlatNetwork, NetworkConfig};
//! # use flatnet::solver::{Solver, SolverConfig};
//! # use flatnet::solvers::Resilient;
//! # fn main() {
//! let cfg = NetworkConfig::feedforward("xor", &[2, 3, 1], ActivationType::Sigmoid);
//! let network = FlatNetwork::with_weights(&cfg, vec![0.1f64; 13]).unwrap();
//! let data = MemoryTrainingSet::from_slices(
//!     &[vec![0f64, 0f64], vec![0f64, 1f64], vec![1f64, 0f64], vec![1f64, 1f64]],
//!     &[vec![0f64], vec![1f64], vec![1f64], vec![0f64]],
//! ).unwrap();
//!
//! let config = SolverConfig { threads: 2, ..SolverConfig::default() };
//! let mut solver = Solver::from_config(network, Box::new(data), Resilient::default(), &config).unwrap();
//! let error = solver.iteration().unwrap();
//! assert!(error > 0f64);
//! # }
//! ```
#![deny(unsafe_code)]
#![warn(missing_docs,
        missing_debug_implementations,
        trivial_casts, trivial_numeric_casts,
        unused_import_braces, unused_qualifications)]

#[macro_use]
extern crate log;

pub mod activation;
pub mod concurrent;
pub mod data;
pub mod error;
pub mod math;
pub mod network;
pub mod solver;
pub mod solvers;
pub mod strategy;
pub mod util;
pub mod weight;
