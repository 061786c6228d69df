//! Computes the gradients of one partition of the training data.
//!
//! A worker owns everything it writes to: its own neuron buffers, error deltas, gradient array
//! and handle on the training data. The only thing it shares is the weight array, which it reads
//! through a view the solver hands out for one pass.
//!
//! For every record of its partition the worker runs a forward pass, seeds the output deltas
//!
//! ```text
//! delta[output] = activation'(output) * (ideal - actual)
//! ```
//!
//! and propagates them back towards the input layer, accumulating
//! `gradient[w] += source_output * target_delta` for every weight. The gradients therefore point
//! in the direction that lowers the error; update rules add them to the weights.
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::activation::IActivation;
use crate::data::{TrainingPair, TrainingSet};
use crate::error::{panic_message, Error, Result};
use crate::math;
use crate::network::{FlatNetwork, NeuronBuffers, Topology};
use crate::solver::error_calculation::ErrorCalculation;
use crate::util::Partition;

#[derive(Debug, Copy, Clone, PartialEq)]
/// What a worker reports after a successful pass.
pub struct GradientOutcome {
    /// Index of the worker.
    pub index: usize,
    /// Errors accumulated over the partition.
    pub error: ErrorCalculation,
    /// Wall-clock time of the pass.
    pub elapsed: Duration,
}

#[derive(Debug)]
/// Computes forward passes, errors and gradients for one partition.
pub struct GradientWorker {
    index: usize,
    topology: Arc<Topology>,
    training: Box<dyn TrainingSet>,
    partition: Partition,
    buffers: NeuronBuffers,
    deltas: Vec<f64>,
    gradients: Vec<f64>,
    pair: TrainingPair,
    error: ErrorCalculation,
    elapsed: Duration,
}

impl GradientWorker {
    /// Create a worker for `partition` of `training`, shaped after `network`.
    ///
    /// Context neurons start cleared on every [run][1], so a pass only depends on the weights and
    /// the records of the partition.
    /// [1]: #method.run
    pub fn new(index: usize, network: &FlatNetwork, training: Box<dyn TrainingSet>, partition: Partition) -> GradientWorker {
        let topology = network.shared_topology();
        let pair = TrainingPair::with_sizes(training.input_size(), training.ideal_size());
        GradientWorker {
            index: index,
            deltas: vec![0f64; topology.neuron_count()],
            gradients: vec![0f64; topology.weight_count()],
            buffers: NeuronBuffers::new(&topology),
            topology: topology,
            training: training,
            partition: partition,
            pair: pair,
            error: ErrorCalculation::default(),
            elapsed: Duration::default(),
        }
    }

    /// Process every record of the partition with `weights`.
    ///
    /// Gradients, errors and context neurons of the previous pass are discarded first.
    pub fn run(&mut self, weights: &[f64]) -> Result<GradientOutcome> {
        let start = Instant::now();
        self.error.reset();
        math::zero(&mut self.gradients);
        if self.topology.has_context() {
            self.buffers.clear_context(&self.topology);
        }

        for index in self.partition.low..=self.partition.high {
            self.training.get_record(index, &mut self.pair)?;
            self.topology.compute_into(weights, &mut self.buffers, &self.pair.input)?;
            self.backpropagate(weights);
        }

        self.elapsed = start.elapsed();
        trace!("Gradient worker {} processed records {}..={} in {:?}",
               self.index, self.partition.low, self.partition.high, self.elapsed);
        Ok(GradientOutcome {
            index: self.index,
            error: self.error,
            elapsed: self.elapsed,
        })
    }

    /// Like [run][1], but a panic inside the pass is reported as [Error::WorkerPanicked][2].
    /// [1]: #method.run
    /// [2]: ../../error/enum.Error.html#variant.WorkerPanicked
    pub fn run_guarded(&mut self, weights: &[f64]) -> Result<GradientOutcome> {
        let index = self.index;
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(weights))) {
            Ok(result) => result,
            Err(payload) => Err(Error::WorkerPanicked { index: index, message: panic_message(payload.as_ref()) }),
        }
    }

    fn backpropagate(&mut self, weights: &[f64]) {
        let topology = &*self.topology;
        let last = topology.layer_count() - 1;
        let output_index = topology.layer_index()[last];
        let output_count = topology.output_count();
        let activation = topology.activation(last);

        for i in 0..output_count {
            let actual = self.buffers.layer_output[output_index + i];
            let derivative = activation.derivative(self.buffers.layer_sums[output_index + i], actual);
            self.deltas[output_index + i] = derivative * (self.pair.ideal[i] - actual);
        }
        self.error.update(&self.buffers.layer_output[output_index..output_index + output_count], &self.pair.ideal);

        for transition in (0..last).rev() {
            process_level(topology, transition, weights, &self.buffers, &mut self.deltas, &mut self.gradients);
        }
    }

    /// Index of the worker.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The records this worker processes.
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Gradients of the last pass.
    pub fn gradients(&self) -> &[f64] {
        &self.gradients
    }

    /// Wall-clock time of the last pass.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

// Accumulates the gradients of one layer transition and propagates the deltas of its target
// layer to the feed neurons of its source layer. Bias and context neurons get gradients but no
// delta, and the input layer needs no deltas at all.
fn process_level(topology: &Topology,
                 transition: usize,
                 weights: &[f64],
                 buffers: &NeuronBuffers,
                 deltas: &mut [f64],
                 gradients: &mut [f64]) {
    let from_index = topology.layer_index()[transition];
    let from_size = topology.layer_counts()[transition];
    let from_feed = topology.layer_feed_counts()[transition];
    let to_index = topology.layer_index()[transition + 1];
    let to_size = topology.layer_feed_counts()[transition + 1];
    let block = topology.weight_index()[transition];
    let activation = topology.activation(transition);

    for y in 0..from_size {
        let output = buffers.layer_output[from_index + y];
        let mut sum = 0f64;
        let mut w = block + y;
        for x in 0..to_size {
            let delta = deltas[to_index + x];
            gradients[w] += output * delta;
            sum += weights[w] * delta;
            w += from_size;
        }
        if transition > 0 && y < from_feed {
            deltas[from_index + y] = sum * activation.derivative(buffers.layer_sums[from_index + y], output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationType;
    use crate::data::MemoryTrainingSet;
    use crate::network::NetworkConfig;

    // numeric gradient of the summed squared error, halved, for one weight
    fn numeric_gradient(network: &FlatNetwork, data: &MemoryTrainingSet, weight: usize) -> f64 {
        let h = 1e-6f64;
        let error_with = |offset: f64| {
            let mut shifted = network.clone();
            shifted.weights_mut()[weight] += offset;
            let mut output = vec![0f64; shifted.output_count()];
            let mut sum = 0f64;
            for pair in data.pairs() {
                shifted.compute(&pair.input, &mut output).unwrap();
                sum += output.iter().zip(&pair.ideal).map(|(a, i)| (i - a) * (i - a)).sum::<f64>();
            }
            sum / 2f64
        };
        -(error_with(h) - error_with(-h)) / (2f64 * h)
    }

    #[test]
    fn gradients_match_finite_differences() {
        let cfg = NetworkConfig::feedforward("numeric", &[2, 3, 2], ActivationType::TanH);
        let weights: Vec<f64> = (0..17).map(|i| ((i * 7 % 11) as f64 - 5f64) / 10f64).collect();
        let network = FlatNetwork::with_weights(&cfg, weights).unwrap();
        let data = MemoryTrainingSet::from_slices(
            &[vec![0.1f64, -0.4f64], vec![0.7f64, 0.2f64], vec![-0.3f64, 0.9f64]],
            &[vec![0.5f64, -0.2f64], vec![-0.1f64, 0.3f64], vec![0.8f64, 0f64]],
        ).unwrap();

        let mut worker = GradientWorker::new(0, &network, Box::new(data.clone()), Partition { low: 0, high: 2 });
        let outcome = worker.run(network.weights()).unwrap();
        assert_eq!(outcome.error.set_size(), 6);
        for w in 0..network.weight_count() {
            let numeric = numeric_gradient(&network, &data, w);
            assert!((worker.gradients()[w] - numeric).abs() < 1e-6,
                    "weight {}: {} vs {}", w, worker.gradients()[w], numeric);
        }
    }

    #[test]
    fn run_resets_previous_pass() {
        let cfg = NetworkConfig::feedforward("reset", &[1, 2, 1], ActivationType::Sigmoid);
        let network = FlatNetwork::with_weights(&cfg, vec![0.3f64; 7]).unwrap();
        let data = MemoryTrainingSet::from_slices(&[vec![1f64]], &[vec![0f64]]).unwrap();
        let mut worker = GradientWorker::new(0, &network, Box::new(data), Partition { low: 0, high: 0 });
        let first = worker.run(network.weights()).unwrap();
        let gradients = worker.gradients().to_vec();
        let second = worker.run(network.weights()).unwrap();
        assert_eq!(first.error, second.error);
        assert_eq!(gradients, worker.gradients());
    }

    #[test]
    fn context_does_not_leak_between_passes() {
        let cfg = NetworkConfig::elman("leak", 1, 2, 1, ActivationType::TanH);
        let network = FlatNetwork::with_weights(&cfg, vec![0.4f64; 11]).unwrap();
        let data = MemoryTrainingSet::from_slices(&[vec![1f64], vec![-0.5f64], vec![0.3f64]],
                                                  &[vec![0.2f64], vec![0.7f64], vec![-0.1f64]]).unwrap();
        let mut worker = GradientWorker::new(0, &network, Box::new(data), Partition { low: 0, high: 2 });
        let first = worker.run(network.weights()).unwrap();
        let gradients = worker.gradients().to_vec();
        let second = worker.run(network.weights()).unwrap();
        assert_eq!(first.error, second.error);
        assert_eq!(gradients, worker.gradients());
    }

    #[test]
    fn missing_records_are_reported() {
        let cfg = NetworkConfig::feedforward("short", &[1, 1], ActivationType::Linear);
        let network = FlatNetwork::from_config(&cfg).unwrap();
        let data = MemoryTrainingSet::from_slices(&[vec![1f64]], &[vec![0f64]]).unwrap();
        let mut worker = GradientWorker::new(3, &network, Box::new(data), Partition { low: 0, high: 1 });
        assert!(matches!(worker.run_guarded(network.weights()), Err(Error::RecordOutOfRange { index: 1, count: 1 })));
    }
}
