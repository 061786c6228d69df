//! Provides the flat, array-based representation of a feed-forward network.
//!
//! A [FlatNetwork][1] stores the whole model in a handful of contiguous arrays instead of a graph
//! of layer objects. Every neuron of every layer lives in one output array, every weight of every
//! layer transition lives in one weight array, and a few index arrays tell where each layer
//! starts. This makes forward and backward passes allocation-free and cache friendly, and it
//! makes a training iteration easy to split: the weight array is the only state workers share.
//!
//! Layers are numbered from the input layer (`0`) to the output layer. Inside the output array
//! each layer is laid out as
//!
//! ```text
//! [ feed neurons | bias neuron (optional) | context neurons (optional) ]
//! ```
//!
//! Only feed neurons are computed from the previous layer. The bias neuron holds a constant
//! activation, context neurons hold the delayed output of the layer that feeds them (Elman/Jordan
//! style recurrence). Both act as additional inputs of the next layer transition.
//!
//! The weights of the transition from layer `t` to layer `t + 1` form one block starting at
//! `weight_index[t]`, ordered by target neuron and then by source neuron.
//!
//! ## Examples
//!
//! ```
//! # use flatnet::network::*;
//! # use flatnet::activation::ActivationType;
//! let cfg = NetworkConfig::feedforward("xor", &[2, 3, 1], ActivationType::Sigmoid);
//! let mut network = FlatNetwork::from_config(&cfg).unwrap();
//! let mut output = [0f64];
//! network.compute(&[0f64, 1f64], &mut output).unwrap();
//! ```
//!
//! [1]: ./struct.FlatNetwork.html
use std::sync::Arc;
use rand::Rng;
use crate::activation::{ActivationType, IActivation};
use crate::error::{Error, Result};
use crate::math;
use crate::weight::FillerType;

#[derive(Debug, Clone)]
/// Configuration of a single layer.
pub struct LayerConfig {
    /// Number of feed neurons (excluding bias and context neurons).
    pub neurons: usize,
    /// The activation function applied to the weighted sums of this layer.
    ///
    /// Ignored for the input layer.
    pub activation: ActivationType,
    /// Whether this layer carries a bias neuron feeding the next layer.
    ///
    /// The output layer never carries a bias neuron.
    ///
    /// Default: true
    pub bias: bool,
    /// The constant output of the bias neuron.
    ///
    /// Default: 1.0
    pub bias_activation: f64,
    /// Index of the layer whose outputs are copied into context neurons of this layer.
    ///
    /// Default: None
    pub context_fed_by: Option<usize>,
}

impl LayerConfig {
    /// Create a LayerConfig with a bias neuron and no context.
    pub fn new(neurons: usize, activation: ActivationType) -> LayerConfig {
        LayerConfig {
            neurons: neurons,
            activation: activation,
            bias: true,
            bias_activation: 1f64,
            context_fed_by: None,
        }
    }

    /// Enable or disable the bias neuron.
    pub fn with_bias(mut self, bias: bool) -> LayerConfig {
        self.bias = bias;
        self
    }

    /// Let the outputs of layer `layer` feed context neurons of this layer.
    pub fn with_context_from(mut self, layer: usize) -> LayerConfig {
        self.context_fed_by = Some(layer);
        self
    }
}

#[derive(Debug, Clone, Default)]
/// Configuration of a flat network, listing its layers from input to output.
pub struct NetworkConfig {
    /// Name of the network, used in log output.
    pub name: String,
    layers: Vec<LayerConfig>,
}

impl NetworkConfig {
    /// Create an empty network configuration.
    pub fn new(name: &str) -> NetworkConfig {
        NetworkConfig {
            name: name.to_owned(),
            layers: Vec::new(),
        }
    }

    /// Create a plain multilayer perceptron.
    ///
    /// The input layer is linear, all other layers use `activation`. Every layer except the
    /// output layer carries a bias neuron.
    pub fn feedforward(name: &str, sizes: &[usize], activation: ActivationType) -> NetworkConfig {
        let mut cfg = NetworkConfig::new(name);
        for (i, size) in sizes.iter().enumerate() {
            let layer_activation = if i == 0 { ActivationType::Linear } else { activation };
            cfg.add_layer(LayerConfig::new(*size, layer_activation));
        }
        cfg
    }

    /// Create an Elman network: the hidden layer feeds context neurons of the input layer.
    pub fn elman(name: &str, inputs: usize, hidden: usize, outputs: usize, activation: ActivationType) -> NetworkConfig {
        let mut cfg = NetworkConfig::new(name);
        cfg.add_layer(LayerConfig::new(inputs, ActivationType::Linear).with_context_from(1));
        cfg.add_layer(LayerConfig::new(hidden, activation));
        cfg.add_layer(LayerConfig::new(outputs, activation));
        cfg
    }

    /// Append a layer, returning its index.
    pub fn add_layer(&mut self, layer: LayerConfig) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    /// The configured layers, input layer first.
    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }
}

#[derive(Debug, Clone, PartialEq)]
/// The immutable structure of a flat network: layer sizes, offsets and activation functions.
///
/// Shared between a network and the gradient workers training it.
pub struct Topology {
    layer_counts: Vec<usize>,
    layer_feed_counts: Vec<usize>,
    layer_context_counts: Vec<usize>,
    layer_index: Vec<usize>,
    weight_index: Vec<usize>,
    activations: Vec<ActivationType>,
    has_bias: Vec<bool>,
    bias_activation: Vec<f64>,
    context_target_offset: Vec<usize>,
    context_target_size: Vec<usize>,
    has_context: bool,
    neuron_count: usize,
    weight_count: usize,
}

impl Topology {
    /// Derive the flat layout from a [NetworkConfig][1].
    /// [1]: ./struct.NetworkConfig.html
    pub fn from_config(config: &NetworkConfig) -> Result<Topology> {
        let layers = config.layers();
        if layers.len() < 2 {
            return Err(Error::InvalidTopology(format!("'{}' needs at least an input and an output layer", config.name)));
        }
        if let Some(empty) = layers.iter().position(|l| l.neurons == 0) {
            return Err(Error::InvalidTopology(format!("layer {} of '{}' has no neurons", empty, config.name)));
        }
        let output_layer = layers.len() - 1;

        // which layer feeds the context neurons of which
        let mut context_source_of = vec![None; layers.len()];
        let mut context_target_of: Vec<Option<usize>> = vec![None; layers.len()];
        for (target, layer) in layers.iter().enumerate() {
            if let Some(source) = layer.context_fed_by {
                if source >= layers.len() {
                    return Err(Error::InvalidTopology(format!("layer {} takes context from missing layer {}", target, source)));
                }
                if target == output_layer {
                    return Err(Error::InvalidTopology("the output layer can not hold context neurons".to_owned()));
                }
                if let Some(other) = context_target_of[source] {
                    return Err(Error::InvalidTopology(format!("layer {} already feeds context of layer {}", source, other)));
                }
                context_target_of[source] = Some(target);
                context_source_of[target] = Some(source);
            }
        }

        let has_bias: Vec<bool> = layers.iter().enumerate().map(|(i, l)| l.bias && i != output_layer).collect();
        let layer_feed_counts: Vec<usize> = layers.iter().map(|l| l.neurons).collect();
        let layer_context_counts: Vec<usize> = context_source_of.iter()
            .map(|source| source.map_or(0, |s| layers[s].neurons))
            .collect();
        let layer_counts: Vec<usize> = (0..layers.len())
            .map(|i| layer_feed_counts[i] + if has_bias[i] { 1 } else { 0 } + layer_context_counts[i])
            .collect();

        let mut layer_index = Vec::with_capacity(layers.len());
        let mut neuron_count = 0;
        for count in &layer_counts {
            layer_index.push(neuron_count);
            neuron_count += *count;
        }

        let mut weight_index = Vec::with_capacity(layers.len() - 1);
        let mut weight_count = 0;
        for t in 0..output_layer {
            weight_index.push(weight_count);
            weight_count += layer_counts[t] * layer_feed_counts[t + 1];
        }

        let mut context_target_offset = vec![0; layers.len()];
        let mut context_target_size = vec![0; layers.len()];
        for (source, target) in context_target_of.iter().enumerate() {
            if let Some(target) = *target {
                context_target_offset[source] = layer_index[target] + layer_feed_counts[target] + if has_bias[target] { 1 } else { 0 };
                context_target_size[source] = layer_feed_counts[source];
            }
        }

        Ok(Topology {
            layer_counts: layer_counts,
            layer_feed_counts: layer_feed_counts,
            layer_context_counts: layer_context_counts,
            layer_index: layer_index,
            weight_index: weight_index,
            activations: layers.iter().map(|l| l.activation).collect(),
            bias_activation: layers.iter().map(|l| l.bias_activation).collect(),
            has_bias: has_bias,
            context_target_offset: context_target_offset,
            context_target_size: context_target_size,
            has_context: context_target_of.iter().any(Option::is_some),
            neuron_count: neuron_count,
            weight_count: weight_count,
        })
    }

    /// Total neurons per layer, including bias and context neurons.
    pub fn layer_counts(&self) -> &[usize] {
        &self.layer_counts
    }

    /// Feed neurons per layer.
    pub fn layer_feed_counts(&self) -> &[usize] {
        &self.layer_feed_counts
    }

    /// Context neurons per layer.
    pub fn layer_context_counts(&self) -> &[usize] {
        &self.layer_context_counts
    }

    /// Offset of each layer in the neuron arrays.
    pub fn layer_index(&self) -> &[usize] {
        &self.layer_index
    }

    /// Offset of each layer transition's block in the weight array.
    pub fn weight_index(&self) -> &[usize] {
        &self.weight_index
    }

    /// Per source layer: offset of the context neurons it feeds.
    pub fn context_target_offset(&self) -> &[usize] {
        &self.context_target_offset
    }

    /// Per source layer: number of context neurons it feeds (0 if none).
    pub fn context_target_size(&self) -> &[usize] {
        &self.context_target_size
    }

    /// Whether any layer holds context neurons.
    pub fn has_context(&self) -> bool {
        self.has_context
    }

    /// Activation function of `layer`.
    pub fn activation(&self, layer: usize) -> ActivationType {
        self.activations[layer]
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layer_counts.len()
    }

    /// Size of the input vector.
    pub fn input_count(&self) -> usize {
        self.layer_feed_counts[0]
    }

    /// Size of the output vector.
    pub fn output_count(&self) -> usize {
        self.layer_feed_counts[self.layer_feed_counts.len() - 1]
    }

    /// Length of the neuron arrays.
    pub fn neuron_count(&self) -> usize {
        self.neuron_count
    }

    /// Length of the weight array.
    pub fn weight_count(&self) -> usize {
        self.weight_count
    }

    /// Position in the weight array of the connection `from -> to` of transition `transition`.
    ///
    /// `from` counts all neurons of the source layer, `to` the feed neurons of the target layer.
    pub fn weight_offset(&self, transition: usize, from: usize, to: usize) -> usize {
        self.weight_index[transition] + to * self.layer_counts[transition] + from
    }

    /// The output layer's slice of a neuron array.
    pub fn output<'a>(&self, layer_output: &'a [f64]) -> &'a [f64] {
        let last = self.layer_count() - 1;
        let start = self.layer_index[last];
        &layer_output[start..start + self.layer_feed_counts[last]]
    }

    /// Runs a forward pass of `input` with `weights`, writing activations into `buffers`.
    ///
    /// Only reads `weights`, so any number of passes may share one weight array.
    pub fn compute_into(&self, weights: &[f64], buffers: &mut NeuronBuffers, input: &[f64]) -> Result<()> {
        if input.len() != self.input_count() {
            return Err(Error::InputSizeMismatch { expected: self.input_count(), actual: input.len() });
        }
        debug_assert_eq!(weights.len(), self.weight_count);

        let start = self.layer_index[0];
        buffers.layer_output[start..start + input.len()].copy_from_slice(input);
        self.copy_context(0, buffers);

        for transition in 0..self.layer_count() - 1 {
            self.compute_transition(transition, weights, buffers);
            self.copy_context(transition + 1, buffers);
        }
        Ok(())
    }

    fn compute_transition(&self, transition: usize, weights: &[f64], buffers: &mut NeuronBuffers) {
        let from_index = self.layer_index[transition];
        let from_size = self.layer_counts[transition];
        let to_index = self.layer_index[transition + 1];
        let to_size = self.layer_feed_counts[transition + 1];

        let (lower, upper) = buffers.layer_output.split_at_mut(to_index);
        let source = &lower[from_index..from_index + from_size];
        let target = &mut upper[..to_size];

        let mut w = self.weight_index[transition];
        for x in 0..to_size {
            let sum = math::dot(&weights[w..w + from_size], source);
            buffers.layer_sums[to_index + x] = sum;
            target[x] = sum;
            w += from_size;
        }
        self.activations[transition + 1].activate(target);
    }

    fn copy_context(&self, layer: usize, buffers: &mut NeuronBuffers) {
        let size = self.context_target_size[layer];
        if size > 0 {
            let start = self.layer_index[layer];
            buffers.layer_output.copy_within(start..start + size, self.context_target_offset[layer]);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// The per-pass state of a network: neuron outputs and weighted sums.
///
/// Every thread computing passes owns its own buffers.
pub struct NeuronBuffers {
    /// Output of every neuron, overwritten on each forward pass.
    pub layer_output: Vec<f64>,
    /// Weighted sum of every neuron before activation.
    pub layer_sums: Vec<f64>,
}

impl NeuronBuffers {
    /// Allocate buffers for `topology`, with bias neurons set and context neurons cleared.
    pub fn new(topology: &Topology) -> NeuronBuffers {
        let mut buffers = NeuronBuffers {
            layer_output: vec![0f64; topology.neuron_count()],
            layer_sums: vec![0f64; topology.neuron_count()],
        };
        for layer in 0..topology.layer_count() {
            if topology.has_bias[layer] {
                let bias = topology.layer_index[layer] + topology.layer_feed_counts[layer];
                buffers.layer_output[bias] = topology.bias_activation[layer];
            }
        }
        buffers
    }

    /// Zero all context neurons.
    pub fn clear_context(&mut self, topology: &Topology) {
        for layer in 0..topology.layer_count() {
            let size = topology.context_target_size[layer];
            if size > 0 {
                let offset = topology.context_target_offset[layer];
                math::zero(&mut self.layer_output[offset..offset + size]);
            }
        }
    }
}

#[derive(Debug, Clone)]
/// A feed-forward network in flat representation.
///
/// The weight array is reference counted: solvers hand read-only views of it to their gradient
/// workers during an iteration, and the next write through [weights_mut][1] only happens after
/// all views are returned (or copies the array if one is still held).
///
/// [1]: #method.weights_mut
pub struct FlatNetwork {
    /// Name of the network, used in log output.
    pub name: String,
    topology: Arc<Topology>,
    weights: Arc<Vec<f64>>,
    buffers: NeuronBuffers,
}

impl FlatNetwork {
    /// Create a network with all weights set to zero.
    pub fn from_config(config: &NetworkConfig) -> Result<FlatNetwork> {
        let topology = Topology::from_config(config)?;
        info!("Flat network '{}': layers {:?}, {} weights{}",
              config.name,
              topology.layer_counts(),
              topology.weight_count(),
              if topology.has_context() { ", with context" } else { "" });
        let weights = vec![0f64; topology.weight_count()];
        let buffers = NeuronBuffers::new(&topology);
        Ok(FlatNetwork {
            name: config.name.clone(),
            topology: Arc::new(topology),
            weights: Arc::new(weights),
            buffers: buffers,
        })
    }

    /// Create a network with the given weights.
    pub fn with_weights(config: &NetworkConfig, weights: Vec<f64>) -> Result<FlatNetwork> {
        let mut network = FlatNetwork::from_config(config)?;
        network.set_weights(&weights)?;
        Ok(network)
    }

    /// Compute the output of the network for `input`.
    ///
    /// Context neurons are updated as a side effect, so recurrent networks depend on the
    /// previous calls. For networks without context the output only depends on weights and input.
    pub fn compute(&mut self, input: &[f64], output: &mut [f64]) -> Result<()> {
        if output.len() != self.output_count() {
            return Err(Error::OutputSizeMismatch { expected: self.output_count(), actual: output.len() });
        }
        self.topology.compute_into(&self.weights, &mut self.buffers, input)?;
        output.copy_from_slice(self.topology.output(&self.buffers.layer_output));
        Ok(())
    }

    /// The network structure.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// A shared handle on the network structure.
    pub fn shared_topology(&self) -> Arc<Topology> {
        self.topology.clone()
    }

    /// The flat weight array.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Mutable access to the flat weight array.
    ///
    /// Copies the array first if a read-only view of it is still alive.
    pub fn weights_mut(&mut self) -> &mut [f64] {
        Arc::make_mut(&mut self.weights).as_mut_slice()
    }

    /// A read-only view of the current weights, for gradient workers.
    pub fn weights_view(&self) -> Arc<Vec<f64>> {
        self.weights.clone()
    }

    /// Replace all weights.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.weight_count() {
            return Err(Error::InvalidTopology(format!("network '{}' has {} weights, got {}",
                                                      self.name, self.weight_count(), weights.len())));
        }
        self.weights_mut().copy_from_slice(weights);
        Ok(())
    }

    /// Output of every neuron after the last [compute][1].
    /// [1]: #method.compute
    pub fn layer_output(&self) -> &[f64] {
        &self.buffers.layer_output
    }

    /// Weighted sums of every neuron after the last [compute][1].
    /// [1]: #method.compute
    pub fn layer_sums(&self) -> &[f64] {
        &self.buffers.layer_sums
    }

    /// The network's own neuron buffers.
    pub fn buffers(&self) -> &NeuronBuffers {
        &self.buffers
    }

    /// Fill every layer transition using `filler`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, filler: &FillerType, rng: &mut R) -> Result<()> {
        let topology = self.topology.clone();
        let weights = self.weights_mut();
        for t in 0..topology.layer_count() - 1 {
            let inputs = topology.layer_counts()[t];
            let outputs = topology.layer_feed_counts()[t + 1];
            let start = topology.weight_index()[t];
            filler.fill(&mut weights[start..start + inputs * outputs], inputs, outputs, rng)?;
        }
        debug!("Randomized {} weights of '{}' with {:?}", topology.weight_count(), self.name, filler);
        Ok(())
    }

    /// Zero all context neurons.
    pub fn clear_context(&mut self) {
        self.buffers.clear_context(&self.topology);
    }

    /// Size of the input vector.
    pub fn input_count(&self) -> usize {
        self.topology.input_count()
    }

    /// Size of the output vector.
    pub fn output_count(&self) -> usize {
        self.topology.output_count()
    }

    /// Number of weights.
    pub fn weight_count(&self) -> usize {
        self.topology.weight_count()
    }
}
