//! Network layer variants.
//!
//! Each layer owns its parameters, its output buffer and its delta buffer.
//! The backward pass accumulates the error gradient into the layer's own
//! buffers and propagates deltas to the previous layer; `update` applies the
//! accumulated gradient and clears it.

use std::io::{Read, Write};

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::codec;
use crate::error::{Error, Result};

const WEIGHT_INIT_SIGMA: f64 = 0.1;
const NOISE_SIGMA: f64 = 0.1;

/// Activation functions for connected and recurrent layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Logistic,
    Tanh,
    Relu,
    Linear,
}

impl Activation {
    pub(crate) fn apply(self, x: f64) -> f64 {
        match self {
            Self::Logistic => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::Relu => x.max(0.0),
            Self::Linear => x,
        }
    }

    /// Derivative expressed in terms of the activated output.
    pub(crate) fn gradient(self, y: f64) -> f64 {
        match self {
            Self::Logistic => y * (1.0 - y),
            Self::Tanh => 1.0 - y * y,
            Self::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Linear => 1.0,
        }
    }

    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Logistic => 0,
            Self::Tanh => 1,
            Self::Relu => 2,
            Self::Linear => 3,
        }
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Logistic),
            1 => Some(Self::Tanh),
            2 => Some(Self::Relu),
            3 => Some(Self::Linear),
            _ => None,
        }
    }
}

pub(crate) fn gauss<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    Normal::new(0.0, sigma).unwrap().sample(rng)
}

/// Result of mutating a single layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerMutation {
    pub changed: bool,
    /// The layer's output width changed; downstream layers must resize.
    pub resized: bool,
}

/// Fully connected layer.
#[derive(Debug, Clone)]
pub struct Connected {
    pub(crate) n_inputs: usize,
    pub(crate) n_outputs: usize,
    /// Hidden layers may grow and shrink under mutation; output layers may
    /// not, since the network's output width is part of its contract.
    pub(crate) resizable: bool,
    pub(crate) max_outputs: usize,
    pub(crate) activation: Activation,
    /// Row-major `n_outputs x n_inputs`.
    pub(crate) weights: Vec<f64>,
    pub(crate) biases: Vec<f64>,
    pub(crate) output: Vec<f64>,
    pub(crate) delta: Vec<f64>,
    weight_grad: Vec<f64>,
    bias_grad: Vec<f64>,
}

impl Connected {
    pub(crate) fn new<R: Rng + ?Sized>(
        n_inputs: usize,
        n_outputs: usize,
        activation: Activation,
        resizable: bool,
        rng: &mut R,
    ) -> Self {
        let mut layer = Self {
            n_inputs,
            n_outputs,
            resizable,
            max_outputs: if resizable { n_outputs * 2 } else { n_outputs },
            activation,
            weights: vec![0.0; n_outputs * n_inputs],
            biases: vec![0.0; n_outputs],
            output: vec![0.0; n_outputs],
            delta: vec![0.0; n_outputs],
            weight_grad: vec![0.0; n_outputs * n_inputs],
            bias_grad: vec![0.0; n_outputs],
        };
        layer.rand_init(rng);
        layer
    }

    pub(crate) fn rand_init<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for w in &mut self.weights {
            *w = gauss(rng, WEIGHT_INIT_SIGMA);
        }
        for b in &mut self.biases {
            *b = gauss(rng, WEIGHT_INIT_SIGMA);
        }
    }

    pub(crate) fn forward(&mut self, input: &[f64]) {
        for o in 0..self.n_outputs {
            let row = &self.weights[o * self.n_inputs..(o + 1) * self.n_inputs];
            let sum = self.biases[o]
                + row
                    .iter()
                    .zip(input)
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
            self.output[o] = self.activation.apply(sum);
        }
    }

    pub(crate) fn backward(&mut self, input: &[f64], mut prev_delta: Option<&mut [f64]>) {
        for o in 0..self.n_outputs {
            let d = self.delta[o] * self.activation.gradient(self.output[o]);
            self.bias_grad[o] += d;
            let row = o * self.n_inputs;
            for i in 0..self.n_inputs {
                self.weight_grad[row + i] += d * input[i];
                if let Some(prev) = prev_delta.as_deref_mut() {
                    prev[i] += d * self.weights[row + i];
                }
            }
        }
    }

    pub(crate) fn update(&mut self, eta: f64) {
        for (w, g) in self.weights.iter_mut().zip(&mut self.weight_grad) {
            *w += eta * *g;
            *g = 0.0;
        }
        for (b, g) in self.biases.iter_mut().zip(&mut self.bias_grad) {
            *b += eta * *g;
            *g = 0.0;
        }
    }

    pub(crate) fn mutate<R: Rng + ?Sized>(
        &mut self,
        p_mutation: f64,
        s_mutation: f64,
        rng: &mut R,
    ) -> LayerMutation {
        let mut result = LayerMutation::default();
        for w in self.weights.iter_mut().chain(&mut self.biases) {
            if rng.random_bool(p_mutation) {
                *w += gauss(rng, s_mutation);
                result.changed = true;
            }
        }
        if self.resizable && rng.random_bool(p_mutation) {
            let grow = rng.random_bool(0.5);
            if grow && self.n_outputs < self.max_outputs {
                self.grow_neuron(rng);
                result.changed = true;
                result.resized = true;
            } else if !grow && self.n_outputs > 1 {
                self.shrink_neuron(rng);
                result.changed = true;
                result.resized = true;
            }
        }
        result
    }

    fn grow_neuron<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.n_outputs += 1;
        for _ in 0..self.n_inputs {
            self.weights.push(gauss(rng, WEIGHT_INIT_SIGMA));
        }
        self.biases.push(gauss(rng, WEIGHT_INIT_SIGMA));
        self.output.push(0.0);
        self.delta.push(0.0);
        self.weight_grad.resize(self.weights.len(), 0.0);
        self.bias_grad.push(0.0);
    }

    fn shrink_neuron<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let victim = rng.random_range(0..self.n_outputs);
        let start = victim * self.n_inputs;
        self.weights.drain(start..start + self.n_inputs);
        self.biases.remove(victim);
        self.n_outputs -= 1;
        self.output.truncate(self.n_outputs);
        self.delta.truncate(self.n_outputs);
        self.weight_grad.truncate(self.weights.len());
        self.bias_grad.truncate(self.n_outputs);
        for g in self
            .weight_grad
            .iter_mut()
            .chain(&mut self.bias_grad)
        {
            *g = 0.0;
        }
    }

    /// Adjusts the input width after the previous layer grew or shrank,
    /// preserving the weights of surviving connections.
    pub(crate) fn resize_inputs<R: Rng + ?Sized>(&mut self, n_inputs: usize, rng: &mut R) {
        let mut weights = vec![0.0; self.n_outputs * n_inputs];
        for o in 0..self.n_outputs {
            for i in 0..n_inputs {
                weights[o * n_inputs + i] = if i < self.n_inputs {
                    self.weights[o * self.n_inputs + i]
                } else {
                    gauss(rng, WEIGHT_INIT_SIGMA)
                };
            }
        }
        self.n_inputs = n_inputs;
        self.weights = weights;
        self.weight_grad = vec![0.0; self.n_outputs * n_inputs];
    }

    pub(crate) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_usize(w, self.n_inputs)?;
        codec::put_usize(w, self.n_outputs)?;
        codec::put_bool(w, self.resizable)?;
        codec::put_usize(w, self.max_outputs)?;
        codec::put_u8(w, self.activation.tag())?;
        codec::put_f64_slice(w, &self.weights)?;
        codec::put_f64_slice(w, &self.biases)
    }

    pub(crate) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let n_inputs = codec::get_usize(r)?;
        let n_outputs = codec::get_usize(r)?;
        let resizable = codec::get_bool(r)?;
        let max_outputs = codec::get_usize(r)?;
        let tag = codec::get_u8(r)?;
        let activation = Activation::from_tag(tag)
            .ok_or_else(|| Error::snapshot(format!("unknown activation tag: {tag}")))?;
        let weights = codec::get_f64_vec(r)?;
        let biases = codec::get_f64_vec(r)?;
        if weights.len() != n_outputs * n_inputs || biases.len() != n_outputs {
            return Err(Error::snapshot("connected layer size mismatch"));
        }
        Ok(Self {
            n_inputs,
            n_outputs,
            resizable,
            max_outputs,
            activation,
            weight_grad: vec![0.0; weights.len()],
            bias_grad: vec![0.0; n_outputs],
            output: vec![0.0; n_outputs],
            delta: vec![0.0; n_outputs],
            weights,
            biases,
        })
    }
}

/// Inverted dropout: active only during training passes.
#[derive(Debug, Clone)]
pub struct Dropout {
    pub(crate) n: usize,
    pub(crate) prob: f64,
    pub(crate) output: Vec<f64>,
    pub(crate) delta: Vec<f64>,
    mask: Vec<bool>,
}

impl Dropout {
    pub(crate) fn new(n: usize, prob: f64) -> Self {
        Self {
            n,
            prob,
            output: vec![0.0; n],
            delta: vec![0.0; n],
            mask: vec![true; n],
        }
    }

    /// A training pass supplies an RNG to sample the mask; inference passes
    /// are the identity.
    pub(crate) fn forward(&mut self, input: &[f64], rng: Option<&mut dyn rand::RngCore>) {
        if let Some(rng) = rng {
            let scale = 1.0 / (1.0 - self.prob);
            for i in 0..self.n {
                self.mask[i] = !rng.random_bool(self.prob);
                self.output[i] = if self.mask[i] { input[i] * scale } else { 0.0 };
            }
        } else {
            self.mask.fill(true);
            self.output.copy_from_slice(input);
        }
    }

    pub(crate) fn backward(&mut self, prev_delta: Option<&mut [f64]>) {
        if let Some(prev) = prev_delta {
            let scale = 1.0 / (1.0 - self.prob);
            for i in 0..self.n {
                prev[i] += if self.mask[i] { self.delta[i] * scale } else { 0.0 };
            }
        }
    }

    pub(crate) fn resize(&mut self, n: usize) {
        self.n = n;
        self.output.resize(n, 0.0);
        self.delta.resize(n, 0.0);
        self.mask.resize(n, true);
    }
}

/// Additive Gaussian noise, applied only during training passes.
#[derive(Debug, Clone)]
pub struct Noise {
    pub(crate) n: usize,
    pub(crate) prob: f64,
    pub(crate) output: Vec<f64>,
    pub(crate) delta: Vec<f64>,
}

impl Noise {
    pub(crate) fn new(n: usize, prob: f64) -> Self {
        Self {
            n,
            prob,
            output: vec![0.0; n],
            delta: vec![0.0; n],
        }
    }

    pub(crate) fn forward(&mut self, input: &[f64], rng: Option<&mut dyn rand::RngCore>) {
        self.output.copy_from_slice(input);
        if let Some(rng) = rng {
            for out in &mut self.output {
                if rng.random_bool(self.prob) {
                    *out += gauss(rng, NOISE_SIGMA);
                }
            }
        }
    }

    pub(crate) fn backward(&mut self, prev_delta: Option<&mut [f64]>) {
        if let Some(prev) = prev_delta {
            for i in 0..self.n {
                prev[i] += self.delta[i];
            }
        }
    }

    pub(crate) fn resize(&mut self, n: usize) {
        self.n = n;
        self.output.resize(n, 0.0);
        self.delta.resize(n, 0.0);
    }
}

/// Softmax normalisation. The backward pass forwards deltas unchanged,
/// assuming a cross-entropy pairing.
#[derive(Debug, Clone)]
pub struct Softmax {
    pub(crate) n: usize,
    pub(crate) output: Vec<f64>,
    pub(crate) delta: Vec<f64>,
}

impl Softmax {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            n,
            output: vec![0.0; n],
            delta: vec![0.0; n],
        }
    }

    pub(crate) fn forward(&mut self, input: &[f64]) {
        let max = input.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for i in 0..self.n {
            self.output[i] = (input[i] - max).exp();
            sum += self.output[i];
        }
        for out in &mut self.output {
            *out /= sum;
        }
    }

    pub(crate) fn backward(&mut self, prev_delta: Option<&mut [f64]>) {
        if let Some(prev) = prev_delta {
            for i in 0..self.n {
                prev[i] += self.delta[i];
            }
        }
    }

    pub(crate) fn resize(&mut self, n: usize) {
        self.n = n;
        self.output.resize(n, 0.0);
        self.delta.resize(n, 0.0);
    }
}

/// Simple recurrent layer with one-step truncated gradients.
#[derive(Debug, Clone)]
pub struct Recurrent {
    pub(crate) n_inputs: usize,
    pub(crate) n_outputs: usize,
    pub(crate) activation: Activation,
    /// Row-major `n_outputs x n_inputs`.
    pub(crate) input_weights: Vec<f64>,
    /// Row-major `n_outputs x n_outputs`.
    pub(crate) rec_weights: Vec<f64>,
    pub(crate) biases: Vec<f64>,
    pub(crate) output: Vec<f64>,
    pub(crate) delta: Vec<f64>,
    prev_state: Vec<f64>,
    input_grad: Vec<f64>,
    rec_grad: Vec<f64>,
    bias_grad: Vec<f64>,
}

impl Recurrent {
    pub(crate) fn new<R: Rng + ?Sized>(
        n_inputs: usize,
        n_outputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let mut layer = Self {
            n_inputs,
            n_outputs,
            activation,
            input_weights: vec![0.0; n_outputs * n_inputs],
            rec_weights: vec![0.0; n_outputs * n_outputs],
            biases: vec![0.0; n_outputs],
            output: vec![0.0; n_outputs],
            delta: vec![0.0; n_outputs],
            prev_state: vec![0.0; n_outputs],
            input_grad: vec![0.0; n_outputs * n_inputs],
            rec_grad: vec![0.0; n_outputs * n_outputs],
            bias_grad: vec![0.0; n_outputs],
        };
        layer.rand_init(rng);
        layer
    }

    pub(crate) fn rand_init<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for w in self
            .input_weights
            .iter_mut()
            .chain(&mut self.rec_weights)
            .chain(&mut self.biases)
        {
            *w = gauss(rng, WEIGHT_INIT_SIGMA);
        }
        self.prev_state.fill(0.0);
        self.output.fill(0.0);
    }

    pub(crate) fn forward(&mut self, input: &[f64]) {
        self.prev_state.copy_from_slice(&self.output);
        for o in 0..self.n_outputs {
            let in_row = &self.input_weights[o * self.n_inputs..(o + 1) * self.n_inputs];
            let rec_row = &self.rec_weights[o * self.n_outputs..(o + 1) * self.n_outputs];
            let sum = self.biases[o]
                + in_row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>()
                + rec_row
                    .iter()
                    .zip(&self.prev_state)
                    .map(|(w, s)| w * s)
                    .sum::<f64>();
            self.output[o] = self.activation.apply(sum);
        }
    }

    pub(crate) fn backward(&mut self, input: &[f64], mut prev_delta: Option<&mut [f64]>) {
        for o in 0..self.n_outputs {
            let d = self.delta[o] * self.activation.gradient(self.output[o]);
            self.bias_grad[o] += d;
            for i in 0..self.n_inputs {
                self.input_grad[o * self.n_inputs + i] += d * input[i];
                if let Some(prev) = prev_delta.as_deref_mut() {
                    prev[i] += d * self.input_weights[o * self.n_inputs + i];
                }
            }
            for s in 0..self.n_outputs {
                self.rec_grad[o * self.n_outputs + s] += d * self.prev_state[s];
            }
        }
    }

    pub(crate) fn update(&mut self, eta: f64) {
        for (w, g) in self
            .input_weights
            .iter_mut()
            .zip(&mut self.input_grad)
            .chain(self.rec_weights.iter_mut().zip(&mut self.rec_grad))
            .chain(self.biases.iter_mut().zip(&mut self.bias_grad))
        {
            *w += eta * *g;
            *g = 0.0;
        }
    }

    pub(crate) fn mutate<R: Rng + ?Sized>(
        &mut self,
        p_mutation: f64,
        s_mutation: f64,
        rng: &mut R,
    ) -> LayerMutation {
        let mut changed = false;
        for w in self
            .input_weights
            .iter_mut()
            .chain(&mut self.rec_weights)
            .chain(&mut self.biases)
        {
            if rng.random_bool(p_mutation) {
                *w += gauss(rng, s_mutation);
                changed = true;
            }
        }
        LayerMutation {
            changed,
            resized: false,
        }
    }

    pub(crate) fn resize_inputs<R: Rng + ?Sized>(&mut self, n_inputs: usize, rng: &mut R) {
        let mut weights = vec![0.0; self.n_outputs * n_inputs];
        for o in 0..self.n_outputs {
            for i in 0..n_inputs {
                weights[o * n_inputs + i] = if i < self.n_inputs {
                    self.input_weights[o * self.n_inputs + i]
                } else {
                    gauss(rng, WEIGHT_INIT_SIGMA)
                };
            }
        }
        self.n_inputs = n_inputs;
        self.input_weights = weights;
        self.input_grad = vec![0.0; self.n_outputs * n_inputs];
    }

    pub(crate) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_usize(w, self.n_inputs)?;
        codec::put_usize(w, self.n_outputs)?;
        codec::put_u8(w, self.activation.tag())?;
        codec::put_f64_slice(w, &self.input_weights)?;
        codec::put_f64_slice(w, &self.rec_weights)?;
        codec::put_f64_slice(w, &self.biases)
    }

    pub(crate) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let n_inputs = codec::get_usize(r)?;
        let n_outputs = codec::get_usize(r)?;
        let tag = codec::get_u8(r)?;
        let activation = Activation::from_tag(tag)
            .ok_or_else(|| Error::snapshot(format!("unknown activation tag: {tag}")))?;
        let input_weights = codec::get_f64_vec(r)?;
        let rec_weights = codec::get_f64_vec(r)?;
        let biases = codec::get_f64_vec(r)?;
        if input_weights.len() != n_outputs * n_inputs
            || rec_weights.len() != n_outputs * n_outputs
            || biases.len() != n_outputs
        {
            return Err(Error::snapshot("recurrent layer size mismatch"));
        }
        Ok(Self {
            n_inputs,
            n_outputs,
            activation,
            input_grad: vec![0.0; input_weights.len()],
            rec_grad: vec![0.0; rec_weights.len()],
            bias_grad: vec![0.0; n_outputs],
            output: vec![0.0; n_outputs],
            delta: vec![0.0; n_outputs],
            prev_state: vec![0.0; n_outputs],
            input_weights,
            rec_weights,
            biases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    #[test]
    fn connected_forward_is_weighted_sum() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let mut layer = Connected::new(2, 1, Activation::Linear, false, &mut rng);
        layer.weights.copy_from_slice(&[2.0, -1.0]);
        layer.biases[0] = 0.5;
        layer.forward(&[1.0, 3.0]);
        assert!((layer.output[0] - (-0.5)).abs() < 1e-12);
    }

    #[test]
    fn connected_learns_linear_target() {
        let mut rng = Pcg64Mcg::seed_from_u64(2);
        let mut layer = Connected::new(1, 1, Activation::Linear, false, &mut rng);
        // y = 3x
        for _ in 0..500 {
            let x = rng.random_range(-1.0..1.0);
            layer.forward(&[x]);
            layer.delta[0] = 3.0 * x - layer.output[0];
            layer.backward(&[x], None);
            layer.update(0.1);
        }
        layer.forward(&[0.5]);
        assert!((layer.output[0] - 1.5).abs() < 0.05);
    }

    #[test]
    fn grow_and_shrink_keep_buffers_consistent() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let mut layer = Connected::new(3, 4, Activation::Relu, true, &mut rng);
        layer.grow_neuron(&mut rng);
        assert_eq!(layer.n_outputs, 5);
        assert_eq!(layer.weights.len(), 15);
        assert_eq!(layer.output.len(), 5);
        layer.shrink_neuron(&mut rng);
        layer.shrink_neuron(&mut rng);
        assert_eq!(layer.n_outputs, 3);
        assert_eq!(layer.weights.len(), 9);
        assert_eq!(layer.biases.len(), 3);
    }

    #[test]
    fn resize_inputs_preserves_surviving_weights() {
        let mut rng = Pcg64Mcg::seed_from_u64(4);
        let mut layer = Connected::new(2, 2, Activation::Linear, false, &mut rng);
        let kept = [layer.weights[0], layer.weights[2]];
        layer.resize_inputs(3, &mut rng);
        assert_eq!(layer.n_inputs, 3);
        assert_eq!(layer.weights.len(), 6);
        assert_eq!(layer.weights[0], kept[0]);
        assert_eq!(layer.weights[3], kept[1]);
    }

    #[test]
    fn dropout_is_identity_outside_training() {
        let mut layer = Dropout::new(4, 0.5);
        let input = [0.1, 0.2, 0.3, 0.4];
        layer.forward(&input, None);
        assert_eq!(layer.output, input);
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut layer = Softmax::new(3);
        layer.forward(&[1.0, 2.0, 3.0]);
        let sum: f64 = layer.output.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(layer.output[2] > layer.output[1]);
    }
}
