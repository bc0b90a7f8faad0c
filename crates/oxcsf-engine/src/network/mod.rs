//! Neural substrate consumed by neural conditions, actions and predictions.
//!
//! A network is an ordered, owned sequence of layers. Mutation may change a
//! hidden layer's width, in which case every downstream layer is resized to
//! the new input width before it is itself mutated.

pub mod layer;

use std::io::{Read, Write};

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};

pub use self::layer::{Activation, Connected, Dropout, LayerMutation, Noise, Recurrent, Softmax};

const LAYER_CONNECTED: u8 = 0;
const LAYER_DROPOUT: u8 = 1;
const LAYER_NOISE: u8 = 2;
const LAYER_SOFTMAX: u8 = 3;
const LAYER_RECURRENT: u8 = 4;

/// A single network layer.
#[derive(Debug, Clone)]
pub enum Layer {
    Connected(Connected),
    Dropout(Dropout),
    Noise(Noise),
    Softmax(Softmax),
    Recurrent(Recurrent),
}

impl Layer {
    pub(crate) fn n_outputs(&self) -> usize {
        match self {
            Self::Connected(l) => l.n_outputs,
            Self::Dropout(l) => l.n,
            Self::Noise(l) => l.n,
            Self::Softmax(l) => l.n,
            Self::Recurrent(l) => l.n_outputs,
        }
    }

    pub(crate) fn output(&self) -> &[f64] {
        match self {
            Self::Connected(l) => &l.output,
            Self::Dropout(l) => &l.output,
            Self::Noise(l) => &l.output,
            Self::Softmax(l) => &l.output,
            Self::Recurrent(l) => &l.output,
        }
    }

    fn delta_mut(&mut self) -> &mut [f64] {
        match self {
            Self::Connected(l) => &mut l.delta,
            Self::Dropout(l) => &mut l.delta,
            Self::Noise(l) => &mut l.delta,
            Self::Softmax(l) => &mut l.delta,
            Self::Recurrent(l) => &mut l.delta,
        }
    }

    fn output_and_delta_mut(&mut self) -> (&[f64], &mut [f64]) {
        match self {
            Self::Connected(l) => (&l.output, &mut l.delta),
            Self::Dropout(l) => (&l.output, &mut l.delta),
            Self::Noise(l) => (&l.output, &mut l.delta),
            Self::Softmax(l) => (&l.output, &mut l.delta),
            Self::Recurrent(l) => (&l.output, &mut l.delta),
        }
    }

    fn forward(&mut self, input: &[f64], rng: Option<&mut dyn rand::RngCore>) {
        match self {
            Self::Connected(l) => l.forward(input),
            Self::Dropout(l) => l.forward(input, rng),
            Self::Noise(l) => l.forward(input, rng),
            Self::Softmax(l) => l.forward(input),
            Self::Recurrent(l) => l.forward(input),
        }
    }

    fn backward(&mut self, input: &[f64], prev_delta: Option<&mut [f64]>) {
        match self {
            Self::Connected(l) => l.backward(input, prev_delta),
            Self::Dropout(l) => l.backward(prev_delta),
            Self::Noise(l) => l.backward(prev_delta),
            Self::Softmax(l) => l.backward(prev_delta),
            Self::Recurrent(l) => l.backward(input, prev_delta),
        }
    }

    fn update(&mut self, eta: f64) {
        match self {
            Self::Connected(l) => l.update(eta),
            Self::Recurrent(l) => l.update(eta),
            Self::Dropout(_) | Self::Noise(_) | Self::Softmax(_) => {}
        }
    }

    fn mutate<R: Rng + ?Sized>(
        &mut self,
        p_mutation: f64,
        s_mutation: f64,
        rng: &mut R,
    ) -> LayerMutation {
        match self {
            Self::Connected(l) => l.mutate(p_mutation, s_mutation, rng),
            Self::Recurrent(l) => l.mutate(p_mutation, s_mutation, rng),
            Self::Dropout(_) | Self::Noise(_) | Self::Softmax(_) => LayerMutation::default(),
        }
    }

    fn resize_inputs<R: Rng + ?Sized>(&mut self, n_inputs: usize, rng: &mut R) {
        match self {
            Self::Connected(l) => l.resize_inputs(n_inputs, rng),
            Self::Recurrent(l) => l.resize_inputs(n_inputs, rng),
            Self::Dropout(l) => l.resize(n_inputs),
            Self::Noise(l) => l.resize(n_inputs),
            Self::Softmax(l) => l.resize(n_inputs),
        }
    }

    fn rand_init<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self {
            Self::Connected(l) => l.rand_init(rng),
            Self::Recurrent(l) => l.rand_init(rng),
            Self::Dropout(_) | Self::Noise(_) | Self::Softmax(_) => {}
        }
    }
}

/// An ordered feed-forward network.
#[derive(Debug, Clone)]
pub struct Network {
    n_inputs: usize,
    layers: Vec<Layer>,
}

impl Network {
    /// Builds a network from an explicit layer stack.
    #[must_use]
    pub fn new(n_inputs: usize, layers: Vec<Layer>) -> Self {
        debug_assert!(!layers.is_empty());
        Self { n_inputs, layers }
    }

    /// A two layer perceptron: a resizable logistic hidden layer followed by
    /// a fixed output layer.
    #[must_use]
    pub fn mlp<R: Rng + ?Sized>(
        n_inputs: usize,
        n_hidden: usize,
        n_outputs: usize,
        out_activation: Activation,
        rng: &mut R,
    ) -> Self {
        let hidden = Connected::new(n_inputs, n_hidden, Activation::Logistic, true, rng);
        let out = Connected::new(n_hidden, n_outputs, out_activation, false, rng);
        Self::new(n_inputs, vec![Layer::Connected(hidden), Layer::Connected(out)])
    }

    #[must_use]
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    #[must_use]
    pub fn n_outputs(&self) -> usize {
        self.layers.last().map_or(0, Layer::n_outputs)
    }

    /// Training-mode forward pass: stochastic layers (dropout, noise) draw
    /// from the supplied RNG.
    pub fn forward<R: Rng>(&mut self, x: &[f64], rng: &mut R) -> &[f64] {
        self.propagate(x, Some(rng));
        self.output()
    }

    /// Inference pass. Stochastic layers are inactive, so the result is
    /// deterministic and no entropy is drawn.
    pub fn infer(&mut self, x: &[f64]) -> &[f64] {
        self.propagate(x, None);
        self.output()
    }

    fn propagate(&mut self, x: &[f64], mut rng: Option<&mut dyn rand::RngCore>) {
        for i in 0..self.layers.len() {
            let (before, rest) = self.layers.split_at_mut(i);
            let layer = &mut rest[0];
            let rng: Option<&mut dyn rand::RngCore> = match rng.as_mut() {
                Some(r) => Some(&mut **r),
                None => None,
            };
            match before.last() {
                Some(prev) => layer.forward(prev.output(), rng),
                None => layer.forward(x, rng),
            }
        }
    }

    /// Output of the most recent forward pass.
    #[must_use]
    pub fn output(&self) -> &[f64] {
        self.layers.last().map_or(&[], |l| l.output())
    }

    /// One gradient step toward `truth`, using the activations of the most
    /// recent forward pass.
    pub fn learn(&mut self, x: &[f64], truth: &[f64], eta: f64) {
        for layer in &mut self.layers {
            layer.delta_mut().fill(0.0);
        }
        {
            let out = self.layers.last_mut().unwrap();
            let (output, delta) = out.output_and_delta_mut();
            debug_assert_eq!(output.len(), truth.len());
            for (d, (t, o)) in delta.iter_mut().zip(truth.iter().zip(output)) {
                *d = t - o;
            }
        }
        for i in (0..self.layers.len()).rev() {
            let (before, rest) = self.layers.split_at_mut(i);
            let layer = &mut rest[0];
            match before.last_mut() {
                Some(prev) => {
                    let (input, prev_delta) = prev.output_and_delta_mut();
                    layer.backward(input, Some(prev_delta));
                }
                None => layer.backward(x, None),
            }
        }
        for layer in &mut self.layers {
            layer.update(eta);
        }
    }

    /// Mutates every layer, resizing downstream layers whenever a hidden
    /// layer's width changed. Returns whether anything changed.
    pub fn mutate<R: Rng + ?Sized>(
        &mut self,
        p_mutation: f64,
        s_mutation: f64,
        rng: &mut R,
    ) -> bool {
        let mut changed = false;
        let mut resize_to: Option<usize> = None;
        for layer in &mut self.layers {
            if let Some(n) = resize_to.take() {
                layer.resize_inputs(n, rng);
            }
            let before = layer.n_outputs();
            let result = layer.mutate(p_mutation, s_mutation, rng);
            changed |= result.changed;
            if result.resized && layer.n_outputs() != before {
                resize_to = Some(layer.n_outputs());
            }
        }
        changed
    }

    /// Re-randomises every weight. Used when covering.
    pub fn rand_init<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for layer in &mut self.layers {
            layer.rand_init(rng);
        }
    }

    pub(crate) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_usize(w, self.n_inputs)?;
        codec::put_usize(w, self.layers.len())?;
        for layer in &self.layers {
            match layer {
                Layer::Connected(l) => {
                    codec::put_u8(w, LAYER_CONNECTED)?;
                    l.save(w)?;
                }
                Layer::Dropout(l) => {
                    codec::put_u8(w, LAYER_DROPOUT)?;
                    codec::put_usize(w, l.n)?;
                    codec::put_f64(w, l.prob)?;
                }
                Layer::Noise(l) => {
                    codec::put_u8(w, LAYER_NOISE)?;
                    codec::put_usize(w, l.n)?;
                    codec::put_f64(w, l.prob)?;
                }
                Layer::Softmax(l) => {
                    codec::put_u8(w, LAYER_SOFTMAX)?;
                    codec::put_usize(w, l.n)?;
                }
                Layer::Recurrent(l) => {
                    codec::put_u8(w, LAYER_RECURRENT)?;
                    l.save(w)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let n_inputs = codec::get_usize(r)?;
        let n_layers = codec::get_usize(r)?;
        let mut layers = Vec::with_capacity(n_layers);
        for _ in 0..n_layers {
            let layer = match codec::get_u8(r)? {
                LAYER_CONNECTED => Layer::Connected(Connected::load(r)?),
                LAYER_DROPOUT => {
                    let n = codec::get_usize(r)?;
                    Layer::Dropout(Dropout::new(n, codec::get_f64(r)?))
                }
                LAYER_NOISE => {
                    let n = codec::get_usize(r)?;
                    Layer::Noise(Noise::new(n, codec::get_f64(r)?))
                }
                LAYER_SOFTMAX => Layer::Softmax(Softmax::new(codec::get_usize(r)?)),
                LAYER_RECURRENT => Layer::Recurrent(Recurrent::load(r)?),
                tag => return Err(Error::snapshot(format!("unknown layer tag: {tag}"))),
            };
            layers.push(layer);
        }
        if layers.is_empty() {
            return Err(Error::snapshot("network has no layers"));
        }
        Ok(Self { n_inputs, layers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    #[test]
    fn mlp_shapes() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let mut net = Network::mlp(3, 5, 2, Activation::Linear, &mut rng);
        assert_eq!(net.n_inputs(), 3);
        assert_eq!(net.n_outputs(), 2);
        let out = net.infer(&[0.1, 0.2, 0.3]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn learns_scaled_identity() {
        let mut rng = Pcg64Mcg::seed_from_u64(8);
        let mut net = Network::mlp(1, 8, 1, Activation::Linear, &mut rng);
        for _ in 0..3000 {
            let x = rng.random_range(0.0..1.0);
            net.forward(&[x], &mut rng);
            net.learn(&[x], &[0.5 * x], 0.1);
        }
        net.infer(&[0.6]);
        assert!((net.output()[0] - 0.3).abs() < 0.05);
    }

    #[test]
    fn width_mutation_keeps_network_consistent() {
        let mut rng = Pcg64Mcg::seed_from_u64(9);
        let mut net = Network::mlp(2, 4, 1, Activation::Logistic, &mut rng);
        // force a few resize events through repeated mutation
        for _ in 0..200 {
            net.mutate(0.5, 0.1, &mut rng);
            let out = net.infer(&[0.4, 0.6]);
            assert_eq!(out.len(), 1);
            assert!(out[0].is_finite());
        }
        assert_eq!(net.n_outputs(), 1);
    }

    #[test]
    fn inference_is_deterministic_with_dropout() {
        let mut rng = Pcg64Mcg::seed_from_u64(10);
        let hidden = Connected::new(1, 4, Activation::Logistic, true, &mut rng);
        let out = Connected::new(4, 1, Activation::Linear, false, &mut rng);
        let mut net = Network::new(
            1,
            vec![
                Layer::Connected(hidden),
                Layer::Dropout(Dropout::new(4, 0.5)),
                Layer::Connected(out),
            ],
        );
        let a = net.infer(&[0.3])[0];
        let b = net.infer(&[0.3])[0];
        assert_eq!(a, b);
    }
}
