//! Dynamical GP graph condition.
//!
//! A fixed-size graph of fuzzy logic nodes updated synchronously for a
//! fixed number of cycles; the condition matches when the first node's
//! truth value ends above one half. Inputs are clamped to [0, 1].

use std::io::{Read, Write};

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::params::Params;

const MAX_COVER_ATTEMPTS: usize = 10_000;
/// Connections per node.
const NODE_K: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeFunction {
    /// Fuzzy conjunction: minimum of the inputs.
    And,
    /// Fuzzy disjunction: maximum of the inputs.
    Or,
    /// Fuzzy negation of the first input.
    Not,
}

impl NodeFunction {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::And => a.min(b),
            Self::Or => a.max(b),
            Self::Not => 1.0 - a,
        }
    }

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.random_range(0..3) {
            0 => Self::And,
            1 => Self::Or,
            _ => Self::Not,
        }
    }

    const fn tag(self) -> u8 {
        match self {
            Self::And => 0,
            Self::Or => 1,
            Self::Not => 2,
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::And),
            1 => Some(Self::Or),
            2 => Some(Self::Not),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    function: NodeFunction,
    /// Sources below `n_nodes` read another node's state; the rest read
    /// input variable `source - n_nodes`.
    sources: [usize; NODE_K],
}

#[derive(Debug, Clone, PartialEq)]
pub struct DgpGraph {
    nodes: Vec<Node>,
    /// Synchronous update cycles per evaluation.
    t: usize,
    x_dim: usize,
}

impl DgpGraph {
    fn random<R: Rng + ?Sized>(params: &Params, rng: &mut R) -> Self {
        let n_nodes = params.dgp_num_nodes;
        let nodes = (0..n_nodes)
            .map(|_| Node {
                function: NodeFunction::random(rng),
                sources: [
                    rng.random_range(0..n_nodes + params.x_dim),
                    rng.random_range(0..n_nodes + params.x_dim),
                ],
            })
            .collect();
        Self {
            nodes,
            t: rng.random_range(1..=params.dgp_max_t),
            x_dim: params.x_dim,
        }
    }

    pub(super) fn cover<R: Rng + ?Sized>(params: &Params, x: &[f64], rng: &mut R) -> Self {
        let mut graph = Self::random(params, rng);
        for _ in 0..MAX_COVER_ATTEMPTS {
            if graph.matches(x) {
                break;
            }
            graph = Self::random(params, rng);
        }
        graph
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        let n_nodes = self.nodes.len();
        let mut state = vec![0.5; n_nodes];
        let mut next = vec![0.0; n_nodes];
        for _ in 0..self.t {
            for (i, node) in self.nodes.iter().enumerate() {
                let read = |source: usize| {
                    if source < n_nodes {
                        state[source]
                    } else {
                        x[source - n_nodes].clamp(0.0, 1.0)
                    }
                };
                next[i] = node
                    .function
                    .apply(read(node.sources[0]), read(node.sources[1]));
            }
            std::mem::swap(&mut state, &mut next);
        }
        state[0]
    }

    pub(super) fn matches(&self, x: &[f64]) -> bool {
        self.evaluate(x) > 0.5
    }

    /// Point mutation of node functions, wiring and cycle count.
    pub(super) fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        let n_nodes = self.nodes.len();
        let mut changed = false;
        for node in &mut self.nodes {
            if rng.random_bool(params.p_mutation) {
                node.function = NodeFunction::random(rng);
                changed = true;
            }
            for source in &mut node.sources {
                if rng.random_bool(params.p_mutation) {
                    *source = rng.random_range(0..n_nodes + self.x_dim);
                    changed = true;
                }
            }
        }
        if rng.random_bool(params.p_mutation) {
            let t = if rng.random_bool(0.5) {
                (self.t + 1).min(params.dgp_max_t)
            } else {
                self.t.saturating_sub(1).max(1)
            };
            if t != self.t {
                self.t = t;
                changed = true;
            }
        }
        changed
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_usize(w, self.x_dim)?;
        codec::put_usize(w, self.t)?;
        codec::put_usize(w, self.nodes.len())?;
        for node in &self.nodes {
            codec::put_u8(w, node.function.tag())?;
            for source in node.sources {
                codec::put_usize(w, source)?;
            }
        }
        Ok(())
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let x_dim = codec::get_usize(r)?;
        let t = codec::get_usize(r)?;
        let n_nodes = codec::get_usize(r)?;
        let mut nodes = Vec::with_capacity(n_nodes);
        for _ in 0..n_nodes {
            let tag = codec::get_u8(r)?;
            let function = NodeFunction::from_tag(tag)
                .ok_or_else(|| Error::snapshot(format!("unknown dgp function tag: {tag}")))?;
            let mut sources = [0_usize; NODE_K];
            for source in &mut sources {
                *source = codec::get_usize(r)?;
                if *source >= n_nodes + x_dim {
                    return Err(Error::snapshot("dgp connection out of range"));
                }
            }
            nodes.push(Node { function, sources });
        }
        if nodes.is_empty() {
            return Err(Error::snapshot("dgp graph has no nodes"));
        }
        Ok(Self { nodes, t, x_dim })
    }
}
