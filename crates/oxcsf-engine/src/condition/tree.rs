//! GP tree condition.
//!
//! Arithmetic program trees stored in prefix order; a subtree is a
//! contiguous span, so crossover splices spans between parents.

use std::io::{Read, Write};

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::params::Params;

const MAX_COVER_ATTEMPTS: usize = 10_000;
/// Upper bound on tree length, so repeated crossover cannot bloat programs.
const MAX_NODES: usize = 256;
const CONST_MIN: f64 = -1.0;
const CONST_MAX: f64 = 1.0;
/// Division guard: denominators this close to zero return the numerator.
const DIV_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Var(usize),
    Const(f64),
}

impl Op {
    fn arity(self) -> usize {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div => 2,
            Self::Var(_) | Self::Const(_) => 0,
        }
    }

    fn random_function<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.random_range(0..4) {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::Mul,
            _ => Self::Div,
        }
    }

    fn random_leaf<R: Rng + ?Sized>(x_dim: usize, rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Self::Var(rng.random_range(0..x_dim))
        } else {
            Self::Const(rng.random_range(CONST_MIN..=CONST_MAX))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpTree {
    ops: Vec<Op>,
    x_dim: usize,
}

impl GpTree {
    fn random<R: Rng + ?Sized>(params: &Params, rng: &mut R) -> Self {
        let mut ops = Vec::new();
        grow(&mut ops, params.tree_max_depth, params.x_dim, rng);
        Self {
            ops,
            x_dim: params.x_dim,
        }
    }

    pub(super) fn cover<R: Rng + ?Sized>(params: &Params, x: &[f64], rng: &mut R) -> Self {
        let mut tree = Self::random(params, rng);
        for _ in 0..MAX_COVER_ATTEMPTS {
            if tree.matches(x) {
                break;
            }
            tree = Self::random(params, rng);
        }
        tree
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut pos = 0;
        let v = eval_at(&self.ops, &mut pos, x);
        debug_assert_eq!(pos, self.ops.len());
        v
    }

    pub(super) fn matches(&self, x: &[f64]) -> bool {
        self.evaluate(x) > 0.5
    }

    /// Subtree crossover: a random span of each parent is exchanged.
    /// Declined when a child would exceed the node cap.
    pub(super) fn crossover<R: Rng + ?Sized>(&mut self, other: &mut Self, rng: &mut R) -> bool {
        let a = subtree_span(&self.ops, rng.random_range(0..self.ops.len()));
        let b = subtree_span(&other.ops, rng.random_range(0..other.ops.len()));
        if self.ops.len() - a.len() + b.len() > MAX_NODES
            || other.ops.len() - b.len() + a.len() > MAX_NODES
        {
            return false;
        }
        let mine: Vec<Op> = self.ops[a.clone()].to_vec();
        let theirs: Vec<Op> = other.ops[b.clone()].to_vec();
        self.ops.splice(a, theirs);
        other.ops.splice(b, mine);
        true
    }

    /// Point mutation preserving arity at every node.
    pub(super) fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        let mut changed = false;
        for op in &mut self.ops {
            if rng.random_bool(params.p_mutation) {
                *op = match op.arity() {
                    2 => Op::random_function(rng),
                    _ => Op::random_leaf(self.x_dim, rng),
                };
                changed = true;
            }
        }
        changed
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_usize(w, self.x_dim)?;
        codec::put_usize(w, self.ops.len())?;
        for op in &self.ops {
            match op {
                Op::Add => codec::put_u8(w, 0)?,
                Op::Sub => codec::put_u8(w, 1)?,
                Op::Mul => codec::put_u8(w, 2)?,
                Op::Div => codec::put_u8(w, 3)?,
                Op::Var(i) => {
                    codec::put_u8(w, 4)?;
                    codec::put_usize(w, *i)?;
                }
                Op::Const(v) => {
                    codec::put_u8(w, 5)?;
                    codec::put_f64(w, *v)?;
                }
            }
        }
        Ok(())
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let x_dim = codec::get_usize(r)?;
        let len = codec::get_usize(r)?;
        let mut ops = Vec::with_capacity(len);
        for _ in 0..len {
            let op = match codec::get_u8(r)? {
                0 => Op::Add,
                1 => Op::Sub,
                2 => Op::Mul,
                3 => Op::Div,
                4 => {
                    let i = codec::get_usize(r)?;
                    if i >= x_dim {
                        return Err(Error::snapshot("tree variable out of range"));
                    }
                    Op::Var(i)
                }
                5 => Op::Const(codec::get_f64(r)?),
                tag => return Err(Error::snapshot(format!("unknown tree op tag: {tag}"))),
            };
            ops.push(op);
        }
        let tree = Self { ops, x_dim };
        if !tree.well_formed() {
            return Err(Error::snapshot("malformed tree expression"));
        }
        Ok(tree)
    }

    fn well_formed(&self) -> bool {
        if self.ops.is_empty() {
            return false;
        }
        let mut pos = 0;
        walk(&self.ops, &mut pos) && pos == self.ops.len()
    }
}

fn grow<R: Rng + ?Sized>(ops: &mut Vec<Op>, depth: usize, x_dim: usize, rng: &mut R) {
    if depth == 0 || rng.random_bool(0.3) {
        ops.push(Op::random_leaf(x_dim, rng));
        return;
    }
    ops.push(Op::random_function(rng));
    grow(ops, depth - 1, x_dim, rng);
    grow(ops, depth - 1, x_dim, rng);
}

fn eval_at(ops: &[Op], pos: &mut usize, x: &[f64]) -> f64 {
    let op = ops[*pos];
    *pos += 1;
    match op {
        Op::Add => eval_at(ops, pos, x) + eval_at(ops, pos, x),
        Op::Sub => eval_at(ops, pos, x) - eval_at(ops, pos, x),
        Op::Mul => eval_at(ops, pos, x) * eval_at(ops, pos, x),
        Op::Div => {
            let a = eval_at(ops, pos, x);
            let b = eval_at(ops, pos, x);
            if b.abs() < DIV_EPS { a } else { a / b }
        }
        Op::Var(i) => x[i],
        Op::Const(v) => v,
    }
}

/// Walks one expression starting at `pos`, reporting structural validity.
fn walk(ops: &[Op], pos: &mut usize) -> bool {
    let Some(op) = ops.get(*pos) else {
        return false;
    };
    *pos += 1;
    (0..op.arity()).all(|_| walk(ops, pos))
}

/// The contiguous span of the subtree rooted at `start`.
fn subtree_span(ops: &[Op], start: usize) -> std::ops::Range<usize> {
    let mut pos = start;
    let ok = walk(ops, &mut pos);
    debug_assert!(ok);
    start..pos
}
