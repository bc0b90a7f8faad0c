//! A single macro-classifier: condition, action, prediction and the
//! bookkeeping statistics the engine maintains for them.

use std::io::{Read, Write};

use rand::Rng;

use crate::action::Action;
use crate::codec;
use crate::condition::Condition;
use crate::error::Result;
use crate::params::Params;
use crate::prediction::Prediction;

/// A rule with numerosity `num`, summarising `num` identical
/// micro-classifiers.
#[derive(Debug, Clone)]
pub struct Classifier {
    pub condition: Condition,
    pub action: Action,
    pub prediction: Prediction,
    /// Moving estimate of the prediction error.
    pub err: f64,
    /// Share of relative accuracy attributed to this rule.
    pub fit: f64,
    /// Multiplicity in the population; zero schedules the rule for kill.
    pub num: u32,
    /// Number of updates applied.
    pub exp: u32,
    /// Moving estimate of the action-set size this rule participates in.
    pub size: f64,
    /// Logical time of the last EA event involving this rule.
    pub time: u32,
    /// Creation time.
    pub age: u32,
    /// Transient: whether the condition matches the current input.
    pub(crate) m: bool,
    /// Transient: the action advocated for the current input.
    pub(crate) current_action: usize,
}

/// Blend rate with warm-up: a true running mean until `exp * beta >= 1`,
/// an exponential moving average afterwards.
fn blend(estimate: f64, target: f64, exp: u32, beta: f64) -> f64 {
    let exp = f64::from(exp);
    if exp * beta < 1.0 {
        (estimate * (exp - 1.0) + target) / exp
    } else {
        estimate + beta * (target - estimate)
    }
}

impl Classifier {
    /// Creates a classifier by covering: the condition is initialised to
    /// match `x` and the action advocates `action`.
    pub fn cover<R: Rng + ?Sized>(
        params: &Params,
        x: &[f64],
        action: usize,
        time: u32,
        rng: &mut R,
    ) -> Self {
        Self {
            condition: Condition::cover(params, x, rng),
            action: Action::cover(params, x, action, rng),
            prediction: Prediction::new(params, rng),
            err: params.init_error,
            fit: params.init_fitness,
            num: 1,
            exp: 0,
            size: 1.0,
            time,
            age: time,
            m: true,
            current_action: action,
        }
    }

    /// Whether the condition matches the input; records the result in the
    /// transient match flag.
    pub fn matches(&mut self, x: &[f64]) -> bool {
        self.m = self.condition.matches(x);
        self.m
    }

    /// One experience update against the target `y`.
    ///
    /// The error estimate absorbs the loss of the pre-update prediction;
    /// `cur` indicates that the prediction was already computed for `x`
    /// this cycle (during the prediction-array build).
    pub fn update<R: Rng>(
        &mut self,
        params: &Params,
        x: &[f64],
        y: &[f64],
        set_num: u32,
        cur: bool,
        rng: &mut R,
    ) {
        self.exp += 1;
        if !cur {
            self.prediction.compute(x);
        }
        let loss = params.loss.compute(self.prediction.output(), y);
        self.err = blend(self.err, loss, self.exp, params.beta);
        self.prediction.update(params, x, y, self.exp, rng);
        self.size = blend(self.size, f64::from(set_num), self.exp, params.beta);
    }

    /// Accuracy on the exponential curve: 1 below the error target, a
    /// power-law falloff above it.
    #[must_use]
    pub fn accuracy(&self, params: &Params) -> f64 {
        if self.err < params.eps_0 {
            1.0
        } else {
            params.alpha * (self.err / params.eps_0).powf(-params.nu)
        }
    }

    /// Moves the fitness toward this cycle's relative accuracy share.
    pub(crate) fn update_fitness(&mut self, params: &Params, acc: f64, acc_sum: f64) {
        let target = acc * f64::from(self.num) / acc_sum;
        self.fit = blend(self.fit, target, self.exp, params.beta);
    }

    /// Whether this rule is experienced and accurate enough to subsume.
    #[must_use]
    pub fn could_subsume(&self, params: &Params) -> bool {
        self.exp >= params.theta_sub && self.err < params.eps_0
    }

    /// Whether this rule subsumes the other: a qualified subsumer with the
    /// same action and a strictly more general condition.
    #[must_use]
    pub fn subsumes(&self, params: &Params, other: &Self) -> bool {
        self.could_subsume(params)
            && self.action.same(&other.action)
            && self.condition.general(&other.condition)
    }

    /// Fitness of one micro-classifier of this rule.
    #[must_use]
    pub fn micro_fitness(&self) -> f64 {
        self.fit / f64::from(self.num)
    }

    pub(crate) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        self.condition.save(w)?;
        self.action.save(w)?;
        self.prediction.save(w)?;
        codec::put_f64(w, self.err)?;
        codec::put_f64(w, self.fit)?;
        codec::put_u32(w, self.num)?;
        codec::put_u32(w, self.exp)?;
        codec::put_f64(w, self.size)?;
        codec::put_u32(w, self.time)?;
        codec::put_u32(w, self.age)
    }

    pub(crate) fn load<R: Read>(r: &mut R, params: &Params) -> Result<Self> {
        let condition = Condition::load(r)?;
        let action = Action::load(r, params)?;
        let prediction = Prediction::load(r)?;
        Ok(Self {
            condition,
            action,
            prediction,
            err: codec::get_f64(r)?,
            fit: codec::get_f64(r)?,
            num: codec::get_u32(r)?,
            exp: codec::get_u32(r)?,
            size: codec::get_f64(r)?,
            time: codec::get_u32(r)?,
            age: codec::get_u32(r)?,
            m: false,
            current_action: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use crate::params::PredictionKind;

    fn covered(params: &Params, rng: &mut Pcg64Mcg) -> Classifier {
        Classifier::cover(params, &[0.5], 0, 0, rng)
    }

    #[test]
    fn covering_initialises_stats() {
        let mut rng = Pcg64Mcg::seed_from_u64(100);
        let params = Params::new(1, 1, 1);
        let cl = covered(&params, &mut rng);
        assert_eq!(cl.num, 1);
        assert_eq!(cl.exp, 0);
        assert_eq!(cl.err, params.init_error);
        assert_eq!(cl.fit, params.init_fitness);
    }

    #[test]
    fn update_keeps_invariants() {
        let mut rng = Pcg64Mcg::seed_from_u64(101);
        let mut params = Params::new(1, 1, 1);
        params.prediction = PredictionKind::Constant;
        let mut cl = covered(&params, &mut rng);
        let mut prev_exp = 0;
        for i in 0..50 {
            let y = [f64::from(i % 3)];
            cl.update(&params, &[0.5], &y, 5, false, &mut rng);
            assert_eq!(cl.exp, prev_exp + 1);
            prev_exp = cl.exp;
            assert!(cl.err >= 0.0);
        }
        // the size estimate settles on the observed set size
        assert!((cl.size - 5.0).abs() < 1e-9);
    }

    #[test]
    fn accuracy_curve_shape() {
        let mut rng = Pcg64Mcg::seed_from_u64(102);
        let params = Params::new(1, 1, 1);
        let mut cl = covered(&params, &mut rng);
        cl.err = params.eps_0 / 2.0;
        assert_eq!(cl.accuracy(&params), 1.0);
        cl.err = params.eps_0;
        assert!((cl.accuracy(&params) - params.alpha).abs() < 1e-12);
        cl.err = params.eps_0 * 2.0;
        let expected = params.alpha * 2.0_f64.powf(-params.nu);
        assert!((cl.accuracy(&params) - expected).abs() < 1e-12);
    }

    #[test]
    fn subsumption_requires_experience_accuracy_and_generality() {
        let mut rng = Pcg64Mcg::seed_from_u64(103);
        let params = Params::new(1, 1, 1);
        let mut wide = Classifier::cover(&params, &[0.5], 0, 0, &mut rng);
        let narrow = Classifier::cover(&params, &[0.5], 0, 0, &mut rng);
        // make the first condition enclose the second
        wide.condition = Condition::Dummy;
        let mut narrow = narrow;
        narrow.condition = Condition::Dummy;

        wide.exp = params.theta_sub;
        wide.err = params.eps_0 / 2.0;
        assert!(wide.subsumes(&params, &narrow));

        wide.exp = params.theta_sub - 1;
        assert!(!wide.subsumes(&params, &narrow));

        wide.exp = params.theta_sub;
        wide.err = params.eps_0 * 2.0;
        assert!(!wide.subsumes(&params, &narrow));
    }

    #[test]
    fn fitness_stays_positive_after_updates() {
        let mut rng = Pcg64Mcg::seed_from_u64(104);
        let mut params = Params::new(1, 1, 1);
        params.prediction = PredictionKind::Constant;
        let mut cl = covered(&params, &mut rng);
        for i in 1..=30 {
            cl.update(&params, &[0.5], &[1.0], 3, false, &mut rng);
            cl.update_fitness(&params, cl.accuracy(&params), 1.0);
            assert!(cl.fit > 0.0, "fitness must stay positive at step {i}");
        }
    }
}
