//! Whole-population binary snapshots.
//!
//! Layout: the magic `XCSF`, a format version, the parameters in a fixed
//! field order, the trial clock, then the classifier count followed by each
//! classifier's self-describing component payloads and fixed statistics.
//! Writes go through a temporary file that is renamed into place, so a
//! failed save never leaves a partial artifact behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand_pcg::Pcg64Mcg;

use crate::classifier::Classifier;
use crate::codec;
use crate::engine::{RlState, Xcsf};
use crate::error::{Error, Result};
use crate::loss::LossKind;
use crate::pa::PredictionArray;
use crate::params::{ActionKind, ConditionKind, EaSelectKind, Params, PredictionKind};
use crate::population::Population;
use crate::set::Set;

const MAGIC: &[u8; 4] = b"XCSF";
const VERSION: u32 = 1;

pub(crate) fn save(xcsf: &Xcsf, path: &Path) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let result = write_to(xcsf, &tmp);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
        return result;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_to(xcsf: &Xcsf, path: &Path) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(MAGIC)?;
    codec::put_u32(&mut w, VERSION)?;
    save_params(&mut w, &xcsf.params)?;
    codec::put_u32(&mut w, xcsf.time)?;
    // the PRNG state rides along so a reloaded engine replays covering
    // decisions identically
    let rng = serde_json::to_vec(&xcsf.rng)
        .map_err(|e| Error::snapshot(format!("rng state: {e}")))?;
    codec::put_bytes(&mut w, &rng)?;
    let live: Vec<&Classifier> = xcsf.pop.classifiers().collect();
    codec::put_u32(&mut w, live.len() as u32)?;
    for c in live {
        c.save(&mut w)?;
    }
    w.flush()?;
    Ok(())
}

pub(crate) fn load(path: &Path) -> Result<Xcsf> {
    let mut r = BufReader::new(File::open(path)?);
    let mut magic = [0_u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::snapshot("bad magic"));
    }
    let version = codec::get_u32(&mut r)?;
    if version != VERSION {
        return Err(Error::snapshot(format!(
            "unsupported snapshot version: {version}"
        )));
    }
    let params = load_params(&mut r)?;
    params.validate()?;
    let time = codec::get_u32(&mut r)?;
    let rng: Pcg64Mcg = serde_json::from_slice(&codec::get_bytes(&mut r)?)
        .map_err(|e| Error::snapshot(format!("rng state: {e}")))?;
    let count = codec::get_u32(&mut r)?;
    let mut pop = Population::new();
    for _ in 0..count {
        pop.insert(Classifier::load(&mut r, &params)?);
    }
    if pop.total_num() > params.pop_size {
        return Err(Error::snapshot("population exceeds its cap"));
    }
    let pa = PredictionArray::new(&params);
    Ok(Xcsf {
        rng,
        pop,
        mset: Set::new(),
        aset: Set::new(),
        kset: Set::new(),
        pa,
        time,
        rl: RlState::default(),
        params,
    })
}

fn save_params<W: Write>(w: &mut W, p: &Params) -> Result<()> {
    codec::put_u32(w, p.pop_size)?;
    codec::put_u32(w, p.max_trials)?;
    codec::put_u32(w, p.perf_trials)?;
    codec::put_u8(w, loss_tag(p.loss))?;
    codec::put_usize(w, p.x_dim)?;
    codec::put_usize(w, p.y_dim)?;
    codec::put_usize(w, p.n_actions)?;
    codec::put_bool(w, p.explore)?;
    codec::put_u64(w, p.seed)?;
    codec::put_usize(w, p.n_threads)?;
    codec::put_f64(w, p.theta_ea)?;
    codec::put_f64(w, p.p_crossover)?;
    codec::put_u32(w, p.lambda)?;
    codec::put_u8(w, select_tag(p.ea_select_kind))?;
    codec::put_f64(w, p.ea_select_size)?;
    codec::put_f64(w, p.alpha)?;
    codec::put_f64(w, p.nu)?;
    codec::put_f64(w, p.beta)?;
    codec::put_f64(w, p.eps_0)?;
    codec::put_u32(w, p.theta_sub)?;
    codec::put_bool(w, p.do_ga_subsumption)?;
    codec::put_bool(w, p.do_set_subsumption)?;
    codec::put_u32(w, p.theta_del)?;
    codec::put_f64(w, p.delta)?;
    codec::put_f64(w, p.init_fitness)?;
    codec::put_f64(w, p.init_error)?;
    codec::put_f64(w, p.gamma)?;
    codec::put_f64(w, p.p_explore)?;
    codec::put_u32(w, p.teletransportation)?;
    codec::put_u8(w, condition_tag(p.condition))?;
    codec::put_u8(w, action_tag(p.action))?;
    codec::put_u8(w, prediction_tag(p.prediction))?;
    codec::put_f64(w, p.cond_min)?;
    codec::put_f64(w, p.cond_max)?;
    codec::put_f64(w, p.cond_spread_min)?;
    codec::put_f64(w, p.cond_p_dont_care)?;
    codec::put_usize(w, p.cond_bits)?;
    codec::put_usize(w, p.hidden_neurons)?;
    codec::put_usize(w, p.dgp_num_nodes)?;
    codec::put_usize(w, p.dgp_max_t)?;
    codec::put_usize(w, p.tree_max_depth)?;
    codec::put_f64(w, p.p_mutation)?;
    codec::put_f64(w, p.s_mutation)?;
    codec::put_f64(w, p.pred_eta)?;
    codec::put_f64(w, p.pred_x0)?;
    codec::put_f64(w, p.pred_rls_scale_factor)?;
    codec::put_f64(w, p.pred_rls_lambda)
}

fn load_params<R: Read>(r: &mut R) -> Result<Params> {
    Ok(Params {
        pop_size: codec::get_u32(r)?,
        max_trials: codec::get_u32(r)?,
        perf_trials: codec::get_u32(r)?,
        loss: loss_from_tag(codec::get_u8(r)?)?,
        x_dim: codec::get_usize(r)?,
        y_dim: codec::get_usize(r)?,
        n_actions: codec::get_usize(r)?,
        explore: codec::get_bool(r)?,
        seed: codec::get_u64(r)?,
        n_threads: codec::get_usize(r)?,
        theta_ea: codec::get_f64(r)?,
        p_crossover: codec::get_f64(r)?,
        lambda: codec::get_u32(r)?,
        ea_select_kind: select_from_tag(codec::get_u8(r)?)?,
        ea_select_size: codec::get_f64(r)?,
        alpha: codec::get_f64(r)?,
        nu: codec::get_f64(r)?,
        beta: codec::get_f64(r)?,
        eps_0: codec::get_f64(r)?,
        theta_sub: codec::get_u32(r)?,
        do_ga_subsumption: codec::get_bool(r)?,
        do_set_subsumption: codec::get_bool(r)?,
        theta_del: codec::get_u32(r)?,
        delta: codec::get_f64(r)?,
        init_fitness: codec::get_f64(r)?,
        init_error: codec::get_f64(r)?,
        gamma: codec::get_f64(r)?,
        p_explore: codec::get_f64(r)?,
        teletransportation: codec::get_u32(r)?,
        condition: condition_from_tag(codec::get_u8(r)?)?,
        action: action_from_tag(codec::get_u8(r)?)?,
        prediction: prediction_from_tag(codec::get_u8(r)?)?,
        cond_min: codec::get_f64(r)?,
        cond_max: codec::get_f64(r)?,
        cond_spread_min: codec::get_f64(r)?,
        cond_p_dont_care: codec::get_f64(r)?,
        cond_bits: codec::get_usize(r)?,
        hidden_neurons: codec::get_usize(r)?,
        dgp_num_nodes: codec::get_usize(r)?,
        dgp_max_t: codec::get_usize(r)?,
        tree_max_depth: codec::get_usize(r)?,
        p_mutation: codec::get_f64(r)?,
        s_mutation: codec::get_f64(r)?,
        pred_eta: codec::get_f64(r)?,
        pred_x0: codec::get_f64(r)?,
        pred_rls_scale_factor: codec::get_f64(r)?,
        pred_rls_lambda: codec::get_f64(r)?,
    })
}

fn condition_tag(kind: ConditionKind) -> u8 {
    match kind {
        ConditionKind::Hyperrectangle => 0,
        ConditionKind::Ellipsoid => 1,
        ConditionKind::Ternary => 2,
        ConditionKind::Neural => 3,
        ConditionKind::Dgp => 4,
        ConditionKind::Tree => 5,
        ConditionKind::Dummy => 6,
    }
}

fn condition_from_tag(tag: u8) -> Result<ConditionKind> {
    Ok(match tag {
        0 => ConditionKind::Hyperrectangle,
        1 => ConditionKind::Ellipsoid,
        2 => ConditionKind::Ternary,
        3 => ConditionKind::Neural,
        4 => ConditionKind::Dgp,
        5 => ConditionKind::Tree,
        6 => ConditionKind::Dummy,
        _ => return Err(Error::snapshot(format!("unknown condition kind: {tag}"))),
    })
}

fn action_tag(kind: ActionKind) -> u8 {
    match kind {
        ActionKind::Integer => 0,
        ActionKind::Neural => 1,
    }
}

fn action_from_tag(tag: u8) -> Result<ActionKind> {
    Ok(match tag {
        0 => ActionKind::Integer,
        1 => ActionKind::Neural,
        _ => return Err(Error::snapshot(format!("unknown action kind: {tag}"))),
    })
}

fn prediction_tag(kind: PredictionKind) -> u8 {
    match kind {
        PredictionKind::Constant => 0,
        PredictionKind::Nlms => 1,
        PredictionKind::Rls => 2,
        PredictionKind::Neural => 3,
    }
}

fn prediction_from_tag(tag: u8) -> Result<PredictionKind> {
    Ok(match tag {
        0 => PredictionKind::Constant,
        1 => PredictionKind::Nlms,
        2 => PredictionKind::Rls,
        3 => PredictionKind::Neural,
        _ => return Err(Error::snapshot(format!("unknown prediction kind: {tag}"))),
    })
}

fn select_tag(kind: EaSelectKind) -> u8 {
    match kind {
        EaSelectKind::Roulette => 0,
        EaSelectKind::Tournament => 1,
    }
}

fn select_from_tag(tag: u8) -> Result<EaSelectKind> {
    Ok(match tag {
        0 => EaSelectKind::Roulette,
        1 => EaSelectKind::Tournament,
        _ => return Err(Error::snapshot(format!("unknown selection kind: {tag}"))),
    })
}

fn loss_tag(kind: LossKind) -> u8 {
    match kind {
        LossKind::Mae => 0,
        LossKind::Mse => 1,
        LossKind::Rmse => 2,
        LossKind::Log => 3,
        LossKind::BinaryLog => 4,
        LossKind::OneHot => 5,
        LossKind::Huber => 6,
    }
}

fn loss_from_tag(tag: u8) -> Result<LossKind> {
    Ok(match tag {
        0 => LossKind::Mae,
        1 => LossKind::Mse,
        2 => LossKind::Rmse,
        3 => LossKind::Log,
        4 => LossKind::BinaryLog,
        5 => LossKind::OneHot,
        6 => LossKind::Huber,
        _ => return Err(Error::snapshot(format!("unknown loss kind: {tag}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    use crate::data::Dataset;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("oxcsf-{name}-{}", std::process::id()))
    }

    fn trained_engine(kind: PredictionKind, seed: u64) -> Xcsf {
        let mut params = Params::new(1, 1, 1);
        params.pop_size = 50;
        params.max_trials = 300;
        params.perf_trials = 10_000;
        params.prediction = kind;
        params.seed = seed;
        let data = Dataset::new(
            (0..40).map(|i| f64::from(i) / 40.0).collect(),
            (0..40).map(|i| f64::from(i) / 20.0 + 0.5).collect(),
            1,
            1,
        )
        .unwrap();
        let mut xcsf = Xcsf::new(params).unwrap();
        xcsf.fit(&data, None, true).unwrap();
        xcsf
    }

    #[test]
    fn round_trip_preserves_predictions() {
        let path = tmp_path("roundtrip");
        for (i, kind) in [
            PredictionKind::Constant,
            PredictionKind::Nlms,
            PredictionKind::Rls,
        ]
        .into_iter()
        .enumerate()
        {
            let mut original = trained_engine(kind, 10 + i as u64);
            original.save(&path).unwrap();
            let mut restored = Xcsf::load(&path).unwrap();
            assert_eq!(restored.time(), original.time());
            assert_eq!(
                restored.population().num_macros(),
                original.population().num_macros()
            );
            let probe: Vec<f64> = (0..100).map(|i| f64::from(i) / 100.0).collect();
            assert_eq!(
                original.predict(&probe).unwrap(),
                restored.predict(&probe).unwrap(),
                "{kind:?}"
            );
        }
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let path = tmp_path("badmagic");
        fs::write(&path, b"NOPE\x01\x00\x00\x00").unwrap();
        assert!(matches!(Xcsf::load(&path), Err(Error::Snapshot(_))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let path = tmp_path("truncated");
        let original = trained_engine(PredictionKind::Nlms, 20);
        original.save(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(Xcsf::load(&path).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            Xcsf::load(Path::new("/nonexistent/oxcsf.bin")),
            Err(Error::Io(_))
        ));
    }
}
