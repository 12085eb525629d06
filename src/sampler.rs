//! The runner side of the pipeline: parameters for one sampling request, the
//! ranked answer, and the [`Sampler`] seam the hosted backend plugs into.

use std::cmp::Ordering;
use std::time::Duration;

use crate::bqm::{BinaryQuadraticModel, Sample, Vartype};
use crate::grid::Coord;
use crate::solution::Assignment;

pub const DEFAULT_LABEL : &str = "Training - Boundary Problem";
pub const MAX_NUM_READS : u32 = 10_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplerError {
    #[error("invalid sampling parameters: {0}")]
    InvalidParameters(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("solver rejected credentials: {0}")]
    Auth(String),

    #[error("no embedding found: {0}")]
    Embedding(String),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("solver error {code}: {message}")]
    Solver { code : u16, message : String },

    #[error("malformed solver response: {0}")]
    Protocol(String),

    #[error("solver returned no samples")]
    Empty,

    #[error("best sample has no label for {0}")]
    IncompleteSample(Coord),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleParams {
    pub chain_strength : f64,
    pub num_reads : u32,
    pub label : String,
    pub timeout : Duration,
}

impl Default for SampleParams {
    fn default() -> Self {
        SampleParams {
            chain_strength : 2.0,
            num_reads : 10,
            label : DEFAULT_LABEL.to_string(),
            timeout : Duration::from_secs(300),
        }
    }
}

impl SampleParams {
    pub fn validate(&self) -> Result<(), SamplerError> {
        if !self.chain_strength.is_finite() || self.chain_strength <= 0.0 {
            return Err(SamplerError::InvalidParameters(format!(
                "chain strength must be positive, got {}",
                self.chain_strength
            )));
        }
        if self.num_reads == 0 || self.num_reads > MAX_NUM_READS {
            return Err(SamplerError::InvalidParameters(format!(
                "num_reads must be in 1..={MAX_NUM_READS}, got {}",
                self.num_reads
            )));
        }
        if self.label.trim().is_empty() {
            return Err(SamplerError::InvalidParameters("empty problem label".into()));
        }
        if self.timeout.is_zero() {
            return Err(SamplerError::InvalidParameters("zero timeout".into()));
        }
        Ok(())
    }
}

/// Chain strength from the RMS of the quadratic biases scaled by the square
/// root of the mean degree. Models without interactions fall back to the
/// largest bias.
pub fn suggest_chain_strength(bqm : &BinaryQuadraticModel<Coord>, prefactor : f64) -> f64 {
    let n = bqm.num_variables();
    let interactions = bqm.num_interactions();
    if interactions == 0 || n == 0 {
        return bqm.max_abs_bias().max(1.0);
    }
    let rms = (bqm.quadratic_terms().map(|(_, _, b)| b * b).sum::<f64>() / interactions as f64).sqrt();
    let avg_degree = 2.0 * interactions as f64 / n as f64;
    prefactor * rms * avg_degree.sqrt()
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleRecord {
    pub sample : Sample<Coord>,
    pub energy : f64,
    pub num_occurrences : u32,
}

/// Samples ranked by ascending energy.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSet {
    vartype : Vartype,
    records : Vec<SampleRecord>,
}

impl SampleSet {
    pub fn from_records(vartype : Vartype, mut records : Vec<SampleRecord>) -> Self {
        records.sort_by(|a, b| a.energy.partial_cmp(&b.energy).unwrap_or(Ordering::Equal));
        SampleSet { vartype, records }
    }

    pub fn vartype(&self) -> Vartype {
        self.vartype
    }

    pub fn first(&self) -> Option<&SampleRecord> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn total_reads(&self) -> u32 {
        self.records.iter().map(|r| r.num_occurrences).sum()
    }
}

pub trait Sampler {
    fn sample(&self, bqm : &BinaryQuadraticModel<Coord>, params : &SampleParams) -> Result<SampleSet, SamplerError>;
}

/// Validates `params`, makes the one blocking call and keeps the best sample.
pub fn run<S : Sampler + ?Sized>(
    bqm : &BinaryQuadraticModel<Coord>,
    sampler : &S,
    params : &SampleParams,
) -> Result<Assignment, SamplerError> {
    params.validate()?;
    tracing::info!(
        chain_strength = params.chain_strength,
        num_reads = params.num_reads,
        label = %params.label,
        "submitting model"
    );
    let sample_set = sampler.sample(bqm, params)?;
    let best = sample_set.first().ok_or(SamplerError::Empty)?;

    let mut labels = Vec::with_capacity(bqm.num_variables());
    for v in bqm.variables() {
        let value = *best.sample.get(v).ok_or(SamplerError::IncompleteSample(*v))?;
        if !sample_set.vartype().accepts(value) {
            return Err(SamplerError::Protocol(format!(
                "value {value} for {v} is not {:?}",
                sample_set.vartype()
            )));
        }
        let label = match sample_set.vartype() {
            Vartype::Binary => value as u8,
            Vartype::Spin => u8::from(value > 0),
        };
        labels.push((*v, label));
    }
    tracing::info!(
        energy = best.energy,
        occurrences = best.num_occurrences,
        records = sample_set.len(),
        "best sample"
    );
    Ok(Assignment::from_labels(labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ImageGraph;
    use crate::grid::PixelGrid;
    use crate::model::{build_bqm, BoundaryObjective};
    use std::cell::Cell;

    struct Canned {
        set : SampleSet,
        calls : Cell<usize>,
    }

    impl Sampler for Canned {
        fn sample(&self, _ : &BinaryQuadraticModel<Coord>, _ : &SampleParams) -> Result<SampleSet, SamplerError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.set.clone())
        }
    }

    fn example_bqm() -> BinaryQuadraticModel<Coord> {
        build_bqm(&ImageGraph::build(&PixelGrid::example()), &BoundaryObjective::default()).unwrap()
    }

    fn uniform(bqm : &BinaryQuadraticModel<Coord>, value : i8) -> Sample<Coord> {
        bqm.variables().map(|v| (*v, value)).collect()
    }

    #[test]
    fn params_validation() {
        assert!(SampleParams::default().validate().is_ok());
        let bad = [
            SampleParams { chain_strength : 0.0, ..Default::default() },
            SampleParams { chain_strength : f64::INFINITY, ..Default::default() },
            SampleParams { num_reads : 0, ..Default::default() },
            SampleParams { num_reads : MAX_NUM_READS + 1, ..Default::default() },
            SampleParams { label : " ".into(), ..Default::default() },
            SampleParams { timeout : Duration::ZERO, ..Default::default() },
        ];
        for p in bad {
            assert!(matches!(p.validate(), Err(SamplerError::InvalidParameters(_))), "{p:?}");
        }
    }

    #[test]
    fn run_keeps_lowest_energy() {
        let bqm = example_bqm();
        let zeros = SampleRecord { sample : uniform(&bqm, 0), energy : 0.0, num_occurrences : 3 };
        let ones = SampleRecord { sample : uniform(&bqm, 1), energy : -1.0, num_occurrences : 1 };
        let sampler = Canned { set : SampleSet::from_records(Vartype::Binary, vec![zeros, ones]), calls : Cell::new(0) };

        let assignment = run(&bqm, &sampler, &SampleParams::default()).unwrap();
        assert_eq!(sampler.calls.get(), 1);
        assert_eq!(assignment.len(), 9);
        assert!(assignment.iter().all(|(_, label)| label == 1));
        assert_eq!(sampler.set.total_reads(), 4);
    }

    #[test]
    fn run_maps_spins_to_labels() {
        let bqm = example_bqm();
        let record = SampleRecord { sample : uniform(&bqm, -1), energy : 0.0, num_occurrences : 1 };
        let sampler = Canned { set : SampleSet::from_records(Vartype::Spin, vec![record]), calls : Cell::new(0) };
        let assignment = run(&bqm, &sampler, &SampleParams::default()).unwrap();
        assert!(assignment.iter().all(|(_, label)| label == 0));
    }

    #[test]
    fn run_rejects_values_outside_the_vartype() {
        let bqm = example_bqm();
        for (vartype, value) in [(Vartype::Spin, 0), (Vartype::Spin, 5), (Vartype::Binary, -1), (Vartype::Binary, 2)] {
            let record = SampleRecord { sample : uniform(&bqm, value), energy : 0.0, num_occurrences : 1 };
            let sampler = Canned { set : SampleSet::from_records(vartype, vec![record]), calls : Cell::new(0) };
            let result = run(&bqm, &sampler, &SampleParams::default());
            assert!(matches!(result, Err(SamplerError::Protocol(_))), "{vartype:?} {value}: {result:?}");
        }
    }

    #[test]
    fn run_rejects_before_calling() {
        let bqm = example_bqm();
        let sampler = Canned { set : SampleSet::from_records(Vartype::Binary, vec![]), calls : Cell::new(0) };
        let params = SampleParams { num_reads : 0, ..Default::default() };
        assert!(run(&bqm, &sampler, &params).is_err());
        assert_eq!(sampler.calls.get(), 0);
        assert_eq!(run(&bqm, &sampler, &SampleParams::default()), Err(SamplerError::Empty));
    }

    #[test]
    fn run_requires_total_sample() {
        let bqm = example_bqm();
        let mut sample = uniform(&bqm, 0);
        sample.remove(&Coord::new(2, 2));
        let record = SampleRecord { sample, energy : 0.0, num_occurrences : 1 };
        let sampler = Canned { set : SampleSet::from_records(Vartype::Binary, vec![record]), calls : Cell::new(0) };
        assert_eq!(
            run(&bqm, &sampler, &SampleParams::default()),
            Err(SamplerError::IncompleteSample(Coord::new(2, 2)))
        );
    }

    #[test]
    fn chain_strength_heuristic() {
        let bqm = example_bqm();
        // all |J| = 2, 12 interactions over 9 variables
        let expected = 2.0 * (24.0f64 / 9.0).sqrt();
        assert!((suggest_chain_strength(&bqm, 1.0) - expected).abs() < 1e-12);

        let lonely = build_bqm(
            &ImageGraph::build(&PixelGrid::new(vec![vec![1]]).unwrap()),
            &BoundaryObjective::default(),
        )
        .unwrap();
        assert_eq!(suggest_chain_strength(&lonely, 1.0), 1.0);
    }
}
