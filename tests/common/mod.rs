use boundary_bqm::sampler::SampleRecord;
use boundary_bqm::{BinaryQuadraticModel, Coord, Sample, SampleParams, SampleSet, Sampler, SamplerError};

/// Enumerates every labeling. Only usable on tiny models.
pub struct ExactSampler;

impl Sampler for ExactSampler {
    fn sample(&self, bqm : &BinaryQuadraticModel<Coord>, params : &SampleParams) -> Result<SampleSet, SamplerError> {
        params.validate()?;
        let vars : Vec<Coord> = bqm.variables().copied().collect();
        assert!(vars.len() <= 16, "too many variables to enumerate");
        let mut records = Vec::with_capacity(1 << vars.len());
        for bits in 0..1u32 << vars.len() {
            let sample : Sample<Coord> = vars.iter().enumerate().map(|(i, v)| (*v, ((bits >> i) & 1) as i8)).collect();
            let energy = bqm.energy(&sample).map_err(|e| SamplerError::Protocol(e.to_string()))?;
            records.push(SampleRecord { sample, energy, num_occurrences : 1 });
        }
        Ok(SampleSet::from_records(bqm.vartype(), records))
    }
}

pub struct FailingSampler(pub SamplerError);

impl Sampler for FailingSampler {
    fn sample(&self, _ : &BinaryQuadraticModel<Coord>, _ : &SampleParams) -> Result<SampleSet, SamplerError> {
        Err(self.0.clone())
    }
}
