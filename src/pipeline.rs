use std::path::PathBuf;

use crate::config::RunConfig;
use crate::graph::ImageGraph;
use crate::grid::PixelGrid;
use crate::model::build_bqm;
use crate::render::{self, RenderContext};
use crate::sampler::{self, suggest_chain_strength, Sampler};
use crate::solution::{Assignment, CutPartition};
use crate::Result;

/// What one run produced.
pub struct RunOutput {
    pub graph : ImageGraph,
    pub assignment : Assignment,
    pub chain_strength : f64,
    pub energy : f64,
    pub cut_edges : usize,
    pub regions : usize,
    pub figures : Vec<PathBuf>,
}

/// Graph builder, model, one sampler call, and the two result figures.
///
/// The input figure is written before the sampler is called, so it survives
/// a failed run.
pub fn run_pipeline<S : Sampler + ?Sized>(grid : &PixelGrid, sampler : &S, config : &RunConfig) -> Result<RunOutput> {
    let mut ctx = RenderContext::new(&config.output_dir, config.cell_size)?;

    let graph = ImageGraph::build(grid);
    tracing::info!(rows = grid.rows(), cols = grid.cols(), edges = graph.edge_count(), "built graph");
    render::draw_graph(&mut ctx, &graph)?;

    let bqm = build_bqm(&graph, &config.objective)?;
    let chain_strength = config
        .chain_strength
        .unwrap_or_else(|| suggest_chain_strength(&bqm, config.chain_strength_prefactor));
    let params = config.sample_params(chain_strength);
    let assignment = sampler::run(&bqm, sampler, &params)?;
    if let Some(c) = assignment.missing(&graph) {
        return Err(sampler::SamplerError::IncompleteSample(c).into());
    }
    let energy = bqm.energy(&assignment.as_sample())?;

    let partition = CutPartition::from_assignment(&graph, &assignment);
    let regions = assignment.region_count(&graph);
    tracing::info!(
        energy,
        cut = partition.cut.len(),
        spurious = partition.spurious(),
        missed = partition.missed(),
        regions,
        "interpreted sample"
    );

    render::draw_solution(&mut ctx, &graph, &assignment)?;
    render::draw_boundary(&mut ctx, grid, &graph, &assignment)?;

    Ok(RunOutput {
        graph,
        assignment,
        chain_strength,
        energy,
        cut_edges : partition.cut.len(),
        regions,
        figures : ctx.finish(),
    })
}
