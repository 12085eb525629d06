//! Boundary detection on a black/white pixel grid, posed as a binary
//! quadratic model and solved on a hosted sampler.
//!
//! The pipeline is linear: [`ImageGraph::build`] turns the grid into a
//! weighted 4-connected graph, [`build_bqm`] puts one binary variable on each
//! pixel with edge terms that favour cutting along colour changes,
//! [`sampler::run`] makes the single blocking call to a [`Sampler`], and the
//! [`render`] functions draw the result.

pub mod bqm;
pub mod config;
pub mod graph;
pub mod grid;
pub mod hosted;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod sampler;
pub mod solution;

pub use bqm::{BinaryQuadraticModel, ModelError, Sample, Vartype};
pub use config::{Config, ConfigError, RunConfig, SolverConfig};
pub use graph::{Adjacency, GridEdge, ImageGraph, PixelNode};
pub use grid::{Coord, GridError, PixelGrid};
pub use hosted::{HostedSampler, HttpTransport, Transport};
pub use model::{build_bqm, BoundaryObjective};
pub use pipeline::{run_pipeline, RunOutput};
pub use render::{RenderContext, RenderError};
pub use sampler::{SampleParams, SampleSet, Sampler, SamplerError};
pub use solution::{boundary_segments, Assignment, CutPartition, Segment};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
