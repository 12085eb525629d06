use anyhow::Context;
use tracing_subscriber::EnvFilter;

use boundary_bqm::{run_pipeline, Config, HostedSampler, PixelGrid};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().context("loading configuration")?;

    // Set up our image grid
    let grid = match &config.run.image {
        Some(path) => PixelGrid::from_image(path).with_context(|| format!("reading grid from {}", path.display()))?,
        None => PixelGrid::example(),
    };

    let sampler = HostedSampler::connect(&config.solver).context("connecting to solver")?;
    let output = run_pipeline(&grid, &sampler, &config.run).context("boundary run failed")?;

    println!(
        "\nBest sample: energy {}, {} cut edges, {} regions (chain strength {:.3})\n",
        output.energy, output.cut_edges, output.regions, output.chain_strength
    );
    for path in &output.figures {
        println!("Your figure is saved to {}", path.display());
    }
    Ok(())
}
