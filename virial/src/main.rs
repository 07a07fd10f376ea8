//! Virial Cluster Sampling Command-Line Interface
//!
//! Runs Monte Carlo chains over cluster configurations of a pair potential,
//! weighting each configuration by its biconnected Mayer cluster sum.

mod app;
mod config;
mod io;
mod potential;
mod sampler;

use app::VirialApplication;
use color_eyre::eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    VirialApplication::from_cli()?.run()
}
