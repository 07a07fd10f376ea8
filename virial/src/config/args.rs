//! Command-line argument parsing for cluster sampling runs

use clap::Parser;

/// Sample virial cluster integrals with YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override number of points in the cluster
    #[arg(short, long)]
    pub points: Option<usize>,

    /// Override cluster variant (plain, precise, adaptive, derivatives, adaptive-derivatives, hard-core, channels)
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Override number of production steps per chain
    #[arg(short, long)]
    pub samples: Option<u64>,

    /// Override number of independent chains
    #[arg(long)]
    pub chains: Option<usize>,

    /// Override random seed of the first chain
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override temperature (reduced units, k_B = 1)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Check final configurations against explicit graph enumeration
    #[arg(long)]
    pub verify: bool,
}
