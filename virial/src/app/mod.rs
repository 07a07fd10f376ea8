mod report;
mod runner;

pub use runner::{run_chains, RunPlan};

use self::report::{report_chain, report_plan, report_summary};
use crate::config::{Args, Config};
use crate::io::setup_output;
use clap::Parser;
use cluster::hard_core::{MAX_HARD_CORE_POINTS, MAX_TABULATED_POINTS};
use cluster::ClusterKind;
use color_eyre::eyre::{bail, Result, WrapErr};
use std::fs;
use tracing::info;

pub struct VirialApplication {
    args: Args,
    config: Config,
}

impl VirialApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref())?;
        info!("Configuration loaded:\n{:?}", self.config);

        let plan = RunPlan::resolve(&self.args, &self.config)?;
        report_plan(&plan);

        let results = run_chains(&plan)?;
        for (idx, result) in results.iter().enumerate() {
            report_chain(idx, result);
        }
        report_summary(&plan, &results);

        Ok(())
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    Ok(config)
}

/// Cluster variant a run samples with
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterSelection {
    /// Scalar Mayer bonds summed by a [`ScalarCluster`](cluster::ScalarCluster)
    Scalar(ClusterKind),
    /// Square-well bonds kept as polynomials in the well variable
    Channels,
}

impl ClusterSelection {
    pub fn determine(args: &Args, config: &Config, beta: f64) -> Result<Self> {
        let params = &config.cluster;
        let name = args
            .kind
            .as_deref()
            .or(params.kind.as_deref())
            .unwrap_or("plain")
            .to_lowercase();

        let selection = match name.as_str() {
            "plain" => ClusterSelection::Scalar(ClusterKind::Plain),
            "precise" => ClusterSelection::Scalar(ClusterKind::Precise {
                digits: params.digits.unwrap_or(40),
            }),
            "adaptive" => ClusterSelection::Scalar(ClusterKind::Adaptive {
                tolerance: params.tolerance.unwrap_or(1e-12),
                digits: params.digits.unwrap_or(40),
            }),
            "derivatives" => ClusterSelection::Scalar(ClusterKind::Derivatives {
                order: params.derivative_order.unwrap_or(1),
                beta,
            }),
            "adaptive-derivatives" | "adaptive_derivatives" => {
                ClusterSelection::Scalar(ClusterKind::AdaptiveDerivatives {
                    order: params.derivative_order.unwrap_or(1),
                    beta,
                    tolerance: params.tolerance.unwrap_or(1e-12),
                    digits: params.digits.unwrap_or(40),
                })
            }
            "hard-core" | "hard_core" => {
                let tabulated = params.tabulated.unwrap_or(5);
                if !(2..=MAX_TABULATED_POINTS).contains(&tabulated) {
                    bail!(
                        "signature tables cover 2 to {} points, got {}",
                        MAX_TABULATED_POINTS,
                        tabulated
                    );
                }
                ClusterSelection::Scalar(ClusterKind::HardCore { tabulated })
            }
            "channels" => ClusterSelection::Channels,
            other => bail!(
                "Unknown cluster kind '{}' (expected plain, precise, adaptive, derivatives, adaptive-derivatives, hard-core or channels)",
                other
            ),
        };
        Ok(selection)
    }

    /// Largest cluster the selected variant accepts
    pub fn max_points(&self) -> usize {
        match self {
            ClusterSelection::Scalar(ClusterKind::HardCore { .. }) => MAX_HARD_CORE_POINTS,
            _ => cluster::subset::MAX_POINTS,
        }
    }
}

impl std::fmt::Display for ClusterSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterSelection::Scalar(kind) => write!(f, "{}", kind),
            ClusterSelection::Channels => write!(f, "square-well channels"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterParams, PotentialConfig};

    fn config(kind: &str) -> Config {
        Config {
            cluster: ClusterParams {
                kind: Some(kind.to_string()),
                ..ClusterParams::default()
            },
            potential: PotentialConfig::HardSphere { sigma: 1.0 },
            sampling: None,
        }
        .with_defaults()
    }

    #[test]
    fn test_selection_from_config() {
        let args = Args::parse_from(["virial"]);
        assert_eq!(
            ClusterSelection::determine(&args, &config("hard-core"), 1.0).unwrap(),
            ClusterSelection::Scalar(ClusterKind::HardCore { tabulated: 5 })
        );
        assert_eq!(
            ClusterSelection::determine(&args, &config("Channels"), 1.0).unwrap(),
            ClusterSelection::Channels
        );
        assert_eq!(
            ClusterSelection::determine(&args, &config("derivatives"), 0.5).unwrap(),
            ClusterSelection::Scalar(ClusterKind::Derivatives { order: 1, beta: 0.5 })
        );
    }

    #[test]
    fn test_adaptive_derivatives_selection() {
        let args = Args::parse_from(["virial", "--kind", "adaptive_derivatives"]);
        let mut params = config("plain");
        params.cluster.derivative_order = Some(2);
        params.cluster.tolerance = Some(1e-6);
        assert_eq!(
            ClusterSelection::determine(&args, &params, 0.25).unwrap(),
            ClusterSelection::Scalar(ClusterKind::AdaptiveDerivatives {
                order: 2,
                beta: 0.25,
                tolerance: 1e-6,
                digits: 40,
            })
        );
    }

    #[test]
    fn test_command_line_overrides_kind() {
        let args = Args::parse_from(["virial", "--kind", "precise"]);
        assert_eq!(
            ClusterSelection::determine(&args, &config("plain"), 1.0).unwrap(),
            ClusterSelection::Scalar(ClusterKind::Precise { digits: 40 })
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let args = Args::parse_from(["virial"]);
        assert!(ClusterSelection::determine(&args, &config("quadruple"), 1.0).is_err());

        let mut table_too_large = config("hard-core");
        table_too_large.cluster.tabulated = Some(MAX_TABULATED_POINTS + 1);
        assert!(ClusterSelection::determine(&args, &table_too_large, 1.0).is_err());
    }
}
