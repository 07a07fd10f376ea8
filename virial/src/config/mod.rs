//! Configuration management for cluster sampling runs
//!
//! This module handles configuration structures and defaults for the cluster
//! variant, the pair potential and the Monte Carlo chains.

mod args;

pub use args::Args;

use serde::{Deserialize, Serialize};

/// Main configuration structure for a sampling run
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub cluster: ClusterParams,
    pub potential: PotentialConfig,
    pub sampling: Option<SamplingParams>,
}

/// Cluster-sum parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClusterParams {
    pub points: Option<usize>,
    pub kind: Option<String>, // plain, precise, adaptive, derivatives, adaptive-derivatives, hard-core, channels
    pub digits: Option<usize>,
    pub tolerance: Option<f64>,
    pub derivative_order: Option<usize>,
    pub tabulated: Option<usize>,
    pub screening: Option<bool>,
    pub caching: Option<bool>,
}

impl Default for ClusterParams {
    fn default() -> Self {
        ClusterParams {
            points: Some(4),
            kind: Some("plain".to_string()),
            digits: Some(40),
            tolerance: Some(1e-12),
            derivative_order: Some(1),
            tabulated: Some(5),
            screening: Some(true),
            caching: Some(true),
        }
    }
}

impl ClusterParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.points.is_none() {
            self.points = defaults.points;
        }
        if self.kind.is_none() {
            self.kind = defaults.kind;
        }
        if self.digits.is_none() {
            self.digits = defaults.digits;
        }
        if self.tolerance.is_none() {
            self.tolerance = defaults.tolerance;
        }
        if self.derivative_order.is_none() {
            self.derivative_order = defaults.derivative_order;
        }
        if self.tabulated.is_none() {
            self.tabulated = defaults.tabulated;
        }
        if self.screening.is_none() {
            self.screening = defaults.screening;
        }
        if self.caching.is_none() {
            self.caching = defaults.caching;
        }
        self
    }
}

/// Pair potential between cluster points
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PotentialConfig {
    HardSphere { sigma: f64 },
    SquareWell { sigma: f64, lambda: f64, epsilon: f64 },
    LennardJones { sigma: f64, epsilon: f64 },
}

pub const DEFAULT_SAMPLES: u64 = 100_000;
pub const DEFAULT_EQUILIBRATION: u64 = 1_000;
pub const DEFAULT_CHAINS: usize = 4;
pub const DEFAULT_SEED: u64 = 12345;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
/// In units of the potential's sigma
pub const DEFAULT_MAX_DISPLACEMENT: f64 = 0.5;

/// Monte Carlo chain parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplingParams {
    pub samples: Option<u64>,
    pub equilibration: Option<u64>,
    pub chains: Option<usize>,
    pub seed: Option<u64>,
    pub temperature: Option<f64>,
    pub max_displacement: Option<f64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            samples: Some(DEFAULT_SAMPLES),
            equilibration: Some(DEFAULT_EQUILIBRATION),
            chains: Some(DEFAULT_CHAINS),
            seed: Some(DEFAULT_SEED),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_displacement: Some(DEFAULT_MAX_DISPLACEMENT),
        }
    }
}

impl SamplingParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.samples.is_none() {
            self.samples = defaults.samples;
        }
        if self.equilibration.is_none() {
            self.equilibration = defaults.equilibration;
        }
        if self.chains.is_none() {
            self.chains = defaults.chains;
        }
        if self.seed.is_none() {
            self.seed = defaults.seed;
        }
        if self.temperature.is_none() {
            self.temperature = defaults.temperature;
        }
        if self.max_displacement.is_none() {
            self.max_displacement = defaults.max_displacement;
        }
        self
    }
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.cluster = self.cluster.with_defaults();
        self.sampling = Some(self.sampling.take().unwrap_or_default().with_defaults());
        self
    }

    /// Get the sampling parameters, defaulted if the section is missing
    pub fn sampling(&self) -> SamplingParams {
        self.sampling.clone().unwrap_or_default().with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config {
            cluster: ClusterParams {
                points: Some(5),
                kind: None,
                digits: None,
                tolerance: None,
                derivative_order: None,
                tabulated: None,
                screening: None,
                caching: None,
            },
            potential: PotentialConfig::HardSphere { sigma: 1.0 },
            sampling: None,
        }
        .with_defaults();

        assert_eq!(config.cluster.points, Some(5));
        assert_eq!(config.cluster.kind.as_deref(), Some("plain"));
        assert_eq!(config.cluster.screening, Some(true));
        assert_eq!(config.sampling().chains, Some(4));
        assert_eq!(config.sampling().temperature, Some(1.0));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
cluster:
  points: 5
  kind: hard-core
  tabulated: 4

potential:
  type: square_well
  sigma: 1.0
  lambda: 1.5
  epsilon: 0.8

sampling:
  samples: 2000
  seed: 7
"#;

        let config: Config = serde_yml::from_str::<Config>(yaml).unwrap().with_defaults();
        assert_eq!(config.cluster.points, Some(5));
        assert_eq!(config.cluster.kind.as_deref(), Some("hard-core"));
        assert_eq!(config.cluster.tabulated, Some(4));
        assert_eq!(
            config.potential,
            PotentialConfig::SquareWell {
                sigma: 1.0,
                lambda: 1.5,
                epsilon: 0.8
            }
        );
        let sampling = config.sampling();
        assert_eq!(sampling.samples, Some(2000));
        assert_eq!(sampling.seed, Some(7));
        assert_eq!(sampling.max_displacement, Some(0.5));
    }

    #[test]
    fn test_unknown_potential_is_rejected() {
        let yaml = r#"
cluster:
  points: 3
potential:
  type: morse
  sigma: 1.0
"#;
        assert!(serde_yml::from_str::<Config>(yaml).is_err());
    }
}
