//! Monte Carlo chains sampling cluster configurations
//!
//! Each chain holds `n` points, the first one pinned at the origin, and moves
//! one of the others at a time. Configurations are visited with probability
//! proportional to the magnitude of their cluster value, so the average sign
//! of the value over the chain measures how much the positive and negative
//! contributions cancel.

use cluster::validation::{biconnected_sum_brute_force, MAX_ENUMERATED_POINTS};
use cluster::{CacheStats, CachedCluster, ChannelBond, ClusterSum, Configuration, ConfigurationId, PairBond, ScreeningStats};
use color_eyre::eyre::{bail, Result};
use nalgebra::Vector3;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

use crate::potential::{MayerFunction, Potential, SquareWell};

/// Attempts made to find a starting configuration with a nonzero value.
const MAX_START_ATTEMPTS: usize = 10_000;

/// Maps pair geometry to the bond type a cluster reads.
pub trait BondModel {
    type Bond: PairBond;

    fn bond(&self, r2: f64) -> Self::Bond;

    /// Scalar Mayer function of the pair at the sampled temperature.
    fn mayer(&self, r2: f64) -> f64;

    fn sigma(&self) -> f64;
}

/// Scalar Mayer bonds of a potential at inverse temperature `beta`.
#[derive(Debug, Clone, Copy)]
pub struct MayerBonds {
    pub potential: Potential,
    pub beta: f64,
}

impl BondModel for MayerBonds {
    type Bond = f64;

    fn bond(&self, r2: f64) -> f64 {
        self.potential.mayer(r2, self.beta)
    }

    fn mayer(&self, r2: f64) -> f64 {
        self.potential.mayer(r2, self.beta)
    }

    fn sigma(&self) -> f64 {
        self.potential.sigma()
    }
}

/// Square-well bonds as polynomials in the well variable.
#[derive(Debug, Clone, Copy)]
pub struct ChannelBonds {
    pub well: SquareWell,
    pub beta: f64,
    pub len: usize,
}

impl ChannelBonds {
    pub fn well_variable(&self) -> f64 {
        self.well.well_variable(self.beta)
    }
}

impl BondModel for ChannelBonds {
    type Bond = ChannelBond;

    fn bond(&self, r2: f64) -> ChannelBond {
        self.well.channel_bond(r2, self.len)
    }

    fn mayer(&self, r2: f64) -> f64 {
        self.well.mayer(r2, self.beta)
    }

    fn sigma(&self) -> f64 {
        self.well.sigma
    }
}

/// Points of one cluster and the identity of their current arrangement.
#[derive(Debug, Clone)]
pub struct PointCluster {
    pub positions: Vec<Vector3<f64>>,
    id: ConfigurationId,
}

impl PointCluster {
    pub fn new(positions: Vec<Vector3<f64>>, id: ConfigurationId) -> Self {
        PointCluster { positions, id }
    }

    pub fn id(&self) -> ConfigurationId {
        self.id
    }

    pub fn distance_squared(&self, i: usize, j: usize) -> f64 {
        (self.positions[i] - self.positions[j]).norm_squared()
    }
}

/// Configuration seen by the cluster: current positions through a bond model.
pub struct Snapshot<'a, M> {
    points: &'a PointCluster,
    model: &'a M,
}

impl<'a, M: BondModel> Snapshot<'a, M> {
    pub fn new(points: &'a PointCluster, model: &'a M) -> Self {
        Snapshot { points, model }
    }
}

impl<M: BondModel> Configuration for Snapshot<'_, M> {
    type Bond = M::Bond;

    fn point_count(&self) -> usize {
        self.points.positions.len()
    }

    fn id(&self) -> ConfigurationId {
        self.points.id
    }

    fn bond(&self, i: usize, j: usize) -> M::Bond {
        self.model.bond(self.points.distance_squared(i, j))
    }
}

/// Statistics for tracking a chain
#[derive(Debug, Clone, Default)]
pub struct SamplerStatistics {
    /// Number of displacement moves attempted
    pub attempts: u64,
    /// Number of displacement moves accepted
    pub accepted: u64,
    /// Number of samples for averages
    pub samples: u64,
    /// Sum of the sign of the cluster value over samples
    pub sign_sum: f64,
}

impl SamplerStatistics {
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempts as f64
        }
    }

    pub fn average_sign(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.sign_sum / self.samples as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Cluster value of the final configuration next to explicit graph enumeration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    pub value: f64,
    pub reference: f64,
}

impl Verification {
    pub fn deviation(&self) -> f64 {
        (self.value - self.reference).abs()
    }
}

/// Results from one chain
#[derive(Debug, Clone)]
pub struct ChainResults {
    pub seed: u64,
    pub samples: u64,
    pub acceptance: f64,
    pub average_sign: f64,
    pub final_value: f64,
    pub screening: ScreeningStats,
    pub cache: CacheStats,
    pub verification: Option<Verification>,
}

/// Chain of displacement moves weighted by `|weight(value)|`.
pub struct ClusterChain<E: ClusterSum, M, F> {
    points: PointCluster,
    model: M,
    cluster: CachedCluster<E>,
    weight: F,
    rng: StdRng,
    seed: u64,
    next_id: u64,
    current_weight: f64,
    /// Maximum displacement per coordinate, in units of the potential's sigma
    pub max_displacement: f64,
    pub stats: SamplerStatistics,
}

impl<E, M, F> ClusterChain<E, M, F>
where
    E: ClusterSum,
    M: BondModel<Bond = E::Bond>,
    F: Fn(&E::Output) -> f64,
{
    /// Places `n` points in a tight clump around the origin, retrying until the
    /// cluster value is nonzero.
    pub fn new(n: usize, model: M, cluster: CachedCluster<E>, weight: F, seed: u64, max_displacement: f64) -> Result<Self> {
        let mut chain = ClusterChain {
            points: PointCluster::new(vec![Vector3::zeros(); n], ConfigurationId(0)),
            model,
            cluster,
            weight,
            rng: StdRng::seed_from_u64(seed),
            seed,
            next_id: 0,
            current_weight: 0.0,
            max_displacement,
            stats: SamplerStatistics::default(),
        };
        let spread = 0.4 * chain.model.sigma();
        for attempt in 0..MAX_START_ATTEMPTS {
            for k in 1..n {
                let offset = chain.rng.gen::<Vector3<f64>>().add_scalar(-0.5);
                chain.points.positions[k] = offset * spread;
            }
            chain.points.id = chain.fresh_id();
            let value = chain.cluster.value(&Snapshot::new(&chain.points, &chain.model))?;
            chain.current_weight = (chain.weight)(&value);
            if chain.current_weight != 0.0 {
                debug!("chain {} started after {} attempts", seed, attempt + 1);
                return Ok(chain);
            }
        }
        bail!(
            "no configuration with a nonzero cluster value found in {} attempts",
            MAX_START_ATTEMPTS
        )
    }

    fn fresh_id(&mut self) -> ConfigurationId {
        self.next_id += 1;
        ConfigurationId(self.next_id)
    }

    pub fn points(&self) -> &PointCluster {
        &self.points
    }

    pub fn cluster(&self) -> &CachedCluster<E> {
        &self.cluster
    }

    pub fn current_weight(&self) -> f64 {
        self.current_weight
    }

    /// Attempt a displacement move, accepted with probability `min(1, |w_new| / |w_old|)`
    pub fn attempt_displacement(&mut self) -> Result<bool> {
        let n = self.points.positions.len();
        if n < 2 {
            return Ok(false);
        }
        self.stats.attempts += 1;

        // point 0 stays at the origin
        let idx = self.rng.gen_range(1..n);
        let old_pos = self.points.positions[idx];
        let old_id = self.points.id;
        let step = self.max_displacement * self.model.sigma();
        // uniform in the cube [-step, step]^3
        let displacement = (self.rng.gen::<Vector3<f64>>() * 2.0).add_scalar(-1.0) * step;
        self.points.positions[idx] = old_pos + displacement;
        self.points.id = self.fresh_id();

        let trial = self.cluster.value(&Snapshot::new(&self.points, &self.model))?;
        let trial_weight = (self.weight)(&trial);
        let ratio = trial_weight.abs() / self.current_weight.abs();
        let accept = ratio >= 1.0 || self.rng.gen::<f64>() < ratio;

        if accept {
            self.current_weight = trial_weight;
            self.stats.accepted += 1;
        } else {
            self.points.positions[idx] = old_pos;
            self.points.id = old_id;
            let restored = self.cluster.value(&Snapshot::new(&self.points, &self.model))?;
            self.current_weight = (self.weight)(&restored);
        }
        Ok(accept)
    }

    /// Sample current state for statistics
    pub fn sample(&mut self) {
        self.stats.samples += 1;
        self.stats.sign_sum += self.current_weight.signum();
    }

    pub fn run(&mut self, steps: u64) -> Result<()> {
        for _ in 0..steps {
            self.attempt_displacement()?;
        }
        Ok(())
    }

    /// Compares the current value with explicit enumeration of graphs
    pub fn verify(&self) -> Option<Verification> {
        let n = self.points.positions.len();
        if n > MAX_ENUMERATED_POINTS {
            return None;
        }
        let reference = biconnected_sum_brute_force(n, |i, j| self.model.mayer(self.points.distance_squared(i, j)));
        Some(Verification {
            value: self.current_weight,
            reference,
        })
    }

    pub fn results(&self, verify: bool) -> ChainResults {
        ChainResults {
            seed: self.seed,
            samples: self.stats.samples,
            acceptance: self.stats.acceptance_rate(),
            average_sign: self.stats.average_sign(),
            final_value: self.current_weight,
            screening: *self.cluster.cluster().screen().stats(),
            cache: *self.cluster.stats(),
            verification: if verify { self.verify() } else { None },
        }
    }
}

/// Runs independent chains in parallel: equilibration, then production with one sample per step
pub fn parallel_chains<E, M, F>(
    chains: Vec<ClusterChain<E, M, F>>,
    equilibration: u64,
    production: u64,
    verify: bool,
) -> Result<Vec<ChainResults>>
where
    E: ClusterSum + Send,
    E::Output: Send,
    M: BondModel<Bond = E::Bond> + Send,
    F: Fn(&E::Output) -> f64 + Send,
{
    chains
        .into_par_iter()
        .map(|mut chain| {
            chain.run(equilibration)?;
            chain.stats.reset();
            for _ in 0..production {
                chain.attempt_displacement()?;
                chain.sample();
            }
            Ok(chain.results(verify))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::HardSphere;
    use approx::assert_abs_diff_eq;
    use cluster::{ChannelCluster, Channels, ClusterKind, ClusterValue, Plain, ScalarCluster, WheatleyCluster};

    fn hard_sphere_chain(n: usize, seed: u64) -> ClusterChain<ScalarCluster, MayerBonds, fn(&ClusterValue) -> f64> {
        let model = MayerBonds {
            potential: Potential::HardSphere(HardSphere { sigma: 1.0 }),
            beta: 1.0,
        };
        let cluster = CachedCluster::new(ScalarCluster::new(n, &ClusterKind::Plain));
        ClusterChain::new(n, model, cluster, ClusterValue::primary as fn(&ClusterValue) -> f64, seed, 0.5).unwrap()
    }

    #[test]
    fn test_chain_starts_with_nonzero_value() {
        let chain = hard_sphere_chain(4, 1);
        assert_ne!(chain.current_weight(), 0.0);
        assert_eq!(chain.points().positions[0], Vector3::zeros());
        // starting clump spans 0.4 sigma per coordinate
        for position in &chain.points().positions {
            assert!(position.amax() <= 0.2);
        }
    }

    #[test]
    fn test_moves_stay_within_step() {
        let mut chain = hard_sphere_chain(4, 5);
        for _ in 0..200 {
            let before = chain.points().clone();
            chain.attempt_displacement().unwrap();
            for (old, new) in before.positions.iter().zip(&chain.points().positions) {
                assert!((new - old).amax() <= 0.5);
            }
        }
    }

    #[test]
    fn test_rejected_moves_restore_configuration() {
        let mut chain = hard_sphere_chain(4, 2);
        for _ in 0..200 {
            let before = chain.points().clone();
            let accepted = chain.attempt_displacement().unwrap();
            if !accepted {
                assert_eq!(chain.points().positions, before.positions);
                assert_eq!(chain.points().id(), before.id());
            }
            assert_ne!(chain.current_weight(), 0.0);
        }
        let cache = chain.cluster().stats();
        assert_eq!(cache.recomputes, 201);
        assert_eq!(cache.rollbacks, chain.stats.attempts - chain.stats.accepted);
    }

    #[test]
    fn test_sampled_values_match_enumeration() {
        let mut chain = hard_sphere_chain(5, 3);
        for _ in 0..20 {
            chain.run(10).unwrap();
            let check = chain.verify().unwrap();
            assert_abs_diff_eq!(check.value, check.reference, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_channel_chain_matches_scalar_value() {
        let well = SquareWell {
            sigma: 1.0,
            lambda: 1.5,
            epsilon: 1.0,
        };
        let n = 4;
        let model = ChannelBonds {
            well,
            beta: 0.7,
            len: Channels::for_points(n).len(),
        };
        let y = model.well_variable();
        let cluster = CachedCluster::new(ChannelCluster::new(n, Channels::for_points(n)));
        let weight = move |value: &Vec<f64>| Channels::evaluate(value, y);
        let mut chain = ClusterChain::new(n, model, cluster, weight, 4, 0.5).unwrap();
        chain.run(50).unwrap();

        let scalar = MayerBonds {
            potential: Potential::SquareWell(well),
            beta: 0.7,
        };
        let mut plain = WheatleyCluster::new(n, Plain);
        let expected = plain.compute(&Snapshot::new(chain.points(), &scalar)).unwrap();
        assert_abs_diff_eq!(chain.current_weight(), expected, epsilon = 1e-10);
    }

    #[test]
    fn test_parallel_chains_report_every_chain() {
        let chains: Vec<_> = (0..3).map(|seed| hard_sphere_chain(4, seed)).collect();
        let results = parallel_chains(chains, 20, 100, true).unwrap();
        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.samples, 100);
            assert!(result.average_sign.abs() <= 1.0);
            assert!(result.acceptance > 0.0);
            let check = result.verification.unwrap();
            assert_abs_diff_eq!(check.value, check.reference, epsilon = 1e-9);
        }
    }
}
