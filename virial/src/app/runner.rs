use crate::app::ClusterSelection;
use crate::config::{
    Args, Config, DEFAULT_CHAINS, DEFAULT_EQUILIBRATION, DEFAULT_MAX_DISPLACEMENT, DEFAULT_SAMPLES, DEFAULT_SEED,
    DEFAULT_TEMPERATURE,
};
use crate::potential::Potential;
use crate::sampler::{parallel_chains, BondModel, ChainResults, ChannelBonds, ClusterChain, MayerBonds};
use cluster::{
    CachedCluster, ChannelCluster, Channels, ClusterKind, ClusterSum, ClusterValue, ScalarCluster, SignatureTable,
};
use color_eyre::eyre::{bail, Result};
use std::sync::Arc;
use tracing::info;

/// Every setting of a sampling run, after command-line overrides and defaults
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub points: usize,
    pub selection: ClusterSelection,
    pub potential: Potential,
    pub temperature: f64,
    pub samples: u64,
    pub equilibration: u64,
    pub chains: usize,
    pub seed: u64,
    pub max_displacement: f64,
    pub screening: bool,
    pub caching: bool,
    pub verify: bool,
}

impl RunPlan {
    pub fn resolve(args: &Args, config: &Config) -> Result<Self> {
        let sampling = config.sampling();
        let temperature = args.temperature.or(sampling.temperature).unwrap_or(DEFAULT_TEMPERATURE);
        if !(temperature > 0.0) {
            bail!("Temperature must be positive, got {}", temperature);
        }

        let selection = ClusterSelection::determine(args, config, 1.0 / temperature)?;
        let points = args.points.or(config.cluster.points).unwrap_or(4);
        if !(2..=selection.max_points()).contains(&points) {
            bail!(
                "The {} cluster takes 2 to {} points, got {}",
                selection,
                selection.max_points(),
                points
            );
        }

        let potential = Potential::from_config(&config.potential);
        match (&selection, &potential) {
            (ClusterSelection::Scalar(ClusterKind::HardCore { .. }), Potential::HardSphere(_)) => {}
            (ClusterSelection::Scalar(ClusterKind::HardCore { .. }), other) => {
                bail!("The hard-core cluster needs hard spheres, got a {} potential", other.name())
            }
            (ClusterSelection::Channels, Potential::SquareWell(_)) => {}
            (ClusterSelection::Channels, other) => {
                bail!("Channel bonds need a square-well potential, got a {} potential", other.name())
            }
            _ => {}
        }

        let chains = args.chains.or(sampling.chains).unwrap_or(DEFAULT_CHAINS);
        if chains == 0 {
            bail!("At least one chain is required");
        }

        Ok(RunPlan {
            points,
            selection,
            potential,
            temperature,
            samples: args.samples.or(sampling.samples).unwrap_or(DEFAULT_SAMPLES),
            equilibration: sampling.equilibration.unwrap_or(DEFAULT_EQUILIBRATION),
            chains,
            seed: args.seed.or(sampling.seed).unwrap_or(DEFAULT_SEED),
            max_displacement: sampling.max_displacement.unwrap_or(DEFAULT_MAX_DISPLACEMENT),
            screening: config.cluster.screening.unwrap_or(true),
            caching: config.cluster.caching.unwrap_or(true),
            verify: args.verify,
        })
    }

    pub fn beta(&self) -> f64 {
        1.0 / self.temperature
    }

    /// Seed of the `index`-th chain
    pub fn chain_seed(&self, index: usize) -> u64 {
        self.seed.wrapping_add(index as u64)
    }
}

/// Builds one chain per requested seed and runs them in parallel
pub fn run_chains(plan: &RunPlan) -> Result<Vec<ChainResults>> {
    info!(
        "\nStarting {} chains of {} points ({} cluster, {} potential)...\n",
        plan.chains,
        plan.points,
        plan.selection,
        plan.potential.name()
    );

    match &plan.selection {
        ClusterSelection::Scalar(kind) => {
            let model = MayerBonds {
                potential: plan.potential,
                beta: plan.beta(),
            };
            // chains share one signature table
            let table = match kind {
                ClusterKind::HardCore { tabulated } => Some(Arc::new(SignatureTable::new(*tabulated))),
                _ => None,
            };
            let weight: fn(&ClusterValue) -> f64 = ClusterValue::primary;
            let chains = (0..plan.chains)
                .map(|idx| {
                    let cluster = match &table {
                        Some(table) => ScalarCluster::hard_core(plan.points, Arc::clone(table)),
                        None => ScalarCluster::new(plan.points, kind),
                    }
                    .with_screening(plan.screening);
                    build_chain(plan, idx, model, cluster, weight)
                })
                .collect::<Result<Vec<_>>>()?;
            parallel_chains(chains, plan.equilibration, plan.samples, plan.verify)
        }
        ClusterSelection::Channels => {
            let well = match plan.potential {
                Potential::SquareWell(well) => well,
                other => bail!("Channel bonds need a square-well potential, got a {} potential", other.name()),
            };
            let channels = Channels::for_points(plan.points);
            let model = ChannelBonds {
                well,
                beta: plan.beta(),
                len: channels.len(),
            };
            let y = model.well_variable();
            info!("Well variable Y = exp(beta * epsilon) - 1 = {:.6}", y);
            let weight = move |value: &Vec<f64>| Channels::evaluate(value, y);
            let chains = (0..plan.chains)
                .map(|idx| {
                    let cluster = ChannelCluster::new(plan.points, channels).with_screening(plan.screening);
                    build_chain(plan, idx, model, cluster, weight)
                })
                .collect::<Result<Vec<_>>>()?;
            parallel_chains(chains, plan.equilibration, plan.samples, plan.verify)
        }
    }
}

fn build_chain<E, M, F>(plan: &RunPlan, idx: usize, model: M, cluster: E, weight: F) -> Result<ClusterChain<E, M, F>>
where
    E: ClusterSum,
    M: BondModel<Bond = E::Bond>,
    F: Fn(&E::Output) -> f64,
{
    let mut cached = CachedCluster::new(cluster);
    cached.set_caching(plan.caching);
    ClusterChain::new(
        plan.points,
        model,
        cached,
        weight,
        plan.chain_seed(idx),
        plan.max_displacement,
    )
}
