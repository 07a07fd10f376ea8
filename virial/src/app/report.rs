use crate::app::RunPlan;
use crate::sampler::ChainResults;
use cluster::{CacheStats, ScreeningStats};
use tracing::{info, warn};

/// Deviation from explicit enumeration above which a chain is flagged
const VERIFICATION_TOLERANCE: f64 = 1e-8;

pub fn report_plan(plan: &RunPlan) {
    info!("\nSampling plan:");
    info!("  Cluster:          {} with {} points", plan.selection, plan.points);
    info!("  Potential:        {}", plan.potential.name());
    info!("  Temperature:      {:.4} (beta = {:.4})", plan.temperature, plan.beta());
    info!(
        "  Chains:           {} x ({} equilibration + {} production steps)",
        plan.chains, plan.equilibration, plan.samples
    );
    info!("  Max displacement: {:.3} sigma", plan.max_displacement);
    info!(
        "  Screening:        {}",
        if plan.screening { "enabled" } else { "disabled" }
    );
    info!("  Caching:          {}", if plan.caching { "enabled" } else { "disabled" });
}

pub fn report_chain(idx: usize, result: &ChainResults) {
    info!(
        "  Chain {:>3} (seed {}): <sign> = {:+.6}, acceptance = {:.3}, final value = {:+.6e}",
        idx + 1,
        result.seed,
        result.average_sign,
        result.acceptance,
        result.final_value
    );
    if let Some(check) = result.verification {
        if check.deviation() > VERIFICATION_TOLERANCE * check.reference.abs().max(1.0) {
            warn!(
                "  Chain {:>3}: cluster value {:+.12e} differs from enumeration {:+.12e}",
                idx + 1,
                check.value,
                check.reference
            );
        } else {
            info!("  Chain {:>3}: matches enumeration ({:+.12e})", idx + 1, check.reference);
        }
    }
}

pub fn report_summary(plan: &RunPlan, results: &[ChainResults]) {
    info!("\nSampling finished.");
    if results.is_empty() {
        return;
    }

    let (mean, error) = mean_and_error(results.iter().map(|r| r.average_sign));
    info!("\nAverage sign over {} chains: {:+.6} +/- {:.6}", results.len(), mean, error);

    let mut screening = ScreeningStats::default();
    let mut cache = CacheStats::default();
    for result in results {
        screening.merge(&result.screening);
        cache.merge(&result.cache);
    }
    info!(
        "Screening: {} of {} evaluated configurations screened ({:.2}%), {} nonzero",
        screening.screened,
        screening.total,
        100.0 * screening.screened_fraction(),
        screening.nonzero
    );
    if plan.caching {
        info!(
            "Cache: {} requests, {} hits, {} rollbacks, {} recomputed",
            cache.requests(),
            cache.hits,
            cache.rollbacks,
            cache.recomputes
        );
    }
}

/// Mean of per-chain averages and its standard error
fn mean_and_error(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let values: Vec<f64> = values.collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, (variance / n).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_error() {
        let (mean, error) = mean_and_error([1.0, 0.5, 0.0].into_iter());
        assert_relative_eq!(mean, 0.5);
        assert_relative_eq!(error, (0.25f64 / 3.0).sqrt());

        let (mean, error) = mean_and_error(std::iter::once(-0.2));
        assert_relative_eq!(mean, -0.2);
        assert_eq!(error, 0.0);
    }
}
