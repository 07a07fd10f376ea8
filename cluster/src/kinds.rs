//! Choice of cluster variant at run time.

use std::fmt;
use std::sync::Arc;

use color_eyre::eyre::Result;
use tracing::trace;

use crate::arithmetic::{BetaDerivatives, Channels, Plain, Precise, PreciseDerivatives};
use crate::bonds::Configuration;
use crate::cache::ClusterSum;
use crate::hard_core::{HardCoreCluster, SignatureTable};
use crate::screen::Screen;
use crate::wheatley::WheatleyCluster;

/// Cluster in channel-polynomial arithmetic over [`ChannelBond`](crate::ChannelBond)s.
pub type ChannelCluster = WheatleyCluster<Channels>;

/// Variants of the cluster sum over scalar Mayer bonds.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterKind {
    /// Double precision.
    Plain,
    /// Extended precision with at least `digits` decimal digits.
    Precise { digits: usize },
    /// Double precision, redone in extended precision when the biconnected
    /// sum is smaller in magnitude than `tolerance`.
    Adaptive { tolerance: f64, digits: usize },
    /// Value and its first `order` derivatives with respect to inverse temperature.
    Derivatives { order: usize, beta: f64 },
    /// Derivatives in double precision, redone in extended precision when the
    /// biconnected sum is smaller in magnitude than `tolerance`.
    AdaptiveDerivatives {
        order: usize,
        beta: f64,
        tolerance: f64,
        digits: usize,
    },
    /// Exact integer sum for hard cores, looking up subsets of up to `tabulated` points.
    HardCore { tabulated: usize },
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterKind::Plain => write!(f, "plain"),
            ClusterKind::Precise { digits } => write!(f, "precise ({} digits)", digits),
            ClusterKind::Adaptive { tolerance, digits } => {
                write!(f, "adaptive (tolerance {:e}, {} digits)", tolerance, digits)
            }
            ClusterKind::Derivatives { order, beta } => write!(f, "derivatives (order {}, beta {})", order, beta),
            ClusterKind::AdaptiveDerivatives {
                order,
                beta,
                tolerance,
                digits,
            } => write!(
                f,
                "adaptive derivatives (order {}, beta {}, tolerance {:e}, {} digits)",
                order, beta, tolerance, digits
            ),
            ClusterKind::HardCore { tabulated } => write!(f, "hard core ({} tabulated points)", tabulated),
        }
    }
}

/// Cluster value as returned by a [`ScalarCluster`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterValue {
    Scalar(f64),
    /// Value followed by its temperature derivatives.
    Vector(Vec<f64>),
}

impl ClusterValue {
    /// The cluster value itself, without derivatives.
    pub fn primary(&self) -> f64 {
        match self {
            ClusterValue::Scalar(value) => *value,
            ClusterValue::Vector(values) => values.first().copied().unwrap_or(0.0),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            ClusterValue::Scalar(value) => std::slice::from_ref(value),
            ClusterValue::Vector(values) => values,
        }
    }
}

/// A cluster of the variant chosen by a [`ClusterKind`].
#[derive(Debug, Clone)]
pub enum ScalarCluster {
    Plain(WheatleyCluster<Plain>),
    Precise(WheatleyCluster<Precise>),
    Adaptive {
        plain: WheatleyCluster<Plain>,
        precise: WheatleyCluster<Precise>,
        tolerance: f64,
        precise_count: u64,
    },
    Derivatives(WheatleyCluster<BetaDerivatives>),
    AdaptiveDerivatives {
        plain: WheatleyCluster<BetaDerivatives>,
        precise: WheatleyCluster<PreciseDerivatives>,
        tolerance: f64,
        precise_count: u64,
    },
    HardCore(HardCoreCluster),
}

impl ScalarCluster {
    pub fn new(n: usize, kind: &ClusterKind) -> Self {
        match kind {
            ClusterKind::Plain => ScalarCluster::Plain(WheatleyCluster::new(n, Plain)),
            ClusterKind::Precise { digits } => ScalarCluster::Precise(WheatleyCluster::new(n, Precise::with_digits(*digits))),
            ClusterKind::Adaptive { tolerance, digits } => ScalarCluster::Adaptive {
                plain: WheatleyCluster::new(n, Plain),
                // the plain pass already screened the configuration
                precise: WheatleyCluster::new(n, Precise::with_digits(*digits)).with_screening(false),
                tolerance: *tolerance,
                precise_count: 0,
            },
            ClusterKind::Derivatives { order, beta } => {
                ScalarCluster::Derivatives(WheatleyCluster::new(n, BetaDerivatives::new(*order, *beta)))
            }
            ClusterKind::AdaptiveDerivatives {
                order,
                beta,
                tolerance,
                digits,
            } => ScalarCluster::AdaptiveDerivatives {
                plain: WheatleyCluster::new(n, BetaDerivatives::new(*order, *beta)),
                precise: WheatleyCluster::new(n, PreciseDerivatives::with_digits(*order, *beta, *digits))
                    .with_screening(false),
                tolerance: *tolerance,
                precise_count: 0,
            },
            ClusterKind::HardCore { tabulated } => Self::hard_core(n, Arc::new(SignatureTable::new(*tabulated))),
        }
    }

    /// Hard-core cluster sharing an existing signature table.
    pub fn hard_core(n: usize, table: Arc<SignatureTable>) -> Self {
        ScalarCluster::HardCore(HardCoreCluster::new(n, table))
    }

    /// Turns screening on or off. The hard-core variant always screens.
    pub fn with_screening(self, screening: bool) -> Self {
        match self {
            ScalarCluster::Plain(cluster) => ScalarCluster::Plain(cluster.with_screening(screening)),
            ScalarCluster::Precise(cluster) => ScalarCluster::Precise(cluster.with_screening(screening)),
            ScalarCluster::Adaptive {
                plain,
                precise,
                tolerance,
                precise_count,
            } => ScalarCluster::Adaptive {
                plain: plain.with_screening(screening),
                precise,
                tolerance,
                precise_count,
            },
            ScalarCluster::Derivatives(cluster) => ScalarCluster::Derivatives(cluster.with_screening(screening)),
            ScalarCluster::AdaptiveDerivatives {
                plain,
                precise,
                tolerance,
                precise_count,
            } => ScalarCluster::AdaptiveDerivatives {
                plain: plain.with_screening(screening),
                precise,
                tolerance,
                precise_count,
            },
            ScalarCluster::HardCore(cluster) => ScalarCluster::HardCore(cluster),
        }
    }

    pub fn point_count(&self) -> usize {
        match self {
            ScalarCluster::Plain(cluster) => cluster.point_count(),
            ScalarCluster::Precise(cluster) => cluster.point_count(),
            ScalarCluster::Adaptive { plain, .. } => plain.point_count(),
            ScalarCluster::Derivatives(cluster) => cluster.point_count(),
            ScalarCluster::AdaptiveDerivatives { plain, .. } => plain.point_count(),
            ScalarCluster::HardCore(cluster) => cluster.point_count(),
        }
    }

    /// Number of configurations an adaptive variant had to redo in extended precision.
    pub fn precise_count(&self) -> u64 {
        match self {
            ScalarCluster::Adaptive { precise_count, .. } => *precise_count,
            ScalarCluster::AdaptiveDerivatives { precise_count, .. } => *precise_count,
            _ => 0,
        }
    }

    pub fn is_screened<C: Configuration<Bond = f64>>(&mut self, config: &C) -> Result<bool> {
        Ok(match self {
            ScalarCluster::Plain(cluster) => cluster.is_screened(config),
            ScalarCluster::Precise(cluster) => cluster.is_screened(config),
            ScalarCluster::Adaptive { plain, .. } => plain.is_screened(config),
            ScalarCluster::Derivatives(cluster) => cluster.is_screened(config),
            ScalarCluster::AdaptiveDerivatives { plain, .. } => plain.is_screened(config),
            ScalarCluster::HardCore(cluster) => cluster.is_screened(config)?,
        })
    }

    pub fn compute<C: Configuration<Bond = f64>>(&mut self, config: &C) -> Result<ClusterValue> {
        let value = match self {
            ScalarCluster::Plain(cluster) => ClusterValue::Scalar(cluster.compute(config)?),
            ScalarCluster::Precise(cluster) => {
                let value = cluster.compute(config)?;
                ClusterValue::Scalar(cluster.arithmetic().to_f64(&value))
            }
            ScalarCluster::Adaptive {
                plain,
                precise,
                tolerance,
                precise_count,
            } => {
                let value = plain.compute(config)?;
                let biconnected = value / (1.0 - plain.point_count() as f64);
                if value != 0.0 && biconnected.abs() < *tolerance {
                    trace!(
                        "biconnected sum {:e} below {:e} for {:?}, recomputing in extended precision",
                        biconnected,
                        tolerance,
                        config.id()
                    );
                    *precise_count += 1;
                    let value = precise.compute(config)?;
                    ClusterValue::Scalar(precise.arithmetic().to_f64(&value))
                } else {
                    ClusterValue::Scalar(value)
                }
            }
            ScalarCluster::Derivatives(cluster) => ClusterValue::Vector(cluster.compute(config)?),
            ScalarCluster::AdaptiveDerivatives {
                plain,
                precise,
                tolerance,
                precise_count,
            } => {
                let values = plain.compute(config)?;
                let value = values.first().copied().unwrap_or(0.0);
                let biconnected = value / (1.0 - plain.point_count() as f64);
                if value != 0.0 && biconnected.abs() < *tolerance {
                    trace!(
                        "biconnected sum {:e} below {:e} for {:?}, recomputing derivatives in extended precision",
                        biconnected,
                        tolerance,
                        config.id()
                    );
                    *precise_count += 1;
                    let values = precise.compute(config)?;
                    ClusterValue::Vector(precise.arithmetic().to_f64(&values))
                } else {
                    ClusterValue::Vector(values)
                }
            }
            ScalarCluster::HardCore(cluster) => ClusterValue::Scalar(cluster.compute(config)?),
        };
        Ok(value)
    }

    pub fn screen(&self) -> &Screen {
        match self {
            ScalarCluster::Plain(cluster) => cluster.screen(),
            ScalarCluster::Precise(cluster) => cluster.screen(),
            ScalarCluster::Adaptive { plain, .. } => plain.screen(),
            ScalarCluster::Derivatives(cluster) => cluster.screen(),
            ScalarCluster::AdaptiveDerivatives { plain, .. } => plain.screen(),
            ScalarCluster::HardCore(cluster) => cluster.screen(),
        }
    }
}

impl ClusterSum for ScalarCluster {
    type Bond = f64;
    type Output = ClusterValue;

    fn point_count(&self) -> usize {
        ScalarCluster::point_count(self)
    }

    fn compute<C: Configuration<Bond = f64>>(&mut self, config: &C) -> Result<ClusterValue> {
        ScalarCluster::compute(self, config)
    }

    fn screen(&self) -> &Screen {
        ScalarCluster::screen(self)
    }
}
