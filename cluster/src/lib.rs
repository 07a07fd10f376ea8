//! Biconnected Mayer cluster sums.
//!
//! Given the pair Mayer functions `f_ij` of `n` points, computes `(1 - n)`
//! times the sum over all biconnected graphs on the points of the product of
//! `f` over each graph's edges, the per-configuration integrand of the `n`-th
//! virial coefficient. The recursion over point subsets costs `O(3^n)` instead
//! of enumerating the `2^(n(n-1)/2)` graphs.
//!
//! - [`WheatleyCluster`] runs the recursion in any [`Arithmetic`]: [`Plain`]
//!   `f64`, [`Precise`] extended precision, [`Channels`] polynomials, or
//!   temperature derivatives in [`BetaDerivatives`] and [`PreciseDerivatives`].
//! - [`HardCoreCluster`] is the exact integer version for hard cores.
//! - [`Screen`] recognises configurations that must give zero.
//! - [`CachedCluster`] reuses values across Monte Carlo trial moves.

pub mod arithmetic;
pub mod bonds;
pub mod cache;
pub mod hard_core;
pub mod kinds;
pub mod screen;
pub mod subset;
pub mod validation;
pub mod wheatley;

pub use arithmetic::{Arithmetic, BetaDerivatives, Channels, Plain, Precise, PreciseDerivatives};
pub use bonds::{ChannelBond, Configuration, ConfigurationId, PairBond, PairTable};
pub use cache::{CacheStats, CachedCluster, ClusterSum};
pub use hard_core::{HardCoreCluster, SignatureTable};
pub use kinds::{ChannelCluster, ClusterKind, ClusterValue, ScalarCluster};
pub use screen::{Screen, ScreeningStats};
pub use subset::Mask;
pub use wheatley::{Multibody, MultibodyValue, WheatleyCluster};
