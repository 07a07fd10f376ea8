//! Memoisation of cluster values by configuration identity.
//!
//! A Monte Carlo chain asks for the value of the same configuration several
//! times per step: once when a trial move is proposed, and again when the move
//! is rejected and the chain falls back to the configuration it came from.
//! [`CachedCluster`] remembers the last two results so neither case recomputes.

use std::fmt;

use color_eyre::eyre::Result;

use crate::arithmetic::Arithmetic;
use crate::bonds::{Configuration, ConfigurationId, PairBond};
use crate::hard_core::HardCoreCluster;
use crate::screen::Screen;
use crate::wheatley::WheatleyCluster;

/// Anything that evaluates a cluster value for a configuration.
pub trait ClusterSum {
    type Bond: PairBond;
    type Output: Clone + fmt::Debug;

    fn point_count(&self) -> usize;

    fn compute<C: Configuration<Bond = Self::Bond>>(&mut self, config: &C) -> Result<Self::Output>;

    fn screen(&self) -> &Screen;
}

impl<A: Arithmetic> ClusterSum for WheatleyCluster<A> {
    type Bond = A::Bond;
    type Output = A::Value;

    fn point_count(&self) -> usize {
        WheatleyCluster::point_count(self)
    }

    fn compute<C: Configuration<Bond = A::Bond>>(&mut self, config: &C) -> Result<A::Value> {
        WheatleyCluster::compute(self, config)
    }

    fn screen(&self) -> &Screen {
        WheatleyCluster::screen(self)
    }
}

impl ClusterSum for HardCoreCluster {
    type Bond = f64;
    type Output = f64;

    fn point_count(&self) -> usize {
        HardCoreCluster::point_count(self)
    }

    fn compute<C: Configuration<Bond = f64>>(&mut self, config: &C) -> Result<f64> {
        HardCoreCluster::compute(self, config)
    }

    fn screen(&self) -> &Screen {
        HardCoreCluster::screen(self)
    }
}

/// Cache traffic of a [`CachedCluster`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests for the most recent configuration.
    pub hits: u64,
    /// Requests that returned to the configuration before it.
    pub rollbacks: u64,
    /// Requests that ran the underlying cluster.
    pub recomputes: u64,
}

impl CacheStats {
    pub fn requests(&self) -> u64 {
        self.hits + self.rollbacks + self.recomputes
    }

    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.rollbacks += other.rollbacks;
        self.recomputes += other.recomputes;
    }
}

/// Wraps a cluster and reuses its last two results.
#[derive(Debug, Clone)]
pub struct CachedCluster<E: ClusterSum> {
    cluster: E,
    caching: bool,
    last: Option<(ConfigurationId, E::Output)>,
    previous: Option<(ConfigurationId, E::Output)>,
    stats: CacheStats,
}

impl<E: ClusterSum> CachedCluster<E> {
    pub fn new(cluster: E) -> Self {
        CachedCluster {
            cluster,
            caching: true,
            last: None,
            previous: None,
            stats: CacheStats::default(),
        }
    }

    /// Value for `config`, recomputed only for a configuration not seen in the last two requests.
    ///
    /// Asking for the configuration before the last one makes it the last again,
    /// as happens when a trial move is rejected. Errors are passed through and
    /// leave the remembered values untouched.
    pub fn value<C: Configuration<Bond = E::Bond>>(&mut self, config: &C) -> Result<E::Output> {
        if !self.caching {
            self.stats.recomputes += 1;
            return self.cluster.compute(config);
        }
        let id = config.id();
        if let Some((last_id, value)) = &self.last {
            if *last_id == id {
                self.stats.hits += 1;
                return Ok(value.clone());
            }
        }
        if let Some((previous_id, value)) = &self.previous {
            if *previous_id == id {
                let value = value.clone();
                self.last = self.previous.clone();
                self.stats.rollbacks += 1;
                return Ok(value);
            }
        }
        let value = self.cluster.compute(config)?;
        self.previous = self.last.replace((id, value.clone()));
        self.stats.recomputes += 1;
        Ok(value)
    }

    /// Turns memoisation on or off; switching forgets remembered values.
    pub fn set_caching(&mut self, caching: bool) {
        self.caching = caching;
        self.last = None;
        self.previous = None;
    }

    pub fn is_caching(&self) -> bool {
        self.caching
    }

    pub fn last_id(&self) -> Option<ConfigurationId> {
        self.last.as_ref().map(|(id, _)| *id)
    }

    pub fn previous_id(&self) -> Option<ConfigurationId> {
        self.previous.as_ref().map(|(id, _)| *id)
    }

    pub fn last_value(&self) -> Option<&E::Output> {
        self.last.as_ref().map(|(_, value)| value)
    }

    pub fn previous_value(&self) -> Option<&E::Output> {
        self.previous.as_ref().map(|(_, value)| value)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn cluster(&self) -> &E {
        &self.cluster
    }

    pub fn cluster_mut(&mut self) -> &mut E {
        &mut self.cluster
    }

    pub fn into_inner(self) -> E {
        self.cluster
    }
}
