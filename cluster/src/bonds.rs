//! Pair bonds and the configurations that supply them.
//!
//! The engine never sees coordinates. A [`Configuration`] hands out one bond per
//! unordered pair of points, plus an identity used by the memo wrapper to tell
//! configurations apart.

use crate::subset::{pair_count, pair_index};

/// Identity of a configuration, unique among the configurations a caller produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigurationId(pub u64);

/// Classification of a pair bond used by the zero-value screen.
pub trait PairBond {
    /// The Boltzmann factor of the pair is exactly zero (`f = -1`).
    fn is_overlap(&self) -> bool;

    /// The pair interacts at all (`f != 0`).
    fn is_interacting(&self) -> bool;
}

/// Mayer function value `f` of a pair.
impl PairBond for f64 {
    fn is_overlap(&self) -> bool {
        *self == -1.0
    }

    fn is_interacting(&self) -> bool {
        *self != 0.0
    }
}

/// Boltzmann factor of a pair expanded in powers of a channel variable `Y`.
///
/// Entry `k` is the coefficient of `Y^k`. A square-well pair inside the core
/// is all zeros, inside the well is `1 + Y`, and outside the well is `1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBond(pub Vec<f64>);

impl ChannelBond {
    pub fn new(coefficients: Vec<f64>) -> Self {
        ChannelBond(coefficients)
    }

    /// Pair beyond every interaction range.
    pub fn ideal(len: usize) -> Self {
        let mut coefficients = vec![0.0; len];
        if let Some(first) = coefficients.first_mut() {
            *first = 1.0;
        }
        ChannelBond(coefficients)
    }

    /// Pair inside a hard core.
    pub fn overlap(len: usize) -> Self {
        ChannelBond(vec![0.0; len])
    }

    /// Pair inside an attractive well: factor `1 + Y`.
    pub fn well(len: usize) -> Self {
        let mut bond = Self::ideal(len);
        if len > 1 {
            bond.0[1] = 1.0;
        }
        bond
    }

    pub fn channels(&self) -> &[f64] {
        &self.0
    }
}

impl PairBond for ChannelBond {
    fn is_overlap(&self) -> bool {
        self.0.iter().all(|&c| c == 0.0)
    }

    fn is_interacting(&self) -> bool {
        self.0
            .iter()
            .enumerate()
            .any(|(k, &c)| if k == 0 { c != 1.0 } else { c != 0.0 })
    }
}

/// Source of pair bonds for one cluster of points.
pub trait Configuration {
    type Bond: PairBond;

    fn point_count(&self) -> usize;

    fn id(&self) -> ConfigurationId;

    /// Bond of the unordered pair `(i, j)`, `i != j`.
    fn bond(&self, i: usize, j: usize) -> Self::Bond;
}

/// Configuration given directly as a table of pair bonds.
#[derive(Debug, Clone, PartialEq)]
pub struct PairTable<B> {
    n: usize,
    id: ConfigurationId,
    values: Vec<B>,
}

impl<B: Clone> PairTable<B> {
    /// Table for `n` points with every pair set to `fill`.
    pub fn new(n: usize, fill: B) -> Self {
        PairTable {
            n,
            id: ConfigurationId(0),
            values: vec![fill; pair_count(n)],
        }
    }

    /// Table whose pair `(i, j)`, `i < j`, holds `bond(i, j)`.
    pub fn from_fn(n: usize, id: ConfigurationId, mut bond: impl FnMut(usize, usize) -> B) -> Self {
        let mut values = Vec::with_capacity(pair_count(n));
        for i in 0..n {
            for j in (i + 1)..n {
                values.push(bond(i, j));
            }
        }
        PairTable { n, id, values }
    }

    pub fn with_id(mut self, id: ConfigurationId) -> Self {
        self.id = id;
        self
    }

    pub fn set_id(&mut self, id: ConfigurationId) {
        self.id = id;
    }

    pub fn get(&self, i: usize, j: usize) -> &B {
        &self.values[self.index(i, j)]
    }

    pub fn set(&mut self, i: usize, j: usize, bond: B) {
        let k = self.index(i, j);
        self.values[k] = bond;
    }

    /// Relabelled copy: pair `(i, j)` of the result is pair `(perm[i], perm[j])` here.
    pub fn permuted(&self, perm: &[usize]) -> Self {
        assert_eq!(perm.len(), self.n, "permutation length must match point count");
        Self::from_fn(self.n, self.id, |i, j| self.get(perm[i], perm[j]).clone())
    }

    fn index(&self, i: usize, j: usize) -> usize {
        assert!(i != j, "no bond between point {} and itself", i);
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        assert!(b < self.n, "point {} out of range for {} points", b, self.n);
        pair_index(a, b, self.n)
    }
}

impl<B: PairBond + Clone> Configuration for PairTable<B> {
    type Bond = B;

    fn point_count(&self) -> usize {
        self.n
    }

    fn id(&self) -> ConfigurationId {
        self.id
    }

    fn bond(&self, i: usize, j: usize) -> B {
        self.get(i, j).clone()
    }
}
