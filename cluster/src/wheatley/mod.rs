//! Biconnected cluster sums by subset recursion.
//!
//! For `n` points with pair Mayer functions `f_ij`, the cluster value is
//! `(1 - n)` times the sum, over all biconnected graphs on the points, of the
//! product of `f` over the graph's edges. Enumerating graphs is exponential in
//! the number of pairs; the recursion here is exponential only in `n`:
//!
//! 1. `Q[S]`, the product of `q = f + 1` over pairs inside `S`, the sum over
//!    all graphs on `S`.
//! 2. `C[S]`, the connected part of `Q[S]`, by removing every split of `S`
//!    into a connected piece holding the lowest point and the rest.
//! 3. `B[S]`, the biconnected part of `C[S]`, by removing graphs with an
//!    articulation point at each pivot `v` in turn.

use color_eyre::eyre::{bail, Result};
use tracing::warn;

use crate::arithmetic::Arithmetic;
use crate::bonds::{Configuration, PairBond};
use crate::screen::Screen;
use crate::subset::{bits, full_mask, lowest_bit, pair_mask, point_count, Mask, Partitions, MAX_POINTS};

#[cfg(test)]
mod tests;

/// Subset-indexed tables reused across evaluations.
#[derive(Debug, Clone)]
pub struct Workspace<V> {
    n: usize,
    /// all graphs on `S`
    pub q: Vec<V>,
    /// connected graphs on `S`
    pub c: Vec<V>,
    /// graphs removed at the current pivot
    pub a: Vec<V>,
    /// graphs with no articulation point among the pivots handled so far
    pub b: Vec<V>,
    /// `B` before the current pivot was handled
    pub ab: Vec<V>,
}

impl<V: Clone> Workspace<V> {
    pub fn new(n: usize, zero: V) -> Self {
        let size = 1usize << n;
        Workspace {
            n,
            q: vec![zero.clone(); size],
            c: vec![zero.clone(); size],
            a: vec![zero.clone(); size],
            b: vec![zero.clone(); size],
            ab: vec![zero; size],
        }
    }

    pub fn point_count(&self) -> usize {
        self.n
    }
}

/// Extends pair and singleton entries of `Q` to every larger subset.
///
/// `Q[S] = Q[S \ {j}] * prod q(j, l)` over the other points `l`, with `j` the
/// lowest point of `S`. Once a factor vanishes the product stays zero.
pub fn fill_products<A: Arithmetic>(arith: &A, q: &mut [A::Value], n: usize) {
    let size = 1usize << n;
    for i in 1..size {
        if point_count(i as Mask) < 3 {
            continue;
        }
        let low = lowest_bit(i as Mask);
        let rest = i as Mask ^ low;
        let (head, tail) = q.split_at_mut(i);
        let qi = &mut tail[0];
        qi.clone_from(&head[rest as usize]);
        if arith.is_zero(qi) {
            continue;
        }
        for l in bits(rest) {
            arith.mul_assign(qi, &head[(low | 1 << l) as usize]);
            if arith.is_zero(qi) {
                break;
            }
        }
    }
}

/// Runs the connected and biconnected passes over a filled `Q` table.
///
/// Returns `(1 - n) * B[full]`.
pub fn biconnected_sum<A: Arithmetic>(arith: &A, workspace: &mut Workspace<A::Value>) -> A::Value {
    let n = workspace.n;
    let size = 1usize << n;
    let Workspace { q, c, a, b, ab, .. } = workspace;

    for i in 1..size {
        let (done, rest) = c.split_at_mut(i);
        let ci = &mut rest[0];
        ci.clone_from(&q[i]);
        for j in Partitions::connected(i as Mask) {
            let comp = i & !(j as usize);
            arith.sub_product(ci, &done[j as usize], &q[comp]);
        }
    }

    for i in 1..size {
        b[i].clone_from(&c[i]);
        ab[i].clone_from(&c[i]);
        a[i] = arith.zero();
    }

    for v in 0..n {
        let pivot = 1usize << v;
        for i in 1..size {
            if i & pivot == 0 || point_count(i as Mask) < 3 {
                continue;
            }
            ab[i].clone_from(&b[i]);
            let mut removed = arith.zero();
            for j in Partitions::articulation(i as Mask, v) {
                let bj = &b[j as usize];
                if arith.is_zero(bj) {
                    continue;
                }
                let joined = (i & !(j as usize)) | pivot;
                arith.add_product(&mut removed, bj, &ab[joined]);
            }
            arith.sub_assign(&mut b[i], &removed);
            a[i] = removed;
        }
    }

    arith.scale(&b[size - 1], 1.0 - n as f64)
}

/// Boltzmann factors of non-pairwise energies, applied on top of the pair products.
pub trait Multibody {
    /// Factor `exp(-β u)` of the non-additive energy of the points in `subset`,
    /// or `None` when that subset carries no correction.
    fn factor(&self, subset: Mask) -> Option<f64>;
}

/// Cluster value with and without a non-additive correction.
#[derive(Debug, Clone, PartialEq)]
pub struct MultibodyValue<V> {
    pub total: V,
    pub pairwise: V,
    /// `total - pairwise`
    pub nonadditive: V,
}

/// Biconnected cluster sum for a fixed number of points.
///
/// Bonds enter as `q = 1 + f` and the Mayer functions are recovered by
/// subtraction, so in [`Plain`](crate::Plain) arithmetic a bond with
/// `|f| ≪ 1` keeps only an absolute accuracy of about `1e-16`; even the two
/// point value `-f` is rounded. [`Precise`](crate::Precise) arithmetic keeps
/// those differences.
///
/// # Examples
/// ```
/// use cluster::{ConfigurationId, PairTable, Plain, WheatleyCluster};
///
/// let mut cluster = WheatleyCluster::new(3, Plain);
/// let config = PairTable::from_fn(3, ConfigurationId(1), |_, _| 0.5);
/// let value = cluster.compute(&config).unwrap();
/// assert!((value + 0.25).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct WheatleyCluster<A: Arithmetic> {
    n: usize,
    arith: A,
    workspace: Workspace<A::Value>,
    screen: Screen,
    screening: bool,
}

impl<A: Arithmetic> WheatleyCluster<A> {
    pub fn new(n: usize, arith: A) -> Self {
        assert!(
            (2..=MAX_POINTS).contains(&n),
            "cluster size must be between 2 and {}, got {}",
            MAX_POINTS,
            n
        );
        let workspace = Workspace::new(n, arith.zero());
        WheatleyCluster {
            n,
            arith,
            workspace,
            screen: Screen::new(n),
            screening: true,
        }
    }

    pub fn with_screening(mut self, screening: bool) -> Self {
        self.screening = screening;
        self
    }

    pub fn point_count(&self) -> usize {
        self.n
    }

    pub fn arithmetic(&self) -> &A {
        &self.arith
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn workspace(&self) -> &Workspace<A::Value> {
        &self.workspace
    }

    /// Reads every pair bond into `Q` and the screen.
    pub fn load<C: Configuration<Bond = A::Bond>>(&mut self, config: &C) {
        assert_eq!(
            config.point_count(),
            self.n,
            "configuration has {} points, cluster expects {}",
            config.point_count(),
            self.n
        );
        self.screen.reset();
        let one = self.arith.one();
        for i in 0..self.n {
            self.workspace.q[1 << i].clone_from(&one);
        }
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                let bond = config.bond(i, j);
                self.screen.add_pair(i, j, bond.is_overlap(), bond.is_interacting());
                self.workspace.q[pair_mask(i, j) as usize] = self.arith.boltzmann(&bond);
            }
        }
    }

    /// Whether the configuration is known to give zero without evaluating it.
    pub fn is_screened<C: Configuration<Bond = A::Bond>>(&mut self, config: &C) -> bool {
        self.load(config);
        self.screen.check()
    }

    /// Cluster value of the configuration.
    ///
    /// A non-finite result is recomputed once; if the second attempt is finite it
    /// is returned with a warning, otherwise an error is returned.
    pub fn compute<C: Configuration<Bond = A::Bond>>(&mut self, config: &C) -> Result<A::Value> {
        self.checked(config, |cluster, config| cluster.evaluate(config, true))
    }

    /// Cluster value with screening skipped.
    pub fn compute_unscreened<C: Configuration<Bond = A::Bond>>(&mut self, config: &C) -> Result<A::Value> {
        self.checked(config, |cluster, config| cluster.evaluate(config, false))
    }

    /// Cluster value with a non-additive Boltzmann factor on subsets of three or more points.
    ///
    /// The overlap graph no longer decides whether a subset can contribute once
    /// the non-additive factor is applied, so the total is never screened.
    pub fn compute_multibody<C, M>(&mut self, config: &C, multibody: &M) -> Result<MultibodyValue<A::Value>>
    where
        C: Configuration<Bond = A::Bond>,
        M: Multibody,
    {
        let pairwise = self.compute(config)?;
        let total = self.checked(config, |cluster, config| cluster.evaluate_multibody(config, multibody))?;
        let mut nonadditive = total.clone();
        self.arith.sub_assign(&mut nonadditive, &pairwise);
        Ok(MultibodyValue {
            total,
            pairwise,
            nonadditive,
        })
    }

    fn checked<C, F>(&mut self, config: &C, evaluate: F) -> Result<A::Value>
    where
        C: Configuration<Bond = A::Bond>,
        F: Fn(&mut Self, &C) -> A::Value,
    {
        let value = evaluate(self, config);
        if self.arith.is_finite(&value) {
            return Ok(value);
        }
        let retry = evaluate(self, config);
        if !self.arith.is_finite(&retry) {
            bail!(
                "cluster value for configuration {:?} is not finite after recomputing: {:?}",
                config.id(),
                retry
            );
        }
        warn!(
            "cluster value for configuration {:?} was {:?}, recomputed as {:?}",
            config.id(),
            value,
            retry
        );
        Ok(retry)
    }

    fn evaluate<C: Configuration<Bond = A::Bond>>(&mut self, config: &C, screening: bool) -> A::Value {
        self.load(config);
        if screening && self.screening && self.screen.check() {
            return self.arith.zero();
        }
        fill_products(&self.arith, &mut self.workspace.q, self.n);
        let value = biconnected_sum(&self.arith, &mut self.workspace);
        if !self.arith.is_zero(&value) {
            self.screen.record_nonzero();
        }
        value
    }

    fn evaluate_multibody<C, M>(&mut self, config: &C, multibody: &M) -> A::Value
    where
        C: Configuration<Bond = A::Bond>,
        M: Multibody,
    {
        self.load(config);
        fill_products(&self.arith, &mut self.workspace.q, self.n);
        let full = full_mask(self.n);
        for subset in 1..=full {
            if point_count(subset) < 3 {
                continue;
            }
            if let Some(factor) = multibody.factor(subset) {
                let factor = self.arith.boltzmann_factor(factor);
                self.arith.mul_assign(&mut self.workspace.q[subset as usize], &factor);
            }
        }
        biconnected_sum(&self.arith, &mut self.workspace)
    }
}
