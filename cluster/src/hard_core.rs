//! Exact integer cluster sums for hard-core bonds.
//!
//! When every Mayer function is `0` or `-1` all intermediate sums are integers,
//! so the recursion runs in `i64`. Small subsets only depend on which of their
//! pairs overlap, so their connected and articulation terms are precomputed
//! once per overlap pattern ("signature") and looked up instead of recomputed.

use std::sync::Arc;

use color_eyre::eyre::{bail, Result};
use tracing::debug;

use crate::bonds::Configuration;
use crate::screen::Screen;
use crate::subset::{bits, lowest_bit, pair_count, point_count, Mask, Partitions};

/// Largest subset size the signature table can hold.
pub const MAX_TABULATED_POINTS: usize = 6;

/// Largest cluster the integer recursion accepts.
pub const MAX_HARD_CORE_POINTS: usize = 16;

/// Precomputed terms for one overlap pattern of a small subset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureEntry {
    /// Sum over connected graphs on the subset.
    pub connected: i64,
    /// Terms removed at each local pivot, lowest point first.
    pub articulated: Vec<i64>,
    /// Biconnected-so-far sum just before each local pivot.
    pub remaining: Vec<i64>,
}

/// Lookup of [`SignatureEntry`] by subset size and overlap signature.
///
/// Bit `k` of a signature is set when the `k`-th pair of the subset overlaps.
/// Pairs of an `m`-point subset are ordered as the pairs of its upper `m - 1`
/// points (in their own order), followed by the lowest point paired with each
/// other point in increasing order.
#[derive(Debug, Clone)]
pub struct SignatureTable {
    tabulated: usize,
    entries: Vec<Vec<SignatureEntry>>,
}

impl SignatureTable {
    /// Tabulates every overlap pattern of subsets with up to `tabulated` points.
    pub fn new(tabulated: usize) -> Self {
        assert!(
            (2..=MAX_TABULATED_POINTS).contains(&tabulated),
            "signature tables cover 2 to {} points, got {}",
            MAX_TABULATED_POINTS,
            tabulated
        );
        let mut entries = vec![Vec::new(); tabulated + 1];
        for (np, slot) in entries.iter_mut().enumerate().skip(2) {
            *slot = Self::tabulate(np);
        }
        debug!(
            "signature table for up to {} points: {} entries",
            tabulated,
            entries.iter().map(Vec::len).sum::<usize>()
        );
        SignatureTable { tabulated, entries }
    }

    pub fn tabulated(&self) -> usize {
        self.tabulated
    }

    pub fn entry(&self, points: usize, signature: u32) -> &SignatureEntry {
        &self.entries[points][signature as usize]
    }

    /// Pair order that signature bits refer to.
    pub fn pair_order(points: usize) -> Vec<(usize, usize)> {
        if points < 2 {
            return Vec::new();
        }
        let mut order: Vec<(usize, usize)> = Self::pair_order(points - 1)
            .into_iter()
            .map(|(a, b)| (a + 1, b + 1))
            .collect();
        order.extend((1..points).map(|l| (0, l)));
        order
    }

    fn tabulate(np: usize) -> Vec<SignatureEntry> {
        let order = Self::pair_order(np);
        let mut workspace = IntegerWorkspace::new(np);
        let mut trace = Vec::with_capacity(np);
        (0..1u32 << order.len())
            .map(|signature| {
                // a connected overlap graph needs at least np - 1 bonds
                if (signature.count_ones() as usize) + 1 < np {
                    return SignatureEntry {
                        connected: 0,
                        articulated: vec![0; np],
                        remaining: vec![0; np],
                    };
                }
                let mut overlap = vec![0 as Mask; np];
                for (k, &(a, b)) in order.iter().enumerate() {
                    if signature >> k & 1 == 1 {
                        overlap[a] |= 1 << b;
                        overlap[b] |= 1 << a;
                    }
                }
                workspace.fill_products(&overlap);
                trace.clear();
                workspace.run(None, Some(&mut trace));
                SignatureEntry {
                    connected: workspace.c[workspace.c.len() - 1],
                    articulated: trace.iter().map(|&(a, _)| a).collect(),
                    remaining: trace.iter().map(|&(_, ab)| ab).collect(),
                }
            })
            .collect()
    }
}

/// Integer tables of the subset recursion.
#[derive(Debug, Clone)]
struct IntegerWorkspace {
    n: usize,
    q: Vec<i64>,
    c: Vec<i64>,
    a: Vec<i64>,
    b: Vec<i64>,
    ab: Vec<i64>,
    signature: Vec<u32>,
}

impl IntegerWorkspace {
    fn new(n: usize) -> Self {
        let size = 1usize << n;
        IntegerWorkspace {
            n,
            q: vec![0; size],
            c: vec![0; size],
            a: vec![0; size],
            b: vec![0; size],
            ab: vec![0; size],
            signature: vec![0; size],
        }
    }

    /// `Q[S]` is one when no pair inside `S` overlaps, zero otherwise.
    fn fill_products(&mut self, overlap: &[Mask]) {
        for i in 1..self.q.len() {
            let low = lowest_bit(i as Mask);
            let rest = i as Mask ^ low;
            let clear = rest == 0 || (self.q[rest as usize] == 1 && overlap[low.trailing_zeros() as usize] & rest == 0);
            self.q[i] = i64::from(clear);
        }
    }

    fn fill_signatures(&mut self, overlap: &[Mask], tabulated: usize) {
        for i in 1..self.signature.len() {
            let count = point_count(i as Mask);
            if count < 2 || count > tabulated {
                continue;
            }
            let low = lowest_bit(i as Mask);
            let rest = i as Mask ^ low;
            let neighbours = overlap[low.trailing_zeros() as usize];
            let mut signature = self.signature[rest as usize];
            let mut bit = 1u32 << pair_count(count - 1);
            for l in bits(rest) {
                if neighbours >> l & 1 == 1 {
                    signature |= bit;
                }
                bit <<= 1;
            }
            self.signature[i] = signature;
        }
    }

    /// Connected and biconnected passes; returns `B` of the full set.
    ///
    /// Subsets small enough for `table` take their terms from it. With `trace`,
    /// the full set's `(A, AB)` after every pivot is appended.
    fn run(&mut self, table: Option<&SignatureTable>, mut trace: Option<&mut Vec<(i64, i64)>>) -> i64 {
        let n = self.n;
        let size = 1usize << n;
        let full = size - 1;
        let tabulated = table.map_or(0, SignatureTable::tabulated);
        let IntegerWorkspace {
            q,
            c,
            a,
            b,
            ab,
            signature,
            ..
        } = self;

        for i in 1..size {
            let count = point_count(i as Mask);
            if let Some(table) = table.filter(|_| count >= 2 && count <= tabulated) {
                c[i] = table.entry(count, signature[i]).connected;
                continue;
            }
            let mut ci = q[i];
            for j in Partitions::connected(i as Mask) {
                ci -= c[j as usize] * q[i & !(j as usize)];
            }
            c[i] = ci;
        }

        b.copy_from_slice(c);
        ab.copy_from_slice(c);
        a.fill(0);

        for v in 0..n {
            let pivot = 1usize << v;
            for i in 1..size {
                let count = point_count(i as Mask);
                if i & pivot == 0 || count < 3 {
                    continue;
                }
                if let Some(table) = table.filter(|_| count <= tabulated) {
                    let rank = point_count((i & (pivot - 1)) as Mask);
                    let entry = table.entry(count, signature[i]);
                    a[i] = entry.articulated[rank];
                    ab[i] = entry.remaining[rank];
                } else {
                    ab[i] = b[i];
                    let mut removed = 0;
                    for j in Partitions::articulation(i as Mask, v) {
                        let bj = b[j as usize];
                        if bj != 0 {
                            removed += bj * ab[(i & !(j as usize)) | pivot];
                        }
                    }
                    a[i] = removed;
                }
                b[i] -= a[i];
            }
            if let Some(trace) = trace.as_deref_mut() {
                trace.push((a[full], ab[full]));
            }
        }
        b[full]
    }
}

/// Hard-core cluster sum in exact integer arithmetic.
///
/// Bonds must be Mayer functions of exactly `0` or `-1`.
#[derive(Debug, Clone)]
pub struct HardCoreCluster {
    n: usize,
    table: Arc<SignatureTable>,
    overlap: Vec<Mask>,
    workspace: IntegerWorkspace,
    screen: Screen,
}

impl HardCoreCluster {
    pub fn new(n: usize, table: Arc<SignatureTable>) -> Self {
        assert!(
            (2..=MAX_HARD_CORE_POINTS).contains(&n),
            "hard-core clusters take 2 to {} points, got {}",
            MAX_HARD_CORE_POINTS,
            n
        );
        HardCoreCluster {
            n,
            table,
            overlap: vec![0; n],
            workspace: IntegerWorkspace::new(n),
            screen: Screen::new(n),
        }
    }

    pub fn point_count(&self) -> usize {
        self.n
    }

    pub fn table(&self) -> &Arc<SignatureTable> {
        &self.table
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    fn load<C: Configuration<Bond = f64>>(&mut self, config: &C) -> Result<()> {
        if config.point_count() != self.n {
            bail!(
                "configuration has {} points, cluster expects {}",
                config.point_count(),
                self.n
            );
        }
        self.screen.reset();
        self.overlap.fill(0);
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                let f = config.bond(i, j);
                let overlap = if f == -1.0 {
                    true
                } else if f == 0.0 {
                    false
                } else {
                    bail!("hard-core bond between points {} and {} is {}, expected 0 or -1", i, j, f);
                };
                if overlap {
                    self.overlap[i] |= 1 << j;
                    self.overlap[j] |= 1 << i;
                }
                self.screen.add_pair(i, j, overlap, overlap);
            }
        }
        Ok(())
    }

    pub fn is_screened<C: Configuration<Bond = f64>>(&mut self, config: &C) -> Result<bool> {
        self.load(config)?;
        Ok(self.screen.check())
    }

    /// Exact cluster value, `(1 - n)` times the signed count of biconnected overlap graphs.
    pub fn compute<C: Configuration<Bond = f64>>(&mut self, config: &C) -> Result<f64> {
        self.load(config)?;
        if self.screen.check() {
            return Ok(0.0);
        }
        let value = self.evaluate(true);
        if value != 0 {
            self.screen.record_nonzero();
        }
        Ok((1 - self.n as i64) as f64 * value as f64)
    }

    /// Integer `B` of the full set, with or without table lookups.
    fn evaluate(&mut self, use_table: bool) -> i64 {
        self.workspace.fill_products(&self.overlap);
        if use_table {
            let tabulated = self.table.tabulated().min(self.n);
            self.workspace.fill_signatures(&self.overlap, tabulated);
            self.workspace.run(Some(&self.table), None)
        } else {
            self.workspace.run(None, None)
        }
    }
}
