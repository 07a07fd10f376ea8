//! Zero-value screening from the shape of the bond graph.
//!
//! Two graphs are built from the pair bonds: the interaction graph (pairs with
//! `f != 0`) and the overlap graph (pairs with `f = -1`, so `q = 0`). The
//! biconnected sum vanishes whenever the interaction graph is not biconnected,
//! and more generally whenever a set of mutually overlapping points separates
//! the interaction graph. Each configuration that passes one of these tests is
//! reported as screened and can skip the recursion.

use crate::subset::{bits, full_mask, lowest_bit, pair_count, point_count, Mask};

/// Running counts of screening decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreeningStats {
    /// Configurations checked.
    pub total: u64,
    /// Configurations found to contribute zero without running the recursion.
    pub screened: u64,
    /// Configurations whose evaluated value was nonzero.
    pub nonzero: u64,
}

impl ScreeningStats {
    pub fn screened_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.screened as f64 / self.total as f64
        }
    }

    pub fn merge(&mut self, other: &ScreeningStats) {
        self.total += other.total;
        self.screened += other.screened;
        self.nonzero += other.nonzero;
    }
}

/// Bond-graph bookkeeping for one cluster size.
#[derive(Debug, Clone)]
pub struct Screen {
    n: usize,
    out_degree: Vec<usize>,
    full_bond_mask: Vec<Mask>,
    overlap_mask: Vec<Mask>,
    clique_set: Vec<bool>,
    cliques: Vec<Mask>,
    edge_count: usize,
    overlap_count: usize,
    clique_count: usize,
    stats: ScreeningStats,
}

impl Screen {
    pub fn new(n: usize) -> Self {
        Screen {
            n,
            out_degree: vec![0; n],
            full_bond_mask: vec![0; n],
            overlap_mask: vec![0; n],
            clique_set: vec![false; 1 << n],
            cliques: Vec::new(),
            edge_count: 0,
            overlap_count: 0,
            clique_count: 0,
            stats: ScreeningStats::default(),
        }
    }

    /// Forgets all pairs recorded for the previous configuration.
    pub fn reset(&mut self) {
        self.out_degree.fill(0);
        self.full_bond_mask.fill(0);
        self.overlap_mask.fill(0);
        self.cliques.clear();
        self.edge_count = 0;
        self.overlap_count = 0;
        self.clique_count = 0;
    }

    pub fn add_pair(&mut self, i: usize, j: usize, overlap: bool, interacting: bool) {
        if !interacting {
            return;
        }
        self.edge_count += 1;
        self.out_degree[i] += 1;
        self.out_degree[j] += 1;
        self.full_bond_mask[i] |= 1 << j;
        self.full_bond_mask[j] |= 1 << i;
        if overlap {
            self.overlap_count += 1;
            self.overlap_mask[i] |= 1 << j;
            self.overlap_mask[j] |= 1 << i;
        }
    }

    /// Checks the recorded pairs; `true` means the value is exactly zero.
    pub fn check(&mut self) -> bool {
        self.stats.total += 1;
        let screened = self.find_zero();
        if screened {
            self.stats.screened += 1;
        }
        screened
    }

    pub fn record_nonzero(&mut self) {
        self.stats.nonzero += 1;
    }

    fn find_zero(&mut self) -> bool {
        let n = self.n;
        let max_edges = pair_count(n);
        self.cliques.clear();
        self.clique_count = 0;
        if self.edge_count == max_edges {
            // every subset of three or more points is a candidate clique
            self.clique_count = (1usize << n) - 1 - n - max_edges;
            return false;
        }
        if max_edges > 1 && self.edge_count == max_edges - 1 && self.overlap_count == self.edge_count {
            // the missing pair is separated by the overlapping clique of all other points
            return true;
        }
        if self.out_degree.iter().any(|&d| d < 2) {
            return true;
        }
        if !self.is_connected() {
            return true;
        }

        let full = full_mask(n);
        for i in 1..full {
            let low = lowest_bit(i);
            let rest = i ^ low;
            let is_clique = rest == 0
                || (self.clique_set[rest as usize]
                    && self.overlap_mask[low.trailing_zeros() as usize] & rest == rest);
            self.clique_set[i as usize] = is_clique;
            if !is_clique || point_count(full ^ i) < 2 {
                continue;
            }
            if self.separates(i) {
                return true;
            }
            if point_count(i) >= 3 {
                self.cliques.push(i);
                self.clique_count += 1;
            }
        }
        false
    }

    fn is_connected(&self) -> bool {
        let full = full_mask(self.n);
        let mut seen: Mask = 1;
        let mut frontier: Mask = 1;
        while frontier != 0 {
            let mut reached = seen;
            for p in bits(frontier) {
                reached |= self.full_bond_mask[p];
            }
            frontier = reached & !seen;
            seen = reached;
        }
        seen == full
    }

    /// Whether removing `clique` leaves the interaction graph disconnected.
    fn separates(&self, clique: Mask) -> bool {
        let full = full_mask(self.n);
        let rest = full ^ clique;
        let mut frontier = lowest_bit(rest);
        let mut seen = frontier | clique;
        loop {
            let mut reached = seen;
            for p in bits(frontier) {
                reached |= self.full_bond_mask[p];
            }
            if reached == full {
                return false;
            }
            if reached == seen {
                return true;
            }
            frontier = reached & !seen;
            seen = reached;
        }
    }

    pub fn point_count(&self) -> usize {
        self.n
    }

    /// Interacting pairs of the last configuration.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn overlap_count(&self) -> usize {
        self.overlap_count
    }

    /// Overlap cliques of three or more points found by the last check.
    pub fn clique_count(&self) -> usize {
        self.clique_count
    }

    pub fn cliques(&self) -> &[Mask] {
        &self.cliques
    }

    pub fn out_degree(&self) -> &[usize] {
        &self.out_degree
    }

    /// Interacting neighbours of each point.
    pub fn full_bond_mask(&self) -> &[Mask] {
        &self.full_bond_mask
    }

    pub fn stats(&self) -> &ScreeningStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ScreeningStats::default();
    }
}
