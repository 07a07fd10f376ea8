//! Reference values by explicit graph enumeration.
//!
//! Walks every graph on the labelled points, keeps the biconnected ones and sums
//! their bond products. Cost grows as `2^(n(n-1)/2)`, so this only serves as a
//! cross-check of the recursion for small clusters.

use itertools::Itertools;

use crate::subset::{bits, full_mask, Mask};

/// Largest cluster the enumeration accepts.
pub const MAX_ENUMERATED_POINTS: usize = 7;

/// Whether the graph on `n` points with the given edges is biconnected.
///
/// A single edge between two points counts as biconnected.
pub fn is_biconnected(n: usize, edges: &[(usize, usize)]) -> bool {
    if n < 2 {
        return false;
    }
    let mut adjacency = vec![0 as Mask; n];
    for &(i, j) in edges {
        adjacency[i] |= 1 << j;
        adjacency[j] |= 1 << i;
    }
    let full = full_mask(n);
    if !spans(full, &adjacency) {
        return false;
    }
    n == 2 || (0..n).all(|v| spans(full & !(1 << v), &adjacency))
}

/// Whether the points of `set` are connected using only edges inside `set`.
fn spans(set: Mask, adjacency: &[Mask]) -> bool {
    if set == 0 {
        return true;
    }
    let mut seen = set & set.wrapping_neg();
    let mut frontier = seen;
    while frontier != 0 {
        let mut reached = seen;
        for p in bits(frontier) {
            reached |= adjacency[p] & set;
        }
        frontier = reached & !seen;
        seen = reached;
    }
    seen == set
}

/// `(1 - n)` times the sum over biconnected graphs of the product of `f` over edges.
pub fn biconnected_sum_brute_force(n: usize, f: impl Fn(usize, usize) -> f64) -> f64 {
    assert!(
        (2..=MAX_ENUMERATED_POINTS).contains(&n),
        "graph enumeration supports 2 to {} points, got {}",
        MAX_ENUMERATED_POINTS,
        n
    );
    let pairs: Vec<(usize, usize)> = (0..n).tuple_combinations().collect();
    let weights: Vec<f64> = pairs.iter().map(|&(i, j)| f(i, j)).collect();
    let mut sum = 0.0;
    let mut edges = Vec::with_capacity(pairs.len());
    for graph in 0u64..(1u64 << pairs.len()) {
        edges.clear();
        let mut weight = 1.0;
        for (k, &pair) in pairs.iter().enumerate() {
            if graph >> k & 1 == 1 {
                edges.push(pair);
                weight *= weights[k];
            }
        }
        if weight != 0.0 && is_biconnected(n, &edges) {
            sum += weight;
        }
    }
    (1.0 - n as f64) * sum
}
