//! Bitmask helpers for subsets of cluster points.
//!
//! A subset of the `n` points of a cluster is stored as an `n`-bit mask: bit `i`
//! is set when point `i` belongs to the subset. Every table in the recursion is
//! indexed by such a mask, so the universe of `n` points needs `2^n` entries.

/// Subset of cluster points, one bit per point.
pub type Mask = u32;

/// Largest cluster the subset-indexed workspace is sized for.
pub const MAX_POINTS: usize = 20;

/// Lowest set bit of `mask` (zero for the empty set).
#[inline]
pub fn lowest_bit(mask: Mask) -> Mask {
    mask & mask.wrapping_neg()
}

/// Number of points in the subset.
#[inline]
pub fn point_count(mask: Mask) -> usize {
    mask.count_ones() as usize
}

/// Mask containing all `n` points.
#[inline]
pub fn full_mask(n: usize) -> Mask {
    assert!(n <= MAX_POINTS, "at most {} points are supported, got {}", MAX_POINTS, n);
    ((1u64 << n) - 1) as Mask
}

/// Two-point subset `{i, j}`.
#[inline]
pub fn pair_mask(i: usize, j: usize) -> Mask {
    (1 << i) | (1 << j)
}

/// Number of unordered pairs that can be formed from `n` points.
#[inline]
pub fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Position of the pair `(i, j)`, `i < j`, in row-major upper-triangle storage.
#[inline]
pub fn pair_index(i: usize, j: usize, n: usize) -> usize {
    debug_assert!(i < j && j < n);
    i * n - i * (i + 1) / 2 + (j - i - 1)
}

/// Iterates over the points of a subset in increasing order.
#[derive(Debug, Clone)]
pub struct Bits {
    rest: Mask,
}

impl Iterator for Bits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.rest == 0 {
            return None;
        }
        let low = lowest_bit(self.rest);
        self.rest ^= low;
        Some(low.trailing_zeros() as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = point_count(self.rest);
        (count, Some(count))
    }
}

impl ExactSizeIterator for Bits {}

/// Points of `mask`, lowest first.
pub fn bits(mask: Mask) -> Bits {
    Bits { rest: mask }
}

/// Iterator over the proper partitions of a subset.
///
/// Yields every sub-mask `j` with `required ⊆ j ⊊ set`, in increasing numeric
/// order, exactly once. The part left over, `set & !j`, is never empty.
///
/// Fixing `required` inside `j` is what keeps the inclusion–exclusion sums from
/// counting a split twice (once as `j` and once as its complement).
#[derive(Debug, Clone)]
pub struct Partitions {
    required: Mask,
    free: Mask,
    sub: Mask,
    done: bool,
}

impl Partitions {
    /// Sub-masks of `set` that contain all of `required`.
    pub fn containing(set: Mask, required: Mask) -> Self {
        debug_assert_eq!(required & !set, 0, "required bits must lie inside the set");
        Partitions {
            required,
            free: set & !required,
            sub: 0,
            done: required == 0 || required == set,
        }
    }

    /// Splits used for the connected sum: `j` always holds the lowest point of `set`.
    pub fn connected(set: Mask) -> Self {
        Self::containing(set, lowest_bit(set))
    }

    /// Splits of `set` at pivot `v`.
    ///
    /// `j` holds `v` and the lowest other point of `set`; the complement is
    /// re-joined with `v` by the caller. Empty when `set` does not contain `v`
    /// or has fewer than three points.
    pub fn articulation(set: Mask, v: usize) -> Self {
        let pivot = 1 << v;
        let rest = set & !pivot;
        if set & pivot == 0 || point_count(rest) < 2 {
            return Self::empty();
        }
        Self::containing(set, pivot | lowest_bit(rest))
    }

    fn empty() -> Self {
        Partitions {
            required: 0,
            free: 0,
            sub: 0,
            done: true,
        }
    }
}

impl Iterator for Partitions {
    type Item = Mask;

    fn next(&mut self) -> Option<Mask> {
        if self.done {
            return None;
        }
        if self.sub == self.free {
            self.done = true;
            return None;
        }
        let j = self.required | self.sub;
        // next sub-mask of `free` in increasing order
        self.sub = self.sub.wrapping_sub(self.free) & self.free;
        Some(j)
    }
}
