//! Cumulative-weight structure.
//!
//! An array-backed binary sum tree (a segment tree) over slot positions.
//! Leaves hold slot weights; every internal node holds the sum of its two
//! children. Node `1` is the root, node `i` has children `2i` and `2i + 1`,
//! and leaves occupy `cap..2 * cap` where `cap` is a power of two.
//!
//! Internal nodes are always recomputed from their children rather than
//! adjusted by deltas, so the root is a pure function of the current leaves
//! and float weights cannot drift over long mutation histories.

use crate::weight::Weight;

#[derive(Debug, Clone)]
pub(crate) struct SumTree<W> {
    nodes: Vec<W>,
    cap: usize,
}

impl<W: Weight> SumTree<W> {
    /// Tree with room for at least `slots` leaves, all zero.
    pub(crate) fn with_capacity(slots: usize) -> Self {
        let cap = slots.max(1).next_power_of_two();
        Self {
            nodes: vec![W::ZERO; 2 * cap],
            cap,
        }
    }

    /// Build a tree whose leading leaves are `weights`, in O(n).
    pub(crate) fn from_weights<I>(slots: usize, weights: I) -> Self
    where
        I: IntoIterator<Item = W>,
    {
        let mut tree = Self::with_capacity(slots);
        for (i, w) in weights.into_iter().take(tree.cap).enumerate() {
            tree.nodes[tree.cap + i] = w;
        }
        for i in (1..tree.cap).rev() {
            tree.nodes[i] = tree.nodes[2 * i] + tree.nodes[2 * i + 1];
        }
        tree
    }

    /// Number of leaves.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.cap
    }

    /// Sum of all leaves.
    #[inline]
    pub(crate) fn total(&self) -> W {
        self.nodes[1]
    }

    #[cfg(test)]
    pub(crate) fn get(&self, slot: usize) -> W {
        self.nodes[self.cap + slot]
    }

    /// Set leaf `slot` to `weight` and recompute its ancestors. O(log n).
    pub(crate) fn set(&mut self, slot: usize, weight: W) {
        debug_assert!(slot < self.cap, "slot {slot} out of capacity {}", self.cap);
        let mut i = self.cap + slot;
        self.nodes[i] = weight;
        i /= 2;
        while i >= 1 {
            self.nodes[i] = self.nodes[2 * i] + self.nodes[2 * i + 1];
            i /= 2;
        }
    }

    /// Locate the slot whose cumulative interval contains `t`. O(log n).
    ///
    /// Expects `total() > 0` and `0 <= t`. The descent only enters subtrees
    /// with a positive sum, so a zero-weight leaf is never returned, and a
    /// float `t` that rounding pushed to (or past) the total still resolves to
    /// the last positive leaf.
    pub(crate) fn find(&self, mut t: W) -> usize {
        let mut i = 1;
        while i < self.cap {
            let left = self.nodes[2 * i];
            let right = self.nodes[2 * i + 1];
            if t < left || !(right > W::ZERO) {
                i *= 2;
            } else {
                t = t - left;
                i = 2 * i + 1;
            }
        }
        i - self.cap
    }
}
