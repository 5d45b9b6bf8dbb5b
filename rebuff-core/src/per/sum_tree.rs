//! Sum tree for prioritized sampling.
use segment_tree::{ops::MinIgnoreNaN, SegmentPoint};

/// Array-backed complete binary tree whose internal nodes hold the sum of
/// their children.
///
/// The number of leaves is `capacity` rounded up to a power of two, so that
/// leaves appear left to right in slot order. Node `i` has children `2i + 1`
/// and `2i + 2`; leaf `ix` lives at `ix + n_leaves - 1`.
/// A min segment tree over the same leaves supports the weight normaliser.
#[derive(Debug)]
pub struct SumTree {
    capacity: usize,
    n_leaves: usize,
    tree: Vec<f32>,
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
}

impl SumTree {
    pub fn new(capacity: usize) -> Self {
        let n_leaves = capacity.next_power_of_two();
        Self {
            capacity,
            n_leaves,
            tree: vec![0f32; 2 * n_leaves - 1],
            min_tree: SegmentPoint::build(vec![f32::MAX; n_leaves], MinIgnoreNaN),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Value of leaf `ix`.
    pub fn get(&self, ix: usize) -> f32 {
        self.tree[ix + self.n_leaves - 1]
    }

    /// Sets leaf `ix` to `p` and recomputes its ancestors.
    pub fn set(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);
        self.min_tree.modify(ix, p);

        let mut node = ix + self.n_leaves - 1;
        self.tree[node] = p;
        while node > 0 {
            node = (node - 1) / 2;
            self.tree[node] = self.tree[2 * node + 1] + self.tree[2 * node + 2];
        }
    }

    /// Sum of leaves `[0, n)`.
    pub fn prefix_sum(&self, n: usize) -> f32 {
        if n >= self.n_leaves {
            return self.total();
        }
        let mut node = n + self.n_leaves - 1;
        let mut sum = 0f32;
        while node > 0 {
            // A right child: everything under its left sibling precedes it.
            if node % 2 == 0 {
                sum += self.tree[node - 1];
            }
            node = (node - 1) / 2;
        }
        sum
    }

    /// Minimum over leaves `[0, n)`. Leaves never set count as `f32::MAX`.
    pub fn min(&self, n: usize) -> f32 {
        self.min_tree.query(0, n.min(self.n_leaves))
    }

    /// Index of the leaf whose cumulative range contains `mass`.
    ///
    /// A mass landing exactly on a boundary goes to the left leaf. Subtrees
    /// of zero weight are never entered unless both children are empty.
    pub fn find(&self, mass: f32) -> usize {
        let mut node = 0;
        let mut mass = mass;
        while node < self.n_leaves - 1 {
            let left = 2 * node + 1;
            let right = left + 1;
            let l = self.tree[left];
            if (mass <= l && l > 0f32) || self.tree[right] <= 0f32 {
                node = left;
            } else {
                mass -= l;
                node = right;
            }
        }
        node + 1 - self.n_leaves
    }

    pub fn clear(&mut self) {
        self.tree.iter_mut().for_each(|v| *v = 0f32);
        self.min_tree = SegmentPoint::build(vec![f32::MAX; self.n_leaves], MinIgnoreNaN);
    }
}
