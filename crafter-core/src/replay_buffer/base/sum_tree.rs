//! Sum tree for prioritized sampling.
use crate::error::CrafterError;
use rand::Rng;

/// Binary tree whose leaves hold `priority^alpha` and whose inner nodes hold
/// the sum of their children.
///
/// The tree lives in a flat array of `2 * capacity - 1` nodes with the leaves
/// at `capacity - 1..`. Inner nodes are recomputed from both children on every
/// change, so a subtree of zero leaves sums to exactly zero.
#[derive(Debug, Clone)]
pub struct SumTree {
    alpha: f64,
    capacity: usize,
    tree: Vec<f64>,
    n_nonzero: usize,
    max_priority: f64,
}

impl SumTree {
    /// Creates a tree with all leaves set to zero.
    pub fn new(capacity: usize, alpha: f64) -> Self {
        debug_assert!(capacity > 0);
        Self {
            alpha,
            capacity,
            tree: vec![0f64; 2 * capacity - 1],
            n_nonzero: 0,
            max_priority: 0.0,
        }
    }

    fn set_leaf(&mut self, ix: usize, v: f64) {
        let mut i = ix + self.capacity - 1;
        let old = self.tree[i];
        if old > 0.0 && v <= 0.0 {
            self.n_nonzero -= 1;
        } else if old <= 0.0 && v > 0.0 {
            self.n_nonzero += 1;
        }
        self.tree[i] = v;
        while i > 0 {
            i = (i - 1) / 2;
            self.tree[i] = self.tree[2 * i + 1] + self.tree[2 * i + 2];
        }
    }

    /// Sets the priority of the `ix`-th leaf.
    ///
    /// The leaf stores `priority^alpha`. The running maximum of raw
    /// priorities is raised if needed.
    pub fn update(&mut self, ix: usize, priority: f64) {
        debug_assert!(ix < self.capacity);
        debug_assert!(priority >= 0.0);
        self.max_priority = self.max_priority.max(priority);
        self.set_leaf(ix, priority.powf(self.alpha));
    }

    /// Sum of all leaves.
    pub fn total(&self) -> f64 {
        self.tree[0]
    }

    /// Value of the `ix`-th leaf, i.e., `priority^alpha`.
    pub fn leaf(&self, ix: usize) -> f64 {
        self.tree[ix + self.capacity - 1]
    }

    /// Largest raw priority set so far.
    pub fn max_priority(&self) -> f64 {
        self.max_priority
    }

    /// Number of leaves with nonzero value.
    pub fn n_nonzero(&self) -> usize {
        self.n_nonzero
    }

    /// Returns the leaf whose cumulative interval contains `s`.
    ///
    /// Never descends into a subtree summing to zero, so the returned leaf has
    /// nonzero value whenever the total is nonzero.
    pub fn find(&self, s: f64) -> usize {
        let mut i = 0;
        let mut s = s;
        while 2 * i + 1 < self.tree.len() {
            let (left, right) = (2 * i + 1, 2 * i + 2);
            if self.tree[left] > 0.0 && (s <= self.tree[left] || self.tree[right] <= 0.0) {
                i = left;
            } else {
                s -= self.tree[left];
                i = right;
            }
        }
        i + 1 - self.capacity
    }

    /// Draws `n` distinct leaves with probability proportional to their values.
    ///
    /// Each drawn leaf is zeroed until the end of the call, then restored.
    /// Returns pairs of the leaf index and its probability `leaf / total`
    /// before any removal.
    pub fn sample(
        &mut self,
        n: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<(usize, f64)>, CrafterError> {
        if n > self.n_nonzero {
            return Err(CrafterError::InsufficientSamples {
                requested: n,
                available: self.n_nonzero,
            });
        }

        let total = self.total();
        let mut drawn = Vec::with_capacity(n);
        for _ in 0..n {
            let s = rng.gen::<f64>() * self.total();
            let ix = self.find(s);
            drawn.push((ix, self.leaf(ix)));
            self.set_leaf(ix, 0.0);
        }
        for &(ix, v) in drawn.iter() {
            self.set_leaf(ix, v);
        }

        Ok(drawn.into_iter().map(|(ix, v)| (ix, v / total)).collect())
    }
}
