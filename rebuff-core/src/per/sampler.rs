//! Proportional prioritized sampler.
use super::{sum_tree::SumTree, PerConfig};
use crate::error::RebuffError;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Priority given to new slots before any priority has been assigned.
const DEFAULT_MAX_PRIORITY: f32 = 1.0;

/// How importance sampling weights are normalised.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum WeightNormalizer {
    /// Divide by the largest weight any stored slot could get.
    All,

    /// Divide by the largest weight in the sampled batch.
    Batch,
}

/// Indices drawn by [`PrioritizedSampler::sample`] and their importance
/// sampling weights.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    /// Sampled slot indices.
    pub indices: Vec<usize>,

    /// Importance sampling weight of each sampled index.
    pub weights: Vec<f32>,
}

/// Weighted sampler over `capacity` slots.
///
/// Leaf `i` holds `max(p_i, epsilon)^alpha` for the raw priority `p_i`.
/// `sample` draws one index per stratum of the cumulative weight, so a batch
/// of size `B` splits `[0, total)` into `B` equal intervals and draws
/// uniformly inside each of them.
///
/// The importance sampling weight of index `i` is
/// $w_i = (N P(i))^{-\beta}$ with $P(i) = p_i / \sum_j p_j$ over the `N`
/// stored slots, normalised as configured by [`WeightNormalizer`].
#[derive(Debug)]
pub struct PrioritizedSampler {
    alpha: f32,
    epsilon: f32,
    max_priority: f32,
    normalize: WeightNormalizer,
    sum_tree: SumTree,
    rng: StdRng,
}

impl PrioritizedSampler {
    /// Creates a sampler over `capacity` slots, all with priority zero.
    pub fn new(capacity: usize, config: &PerConfig, seed: u64) -> Result<Self, RebuffError> {
        crate::env::check_positive("capacity", capacity)?;
        let max_leaves = isize::MAX as usize / (2 * std::mem::size_of::<f32>());
        if !matches!(capacity.checked_next_power_of_two(), Some(n) if n <= max_leaves) {
            return Err(RebuffError::InvalidConfig(format!(
                "capacity {} is too large for a priority tree",
                capacity
            )));
        }
        config.validate()?;
        Ok(Self {
            alpha: config.alpha,
            epsilon: config.epsilon,
            max_priority: DEFAULT_MAX_PRIORITY,
            normalize: config.normalize,
            sum_tree: SumTree::new(capacity),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.sum_tree.capacity()
    }

    /// Largest raw priority ever assigned, or 1 if none has been.
    pub fn max_priority(&self) -> f32 {
        self.max_priority
    }

    /// Transformed priority of slot `index`.
    pub fn priority(&self, index: usize) -> f32 {
        self.sum_tree.get(index)
    }

    /// Sum of the transformed priorities of every slot.
    pub fn total_priority(&self) -> f32 {
        self.sum_tree.total()
    }

    fn check_index(&self, index: usize) -> Result<(), RebuffError> {
        if index >= self.capacity() {
            return Err(RebuffError::IndexOutOfRange {
                index,
                size: self.capacity(),
            });
        }
        Ok(())
    }

    fn check_priority(index: usize, p: f32) -> Result<(), RebuffError> {
        if !p.is_finite() {
            return Err(RebuffError::InvalidPriority(index));
        }
        Ok(())
    }

    #[inline]
    fn assign(&mut self, index: usize, p: f32, alpha: f32) {
        let p = p.max(self.epsilon);
        if p > self.max_priority {
            self.max_priority = p;
        }
        self.sum_tree.set(index, p.powf(alpha));
    }

    /// Sets the priority of slot `index`.
    pub fn set_priority(&mut self, index: usize, p: f32) -> Result<(), RebuffError> {
        self.set_priority_with_alpha(index, p, self.alpha)
    }

    /// Sets the priority of slot `index` using `alpha` instead of the
    /// configured exponent.
    pub fn set_priority_with_alpha(
        &mut self,
        index: usize,
        p: f32,
        alpha: f32,
    ) -> Result<(), RebuffError> {
        self.check_index(index)?;
        Self::check_priority(index, p)?;
        self.assign(index, p, alpha);
        Ok(())
    }

    /// Gives the `n` slots starting at `next_index`, wrapping at the end, the
    /// current maximum priority.
    pub fn set_priorities_max(&mut self, next_index: usize, n: usize) {
        let capacity = self.capacity();
        let v = self.max_priority.max(self.epsilon).powf(self.alpha);
        for j in 0..n.min(capacity) {
            self.sum_tree.set((next_index + j) % capacity, v);
        }
    }

    /// Gives the slots starting at `next_index`, wrapping at the end, the
    /// priorities in `ps`.
    pub fn set_priorities_from(&mut self, next_index: usize, ps: &[f32]) -> Result<(), RebuffError> {
        let capacity = self.capacity();
        self.check_index(next_index)?;
        if ps.len() > capacity {
            return Err(RebuffError::CapacityExceeded {
                requested: ps.len(),
                available: capacity,
            });
        }
        for (j, &p) in ps.iter().enumerate() {
            Self::check_priority((next_index + j) % capacity, p)?;
        }
        for (j, &p) in ps.iter().enumerate() {
            self.assign((next_index + j) % capacity, p, self.alpha);
        }
        Ok(())
    }

    /// Sets the priorities of `indices`.
    ///
    /// The whole call is rejected, with no priority changed, if the lengths
    /// differ, an index is out of range or a priority is not finite.
    pub fn update_priorities(&mut self, indices: &[usize], ps: &[f32]) -> Result<(), RebuffError> {
        if indices.len() != ps.len() {
            return Err(RebuffError::LengthMismatch(indices.len(), ps.len()));
        }
        for (&ix, &p) in indices.iter().zip(ps.iter()) {
            self.check_index(ix)?;
            Self::check_priority(ix, p)?;
        }
        for (&ix, &p) in indices.iter().zip(ps.iter()) {
            self.assign(ix, p, self.alpha);
        }
        Ok(())
    }

    /// Draws `batch_size` indices among slots `[0, stored_size)`.
    ///
    /// Fails if `stored_size` is zero, every priority in range is zero or
    /// their sum overflows.
    pub fn sample(
        &mut self,
        batch_size: usize,
        beta: f32,
        stored_size: usize,
    ) -> Result<SampleBatch, RebuffError> {
        if stored_size == 0 {
            return Err(RebuffError::EmptyBuffer);
        }
        let stored_size = stored_size.min(self.capacity());
        let p_sum = self.sum_tree.prefix_sum(stored_size);
        if !(p_sum > 0f32) {
            return Err(RebuffError::ZeroTotalPriority);
        }
        if !p_sum.is_finite() {
            return Err(RebuffError::TotalPriorityOverflow);
        }

        let every_range_len = p_sum / batch_size as f32;
        let indices = (0..batch_size)
            .map(|k| {
                let mass = (k as f32 + self.rng.gen::<f32>()) * every_range_len;
                self.sum_tree.find(mass).min(stored_size - 1)
            })
            .collect::<Vec<_>>();

        let weights = self.weights(&indices, beta.max(0f32), stored_size, p_sum);
        trace!(
            "PrioritizedSampler::sample: batch_size={}, stored_size={}, p_sum={}",
            batch_size,
            stored_size,
            p_sum
        );

        Ok(SampleBatch { indices, weights })
    }

    fn weights(&self, indices: &[usize], beta: f32, stored_size: usize, p_sum: f32) -> Vec<f32> {
        let n = stored_size as f32 / p_sum;
        let ws = indices
            .iter()
            .map(|&ix| (n * self.sum_tree.get(ix)).powf(-beta))
            .collect::<Vec<_>>();

        let w_max = match self.normalize {
            WeightNormalizer::All => (n * self.sum_tree.min(stored_size)).powf(-beta),
            WeightNormalizer::Batch => ws.iter().cloned().fold(f32::NAN, f32::max),
        };
        let w_max_inv = 1f32 / w_max;

        ws.iter().map(|w| w * w_max_inv).collect()
    }

    /// Resets every priority to zero and the maximum priority to its default.
    pub fn clear(&mut self) {
        self.max_priority = DEFAULT_MAX_PRIORITY;
        self.sum_tree.clear();
    }
}
