//! Slot-addressed transition storage.
use super::{EnvironmentConfig, TransitionSlice};
use crate::{dim_buffer::DimensionalBuffer, error::RebuffError, replay_buffer::TransitionBatch};

/// Five parallel [`DimensionalBuffer`]s sharing one slot index space.
///
/// This type does no bookkeeping of its own: callers decide which slots
/// to write and which slots hold valid data.
#[derive(Debug, Clone)]
pub struct Environment {
    buffer_size: usize,
    obs_dim: usize,
    act_dim: usize,
    obs: DimensionalBuffer<f32>,
    act: DimensionalBuffer<f32>,
    reward: DimensionalBuffer<f32>,
    next_obs: DimensionalBuffer<f32>,
    done: DimensionalBuffer<i8>,
}

impl Environment {
    /// Creates a storage from a validated configuration.
    pub fn new(config: &EnvironmentConfig) -> Result<Self, RebuffError> {
        config.validate()?;
        Ok(Self::with_dims(config.capacity, config.obs_dim, config.act_dim))
    }

    pub(crate) fn with_dims(buffer_size: usize, obs_dim: usize, act_dim: usize) -> Self {
        Self {
            buffer_size,
            obs_dim,
            act_dim,
            obs: DimensionalBuffer::new(buffer_size, obs_dim),
            act: DimensionalBuffer::new(buffer_size, act_dim),
            reward: DimensionalBuffer::new(buffer_size, 1),
            next_obs: DimensionalBuffer::new(buffer_size, obs_dim),
            done: DimensionalBuffer::new(buffer_size, 1),
        }
    }

    /// Number of slots.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Width of an observation.
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    /// Width of an action.
    pub fn act_dim(&self) -> usize {
        self.act_dim
    }

    /// Writes transitions `[shift, shift + count)` of `tr` to slots
    /// `[index, index + count)`.
    ///
    /// The shape of `tr` is checked and the range is bounds-checked before
    /// any field is written, so a failed call leaves the storage untouched.
    pub fn store(
        &mut self,
        tr: &TransitionSlice<'_>,
        shift: usize,
        index: usize,
        count: usize,
    ) -> Result<(), RebuffError> {
        let n = tr.check_shape(self.obs_dim, self.act_dim)?;
        if shift + count > n {
            return Err(RebuffError::ShapeMismatch {
                field: "reward",
                expected: shift + count,
                actual: n,
            });
        }
        if index + count > self.buffer_size {
            return Err(RebuffError::CapacityExceeded {
                requested: count,
                available: self.buffer_size.saturating_sub(index),
            });
        }

        self.obs.store_data(tr.obs, shift, index, count)?;
        self.act.store_data(tr.act, shift, index, count)?;
        self.reward.store_data(tr.reward, shift, index, count)?;
        self.next_obs.store_data(tr.next_obs, shift, index, count)?;
        self.done.store_data(tr.done, shift, index, count)?;
        Ok(())
    }

    /// The transition at slot `index`.
    ///
    /// Panics if `index >= buffer_size()`.
    pub fn get(&self, index: usize) -> TransitionSlice<'_> {
        self.range(index, 1)
    }

    /// Transitions at slots `[start, start + len)`.
    ///
    /// Panics if the range runs past `buffer_size()`.
    pub fn range(&self, start: usize, len: usize) -> TransitionSlice<'_> {
        TransitionSlice {
            obs: self.obs.rows(start, len),
            act: self.act.rows(start, len),
            reward: self.reward.rows(start, len),
            next_obs: self.next_obs.rows(start, len),
            done: self.done.rows(start, len),
        }
    }

    /// Copies the transitions at `indices` into an owned batch.
    pub fn gather(&self, indices: &[usize]) -> TransitionBatch {
        let n = indices.len();
        let mut batch = TransitionBatch::with_capacity(n, self.obs_dim, self.act_dim);
        for &i in indices {
            self.obs.extend_with_row(i, &mut batch.obs);
            self.act.extend_with_row(i, &mut batch.act);
            self.reward.extend_with_row(i, &mut batch.reward);
            self.next_obs.extend_with_row(i, &mut batch.next_obs);
            self.done.extend_with_row(i, &mut batch.done);
        }
        batch
    }

    /// Moves slots `[begin, end)` so that they start at slot `dest`.
    pub(crate) fn move_slots(&mut self, begin: usize, end: usize, dest: usize) {
        self.obs.copy_within(begin, end, dest);
        self.act.copy_within(begin, end, dest);
        self.reward.copy_within(begin, end, dest);
        self.next_obs.copy_within(begin, end, dest);
        self.done.copy_within(begin, end, dest);
    }

    /// All rewards, one per slot.
    pub fn rewards(&self) -> &[f32] {
        self.reward.as_slice()
    }

    /// All next observations, `obs_dim` values per slot.
    pub fn next_observations(&self) -> &[f32] {
        self.next_obs.as_slice()
    }

    /// All done flags, one per slot.
    pub fn dones(&self) -> &[i8] {
        self.done.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        Environment::new(&EnvironmentConfig::default().capacity(8).obs_dim(2).act_dim(1)).unwrap()
    }

    #[test]
    fn test_store_and_get() {
        let mut env = env();
        let obs = [1.0, 2.0, 3.0, 4.0];
        let next_obs = [3.0, 4.0, 5.0, 6.0];
        let act = [0.5, 1.5];
        let rew = [1.0, -1.0];
        let done = [0, 1];
        let tr = TransitionSlice::new(&obs, &act, &rew, &next_obs, &done);
        env.store(&tr, 0, 3, 2).unwrap();

        let t = env.get(4);
        assert_eq!(t.obs, &[3.0, 4.0]);
        assert_eq!(t.act, &[1.5]);
        assert_eq!(t.reward, &[-1.0]);
        assert_eq!(t.next_obs, &[5.0, 6.0]);
        assert_eq!(t.done, &[1]);
        assert_eq!(env.range(3, 2).len(), 2);

        let batch = env.gather(&[4, 3, 4]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.obs, vec![3.0, 4.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(batch.done, vec![1, 0, 1]);
    }

    #[test]
    fn test_failed_store_leaves_storage_untouched() {
        let mut env = env();
        let obs = [1.0; 6];
        let act = [1.0; 3];
        let rew = [1.0; 3];
        let done = [1; 3];
        let tr = TransitionSlice::new(&obs, &act, &rew, &obs, &done);
        assert!(env.store(&tr, 0, 6, 3).is_err());
        assert!(env.rewards().iter().all(|&r| r == 0.0));
        assert!(env.dones().iter().all(|&d| d == 0));
    }

    #[test]
    fn test_invalid_config() {
        let config = EnvironmentConfig::default().obs_dim(0);
        assert!(Environment::new(&config).is_err());
    }
}
