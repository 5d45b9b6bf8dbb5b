//! Circular transition storage.
use super::{Environment, EnvironmentConfig, TransitionSlice};
use crate::error::RebuffError;
use log::{debug, trace};

/// A circular buffer of transitions.
///
/// Writes start at `next_index` and wrap to slot 0 at the end of the storage,
/// overwriting the oldest transitions once `stored_size` has reached the
/// capacity.
#[derive(Debug, Clone)]
pub struct RingEnvironment {
    env: Environment,
    next_index: usize,
    stored_size: usize,
}

impl RingEnvironment {
    /// Creates an empty ring.
    pub fn new(config: &EnvironmentConfig) -> Result<Self, RebuffError> {
        let env = Environment::new(config)?;
        debug!(
            "RingEnvironment: capacity={}, obs_dim={}, act_dim={}",
            config.capacity, config.obs_dim, config.act_dim
        );
        Ok(Self {
            env,
            next_index: 0,
            stored_size: 0,
        })
    }

    /// Appends the transitions of `tr` at the write cursor.
    ///
    /// A run crossing the end of the storage is split into two contiguous
    /// writes. Runs longer than the capacity are rejected, as is any run with
    /// inconsistent field lengths; in both cases nothing is written.
    pub fn store(&mut self, tr: &TransitionSlice<'_>) -> Result<(), RebuffError> {
        let n = tr.check_shape(self.env.obs_dim(), self.env.act_dim())?;
        let buffer_size = self.env.buffer_size();
        if n > buffer_size {
            return Err(RebuffError::CapacityExceeded {
                requested: n,
                available: buffer_size,
            });
        }
        trace!("RingEnvironment::store: next_index={}, n={}", self.next_index, n);

        let mut shift = 0;
        let mut remaining = n;
        while remaining > 0 {
            let copy_n = remaining.min(buffer_size - self.next_index);
            self.env.store(tr, shift, self.next_index, copy_n)?;

            self.next_index += copy_n;
            if self.next_index >= buffer_size {
                self.next_index = 0;
            }
            self.stored_size = (self.stored_size + copy_n).min(buffer_size);

            remaining -= copy_n;
            shift += copy_n;
        }
        Ok(())
    }

    /// The transition at slot `index`, or `None` if the slot holds no data.
    pub fn get(&self, index: usize) -> Option<TransitionSlice<'_>> {
        if index < self.stored_size {
            Some(self.env.get(index))
        } else {
            None
        }
    }

    /// Slot to be written next.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Number of valid slots.
    pub fn stored_size(&self) -> usize {
        self.stored_size
    }

    /// Number of slots.
    pub fn buffer_size(&self) -> usize {
        self.env.buffer_size()
    }

    /// Returns `true` once every slot has been written.
    pub fn is_full(&self) -> bool {
        self.stored_size == self.env.buffer_size()
    }

    /// The underlying storage.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Forgets every stored transition.
    pub fn clear(&mut self) {
        debug!("RingEnvironment::clear");
        self.stored_size = 0;
        self.next_index = 0;
    }
}
