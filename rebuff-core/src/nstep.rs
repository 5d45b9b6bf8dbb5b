//! N-step returns.
//!
//! For a sampled slot `i`, [`NstepReturnComputer`] folds up to `nstep`
//! consecutive rewards,
//!
//! $R_i = \sum_{k=0}^{m-1} \gamma^k r_{i+k}$,
//!
//! where `m` stops growing at the first done flag (inclusive), at the end of
//! the valid data or at `nstep`. It also returns the bootstrap discount
//! $\gamma^m$ and the next observation of the last folded step.
use crate::{env::Environment, error::RebuffError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`NstepReturnComputer`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct NstepConfig {
    /// Maximum number of rewards folded into a return.
    pub nstep: usize,

    /// Discount factor.
    pub gamma: f32,
}

impl Default for NstepConfig {
    fn default() -> Self {
        Self {
            nstep: 3,
            gamma: 0.99,
        }
    }
}

impl NstepConfig {
    /// Sets the number of steps.
    pub fn nstep(mut self, nstep: usize) -> Self {
        self.nstep = nstep;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), RebuffError> {
        crate::env::check_positive("nstep", self.nstep)?;
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(RebuffError::InvalidConfig(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Raw per-slot arrays of a transition storage and the extent of its valid
/// data.
#[derive(Debug, Clone, Copy)]
pub struct NstepSource<'a> {
    /// Rewards, one per slot.
    pub reward: &'a [f32],

    /// Next observations, `obs_dim` values per slot.
    pub next_obs: &'a [f32],

    /// Done flags, one per slot.
    pub done: &'a [i8],

    /// Number of valid slots.
    pub stored_size: usize,

    /// Slot to be written next. A walk never steps onto it.
    pub next_index: usize,
}

impl<'a> NstepSource<'a> {
    /// Borrows the arrays of `env`.
    pub fn from_env(env: &'a Environment, stored_size: usize, next_index: usize) -> Self {
        Self {
            reward: env.rewards(),
            next_obs: env.next_observations(),
            done: env.dones(),
            stored_size,
            next_index,
        }
    }
}

/// Output of [`NstepReturnComputer::sample`], one entry per requested index.
#[derive(Debug, Clone, PartialEq)]
pub struct NstepBatch {
    /// $\gamma^m$.
    pub discount: Vec<f32>,

    /// Discounted sum of the `m` folded rewards.
    pub ret: Vec<f32>,

    /// Next observation of the last folded step, `obs_dim` values each.
    pub next_obs: Vec<f32>,

    /// Done flag of the last folded step.
    pub done: Vec<i8>,
}

/// Computes n-step returns over a storage of `buffer_size` slots.
#[derive(Debug, Clone)]
pub struct NstepReturnComputer {
    buffer_size: usize,
    obs_dim: usize,
    nstep: usize,
    gamma: f32,
}

impl NstepReturnComputer {
    /// Creates a computer for storages of `buffer_size` slots.
    pub fn new(buffer_size: usize, obs_dim: usize, config: &NstepConfig) -> Result<Self, RebuffError> {
        crate::env::check_positive("buffer_size", buffer_size)?;
        crate::env::check_positive("obs_dim", obs_dim)?;
        config.validate()?;
        Ok(Self {
            buffer_size,
            obs_dim,
            nstep: config.nstep,
            gamma: config.gamma,
        })
    }

    /// Number of steps.
    pub fn nstep(&self) -> usize {
        self.nstep
    }

    /// Discount factor.
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    fn check_source(&self, src: &NstepSource<'_>) -> Result<(), RebuffError> {
        let fields = [
            ("reward", src.reward.len(), self.buffer_size),
            ("next_obs", src.next_obs.len(), self.buffer_size * self.obs_dim),
            ("done", src.done.len(), self.buffer_size),
        ];
        for (field, actual, expected) in fields {
            if actual != expected {
                return Err(RebuffError::ShapeMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        if src.stored_size > self.buffer_size {
            return Err(RebuffError::IndexOutOfRange {
                index: src.stored_size,
                size: self.buffer_size,
            });
        }
        Ok(())
    }

    /// The slot following `j`, if the walk may continue onto it.
    ///
    /// The walk wraps to slot 0 only in a full ring and stops at the write
    /// cursor, where the oldest data begins.
    fn next_slot(&self, j: usize, src: &NstepSource<'_>) -> Option<usize> {
        let mut next = j + 1;
        if next == self.buffer_size {
            if src.stored_size < self.buffer_size {
                return None;
            }
            next = 0;
        }
        if next >= src.stored_size || next == src.next_index {
            return None;
        }
        Some(next)
    }

    /// Computes discounts, returns and n-step next observations for `indices`.
    pub fn sample(&self, indices: &[usize], src: &NstepSource<'_>) -> Result<NstepBatch, RebuffError> {
        self.check_source(src)?;
        if let Some(&index) = indices.iter().find(|&&i| i >= src.stored_size) {
            return Err(RebuffError::IndexOutOfRange {
                index,
                size: src.stored_size,
            });
        }

        let mut batch = NstepBatch {
            discount: Vec::with_capacity(indices.len()),
            ret: Vec::with_capacity(indices.len()),
            next_obs: Vec::with_capacity(indices.len() * self.obs_dim),
            done: Vec::with_capacity(indices.len()),
        };

        for &i in indices {
            let mut j = i;
            let mut gamma_m = 1f32;
            let mut ret = 0f32;
            let mut m = 0;
            loop {
                ret += gamma_m * src.reward[j];
                gamma_m *= self.gamma;
                m += 1;
                if m == self.nstep || src.done[j] != 0 {
                    break;
                }
                match self.next_slot(j, src) {
                    Some(next) => j = next,
                    None => break,
                }
            }

            batch.discount.push(gamma_m);
            batch.ret.push(ret);
            batch.done.push(src.done[j]);
            batch
                .next_obs
                .extend_from_slice(&src.next_obs[j * self.obs_dim..(j + 1) * self.obs_dim]);
        }

        Ok(batch)
    }
}
