//! Configuration of replay buffers.
use crate::{env::EnvironmentConfig, nstep::NstepConfig, per::PerConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer) and
/// [`PrioritizedReplayBuffer`](super::PrioritizedReplayBuffer).
///
/// # Examples
///
/// ```rust
/// use rebuff_core::{nstep::NstepConfig, per::PerConfig, replay_buffer::ReplayBufferConfig};
///
/// let config = ReplayBufferConfig::default()
///     .capacity(10000)
///     .obs_dim(4)
///     .seed(42)
///     .per_config(Some(PerConfig::default()))
///     .nstep_config(Some(NstepConfig::default().nstep(3)));
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of transitions. When the buffer is full, new
    /// transitions replace the oldest ones.
    pub capacity: usize,

    /// Width of an observation.
    pub obs_dim: usize,

    /// Width of an action.
    pub act_dim: usize,

    /// Random seed used for sampling.
    pub seed: u64,

    /// Prioritized experience replay. The prioritized buffer falls back to
    /// [`PerConfig::default`] when this is `None`; the uniform buffer ignores it.
    pub per_config: Option<PerConfig>,

    /// N-step returns. If `None`, sampled batches carry one-step rewards.
    pub nstep_config: Option<NstepConfig>,
}

impl Default for ReplayBufferConfig {
    /// Creates a default configuration:
    /// - `capacity = 10000`
    /// - `obs_dim = 1`, `act_dim = 1`
    /// - `seed = 42`
    /// - no PER, no n-step returns
    fn default() -> Self {
        Self {
            capacity: 10000,
            obs_dim: 1,
            act_dim: 1,
            seed: 42,
            per_config: None,
            nstep_config: None,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the observation width.
    pub fn obs_dim(mut self, obs_dim: usize) -> Self {
        self.obs_dim = obs_dim;
        self
    }

    /// Sets the action width.
    pub fn act_dim(mut self, act_dim: usize) -> Self {
        self.act_dim = act_dim;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the configuration for prioritized experience replay.
    pub fn per_config(mut self, per_config: Option<PerConfig>) -> Self {
        self.per_config = per_config;
        self
    }

    /// Sets the configuration of n-step returns.
    pub fn nstep_config(mut self, nstep_config: Option<NstepConfig>) -> Self {
        self.nstep_config = nstep_config;
        self
    }

    /// Configuration of the underlying ring storage.
    pub fn env_config(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            capacity: self.capacity,
            obs_dim: self.obs_dim,
            act_dim: self.act_dim,
        }
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
