//! Configuration of environments.
use crate::error::RebuffError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Environment`](super::Environment) and
/// [`RingEnvironment`](super::RingEnvironment).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EnvironmentConfig {
    /// Number of transition slots.
    pub capacity: usize,

    /// Width of an observation.
    pub obs_dim: usize,

    /// Width of an action.
    pub act_dim: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            obs_dim: 1,
            act_dim: 1,
        }
    }
}

impl EnvironmentConfig {
    /// Sets the number of slots.
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

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), RebuffError> {
        check_positive("capacity", self.capacity)?;
        check_positive("obs_dim", self.obs_dim)?;
        check_positive("act_dim", self.act_dim)?;
        check_storage(self.capacity, self.obs_dim.max(self.act_dim))
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

/// Configuration of [`SelectiveEnvironment`](super::SelectiveEnvironment).
///
/// The storage holds `episode_len * n_episodes` transitions and at most
/// `n_episodes` episodes.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SelectiveEnvironmentConfig {
    /// Nominal episode length.
    pub episode_len: usize,

    /// Number of entries in the episode directory.
    pub n_episodes: usize,

    /// Width of an observation.
    pub obs_dim: usize,

    /// Width of an action.
    pub act_dim: usize,
}

impl Default for SelectiveEnvironmentConfig {
    fn default() -> Self {
        Self {
            episode_len: 1000,
            n_episodes: 10,
            obs_dim: 1,
            act_dim: 1,
        }
    }
}

impl SelectiveEnvironmentConfig {
    /// Sets the nominal episode length.
    pub fn episode_len(mut self, episode_len: usize) -> Self {
        self.episode_len = episode_len;
        self
    }

    /// Sets the number of episodes.
    pub fn n_episodes(mut self, n_episodes: usize) -> Self {
        self.n_episodes = n_episodes;
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

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), RebuffError> {
        check_positive("episode_len", self.episode_len)?;
        check_positive("n_episodes", self.n_episodes)?;
        check_positive("obs_dim", self.obs_dim)?;
        check_positive("act_dim", self.act_dim)?;
        let buffer_size = self
            .episode_len
            .checked_mul(self.n_episodes)
            .ok_or_else(|| {
                RebuffError::InvalidConfig(format!(
                    "episode_len * n_episodes overflows: {} * {}",
                    self.episode_len, self.n_episodes
                ))
            })?;
        check_storage(buffer_size, self.obs_dim.max(self.act_dim))
    }

    /// Total number of transition slots, saturating at `usize::MAX`.
    pub fn buffer_size(&self) -> usize {
        self.episode_len.saturating_mul(self.n_episodes)
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

pub(crate) fn check_positive(name: &str, value: usize) -> Result<(), RebuffError> {
    if value == 0 {
        return Err(RebuffError::InvalidConfig(format!("{} must be positive", name)));
    }
    Ok(())
}

/// Checks that `n_slots` rows of `dim` values fit in one allocation.
fn check_storage(n_slots: usize, dim: usize) -> Result<(), RebuffError> {
    let bytes = n_slots
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()));
    match bytes {
        Some(n) if n <= isize::MAX as usize => Ok(()),
        _ => Err(RebuffError::InvalidConfig(format!(
            "storage of {} slots with {} values each is too large",
            n_slots, dim
        ))),
    }
}
