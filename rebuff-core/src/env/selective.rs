//! Episode-organised transition storage.
use super::{Environment, SelectiveEnvironmentConfig, TransitionSlice};
use crate::error::RebuffError;
use log::{debug, trace};

/// Whether an episode can still grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeState {
    /// No done flag seen yet; the next `store` extends this episode.
    Open,

    /// Terminated by a done flag or by the end of the storage.
    Sealed,
}

/// An entry of the episode directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Episode {
    /// First slot of the episode.
    pub start: usize,

    /// Number of transitions.
    pub len: usize,

    /// Open or sealed.
    pub state: EpisodeState,
}

impl Episode {
    fn is_open(&self) -> bool {
        self.state == EpisodeState::Open
    }
}

/// A linear transition storage organised as whole episodes.
///
/// Episodes are kept in insertion order and tile `[0, stored_size())`
/// without gaps. Deleting an episode shifts every later transition left so
/// that this stays true. At most the last episode of the directory is
/// [`EpisodeState::Open`].
#[derive(Debug, Clone)]
pub struct SelectiveEnvironment {
    env: Environment,
    episode_len: usize,
    n_episodes: usize,
    episodes: Vec<Episode>,
    next_index: usize,
}

impl SelectiveEnvironment {
    /// Creates an empty storage of `episode_len * n_episodes` slots.
    pub fn new(config: &SelectiveEnvironmentConfig) -> Result<Self, RebuffError> {
        config.validate()?;
        debug!(
            "SelectiveEnvironment: episode_len={}, n_episodes={}, obs_dim={}, act_dim={}",
            config.episode_len, config.n_episodes, config.obs_dim, config.act_dim
        );
        Ok(Self {
            env: Environment::with_dims(config.buffer_size(), config.obs_dim, config.act_dim),
            episode_len: config.episode_len,
            n_episodes: config.n_episodes,
            episodes: Vec::with_capacity(config.n_episodes),
            next_index: 0,
        })
    }

    /// Appends a run of transitions.
    ///
    /// The run extends the open episode, if any. Every done flag seals the
    /// current episode, and a run filling the remaining storage seals its last
    /// episode as well. The request is rejected without side effects if it does
    /// not fit in the remaining slots or needs more directory entries than are
    /// left.
    pub fn store(&mut self, tr: &TransitionSlice<'_>) -> Result<(), RebuffError> {
        let n = tr.check_shape(self.env.obs_dim(), self.env.act_dim())?;
        let available = self.env.buffer_size() - self.next_index;
        if n > available {
            return Err(RebuffError::CapacityExceeded {
                requested: n,
                available,
            });
        }
        if n == 0 {
            return Ok(());
        }
        let fills = n == available;
        let seals = |k: usize| tr.done[k] != 0 || (fills && k + 1 == n);

        let mut in_open = self.episodes.last().map_or(false, Episode::is_open);
        let mut new_entries = 0;
        for k in 0..n {
            if !in_open {
                new_entries += 1;
                in_open = true;
            }
            if seals(k) {
                in_open = false;
            }
        }
        if self.episodes.len() + new_entries > self.n_episodes {
            return Err(RebuffError::EpisodeDirectoryFull(self.n_episodes));
        }

        self.env.store(tr, 0, self.next_index, n)?;
        trace!(
            "SelectiveEnvironment::store: next_index={}, n={}, new_episodes={}",
            self.next_index,
            n,
            new_entries
        );

        for k in 0..n {
            let slot = self.next_index + k;
            match self.episodes.last_mut() {
                Some(ep) if ep.is_open() => ep.len += 1,
                _ => self.episodes.push(Episode {
                    start: slot,
                    len: 1,
                    state: EpisodeState::Open,
                }),
            }
            if seals(k) {
                if let Some(ep) = self.episodes.last_mut() {
                    ep.state = EpisodeState::Sealed;
                }
            }
        }
        self.next_index += n;
        Ok(())
    }

    /// The transitions of the `i`-th episode.
    ///
    /// The view is empty if there is no such episode.
    pub fn get_episode(&self, i: usize) -> TransitionSlice<'_> {
        match self.episodes.get(i) {
            Some(ep) => self.env.range(ep.start, ep.len),
            None => TransitionSlice::empty(),
        }
    }

    /// Directory entry of the `i`-th episode.
    pub fn episode(&self, i: usize) -> Option<Episode> {
        self.episodes.get(i).copied()
    }

    /// The whole episode directory.
    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    /// Removes the `i`-th episode and returns the number of transitions
    /// removed, or 0 if there is no such episode.
    ///
    /// Later episodes move left to close the gap.
    pub fn delete_episode(&mut self, i: usize) -> usize {
        if i >= self.episodes.len() {
            return 0;
        }

        let deleted = self.episodes.remove(i);
        let end = deleted.start + deleted.len;
        if end < self.next_index {
            self.env.move_slots(end, self.next_index, deleted.start);
        }
        for ep in &mut self.episodes[i..] {
            ep.start -= deleted.len;
        }
        self.next_index -= deleted.len;

        debug!(
            "SelectiveEnvironment::delete_episode: episode={}, len={}, state={:?}",
            i, deleted.len, deleted.state
        );
        deleted.len
    }

    /// Slot to be written next.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Number of valid slots; equal to the sum of episode lengths.
    pub fn stored_size(&self) -> usize {
        self.next_index
    }

    /// Number of episodes, open or sealed.
    pub fn stored_episode_size(&self) -> usize {
        self.episodes.len()
    }

    /// Number of slots.
    pub fn buffer_size(&self) -> usize {
        self.env.buffer_size()
    }

    /// Nominal episode length given at construction.
    pub fn episode_len(&self) -> usize {
        self.episode_len
    }

    /// The underlying storage.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Forgets every episode.
    pub fn clear(&mut self) {
        debug!("SelectiveEnvironment::clear");
        self.next_index = 0;
        self.episodes.clear();
    }
}
