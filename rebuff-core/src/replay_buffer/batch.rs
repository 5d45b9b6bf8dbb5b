//! Owned batches of transitions.
use crate::env::TransitionSlice;

/// Transitions copied out of a buffer.
///
/// Field layouts follow [`TransitionSlice`]. Batches drawn by a replay
/// buffer fill the optional fields that apply to them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionBatch {
    /// Observations.
    pub obs: Vec<f32>,

    /// Actions.
    pub act: Vec<f32>,

    /// Next observations.
    pub next_obs: Vec<f32>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Done flags.
    pub done: Vec<i8>,

    /// Bootstrap discounts when n-step returns are used.
    pub discount: Option<Vec<f32>>,

    /// Importance sampling weights for prioritized experience replay.
    pub weight: Option<Vec<f32>>,

    /// Slot indices of sampled transitions.
    pub ix_sample: Option<Vec<usize>>,
}

impl TransitionBatch {
    /// Creates an empty batch with room for `capacity` transitions.
    pub fn with_capacity(capacity: usize, obs_dim: usize, act_dim: usize) -> Self {
        Self {
            obs: Vec::with_capacity(capacity * obs_dim),
            act: Vec::with_capacity(capacity * act_dim),
            next_obs: Vec::with_capacity(capacity * obs_dim),
            reward: Vec::with_capacity(capacity),
            done: Vec::with_capacity(capacity),
            discount: None,
            weight: None,
            ix_sample: None,
        }
    }

    /// Copies a view into an owned batch.
    pub fn from_slice(tr: &TransitionSlice<'_>) -> Self {
        Self {
            obs: tr.obs.to_vec(),
            act: tr.act.to_vec(),
            next_obs: tr.next_obs.to_vec(),
            reward: tr.reward.to_vec(),
            done: tr.done.to_vec(),
            ..Self::default()
        }
    }

    /// Borrows the transition fields as a view.
    pub fn as_slice(&self) -> TransitionSlice<'_> {
        TransitionSlice::new(&self.obs, &self.act, &self.reward, &self.next_obs, &self.done)
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
