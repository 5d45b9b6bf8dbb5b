//! Borrowed views of transitions.
use crate::error::RebuffError;

/// A run of transitions laid out as five flat, parallel slices.
///
/// `obs` and `next_obs` hold `len() * obs_dim` values, `act` holds
/// `len() * act_dim` values and `reward`/`done` hold one value per transition.
/// It is both the input of `store` calls and the view handed out by
/// environments, in which case it borrows their storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionSlice<'a> {
    /// Observations.
    pub obs: &'a [f32],

    /// Actions.
    pub act: &'a [f32],

    /// Rewards.
    pub reward: &'a [f32],

    /// Next observations.
    pub next_obs: &'a [f32],

    /// Done flags, non-zero at the last step of an episode.
    pub done: &'a [i8],
}

impl<'a> TransitionSlice<'a> {
    /// Bundles five slices into a view.
    pub fn new(
        obs: &'a [f32],
        act: &'a [f32],
        reward: &'a [f32],
        next_obs: &'a [f32],
        done: &'a [i8],
    ) -> Self {
        Self {
            obs,
            act,
            reward,
            next_obs,
            done,
        }
    }

    /// A view with no transitions.
    pub fn empty() -> Self {
        Self::new(&[], &[], &[], &[], &[])
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the view holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Checks that every field has `len() * dim` values and returns `len()`.
    pub(crate) fn check_shape(&self, obs_dim: usize, act_dim: usize) -> Result<usize, RebuffError> {
        let n = self.len();
        let fields = [
            ("obs", self.obs.len(), n * obs_dim),
            ("act", self.act.len(), n * act_dim),
            ("next_obs", self.next_obs.len(), n * obs_dim),
            ("done", self.done.len(), n),
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
        Ok(n)
    }
}
