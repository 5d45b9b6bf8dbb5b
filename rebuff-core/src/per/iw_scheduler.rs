//! Annealing of the importance sampling exponent.
use super::PerConfig;

/// Linear schedule of $\beta$, the exponent of importance sampling weights.
///
/// $\beta$ moves from `beta_0` to `beta_final` as priority updates are
/// counted with [`IwScheduler::step`], reaching `beta_final` after
/// `n_opts_final` of them.
#[derive(Clone, Debug, PartialEq)]
pub struct IwScheduler {
    beta_0: f32,
    beta_final: f32,
    n_opts_final: usize,
    n_opts: usize,
}

impl IwScheduler {
    /// Creates a schedule from the beta parameters of `config`.
    pub fn new(config: &PerConfig) -> Self {
        Self {
            beta_0: config.beta_0,
            beta_final: config.beta_final,
            n_opts_final: config.n_opts_final,
            n_opts: 0,
        }
    }

    /// Current value of $\beta$.
    pub fn beta(&self) -> f32 {
        if self.n_opts >= self.n_opts_final {
            return self.beta_final;
        }
        let progress = self.n_opts as f32 / self.n_opts_final as f32;
        self.beta_0 + (self.beta_final - self.beta_0) * progress
    }

    /// Number of priority updates counted so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Counts one priority update. The count saturates once the final
    /// value is reached.
    pub fn step(&mut self) {
        if self.n_opts < self.n_opts_final {
            self.n_opts += 1;
        }
    }

    /// Restarts the schedule.
    pub fn reset(&mut self) {
        self.n_opts = 0;
    }
}
