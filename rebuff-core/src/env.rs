//! Transition storage.
//!
//! Every environment keeps five parallel [`DimensionalBuffer`](crate::DimensionalBuffer)s
//! indexed by the same slot number: observations, actions, rewards,
//! next observations and done flags.
//!
//! - [`Environment`]: the bare storage, addressed by explicit slot.
//! - [`RingEnvironment`]: a circular buffer that overwrites its oldest slots.
//! - [`SelectiveEnvironment`]: a linear buffer organised as whole episodes,
//!   which can be read and deleted one episode at a time.
mod base;
mod config;
mod ring;
mod selective;
mod transition;
pub use base::Environment;
pub use config::{EnvironmentConfig, SelectiveEnvironmentConfig};
pub use ring::RingEnvironment;
pub use selective::{Episode, EpisodeState, SelectiveEnvironment};
pub use transition::TransitionSlice;
pub(crate) use config::check_positive;
