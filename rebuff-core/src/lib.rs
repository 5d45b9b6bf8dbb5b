#![warn(missing_docs)]
//! Experience replay storage for reinforcement learning.
//!
//! - [`DimensionalBuffer`]: fixed-capacity storage of fixed-width rows.
//! - [`env`]: transition storages, circular ([`env::RingEnvironment`]) or
//!   organised as episodes ([`env::SelectiveEnvironment`]).
//! - [`per`]: proportional prioritized sampling over a sum tree.
//! - [`nstep`]: discounted n-step returns.
//! - [`replay_buffer`]: uniform and prioritized replay buffers implementing
//!   [`ReplayBufferBase`].
//! - [`sync`]: lock-guarded wrappers for use from several threads.
pub mod dim_buffer;
pub mod env;
pub mod error;
pub mod nstep;
pub mod per;
pub mod replay_buffer;
pub mod sync;

mod base;
pub use base::{ExperienceBufferBase, ReplayBufferBase};
pub use dim_buffer::DimensionalBuffer;
pub use error::RebuffError;
