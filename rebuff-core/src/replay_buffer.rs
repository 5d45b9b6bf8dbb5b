//! Replay buffers.
//!
//! Both buffers store transitions in a [`RingEnvironment`](crate::env::RingEnvironment)
//! and hand out owned [`TransitionBatch`]es.
//!
//! - [`ReplayBuffer`] samples uniformly with replacement.
//! - [`PrioritizedReplayBuffer`] samples in proportion to per-slot priorities
//!   and attaches importance sampling weights.
//!
//! With an [`NstepConfig`](crate::nstep::NstepConfig), rewards, next
//! observations and done flags of a sampled batch are replaced by their n-step
//! counterparts and the batch carries the bootstrap discount.
//!
//! # Examples
//!
//! ```rust
//! use rebuff_core::{
//!     env::TransitionSlice,
//!     per::PerConfig,
//!     replay_buffer::{PrioritizedReplayBuffer, ReplayBufferConfig},
//! };
//!
//! let config = ReplayBufferConfig::default()
//!     .capacity(256)
//!     .obs_dim(3)
//!     .act_dim(1)
//!     .per_config(Some(PerConfig::default().alpha(0.7)));
//! let mut buffer = PrioritizedReplayBuffer::new(&config).unwrap();
//!
//! let obs = [1.0f32; 3];
//! let tr = TransitionSlice::new(&obs, &[0.0], &[1.0], &obs, &[0]);
//! for _ in 0..500 {
//!     buffer.add(&tr).unwrap();
//! }
//!
//! let batch = buffer.sample(32, 0.4).unwrap();
//! let ixs = batch.ix_sample.clone().unwrap();
//! buffer.update_priorities(&ixs, &vec![0.5; ixs.len()]).unwrap();
//! ```
mod base;
mod batch;
mod config;
pub use base::{PrioritizedReplayBuffer, ReplayBuffer};
pub use batch::TransitionBatch;
pub use config::ReplayBufferConfig;
