//! Prioritized experience replay.
//!
//! [`PrioritizedSampler`] keeps one priority per slot of a buffer in a sum
//! tree, giving O(log N) priority updates and weighted draws.
//! [`IwScheduler`] anneals the exponent of the importance sampling weights
//! over the course of training.
mod config;
mod iw_scheduler;
mod sampler;
mod sum_tree;
pub use config::PerConfig;
pub use iw_scheduler::IwScheduler;
pub use sampler::{PrioritizedSampler, SampleBatch, WeightNormalizer};
