//! Thread-safe wrappers.
//!
//! Each wrapper owns its buffer behind a lock and is `Send + Sync`, so it
//! can be shared between actor and learner threads through an
//! [`Arc`](std::sync::Arc). Views into the storage are handed to closures
//! and never outlive the guard.
use crate::{
    env::{
        EnvironmentConfig, Episode, RingEnvironment, SelectiveEnvironment,
        SelectiveEnvironmentConfig, TransitionSlice,
    },
    error::RebuffError,
    replay_buffer::{PrioritizedReplayBuffer, ReplayBufferConfig, TransitionBatch},
};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> Result<RwLockReadGuard<'a, T>, RebuffError> {
    lock.read().map_err(|_| RebuffError::LockPoisoned(name))
}

fn write<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> Result<RwLockWriteGuard<'a, T>, RebuffError> {
    lock.write().map_err(|_| RebuffError::LockPoisoned(name))
}

/// A [`RingEnvironment`] behind a read/write lock.
///
/// Stores are serialized; readers run concurrently with each other.
#[derive(Debug)]
pub struct SharedRingEnvironment {
    inner: RwLock<RingEnvironment>,
}

impl SharedRingEnvironment {
    const NAME: &'static str = "SharedRingEnvironment";

    /// Creates an empty ring.
    pub fn new(config: &EnvironmentConfig) -> Result<Self, RebuffError> {
        Ok(Self::from(RingEnvironment::new(config)?))
    }

    /// Appends transitions, see [`RingEnvironment::store`].
    pub fn store(&self, tr: &TransitionSlice<'_>) -> Result<(), RebuffError> {
        write(&self.inner, Self::NAME)?.store(tr)
    }

    /// Calls `f` with the transition at slot `index`, or with `None` if the
    /// slot holds no data.
    pub fn with_transition<R>(
        &self,
        index: usize,
        f: impl FnOnce(Option<TransitionSlice<'_>>) -> R,
    ) -> Result<R, RebuffError> {
        let ring = read(&self.inner, Self::NAME)?;
        Ok(f(ring.get(index)))
    }

    /// Calls `f` with the locked ring.
    pub fn with_ring<R>(&self, f: impl FnOnce(&RingEnvironment) -> R) -> Result<R, RebuffError> {
        let ring = read(&self.inner, Self::NAME)?;
        Ok(f(&ring))
    }

    /// Copies the transitions at `indices`, all of which must be stored.
    pub fn gather(&self, indices: &[usize]) -> Result<TransitionBatch, RebuffError> {
        let ring = read(&self.inner, Self::NAME)?;
        let size = ring.stored_size();
        if let Some(&index) = indices.iter().find(|&&i| i >= size) {
            return Err(RebuffError::IndexOutOfRange { index, size });
        }
        Ok(ring.environment().gather(indices))
    }

    /// Slot to be written next.
    pub fn next_index(&self) -> Result<usize, RebuffError> {
        Ok(read(&self.inner, Self::NAME)?.next_index())
    }

    /// Number of valid slots.
    pub fn stored_size(&self) -> Result<usize, RebuffError> {
        Ok(read(&self.inner, Self::NAME)?.stored_size())
    }

    /// Forgets every stored transition.
    pub fn clear(&self) -> Result<(), RebuffError> {
        write(&self.inner, Self::NAME)?.clear();
        Ok(())
    }

    /// Returns the wrapped ring.
    pub fn into_inner(self) -> Result<RingEnvironment, RebuffError> {
        self.inner
            .into_inner()
            .map_err(|_| RebuffError::LockPoisoned(Self::NAME))
    }
}

impl From<RingEnvironment> for SharedRingEnvironment {
    fn from(ring: RingEnvironment) -> Self {
        Self {
            inner: RwLock::new(ring),
        }
    }
}

/// A [`SelectiveEnvironment`] behind a read/write lock.
///
/// Deletion compacts the storage under the write lock, so episode indices
/// read before a `delete_episode` may refer to a different episode after it.
#[derive(Debug)]
pub struct SharedSelectiveEnvironment {
    inner: RwLock<SelectiveEnvironment>,
}

impl SharedSelectiveEnvironment {
    const NAME: &'static str = "SharedSelectiveEnvironment";

    /// Creates an empty environment.
    pub fn new(config: &SelectiveEnvironmentConfig) -> Result<Self, RebuffError> {
        Ok(Self::from(SelectiveEnvironment::new(config)?))
    }

    /// Appends transitions, see [`SelectiveEnvironment::store`].
    pub fn store(&self, tr: &TransitionSlice<'_>) -> Result<(), RebuffError> {
        write(&self.inner, Self::NAME)?.store(tr)
    }

    /// Calls `f` with the transitions of episode `i`, empty if it does not
    /// exist.
    pub fn with_episode<R>(
        &self,
        i: usize,
        f: impl FnOnce(TransitionSlice<'_>) -> R,
    ) -> Result<R, RebuffError> {
        let env = read(&self.inner, Self::NAME)?;
        Ok(f(env.get_episode(i)))
    }

    /// Calls `f` with the locked environment.
    pub fn with_env<R>(&self, f: impl FnOnce(&SelectiveEnvironment) -> R) -> Result<R, RebuffError> {
        let env = read(&self.inner, Self::NAME)?;
        Ok(f(&env))
    }

    /// Directory entry of episode `i`.
    pub fn episode(&self, i: usize) -> Result<Option<Episode>, RebuffError> {
        Ok(read(&self.inner, Self::NAME)?.episode(i))
    }

    /// Deletes episode `i` and returns the number of transitions removed.
    pub fn delete_episode(&self, i: usize) -> Result<usize, RebuffError> {
        Ok(write(&self.inner, Self::NAME)?.delete_episode(i))
    }

    /// Slot to be written next.
    pub fn next_index(&self) -> Result<usize, RebuffError> {
        Ok(read(&self.inner, Self::NAME)?.next_index())
    }

    /// Number of valid slots.
    pub fn stored_size(&self) -> Result<usize, RebuffError> {
        Ok(read(&self.inner, Self::NAME)?.stored_size())
    }

    /// Number of slots.
    pub fn buffer_size(&self) -> Result<usize, RebuffError> {
        Ok(read(&self.inner, Self::NAME)?.buffer_size())
    }

    /// Number of episodes in the directory.
    pub fn stored_episode_size(&self) -> Result<usize, RebuffError> {
        Ok(read(&self.inner, Self::NAME)?.stored_episode_size())
    }

    /// Empties the directory.
    pub fn clear(&self) -> Result<(), RebuffError> {
        write(&self.inner, Self::NAME)?.clear();
        Ok(())
    }
}

impl From<SelectiveEnvironment> for SharedSelectiveEnvironment {
    fn from(env: SelectiveEnvironment) -> Self {
        Self {
            inner: RwLock::new(env),
        }
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// A [`PrioritizedReplayBuffer`] behind a mutex.
///
/// Sampling advances the random number generator, so every operation takes
/// the lock exclusively. A `sample` therefore never sees transitions whose
/// priorities have not been written yet, nor a half-updated tree.
///
/// ```mermaid
/// graph LR
///     A0[Actor 0] -->|add| B[SharedPrioritizedReplayBuffer]
///     A1[Actor 1] -->|add| B
///     B -->|sample| L[Learner]
///     L -->|update_priorities| B
/// ```
#[derive(Debug)]
pub struct SharedPrioritizedReplayBuffer {
    inner: Mutex<PrioritizedReplayBuffer>,
}

impl SharedPrioritizedReplayBuffer {
    const NAME: &'static str = "SharedPrioritizedReplayBuffer";

    /// Creates an empty buffer.
    pub fn new(config: &ReplayBufferConfig) -> Result<Self, RebuffError> {
        Ok(Self::from(PrioritizedReplayBuffer::new(config)?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, PrioritizedReplayBuffer>, RebuffError> {
        self.inner
            .lock()
            .map_err(|_| RebuffError::LockPoisoned(Self::NAME))
    }

    /// Appends transitions with the current maximum priority.
    pub fn add(&self, tr: &TransitionSlice<'_>) -> Result<(), RebuffError> {
        self.lock()?.add(tr)
    }

    /// Appends transitions with explicit priorities.
    pub fn add_with_priorities(&self, tr: &TransitionSlice<'_>, ps: &[f32]) -> Result<(), RebuffError> {
        self.lock()?.add_with_priorities(tr, ps)
    }

    /// Draws a batch, see [`PrioritizedReplayBuffer::sample`].
    pub fn sample(&self, batch_size: usize, beta: f32) -> Result<TransitionBatch, RebuffError> {
        self.lock()?.sample(batch_size, beta)
    }

    /// Sets the priorities of stored transitions.
    pub fn update_priorities(&self, ixs: &[usize], ps: &[f32]) -> Result<(), RebuffError> {
        self.lock()?.update_priorities(ixs, ps)
    }

    /// Number of valid slots.
    pub fn stored_size(&self) -> Result<usize, RebuffError> {
        Ok(self.lock()?.stored_size())
    }

    /// Largest priority assigned so far.
    pub fn max_priority(&self) -> Result<f32, RebuffError> {
        Ok(self.lock()?.max_priority())
    }

    /// Forgets every transition and priority.
    pub fn clear(&self) -> Result<(), RebuffError> {
        self.lock()?.clear();
        Ok(())
    }
}

impl From<PrioritizedReplayBuffer> for SharedPrioritizedReplayBuffer {
    fn from(buffer: PrioritizedReplayBuffer) -> Self {
        Self {
            inner: Mutex::new(buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::per::PerConfig;
    use std::{sync::Arc, thread};
    use test_log::test;

    fn is_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_send_sync() {
        is_send_sync::<SharedRingEnvironment>();
        is_send_sync::<SharedSelectiveEnvironment>();
        is_send_sync::<SharedPrioritizedReplayBuffer>();
    }

    #[test]
    fn test_concurrent_ring_stores() {
        const N_THREADS: usize = 4;
        const N_STEPS: usize = 50;
        let config = EnvironmentConfig::default().capacity(N_THREADS * N_STEPS);
        let ring = Arc::new(SharedRingEnvironment::new(&config).unwrap());

        let handles = (0..N_THREADS)
            .map(|t| {
                let ring = ring.clone();
                thread::spawn(move || {
                    for _ in 0..N_STEPS {
                        let v = [t as f32];
                        ring.store(&TransitionSlice::new(&v, &v, &v, &v, &[0]))
                            .unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(ring.stored_size().unwrap(), N_THREADS * N_STEPS);
        let batch = ring.gather(&(0..N_THREADS * N_STEPS).collect::<Vec<_>>()).unwrap();
        for t in 0..N_THREADS {
            let n = batch.reward.iter().filter(|&&r| r == t as f32).count();
            assert_eq!(n, N_STEPS);
        }
        assert!(ring.gather(&[N_THREADS * N_STEPS]).is_err());
        assert_eq!(
            ring.with_transition(3, |tr| tr.map(|tr| tr.len())).unwrap(),
            Some(1)
        );
    }

    #[test]
    fn test_shared_selective() {
        let config = SelectiveEnvironmentConfig::default()
            .episode_len(4)
            .n_episodes(4);
        let env = SharedSelectiveEnvironment::new(&config).unwrap();
        let v = [1.0, 2.0, 3.0];
        env.store(&TransitionSlice::new(&v, &v, &v, &v, &[0, 0, 1]))
            .unwrap();
        env.store(&TransitionSlice::new(&v[..2], &v[..2], &v[..2], &v[..2], &[0, 1]))
            .unwrap();

        assert_eq!(env.stored_episode_size().unwrap(), 2);
        assert_eq!(env.with_episode(1, |ep| ep.reward.to_vec()).unwrap(), vec![1.0, 2.0]);
        assert_eq!(env.delete_episode(0).unwrap(), 3);
        assert_eq!(env.stored_size().unwrap(), 2);
        assert_eq!(env.episode(0).unwrap().map(|e| e.start), Some(0));
        assert_eq!(env.with_episode(5, |ep| ep.len()).unwrap(), 0);
        assert_eq!(env.next_index().unwrap(), 2);
        assert_eq!(env.buffer_size().unwrap(), 16);
        let total = env
            .with_env(|se| se.episodes().iter().map(|e| e.len).sum::<usize>())
            .unwrap();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_concurrent_add_and_sample() {
        let config = ReplayBufferConfig::default()
            .capacity(128)
            .per_config(Some(PerConfig::default()));
        let buffer = Arc::new(SharedPrioritizedReplayBuffer::new(&config).unwrap());
        let v = [0.5f32; 8];
        buffer
            .add(&TransitionSlice::new(&v, &v, &v, &v, &[0; 8]))
            .unwrap();

        let producer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    buffer
                        .add(&TransitionSlice::new(&v[..2], &v[..2], &v[..2], &v[..2], &[0; 2]))
                        .unwrap();
                }
            })
        };
        let consumer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let batch = buffer.sample(8, 0.4).unwrap();
                    let ixs = batch.ix_sample.unwrap();
                    let size = buffer.stored_size().unwrap();
                    assert!(ixs.iter().all(|&i| i < size));
                    buffer.update_priorities(&ixs, &[0.3; 8]).unwrap();
                }
            })
        };
        producer.join().unwrap();
        consumer.join().unwrap();

        assert_eq!(buffer.stored_size().unwrap(), 128);
        assert_eq!(buffer.max_priority().unwrap(), 1.0);
    }
}
