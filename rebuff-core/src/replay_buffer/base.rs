//! Uniform and prioritized replay buffers.
use super::{ReplayBufferConfig, TransitionBatch};
use crate::{
    env::{RingEnvironment, TransitionSlice},
    error::RebuffError,
    nstep::{NstepReturnComputer, NstepSource},
    per::{IwScheduler, PrioritizedSampler},
    ExperienceBufferBase, ReplayBufferBase,
};
use anyhow::{anyhow, Result};
use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn build_nstep(config: &ReplayBufferConfig) -> Result<Option<NstepReturnComputer>, RebuffError> {
    config
        .nstep_config
        .as_ref()
        .map(|c| NstepReturnComputer::new(config.capacity, config.obs_dim, c))
        .transpose()
}

/// Copies the transitions at `ixs` and applies n-step returns if configured.
fn encode_sample(
    ring: &RingEnvironment,
    nstep: Option<&NstepReturnComputer>,
    ixs: &[usize],
) -> Result<TransitionBatch, RebuffError> {
    let mut batch = ring.environment().gather(ixs);
    if let Some(nstep) = nstep {
        let src = NstepSource::from_env(ring.environment(), ring.stored_size(), ring.next_index());
        let nb = nstep.sample(ixs, &src)?;
        batch.reward = nb.ret;
        batch.next_obs = nb.next_obs;
        batch.done = nb.done;
        batch.discount = Some(nb.discount);
    }
    Ok(batch)
}

/// A replay buffer sampling transitions uniformly.
#[derive(Debug)]
pub struct ReplayBuffer {
    ring: RingEnvironment,
    rng: StdRng,
    nstep: Option<NstepReturnComputer>,
}

impl ReplayBuffer {
    /// Creates an empty buffer.
    pub fn new(config: &ReplayBufferConfig) -> Result<Self, RebuffError> {
        let ring = RingEnvironment::new(&config.env_config())?;
        let nstep = build_nstep(config)?;
        if config.per_config.is_some() {
            debug!("ReplayBuffer samples uniformly; per_config is ignored");
        }
        Ok(Self {
            ring,
            rng: StdRng::seed_from_u64(config.seed),
            nstep,
        })
    }

    /// Appends transitions, overwriting the oldest ones when full.
    pub fn add(&mut self, tr: &TransitionSlice<'_>) -> Result<(), RebuffError> {
        self.ring.store(tr)
    }

    /// Draws `batch_size` transitions uniformly with replacement.
    pub fn sample(&mut self, batch_size: usize) -> Result<TransitionBatch, RebuffError> {
        let stored_size = self.ring.stored_size();
        if stored_size == 0 {
            return Err(RebuffError::EmptyBuffer);
        }
        let ixs = (0..batch_size)
            .map(|_| self.rng.gen_range(0..stored_size))
            .collect::<Vec<_>>();
        let mut batch = encode_sample(&self.ring, self.nstep.as_ref(), &ixs)?;
        batch.ix_sample = Some(ixs);
        Ok(batch)
    }

    /// Copies the transitions at `ixs`, each of which must be below
    /// [`ReplayBuffer::stored_size`].
    pub fn encode_sample(&self, ixs: &[usize]) -> Result<TransitionBatch, RebuffError> {
        check_indices(ixs, self.ring.stored_size())?;
        encode_sample(&self.ring, self.nstep.as_ref(), ixs)
    }

    /// Slot to be written next.
    pub fn next_index(&self) -> usize {
        self.ring.next_index()
    }

    /// Number of valid slots.
    pub fn stored_size(&self) -> usize {
        self.ring.stored_size()
    }

    /// Number of slots.
    pub fn buffer_size(&self) -> usize {
        self.ring.buffer_size()
    }

    /// The underlying ring storage.
    pub fn ring(&self) -> &RingEnvironment {
        &self.ring
    }

    /// Forgets every stored transition.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl ExperienceBufferBase for ReplayBuffer {
    type Item = TransitionBatch;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        Ok(self.add(&tr.as_slice())?)
    }

    fn len(&self) -> usize {
        self.stored_size()
    }
}

impl ReplayBufferBase for ReplayBuffer {
    type Config = ReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> Result<Self> {
        Ok(Self::new(config)?)
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        Ok(self.sample(size)?)
    }

    fn update_priority(&mut self, _ixs: &Option<Vec<usize>>, _td_err: &Option<Vec<f32>>) -> Result<()> {
        Ok(())
    }
}

fn check_indices(ixs: &[usize], stored_size: usize) -> Result<(), RebuffError> {
    match ixs.iter().find(|&&ix| ix >= stored_size) {
        Some(&index) => Err(RebuffError::IndexOutOfRange {
            index,
            size: stored_size,
        }),
        None => Ok(()),
    }
}

/// A replay buffer sampling transitions in proportion to their priorities.
///
/// New transitions get the largest priority assigned so far, so they are
/// sampled at least as often as any other transition until a learner
/// rescores them with [`PrioritizedReplayBuffer::update_priorities`].
#[derive(Debug)]
pub struct PrioritizedReplayBuffer {
    ring: RingEnvironment,
    sampler: PrioritizedSampler,
    iw_scheduler: IwScheduler,
    nstep: Option<NstepReturnComputer>,
}

impl PrioritizedReplayBuffer {
    /// Creates an empty buffer.
    pub fn new(config: &ReplayBufferConfig) -> Result<Self, RebuffError> {
        let per_config = config.per_config.clone().unwrap_or_default();
        let ring = RingEnvironment::new(&config.env_config())?;
        let sampler = PrioritizedSampler::new(config.capacity, &per_config, config.seed)?;
        let nstep = build_nstep(config)?;
        debug!(
            "PrioritizedReplayBuffer: alpha={}, normalize={:?}",
            per_config.alpha, per_config.normalize
        );
        Ok(Self {
            ring,
            sampler,
            iw_scheduler: IwScheduler::new(&per_config),
            nstep,
        })
    }

    /// Appends transitions with the current maximum priority.
    pub fn add(&mut self, tr: &TransitionSlice<'_>) -> Result<(), RebuffError> {
        let next_index = self.ring.next_index();
        self.ring.store(tr)?;
        self.sampler.set_priorities_max(next_index, tr.len());
        Ok(())
    }

    /// Appends transitions with explicit priorities, one per transition.
    pub fn add_with_priorities(&mut self, tr: &TransitionSlice<'_>, ps: &[f32]) -> Result<(), RebuffError> {
        if ps.len() != tr.len() {
            return Err(RebuffError::LengthMismatch(tr.len(), ps.len()));
        }
        let next_index = self.ring.next_index();
        if let Some(j) = ps.iter().position(|p| !p.is_finite()) {
            return Err(RebuffError::InvalidPriority((next_index + j) % self.buffer_size()));
        }
        self.ring.store(tr)?;
        self.sampler.set_priorities_from(next_index, ps)
    }

    /// Draws `batch_size` transitions with importance sampling exponent `beta`.
    ///
    /// The batch carries `ix_sample` and `weight`.
    pub fn sample(&mut self, batch_size: usize, beta: f32) -> Result<TransitionBatch, RebuffError> {
        let sb = self.sampler.sample(batch_size, beta, self.ring.stored_size())?;
        let mut batch = encode_sample(&self.ring, self.nstep.as_ref(), &sb.indices)?;
        batch.weight = Some(sb.weights);
        batch.ix_sample = Some(sb.indices);
        Ok(batch)
    }

    /// Sets the priorities of stored transitions.
    ///
    /// Rejected as a whole if any index is at or beyond
    /// [`PrioritizedReplayBuffer::stored_size`].
    pub fn update_priorities(&mut self, ixs: &[usize], ps: &[f32]) -> Result<(), RebuffError> {
        if let Err(e) = check_indices(ixs, self.ring.stored_size()) {
            warn!("PrioritizedReplayBuffer::update_priorities rejected: {}", e);
            return Err(e);
        }
        self.sampler.update_priorities(ixs, ps)
    }

    /// Largest priority assigned so far.
    pub fn max_priority(&self) -> f32 {
        self.sampler.max_priority()
    }

    /// Current importance sampling exponent of the schedule.
    pub fn beta(&self) -> f32 {
        self.iw_scheduler.beta()
    }

    /// Slot to be written next.
    pub fn next_index(&self) -> usize {
        self.ring.next_index()
    }

    /// Number of valid slots.
    pub fn stored_size(&self) -> usize {
        self.ring.stored_size()
    }

    /// Number of slots.
    pub fn buffer_size(&self) -> usize {
        self.ring.buffer_size()
    }

    /// The underlying ring storage.
    pub fn ring(&self) -> &RingEnvironment {
        &self.ring
    }

    /// The underlying sampler.
    pub fn sampler(&self) -> &PrioritizedSampler {
        &self.sampler
    }

    /// Forgets every transition and priority and restarts the beta schedule.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.sampler.clear();
        self.iw_scheduler.reset();
    }
}

impl ExperienceBufferBase for PrioritizedReplayBuffer {
    type Item = TransitionBatch;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        Ok(self.add(&tr.as_slice())?)
    }

    fn len(&self) -> usize {
        self.stored_size()
    }
}

impl ReplayBufferBase for PrioritizedReplayBuffer {
    type Config = ReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> Result<Self> {
        Ok(Self::new(config)?)
    }

    /// Samples with the scheduled value of beta.
    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        let beta = self.iw_scheduler.beta();
        Ok(self.sample(size, beta)?)
    }

    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, td_err: &Option<Vec<f32>>) -> Result<()> {
        let ixs = ixs
            .as_ref()
            .ok_or_else(|| anyhow!("ixs should be Some(_) in update_priority()"))?;
        let td_err = td_err
            .as_ref()
            .ok_or_else(|| anyhow!("td_err should be Some(_) in update_priority()"))?;
        let ps = td_err.iter().map(|e| e.abs()).collect::<Vec<_>>();
        self.update_priorities(ixs, &ps)?;
        self.iw_scheduler.step();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{nstep::NstepConfig, per::PerConfig};
    use test_log::test;

    const OBS_DIM: usize = 3;
    const ACT_DIM: usize = 1;

    /// Transitions whose observations encode a running counter.
    struct Steps {
        obs: Vec<f32>,
        act: Vec<f32>,
        rew: Vec<f32>,
        next_obs: Vec<f32>,
        done: Vec<i8>,
    }

    impl Steps {
        fn new(start: usize, n: usize, done_every: usize) -> Self {
            let ids = (start..start + n).collect::<Vec<_>>();
            Self {
                obs: ids.iter().flat_map(|&i| [i as f32; OBS_DIM]).collect(),
                act: ids.iter().map(|&i| i as f32).collect(),
                rew: vec![1.0; n],
                next_obs: ids.iter().flat_map(|&i| [(i + 1) as f32; OBS_DIM]).collect(),
                done: ids
                    .iter()
                    .map(|&i| ((i + 1) % done_every == 0) as i8)
                    .collect(),
            }
        }

        fn slice(&self) -> TransitionSlice<'_> {
            TransitionSlice::new(&self.obs, &self.act, &self.rew, &self.next_obs, &self.done)
        }
    }

    fn config(capacity: usize) -> ReplayBufferConfig {
        ReplayBufferConfig::default()
            .capacity(capacity)
            .obs_dim(OBS_DIM)
            .act_dim(ACT_DIM)
    }

    #[test]
    fn test_uniform_sample() {
        let mut rb = ReplayBuffer::new(&config(256)).unwrap();
        assert_eq!(rb.sample(4), Err(RebuffError::EmptyBuffer));

        for i in 0..500 {
            rb.add(&Steps::new(i, 1, 1000).slice()).unwrap();
        }
        assert_eq!(rb.stored_size(), 256);

        let batch = rb.sample(32).unwrap();
        assert_eq!(batch.len(), 32);
        assert_eq!(batch.obs.len(), 32 * OBS_DIM);
        assert!(batch.weight.is_none());
        let ixs = batch.ix_sample.unwrap();
        assert!(ixs.iter().all(|&i| i < 256));
        // Observations match the slot they were sampled from.
        for (k, &ix) in ixs.iter().enumerate() {
            assert_eq!(batch.act[k], rb.ring().get(ix).unwrap().act[0]);
        }
    }

    #[test]
    fn test_new_transitions_get_max_priority() {
        let config = config(16).per_config(Some(PerConfig::default().alpha(1.0)));
        let mut rb = PrioritizedReplayBuffer::new(&config).unwrap();
        rb.add(&Steps::new(0, 4, 100).slice()).unwrap();
        assert_eq!(rb.sampler().priority(3), 1.0);

        rb.update_priorities(&[0], &[5.0]).unwrap();
        assert_eq!(rb.max_priority(), 5.0);
        rb.add(&Steps::new(4, 2, 100).slice()).unwrap();
        assert_eq!(rb.sampler().priority(4), 5.0);
        assert_eq!(rb.sampler().priority(5), 5.0);
        assert_eq!(rb.sampler().priority(6), 0.0);

        rb.add_with_priorities(&Steps::new(6, 2, 100).slice(), &[2.0, 3.0])
            .unwrap();
        assert_eq!(rb.sampler().priority(7), 3.0);
    }

    #[test]
    fn test_prioritized_sample() {
        let config = config(64).per_config(Some(PerConfig::default()));
        let mut rb = PrioritizedReplayBuffer::new(&config).unwrap();
        rb.add(&Steps::new(0, 40, 100).slice()).unwrap();

        let batch = rb.sample(16, 0.4).unwrap();
        let ixs = batch.ix_sample.clone().unwrap();
        assert!(ixs.iter().all(|&i| i < 40));
        assert_eq!(batch.weight.as_ref().unwrap().len(), 16);

        let mut ps = vec![0.01; ixs.len()];
        ps[0] = 1e10;
        rb.update_priorities(&ixs, &ps).unwrap();
        let batch = rb.sample(256, 0.4).unwrap();
        let hits = batch
            .ix_sample
            .unwrap()
            .iter()
            .filter(|&&i| i == ixs[0])
            .count();
        assert!(hits > 250);
    }

    #[test]
    fn test_update_beyond_stored_size_is_rejected() {
        let config = config(64).per_config(Some(PerConfig::default()));
        let mut rb = PrioritizedReplayBuffer::new(&config).unwrap();
        rb.add(&Steps::new(0, 10, 100).slice()).unwrap();
        let total = rb.sampler().total_priority();

        assert_eq!(
            rb.update_priorities(&[1, 10], &[3.0, 3.0]),
            Err(RebuffError::IndexOutOfRange { index: 10, size: 10 })
        );
        assert_eq!(rb.sampler().total_priority(), total);
    }

    #[test]
    fn test_invalid_priority_stores_nothing() {
        let config = config(8).per_config(Some(PerConfig::default()));
        let mut rb = PrioritizedReplayBuffer::new(&config).unwrap();
        let r = rb.add_with_priorities(&Steps::new(0, 2, 100).slice(), &[1.0, f32::NAN]);
        assert_eq!(r, Err(RebuffError::InvalidPriority(1)));
        let r = rb.add_with_priorities(&Steps::new(0, 2, 100).slice(), &[f32::INFINITY, 1.0]);
        assert_eq!(r, Err(RebuffError::InvalidPriority(0)));
        assert_eq!(rb.stored_size(), 0);

        rb.add(&Steps::new(0, 4, 100).slice()).unwrap();
        assert!(rb.update_priorities(&[2], &[f32::INFINITY]).is_err());
        let batch = rb.sample(4, 0.4).unwrap();
        assert!(batch.weight.unwrap().iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_nstep_batch() {
        let config = config(32).nstep_config(Some(NstepConfig::default().nstep(3).gamma(0.5)));
        let mut rb = ReplayBuffer::new(&config).unwrap();
        // Episodes of 4 steps: done at slots 3, 7, 11.
        rb.add(&Steps::new(0, 12, 4).slice()).unwrap();

        let batch = rb.encode_sample(&[0, 2, 3, 11]).unwrap();
        assert_eq!(batch.reward, vec![1.75, 1.5, 1.0, 1.0]);
        assert_eq!(batch.discount.unwrap(), vec![0.125, 0.25, 0.5, 0.5]);
        assert_eq!(batch.done, vec![0, 1, 1, 1]);
        // The next observation of slot 2 is that of slot 3.
        assert_eq!(&batch.next_obs[0..OBS_DIM], &[3.0; OBS_DIM]);
        assert_eq!(&batch.next_obs[OBS_DIM..2 * OBS_DIM], &[4.0; OBS_DIM]);
        // Observations themselves are not shifted.
        assert_eq!(&batch.obs[OBS_DIM..2 * OBS_DIM], &[2.0; OBS_DIM]);

        assert!(rb.encode_sample(&[12]).is_err());
    }

    #[test]
    fn test_traits() -> Result<()> {
        fn fill<R>(rb: &mut R) -> Result<()>
        where
            R: ExperienceBufferBase<Item = TransitionBatch>,
        {
            let steps = Steps::new(0, 20, 5);
            rb.push(TransitionBatch::from_slice(&steps.slice()))
        }

        let config = config(32).per_config(Some(PerConfig::default().n_opts_final(10)));
        let mut rb = PrioritizedReplayBuffer::build(&config)?;
        fill(&mut rb)?;
        assert_eq!(rb.len(), 20);

        let batch = rb.batch(8)?;
        let td_err = Some(vec![-2.0; 8]);
        rb.update_priority(&batch.ix_sample, &td_err)?;
        assert_eq!(rb.max_priority(), 2.0);
        assert!((rb.beta() - 0.46).abs() < 1e-6);
        assert!(rb.update_priority(&None, &td_err).is_err());

        let mut rb = ReplayBuffer::build(&config)?;
        fill(&mut rb)?;
        let batch = rb.batch(8)?;
        rb.update_priority(&batch.ix_sample, &td_err)?;

        assert!(ReplayBuffer::build(&config.capacity(0)).is_err());
        Ok(())
    }

    #[test]
    fn test_clear() {
        let config = config(8).per_config(Some(PerConfig::default()));
        let mut rb = PrioritizedReplayBuffer::new(&config).unwrap();
        rb.add(&Steps::new(0, 4, 100).slice()).unwrap();
        rb.update_priorities(&[0], &[9.0]).unwrap();
        rb.clear();
        assert_eq!(rb.stored_size(), 0);
        assert_eq!(rb.max_priority(), 1.0);
        assert_eq!(rb.sample(2, 0.4), Err(RebuffError::EmptyBuffer));
    }
}
