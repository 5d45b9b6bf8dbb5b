use anyhow::Result;
use rebuff_core::{
    env::{SelectiveEnvironment, SelectiveEnvironmentConfig, TransitionSlice},
    nstep::NstepConfig,
    per::{PerConfig, WeightNormalizer},
    replay_buffer::{PrioritizedReplayBuffer, ReplayBufferConfig, TransitionBatch},
    ExperienceBufferBase, ReplayBufferBase,
};
use test_log::test;

const OBS_DIM: usize = 4;
const ACT_DIM: usize = 2;

/// One episode of `len` steps whose rewards are all `reward`.
fn episode(len: usize, reward: f32, terminal: bool) -> TransitionBatch {
    let mut done = vec![0i8; len];
    if terminal {
        done[len - 1] = 1;
    }
    TransitionBatch {
        obs: (0..len * OBS_DIM).map(|x| x as f32).collect(),
        act: vec![0.0; len * ACT_DIM],
        next_obs: (0..len * OBS_DIM).map(|x| (x + OBS_DIM) as f32).collect(),
        reward: vec![reward; len],
        done,
        ..TransitionBatch::default()
    }
}

fn config() -> ReplayBufferConfig {
    ReplayBufferConfig::default()
        .capacity(100)
        .obs_dim(OBS_DIM)
        .act_dim(ACT_DIM)
        .seed(7)
        .per_config(Some(
            PerConfig::default()
                .alpha(0.6)
                .n_opts_final(20)
                .normalize(WeightNormalizer::Batch),
        ))
        .nstep_config(Some(NstepConfig::default().nstep(3).gamma(0.9)))
}

#[test]
fn test_training_loop() -> Result<()> {
    let mut buffer = PrioritizedReplayBuffer::build(&config())?;
    for i in 0..30 {
        buffer.push(episode(5, i as f32, true))?;
    }
    assert_eq!(buffer.len(), 100);
    assert_eq!(buffer.next_index(), 50);

    for _ in 0..20 {
        let batch = buffer.batch(32)?;
        assert_eq!(batch.len(), 32);
        assert_eq!(batch.obs.len(), 32 * OBS_DIM);
        assert_eq!(batch.act.len(), 32 * ACT_DIM);

        // Batch normalisation puts the largest weight at 1.
        let weight = batch.weight.as_ref().unwrap();
        let w_max = weight.iter().cloned().fold(f32::MIN, f32::max);
        assert!((w_max - 1.0).abs() < 1e-6);

        // Discounts are gamma^m with m in 1..=3.
        let discount = batch.discount.as_ref().unwrap();
        for d in discount {
            assert!([0.9f32, 0.81, 0.729].iter().any(|e| (d - e).abs() < 1e-6));
        }

        let td_err = batch.reward.iter().map(|r| -r).collect::<Vec<_>>();
        buffer.update_priority(&batch.ix_sample, &Some(td_err))?;
    }
    assert_eq!(buffer.beta(), 1.0);

    // Rewards grow with the episode number, so do priorities after updates.
    assert!(buffer.max_priority() > 1.0);
    Ok(())
}

#[test]
fn test_nstep_returns_stop_at_episode_end() -> Result<()> {
    let mut buffer = PrioritizedReplayBuffer::build(&config())?;
    buffer.push(episode(5, 1.0, true))?;
    buffer.push(episode(5, 2.0, false))?;

    let ixs = (0..10).collect::<Vec<_>>();
    let ps = vec![1.0; 10];
    buffer.update_priorities(&ixs, &ps)?;

    let batch = buffer.sample(200, 0.4)?;
    let ix_sample = batch.ix_sample.as_ref().unwrap();
    for (k, &i) in ix_sample.iter().enumerate() {
        let (r, left) = if i < 5 { (1.0, 5 - i) } else { (2.0, 10 - i) };
        let m = left.min(3);
        let ret: f32 = (0..m).map(|j| r * 0.9f32.powi(j as i32)).sum();
        assert!((batch.reward[k] - ret).abs() < 1e-5, "index {}", i);
        assert_eq!(batch.done[k], (i == 4 || i == 3 || i == 2) as i8);
    }
    Ok(())
}

#[test]
fn test_selective_environment_bookkeeping() -> Result<()> {
    let config = SelectiveEnvironmentConfig::default()
        .episode_len(10)
        .n_episodes(5)
        .obs_dim(OBS_DIM)
        .act_dim(ACT_DIM);
    let mut env = SelectiveEnvironment::new(&config)?;

    let lens = [4, 7, 3, 9];
    for (i, &len) in lens.iter().enumerate() {
        let ep = episode(len, i as f32, true);
        env.store(&ep.as_slice())?;
    }
    assert_eq!(env.stored_episode_size(), 4);
    assert_eq!(env.stored_size(), 23);

    assert_eq!(env.delete_episode(9), 0);
    assert_eq!(env.stored_size(), 23);

    assert_eq!(env.delete_episode(1), 7);
    assert_eq!(env.stored_size(), 16);
    let ep = env.get_episode(1);
    assert_eq!(ep.len(), 3);
    assert!(ep.reward.iter().all(|&r| r == 2.0));
    let ep = env.get_episode(2);
    assert_eq!(ep.obs, &episode(9, 3.0, true).obs[..]);

    let total: usize = env.episodes().iter().map(|e| e.len).sum();
    assert_eq!(total, env.stored_size());
    assert_eq!(env.next_index(), env.stored_size());
    Ok(())
}
