//! The epoch-based training loop.
//!
//! ```text
//! test the initial policy (epoch 0)
//! for epoch = 1 .. max_epoch:
//!   while epoch steps < step_per_epoch:
//!     collect step_per_collect steps with the train collector
//!     policy.learn(drained buffer)
//!   evaluate episode_per_test episodes with the test collector
//!   keep the best epoch (optionally checkpoint it)
//!   stop once the reward threshold is reached
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::checkpoint::Checkpoint;
use crate::collector::{CollectStats, CollectTarget, Collector};
use crate::config::SamplingConfig;
use crate::env::ParallelEnv;
use crate::logger::ExperimentLogger;
use crate::policy::Policy;

/// What a finished training run reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResult {
    pub epochs: usize,
    pub env_steps: usize,
    pub gradient_steps: usize,
    pub best_reward: f64,
    pub best_reward_std: f64,
    pub best_epoch: usize,
    pub duration_secs: f64,
    pub stopped_early: bool,
}

/// Runs the optimization loop over a policy and its collectors.
pub trait Trainer<E, P>
where
    E: ParallelEnv,
    P: Policy<Observation = E::Observation, Action = E::Action>,
{
    fn run(
        &mut self,
        policy: &mut P,
        train_collector: &mut Collector<E>,
        test_collector: &mut Collector<E>,
        logger: &mut dyn ExperimentLogger,
    ) -> Result<TrainResult>;
}

#[derive(Debug, Clone)]
pub struct EpochTrainer {
    max_epoch: usize,
    step_per_epoch: usize,
    step_per_collect: usize,
    episode_per_test: usize,
    reward_threshold: Option<f64>,
    save_best_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
struct Best {
    epoch: usize,
    reward: f64,
    reward_std: f64,
}

impl EpochTrainer {
    pub fn from_sampling(sampling: &SamplingConfig) -> Self {
        Self {
            max_epoch: sampling.num_epochs,
            step_per_epoch: sampling.step_per_epoch,
            step_per_collect: sampling.step_per_collect,
            episode_per_test: sampling.episode_per_test,
            reward_threshold: sampling.reward_threshold,
            save_best_path: None,
        }
    }

    /// Checkpoint the policy to `path` every time the best test reward improves.
    pub fn with_save_best(mut self, path: Option<PathBuf>) -> Self {
        self.save_best_path = path;
        self
    }

    fn reached_threshold(&self, reward: f64) -> bool {
        self.reward_threshold.is_some_and(|t| reward >= t)
    }

    fn test<E, P>(
        &self,
        policy: &mut P,
        test_collector: &mut Collector<E>,
        logger: &mut dyn ExperimentLogger,
        env_step: usize,
    ) -> Result<CollectStats>
    where
        E: ParallelEnv,
        P: Policy<Observation = E::Observation, Action = E::Action>,
    {
        policy.eval();
        test_collector.reset()?;
        let stats = test_collector.collect(
            policy,
            CollectTarget::Episodes(self.episode_per_test),
            false,
        )?;
        policy.set_training(true);
        logger.log_test_data(&stats, env_step)?;
        Ok(stats)
    }
}

impl<E, P> Trainer<E, P> for EpochTrainer
where
    E: ParallelEnv,
    P: Policy<Observation = E::Observation, Action = E::Action>,
{
    fn run(
        &mut self,
        policy: &mut P,
        train_collector: &mut Collector<E>,
        test_collector: &mut Collector<E>,
        logger: &mut dyn ExperimentLogger,
    ) -> Result<TrainResult> {
        if self.step_per_collect == 0 && self.step_per_epoch > 0 {
            bail!("step_per_collect must be positive when step_per_epoch is");
        }

        let start = Instant::now();
        let mut env_step = 0usize;
        let mut gradient_step = 0usize;
        let mut epochs_run = 0usize;

        info!(
            max_epoch = self.max_epoch,
            step_per_epoch = self.step_per_epoch,
            step_per_collect = self.step_per_collect,
            episode_per_test = self.episode_per_test,
            "starting training"
        );

        train_collector.reset().context("failed to reset train collector")?;

        let initial = self.test(policy, test_collector, logger, env_step)?;
        let mut best = Best {
            epoch: 0,
            reward: initial.mean_return(),
            reward_std: initial.std_return(),
        };
        let mut stopped_early = self.reached_threshold(best.reward);

        if !stopped_early {
            for epoch in 1..=self.max_epoch {
                policy.set_training(true);

                let mut epoch_steps = 0usize;
                while epoch_steps < self.step_per_epoch {
                    let stats = train_collector.collect(
                        policy,
                        CollectTarget::Steps(self.step_per_collect),
                        false,
                    )?;
                    epoch_steps += stats.n_steps;
                    env_step += stats.n_steps;
                    logger.log_train_data(&stats, env_step)?;

                    let batch = train_collector.drain_buffer();
                    let update = policy.learn(&batch).context("policy update failed")?;
                    gradient_step += 1;
                    logger.log_update_data(&update, gradient_step)?;
                }

                let test_stats = self.test(policy, test_collector, logger, env_step)?;
                let reward = test_stats.mean_return();
                epochs_run = epoch;

                if reward > best.reward {
                    best = Best {
                        epoch,
                        reward,
                        reward_std: test_stats.std_return(),
                    };
                    if let Some(path) = &self.save_best_path {
                        Checkpoint::from_policy(&*policy, epoch, Some(reward))?
                            .save_to_file(path)?;
                    }
                }

                info!(
                    epoch,
                    env_step,
                    test_reward = reward,
                    best_reward = best.reward,
                    best_epoch = best.epoch,
                    "epoch completed"
                );

                if self.reached_threshold(reward) {
                    stopped_early = true;
                    break;
                }
            }
        }

        let result = TrainResult {
            epochs: epochs_run,
            env_steps: env_step,
            gradient_steps: gradient_step,
            best_reward: best.reward,
            best_reward_std: best.reward_std,
            best_epoch: best.epoch,
            duration_secs: start.elapsed().as_secs_f64(),
            stopped_early,
        };

        info!(
            epochs = result.epochs,
            env_steps = result.env_steps,
            best_reward = result.best_reward,
            stopped_early,
            "training finished"
        );

        Ok(result)
    }
}
