//! One experiment run, end to end.
//!
//! [`Experiment::run`] sequences the phases of a run in a fixed order:
//!
//! ```text
//! 1. seed the run's random source
//! 2. build the train/test environments
//! 3. build the config dict (all config sections + environment info)
//! 4. create the logger
//! 5. create the policy
//! 6. restore the policy from a checkpoint      (if resume_path is set)
//! 7. create the train/test collectors
//! 8. create and run the trainer                (unless watch is set)
//! 9. watch the policy for a few test episodes  (always)
//! ```
//!
//! The collectors are closed and the logger finished once the watch pass is done.
//!
//! Errors from any collaborator abort the run and propagate to the caller.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::agent::AgentFactory;
use crate::collector::{CollectStats, CollectTarget, Collector};
use crate::config::{AgentConfig, ExperimentConfig, LoggerConfig, SamplingConfig, ShoalConfig};
use crate::env::{EnvFactory, ParallelEnv};
use crate::logger::{ConfigDict, LoggerFactory};
use crate::policy::Policy;
use crate::rng::RunRng;
use crate::training::{TrainResult, Trainer};

/// What a finished run hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentOutcome {
    pub seed: u64,
    /// `None` when training was skipped.
    pub train_result: Option<TrainResult>,
    /// Statistics of the final watch pass.
    pub watch_stats: CollectStats,
}

pub struct Experiment<EF, LF, AF> {
    config: ExperimentConfig,
    logger_config: LoggerConfig,
    agent_config: AgentConfig,
    sampling_config: SamplingConfig,
    env_factory: EF,
    logger_factory: LF,
    agent_factory: AF,
}

impl<EF, LF, AF> Experiment<EF, LF, AF>
where
    EF: EnvFactory,
    LF: LoggerFactory,
    AF: AgentFactory<EF::Env>,
{
    pub fn new(
        config: ExperimentConfig,
        logger_config: LoggerConfig,
        agent_config: AgentConfig,
        sampling_config: SamplingConfig,
        env_factory: EF,
        logger_factory: LF,
        agent_factory: AF,
    ) -> Self {
        Self {
            config,
            logger_config,
            agent_config,
            sampling_config,
            env_factory,
            logger_factory,
            agent_factory,
        }
    }

    /// Take the four config sections from a full [`ShoalConfig`].
    pub fn from_config(
        config: &ShoalConfig,
        env_factory: EF,
        logger_factory: LF,
        agent_factory: AF,
    ) -> Self {
        Self::new(
            config.experiment.clone(),
            config.logger.clone(),
            config.agent.clone(),
            config.sampling.clone(),
            env_factory,
            logger_factory,
            agent_factory,
        )
    }

    fn build_config_dict(&self) -> Result<ConfigDict> {
        let mut dict = ConfigDict::new();
        dict.insert("experiment".into(), serde_json::to_value(&self.config)?);
        dict.insert("logger".into(), serde_json::to_value(&self.logger_config)?);
        dict.insert("agent".into(), serde_json::to_value(&self.agent_config)?);
        dict.insert("sampling".into(), serde_json::to_value(&self.sampling_config)?);
        Ok(dict)
    }

    /// Run every phase once and report the outcome.
    pub fn run(&self, log_name: &str) -> Result<ExperimentOutcome> {
        let device = self.config.device;

        let mut rng = RunRng::from_seed(self.config.seed);
        info!(log_name, seed = rng.seed(), "Starting experiment");

        let envs = self
            .env_factory
            .create_envs(&mut rng)
            .context("Failed to create environments")?;

        let mut config_dict = self
            .build_config_dict()
            .context("Failed to serialize experiment config")?;
        config_dict.extend(envs.info());

        let mut logger = self
            .logger_factory
            .create_logger(log_name, self.config.resume_id.as_deref(), &config_dict)
            .context("Failed to create logger")?;

        let mut policy = self
            .agent_factory
            .create_policy(&envs, device, &mut rng)
            .context("Failed to create policy")?;

        if let Some(path) = &self.config.resume_path {
            self.agent_factory
                .load_checkpoint(&mut policy, path, &envs, device)
                .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
            info!(path = %path.display(), "Restored policy from checkpoint");
        }

        let env_spec = envs.spec().clone();
        let (mut train_collector, mut test_collector) = self
            .agent_factory
            .create_train_test_collector(&policy, envs)
            .context("Failed to create collectors")?;

        let train_result = if self.config.watch {
            info!("Watch mode: skipping training");
            None
        } else {
            let mut trainer = self
                .agent_factory
                .create_trainer(&policy, &env_spec)
                .context("Failed to create trainer")?;
            let result = trainer
                .run(
                    &mut policy,
                    &mut train_collector,
                    &mut test_collector,
                    logger.as_mut(),
                )
                .context("Training failed")?;
            logger.log_result(&serde_json::to_value(&result)?)?;
            Some(result)
        };

        let watch_stats = watch_agent(
            self.config.watch_num_episodes,
            &mut policy,
            &mut test_collector,
            self.config.render,
        )
        .context("Watch pass failed")?;

        train_collector.close()?;
        test_collector.close()?;
        logger.finish()?;

        Ok(ExperimentOutcome {
            seed: self.config.seed,
            train_result,
            watch_stats,
        })
    }
}

/// Evaluate `policy` for `num_episodes` episodes on freshly reset test
/// environments and report the mean reward and episode length.
pub fn watch_agent<E, P>(
    num_episodes: usize,
    policy: &mut P,
    test_collector: &mut Collector<E>,
    render: bool,
) -> Result<CollectStats>
where
    E: ParallelEnv,
    P: Policy<Observation = E::Observation, Action = E::Action>,
{
    policy.eval();
    test_collector.reset()?;
    let stats = test_collector.collect(policy, CollectTarget::Episodes(num_episodes), render)?;
    info!(
        episodes = stats.n_episodes,
        final_reward = stats.mean_return(),
        final_length = stats.mean_length(),
        "Final reward: {:.3}, length: {:.1}",
        stats.mean_return(),
        stats.mean_length()
    );
    Ok(stats)
}
