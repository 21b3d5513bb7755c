//! Agent factories: everything policy-shaped an experiment needs.
//!
//! An [`AgentFactory`] builds the policy for a run, restores it from a
//! checkpoint, wires up the train/test collectors and creates the trainer.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::collector::Collector;
use crate::config::{AgentConfig, Device, SamplingConfig};
use crate::env::{EnvSpec, Environments, ParallelEnv};
use crate::policy::{Policy, RandomPolicy};
use crate::rng::{streams, RunRng};
use crate::training::{Checkpoint, EpochTrainer, Trainer};

pub trait AgentFactory<E: ParallelEnv> {
    type Policy: Policy<Observation = E::Observation, Action = E::Action>;
    type Trainer: Trainer<E, Self::Policy>;

    fn create_policy(
        &self,
        envs: &Environments<E>,
        device: Device,
        rng: &mut RunRng,
    ) -> Result<Self::Policy>;

    /// Restore `policy` from the checkpoint at `path`.
    fn load_checkpoint(
        &self,
        policy: &mut Self::Policy,
        path: &Path,
        envs: &Environments<E>,
        device: Device,
    ) -> Result<()> {
        let _ = (envs, device);
        Checkpoint::load_from_file(path)?.restore(policy)
    }

    /// Split the environment bundle into a training and an evaluation collector.
    fn create_train_test_collector(
        &self,
        policy: &Self::Policy,
        envs: Environments<E>,
    ) -> Result<(Collector<E>, Collector<E>)>;

    fn create_trainer(&self, policy: &Self::Policy, env_spec: &EnvSpec) -> Result<Self::Trainer>;
}

/// Uniform-random policy with an [`EpochTrainer`]; works with any
/// environment whose actions are discrete indices.
#[derive(Debug, Clone)]
pub struct RandomAgentFactory {
    agent: AgentConfig,
    sampling: SamplingConfig,
}

impl RandomAgentFactory {
    pub fn new(agent: AgentConfig, sampling: SamplingConfig) -> Self {
        Self { agent, sampling }
    }
}

impl<E> AgentFactory<E> for RandomAgentFactory
where
    E: ParallelEnv<Action = usize>,
{
    type Policy = RandomPolicy<E::Observation>;
    type Trainer = EpochTrainer;

    fn create_policy(
        &self,
        envs: &Environments<E>,
        device: Device,
        rng: &mut RunRng,
    ) -> Result<Self::Policy> {
        if device != Device::Cpu {
            warn!(?device, "RandomPolicy always runs on the CPU");
        }
        let policy = RandomPolicy::new(&envs.spec().action_space, rng.fork(streams::POLICY))
            .with_context(|| format!("cannot build a policy for {}", envs.spec().name))?;
        info!(env = %envs.spec().name, action_space = ?envs.spec().action_space, "created random policy");
        Ok(policy)
    }

    fn create_train_test_collector(
        &self,
        _policy: &Self::Policy,
        envs: Environments<E>,
    ) -> Result<(Collector<E>, Collector<E>)> {
        let (train, test, _) = envs.into_parts();
        Ok((
            Collector::with_buffer("train", train, self.sampling.buffer_size),
            Collector::new("test", test),
        ))
    }

    fn create_trainer(&self, _policy: &Self::Policy, env_spec: &EnvSpec) -> Result<EpochTrainer> {
        info!(
            env = %env_spec.name,
            gamma = self.agent.gamma,
            learning_rate = self.agent.learning_rate,
            "created epoch trainer"
        );
        Ok(EpochTrainer::from_sampling(&self.sampling)
            .with_save_best(self.agent.save_best_path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::env::{EnvFactory, MatrixGame, MatrixGameEnvFactory};

    fn envs(sampling: &SamplingConfig) -> Environments<crate::env::MatrixGameEnv> {
        let env = EnvConfig {
            game: MatrixGame::RockPaperScissors,
            max_cycles: 3,
            strict_spaces: true,
        };
        MatrixGameEnvFactory::new(env, sampling)
            .create_envs(&mut RunRng::from_seed(0))
            .unwrap()
    }

    #[test]
    fn collectors_split_the_bundle() {
        let sampling = SamplingConfig {
            num_train_envs: 3,
            num_test_envs: 1,
            buffer_size: 50,
            ..SamplingConfig::default()
        };
        let factory = RandomAgentFactory::new(AgentConfig::default(), sampling.clone());
        let envs = envs(&sampling);
        let policy = factory
            .create_policy(&envs, Device::Cpu, &mut RunRng::from_seed(0))
            .unwrap();

        let (train, test) = factory.create_train_test_collector(&policy, envs).unwrap();
        assert_eq!(train.env_count(), 3);
        assert_eq!(test.env_count(), 1);
        assert_eq!(train.label(), "train");
        assert_eq!(test.label(), "test");
    }

    #[test]
    fn default_checkpoint_loading_restores_policy() {
        let sampling = SamplingConfig::default();
        let factory = RandomAgentFactory::new(AgentConfig::default(), sampling.clone());
        let envs = envs(&sampling);
        let mut rng = RunRng::from_seed(0);

        let mut trained = factory.create_policy(&envs, Device::Cpu, &mut rng).unwrap();
        trained.learn(&[]).unwrap();
        let path = std::env::temp_dir().join(format!("shoal_agent_{}.json", uuid::Uuid::new_v4()));
        Checkpoint::from_policy(&trained, 1, None)
            .unwrap()
            .save_to_file(&path)
            .unwrap();

        let mut fresh = factory.create_policy(&envs, Device::Cpu, &mut rng).unwrap();
        factory
            .load_checkpoint(&mut fresh, &path, &envs, Device::Cpu)
            .unwrap();
        assert_eq!(fresh.updates(), 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_checkpoint_propagates() {
        let sampling = SamplingConfig::default();
        let factory = RandomAgentFactory::new(AgentConfig::default(), sampling.clone());
        let envs = envs(&sampling);
        let mut policy = factory
            .create_policy(&envs, Device::Cpu, &mut RunRng::from_seed(0))
            .unwrap();
        let path = std::env::temp_dir().join("shoal_missing_agent_checkpoint.json");
        assert!(factory
            .load_checkpoint(&mut policy, &path, &envs, Device::Cpu)
            .is_err());
    }
}
