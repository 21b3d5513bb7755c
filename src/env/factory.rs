//! Environment factories and the train/test environment bundle they produce.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::adapter::ParallelEnvAdapter;
use super::matrix_game::MatrixGameEnv;
use super::traits::{AgentId, ParallelEnv, Space};
use crate::config::{EnvConfig, SamplingConfig};
use crate::rng::RunRng;

/// Metadata shared by every environment in a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSpec {
    pub name: String,
    pub agents: Vec<AgentId>,
    pub observation_space: Space,
    pub action_space: Space,
    pub num_train_envs: usize,
    pub num_test_envs: usize,
}

/// Training and evaluation environments for one run.
#[derive(Debug)]
pub struct Environments<E> {
    pub train: Vec<ParallelEnvAdapter<E>>,
    pub test: Vec<ParallelEnvAdapter<E>>,
    pub spec: EnvSpec,
}

impl<E: ParallelEnv> Environments<E> {
    /// Bundle adapters, taking the shared spaces from the first training env.
    pub fn new(
        name: &str,
        train: Vec<ParallelEnvAdapter<E>>,
        test: Vec<ParallelEnvAdapter<E>>,
    ) -> Result<Self> {
        let first = train
            .first()
            .or_else(|| test.first())
            .context("an environment bundle needs at least one environment")?;

        let spec = EnvSpec {
            name: name.to_string(),
            agents: first.agents().to_vec(),
            observation_space: first.observation_space().clone(),
            action_space: first.action_space().clone(),
            num_train_envs: train.len(),
            num_test_envs: test.len(),
        };

        if let Some(other) = train
            .iter()
            .chain(test.iter())
            .find(|e| {
                e.observation_space() != &spec.observation_space
                    || e.action_space() != &spec.action_space
            })
        {
            anyhow::bail!(
                "environments in bundle {name} disagree on spaces (agents {:?})",
                other.agents()
            );
        }

        Ok(Self { train, test, spec })
    }

    /// Flat description of the bundle, merged into the logged run config.
    pub fn info(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut info = serde_json::Map::new();
        info.insert("env_name".into(), self.spec.name.clone().into());
        info.insert("agents".into(), serde_json::json!(self.spec.agents));
        info.insert(
            "observation_space".into(),
            serde_json::to_value(&self.spec.observation_space).unwrap_or_default(),
        );
        info.insert(
            "action_space".into(),
            serde_json::to_value(&self.spec.action_space).unwrap_or_default(),
        );
        info.insert("num_train_envs".into(), self.spec.num_train_envs.into());
        info.insert("num_test_envs".into(), self.spec.num_test_envs.into());
        info
    }

    pub fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    pub fn into_parts(self) -> (Vec<ParallelEnvAdapter<E>>, Vec<ParallelEnvAdapter<E>>, EnvSpec) {
        (self.train, self.test, self.spec)
    }
}

/// Builds the environments for a run.
pub trait EnvFactory {
    type Env: ParallelEnv;

    fn create_envs(&self, rng: &mut RunRng) -> Result<Environments<Self::Env>>;
}

/// Builds [`MatrixGameEnv`] bundles from configuration.
#[derive(Debug, Clone)]
pub struct MatrixGameEnvFactory {
    env: EnvConfig,
    num_train_envs: usize,
    num_test_envs: usize,
}

impl MatrixGameEnvFactory {
    pub fn new(env: EnvConfig, sampling: &SamplingConfig) -> Self {
        Self {
            env,
            num_train_envs: sampling.num_train_envs,
            num_test_envs: sampling.num_test_envs,
        }
    }

    fn build(&self, rng: &mut RunRng) -> Result<ParallelEnvAdapter<MatrixGameEnv>> {
        let mut env = MatrixGameEnv::preset(self.env.game, self.env.max_cycles)?;
        env.seed(Some(rng.next_seed()))?;
        let adapter = if self.env.strict_spaces {
            ParallelEnvAdapter::new(env)?
        } else {
            ParallelEnvAdapter::assume_homogeneous(env)?
        };
        Ok(adapter)
    }
}

impl EnvFactory for MatrixGameEnvFactory {
    type Env = MatrixGameEnv;

    fn create_envs(&self, rng: &mut RunRng) -> Result<Environments<MatrixGameEnv>> {
        let train = (0..self.num_train_envs)
            .map(|_| self.build(rng))
            .collect::<Result<Vec<_>>>()
            .context("failed to build training environments")?;
        let test = (0..self.num_test_envs)
            .map(|_| self.build(rng))
            .collect::<Result<Vec<_>>>()
            .context("failed to build test environments")?;

        tracing::info!(
            game = self.env.game.as_str(),
            train = train.len(),
            test = test.len(),
            "created environments"
        );

        Environments::new(self.env.game.as_str(), train, test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MatrixGame;

    fn factory(game: MatrixGame, train: usize, test: usize) -> MatrixGameEnvFactory {
        factory_with(game, train, test, true)
    }

    fn factory_with(
        game: MatrixGame,
        train: usize,
        test: usize,
        strict_spaces: bool,
    ) -> MatrixGameEnvFactory {
        let sampling = SamplingConfig {
            num_train_envs: train,
            num_test_envs: test,
            ..SamplingConfig::default()
        };
        let env = EnvConfig {
            game,
            max_cycles: 3,
            strict_spaces,
        };
        MatrixGameEnvFactory::new(env, &sampling)
    }

    #[test]
    fn builds_requested_env_counts() {
        let mut rng = RunRng::from_seed(1);
        let envs = factory(MatrixGame::Coordination, 3, 2)
            .create_envs(&mut rng)
            .unwrap();
        assert_eq!(envs.train.len(), 3);
        assert_eq!(envs.test.len(), 2);
        assert_eq!(envs.spec().action_space, Space::discrete(3));
        assert_eq!(envs.spec().agents.len(), 2);
    }

    #[test]
    fn info_exports_bundle_metadata() {
        let mut rng = RunRng::from_seed(1);
        let envs = factory(MatrixGame::PrisonersDilemma, 1, 1)
            .create_envs(&mut rng)
            .unwrap();
        let info = envs.info();
        assert_eq!(info["env_name"], "prisoners_dilemma");
        assert_eq!(info["num_train_envs"], 1);
        assert_eq!(info["action_space"]["n"], 2);
        assert_eq!(info["agents"][0], "player_0");
    }

    #[test]
    fn same_seed_builds_same_env_seeds() {
        let build = |seed| {
            let mut rng = RunRng::from_seed(seed);
            let mut envs = factory(MatrixGame::RockPaperScissors, 2, 1)
                .create_envs(&mut rng)
                .unwrap();
            envs.train
                .iter_mut()
                .map(|e| e.reset(None).unwrap().infos["player_0"]["seed"].clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(build(5), build(5));
        assert_ne!(build(5), build(6));
    }

    #[test]
    fn empty_bundle_is_rejected() {
        let mut rng = RunRng::from_seed(1);
        assert!(factory(MatrixGame::Coordination, 0, 0)
            .create_envs(&mut rng)
            .is_err());
    }

    #[test]
    fn lenient_spaces_build_the_same_bundle() {
        let strict = factory_with(MatrixGame::RockPaperScissors, 2, 1, true)
            .create_envs(&mut RunRng::from_seed(4))
            .unwrap();
        let lenient = factory_with(MatrixGame::RockPaperScissors, 2, 1, false)
            .create_envs(&mut RunRng::from_seed(4))
            .unwrap();
        assert_eq!(strict.spec(), lenient.spec());
        assert_eq!(lenient.spec().observation_space, Space::discrete(4));
    }

    #[test]
    fn bundle_with_mismatched_envs_is_rejected() {
        let two = ParallelEnvAdapter::new(MatrixGameEnv::coordination(2, 3).unwrap()).unwrap();
        let three = ParallelEnvAdapter::new(MatrixGameEnv::coordination(3, 3).unwrap()).unwrap();
        let err = Environments::new("mixed", vec![two], vec![three]).unwrap_err();
        assert!(err.to_string().contains("disagree on spaces"));
    }
}
