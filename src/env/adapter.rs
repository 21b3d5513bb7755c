//! Single-policy view over a parallel environment.
//!
//! [`ParallelEnvAdapter`] exposes one `observation_space` and one
//! `action_space` for the whole environment so a single shared policy can act
//! for every agent. Those spaces are read from the first agent in
//! `possible_agents`; all lifecycle calls are forwarded unchanged.

use anyhow::Result;

use super::traits::{AgentId, AgentMap, ParallelEnv, ParallelReset, ParallelStep, Space};
use crate::error::{EnvError, SpaceKind};

/// Wraps a [`ParallelEnv`] whose agents share one observation space and one
/// action space.
#[derive(Debug, Clone)]
pub struct ParallelEnvAdapter<E> {
    env: E,
    agents: Vec<AgentId>,
    observation_space: Space,
    action_space: Space,
}

impl<E: ParallelEnv> ParallelEnvAdapter<E> {
    /// Wrap `env`, checking that every agent declares the same spaces as the
    /// first one.
    pub fn new(env: E) -> Result<Self, EnvError> {
        let adapter = Self::assume_homogeneous(env)?;
        adapter.check_homogeneous()?;
        Ok(adapter)
    }

    /// Wrap `env` using the first agent's spaces without looking at the
    /// other agents.
    pub fn assume_homogeneous(env: E) -> Result<Self, EnvError> {
        let agents = env.possible_agents().to_vec();
        let first = agents.first().ok_or(EnvError::NoAgents)?;

        let observation_space = space_of(env.observation_spaces(), first, SpaceKind::Observation)?;
        let action_space = space_of(env.action_spaces(), first, SpaceKind::Action)?;

        Ok(Self {
            env,
            agents,
            observation_space,
            action_space,
        })
    }

    fn check_homogeneous(&self) -> Result<(), EnvError> {
        let reference = &self.agents[0];
        for agent in &self.agents[1..] {
            let checks = [
                (self.env.observation_spaces(), &self.observation_space, SpaceKind::Observation),
                (self.env.action_spaces(), &self.action_space, SpaceKind::Action),
            ];
            for (spaces, expected, kind) in checks {
                if &space_of(spaces, agent, kind)? != expected {
                    return Err(EnvError::HeterogeneousSpaces {
                        agent: agent.clone(),
                        reference: reference.clone(),
                        kind,
                    });
                }
            }
        }
        Ok(())
    }

    /// Agent ids captured at construction.
    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    /// The observation space shared by all agents.
    pub fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    /// The action space shared by all agents.
    pub fn action_space(&self) -> &Space {
        &self.action_space
    }

    /// The wrapped environment.
    pub fn inner(&self) -> &E {
        &self.env
    }
}

fn space_of(spaces: &AgentMap<Space>, agent: &str, kind: SpaceKind) -> Result<Space, EnvError> {
    spaces
        .get(agent)
        .cloned()
        .ok_or_else(|| EnvError::MissingSpace {
            agent: agent.to_string(),
            kind,
        })
}

impl<E: ParallelEnv> ParallelEnv for ParallelEnvAdapter<E> {
    type Observation = E::Observation;
    type Action = E::Action;

    fn possible_agents(&self) -> &[AgentId] {
        self.env.possible_agents()
    }

    fn observation_spaces(&self) -> &AgentMap<Space> {
        self.env.observation_spaces()
    }

    fn action_spaces(&self) -> &AgentMap<Space> {
        self.env.action_spaces()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<ParallelReset<Self::Observation>> {
        self.env.reset(seed)
    }

    fn step(&mut self, actions: AgentMap<Self::Action>) -> Result<ParallelStep<Self::Observation>> {
        self.env.step(actions)
    }

    fn close(&mut self) -> Result<()> {
        self.env.close()
    }

    fn seed(&mut self, seed: Option<u64>) -> Result<()> {
        self.env.seed(seed)
    }

    fn render(&mut self) -> Result<Option<String>> {
        self.env.render()
    }
}
