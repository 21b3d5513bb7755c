//! Rollout collection: driving a policy through parallel environments.
//!
//! The [`Collector`] steps its environments round-robin. Each tick it
//!   1. asks the policy for an action for every live agent,
//!   2. steps the environment with the joint action,
//!   3. records one [`Transition`] per acting agent,
//!   4. drops agents that terminated or were truncated.
//!
//! When no live agent remains the episode is recorded in the returned
//! [`CollectStats`] and that environment is reset.

use std::collections::VecDeque;

use anyhow::{bail, Context, Result};

use super::types::{CollectStats, CollectTarget, Transition};
use crate::env::{AgentMap, ParallelEnv, ParallelEnvAdapter};
use crate::policy::Policy;

/// Per-environment episode bookkeeping.
struct EnvSlot<E: ParallelEnv> {
    env: ParallelEnvAdapter<E>,
    /// Observations of the live agents; `None` until the env has been reset.
    observations: Option<AgentMap<E::Observation>>,
    returns: AgentMap<f64>,
    length: usize,
}

impl<E: ParallelEnv> EnvSlot<E> {
    fn reset(&mut self) -> Result<()> {
        let reset = self.env.reset(None)?;
        if reset.observations.is_empty() {
            bail!("environment reset returned no live agents");
        }
        self.returns = reset.observations.keys().map(|a| (a.clone(), 0.0)).collect();
        self.observations = Some(reset.observations);
        self.length = 0;
        Ok(())
    }
}

type Buffer<E> = VecDeque<Transition<<E as ParallelEnv>::Observation, <E as ParallelEnv>::Action>>;

/// Runs a policy inside a set of adapted parallel environments.
pub struct Collector<E: ParallelEnv> {
    /// Label written into log events (e.g. "train", "test").
    label: String,
    slots: Vec<EnvSlot<E>>,
    /// Bounded transition buffer; `None` for collectors that only evaluate.
    buffer: Option<Buffer<E>>,
    buffer_capacity: usize,
    next_env: usize,
}

impl<E: ParallelEnv> Collector<E> {
    /// A collector that keeps no transitions (evaluation).
    pub fn new(label: &str, envs: Vec<ParallelEnvAdapter<E>>) -> Self {
        let slots = envs
            .into_iter()
            .map(|env| EnvSlot {
                env,
                observations: None,
                returns: AgentMap::new(),
                length: 0,
            })
            .collect();
        Self {
            label: label.to_string(),
            slots,
            buffer: None,
            buffer_capacity: 0,
            next_env: 0,
        }
    }

    /// A collector that keeps the most recent `capacity` transitions.
    pub fn with_buffer(label: &str, envs: Vec<ParallelEnvAdapter<E>>, capacity: usize) -> Self {
        let mut collector = Self::new(label, envs);
        collector.buffer = Some(VecDeque::with_capacity(capacity.min(1 << 16)));
        collector.buffer_capacity = capacity;
        collector
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn env_count(&self) -> usize {
        self.slots.len()
    }

    /// Transitions currently held; always 0 for a collector without a buffer.
    pub fn buffer_len(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.len())
    }

    /// Take every buffered transition, oldest first.
    pub fn drain_buffer(&mut self) -> Vec<Transition<E::Observation, E::Action>> {
        self.buffer
            .as_mut()
            .map(|b| b.drain(..).collect())
            .unwrap_or_default()
    }

    /// Reset every environment and discard buffered transitions and
    /// in-progress episodes.
    pub fn reset(&mut self) -> Result<()> {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear();
        }
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.reset()
                .with_context(|| format!("{} collector: failed to reset env {i}", self.label))?;
        }
        self.next_env = 0;
        tracing::debug!(collector = %self.label, envs = self.slots.len(), "collector reset");
        Ok(())
    }

    /// Close every environment.
    pub fn close(&mut self) -> Result<()> {
        for slot in &mut self.slots {
            slot.env.close()?;
        }
        Ok(())
    }

    /// Step the environments until `target` is reached.
    ///
    /// With `render` set, every environment frame is printed to stdout.
    pub fn collect<P>(
        &mut self,
        policy: &mut P,
        target: CollectTarget,
        render: bool,
    ) -> Result<CollectStats>
    where
        P: Policy<Observation = E::Observation, Action = E::Action>,
    {
        let mut stats = CollectStats::default();
        if target.reached(0, 0) {
            return Ok(stats);
        }
        if self.slots.is_empty() {
            bail!("{} collector has no environments", self.label);
        }

        while !target.reached(stats.n_episodes, stats.n_steps) {
            let idx = self.next_env;
            self.next_env = (idx + 1) % self.slots.len();
            self.tick(idx, policy, render, &mut stats)
                .with_context(|| format!("{} collector: env {idx} failed", self.label))?;
        }

        tracing::debug!(
            collector = %self.label,
            episodes = stats.n_episodes,
            steps = stats.n_steps,
            mean_return = stats.mean_return(),
            "collection finished"
        );

        Ok(stats)
    }

    // -- internal helpers ---------------------------------------------------

    fn tick<P>(
        &mut self,
        idx: usize,
        policy: &mut P,
        render: bool,
        stats: &mut CollectStats,
    ) -> Result<()>
    where
        P: Policy<Observation = E::Observation, Action = E::Action>,
    {
        let Self {
            slots,
            buffer,
            buffer_capacity,
            ..
        } = self;
        let slot = &mut slots[idx];

        if slot.observations.is_none() {
            slot.reset()?;
        }
        let observations = slot.observations.take().unwrap_or_default();

        // Ask in possible_agents order so seeded policies are reproducible.
        let acting: Vec<_> = slot
            .env
            .agents()
            .iter()
            .filter(|a| observations.contains_key(*a))
            .cloned()
            .collect();

        let mut actions = AgentMap::with_capacity(acting.len());
        for agent in &acting {
            let action = policy.act(agent, &observations[agent])?;
            actions.insert(agent.clone(), action);
        }

        let step = slot.env.step(actions.clone())?;
        stats.n_steps += 1;
        slot.length += 1;

        if render {
            if let Some(frame) = slot.env.render()? {
                println!("{frame}");
            }
        }

        let dones = step.dones();
        for agent in &acting {
            let reward = step.rewards.get(agent).copied().unwrap_or(0.0);
            *slot.returns.entry(agent.clone()).or_insert(0.0) += reward;

            if let Some(buffer) = buffer.as_mut() {
                if *buffer_capacity == 0 {
                    continue;
                }
                if buffer.len() >= *buffer_capacity {
                    buffer.pop_front();
                }
                let (Some(observation), Some(action)) =
                    (observations.get(agent), actions.get(agent))
                else {
                    continue;
                };
                buffer.push_back(Transition {
                    agent: agent.clone(),
                    observation: observation.clone(),
                    action: action.clone(),
                    reward,
                    next_observation: step.observations.get(agent).cloned(),
                    terminated: step.terminations.get(agent).copied().unwrap_or(false),
                    truncated: step.truncations.get(agent).copied().unwrap_or(false),
                });
            }
        }

        let live: AgentMap<E::Observation> = step
            .observations
            .into_iter()
            .filter(|(agent, _)| !dones.get(agent).copied().unwrap_or(false))
            .collect();

        if live.is_empty() {
            let returns = std::mem::take(&mut slot.returns);
            let episode_return = if returns.is_empty() {
                0.0
            } else {
                returns.values().sum::<f64>() / returns.len() as f64
            };
            for (agent, ret) in returns {
                stats.agent_returns.entry(agent).or_default().push(ret);
            }
            stats.episode_returns.push(episode_return);
            stats.episode_lengths.push(slot.length);
            stats.n_episodes += 1;

            tracing::debug!(
                env = idx,
                length = slot.length,
                episode_return,
                "episode finished"
            );

            slot.reset()?;
        } else {
            slot.observations = Some(live);
        }

        Ok(())
    }
}
