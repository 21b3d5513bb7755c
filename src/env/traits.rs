//! Core parallel-environment trait and shared types.
//!
//! A parallel environment is stepped with one action per live agent and
//! answers with a per-agent observation, reward, termination, truncation and
//! info. Every environment in the crate implements [`ParallelEnv`] so the
//! adapter and the collector can drive it uniformly.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Identifier of a single agent inside a parallel environment.
pub type AgentId = String;

/// A value per agent, keyed by agent id.
pub type AgentMap<T> = HashMap<AgentId, T>;

/// Free-form per-agent information returned by `reset` and `step`.
pub type Info = serde_json::Value;

// ---------------------------------------------------------------------------
// Spaces
// ---------------------------------------------------------------------------

/// Descriptor of an observation or action space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Space {
    /// `n` options, `0..n`.
    Discrete { n: usize },
    /// A box of continuous values with per-element bounds.
    Box {
        low: Vec<f64>,
        high: Vec<f64>,
        shape: Vec<usize>,
    },
    /// One discrete choice per element, element `i` in `0..nvec[i]`.
    MultiDiscrete { nvec: Vec<usize> },
}

impl Space {
    /// Shorthand for a `Discrete` space.
    pub fn discrete(n: usize) -> Self {
        Self::Discrete { n }
    }

    /// Number of options for a `Discrete` space, `None` otherwise.
    pub fn n(&self) -> Option<usize> {
        match self {
            Self::Discrete { n } => Some(*n),
            _ => None,
        }
    }

    /// Whether `index` is a valid element of a `Discrete` space.
    pub fn contains_discrete(&self, index: usize) -> bool {
        matches!(self, Self::Discrete { n } if index < *n)
    }

    /// Number of scalars needed to represent one element of the space.
    pub fn flat_dim(&self) -> usize {
        match self {
            Self::Discrete { .. } => 1,
            Self::Box { shape, .. } => shape.iter().product(),
            Self::MultiDiscrete { nvec } => nvec.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reset / step bundles
// ---------------------------------------------------------------------------

/// What `reset` hands back: the initial observation and info of every agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelReset<O> {
    pub observations: AgentMap<O>,
    pub infos: AgentMap<Info>,
}

/// The five-part bundle returned by a parallel `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelStep<O> {
    pub observations: AgentMap<O>,
    pub rewards: AgentMap<f64>,
    pub terminations: AgentMap<bool>,
    pub truncations: AgentMap<bool>,
    pub infos: AgentMap<Info>,
}

impl<O> ParallelStep<O> {
    /// The four-part view: an agent is done when terminated or truncated.
    pub fn dones(&self) -> AgentMap<bool> {
        self.terminations
            .iter()
            .map(|(agent, &term)| {
                let trunc = self.truncations.get(agent).copied().unwrap_or(false);
                (agent.clone(), term || trunc)
            })
            .collect()
    }

    /// Whether every agent that reported a flag is finished.
    ///
    /// A step that reports no agents at all counts as finished.
    pub fn all_done(&self) -> bool {
        self.terminations.keys().chain(self.truncations.keys()).all(|agent| {
            self.terminations.get(agent).copied().unwrap_or(false)
                || self.truncations.get(agent).copied().unwrap_or(false)
        })
    }

    /// Whether the step returned no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// The trait
// ---------------------------------------------------------------------------

/// A simultaneous-move multi-agent environment.
pub trait ParallelEnv {
    /// What each agent observes.
    type Observation: Clone;

    /// What each agent submits per tick.
    type Action: Clone;

    /// Every agent that can ever take part, in a stable order.
    fn possible_agents(&self) -> &[AgentId];

    /// Observation space per agent.
    fn observation_spaces(&self) -> &AgentMap<Space>;

    /// Action space per agent.
    fn action_spaces(&self) -> &AgentMap<Space>;

    /// Start a new episode, optionally reseeding first.
    fn reset(&mut self, seed: Option<u64>) -> Result<ParallelReset<Self::Observation>>;

    /// Advance one tick with an action for every live agent.
    fn step(&mut self, actions: AgentMap<Self::Action>) -> Result<ParallelStep<Self::Observation>>;

    /// Release any resources held by the environment.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Seed the environment's internal randomness.
    fn seed(&mut self, seed: Option<u64>) -> Result<()>;

    /// Render the current state as a text frame, if the environment supports it.
    fn render(&mut self) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with(flags: &[(&str, bool, bool)]) -> ParallelStep<u8> {
        let mut step = ParallelStep {
            observations: AgentMap::new(),
            rewards: AgentMap::new(),
            terminations: AgentMap::new(),
            truncations: AgentMap::new(),
            infos: AgentMap::new(),
        };
        for (agent, term, trunc) in flags {
            step.observations.insert(agent.to_string(), 0);
            step.terminations.insert(agent.to_string(), *term);
            step.truncations.insert(agent.to_string(), *trunc);
        }
        step
    }

    #[test]
    fn dones_merge_terminations_and_truncations() {
        let step = step_with(&[("a", true, false), ("b", false, true), ("c", false, false)]);
        let dones = step.dones();
        assert!(dones["a"]);
        assert!(dones["b"]);
        assert!(!dones["c"]);
        assert!(!step.all_done());
    }

    #[test]
    fn all_done_when_every_agent_finished() {
        let step = step_with(&[("a", true, false), ("b", false, true)]);
        assert!(step.all_done());
    }

    #[test]
    fn empty_step_counts_as_done() {
        let step = step_with(&[]);
        assert!(step.is_empty());
        assert!(step.all_done());
    }

    #[test]
    fn space_helpers() {
        let d = Space::discrete(3);
        assert_eq!(d.n(), Some(3));
        assert!(d.contains_discrete(2));
        assert!(!d.contains_discrete(3));
        assert_eq!(d.flat_dim(), 1);

        let b = Space::Box {
            low: vec![0.0; 6],
            high: vec![1.0; 6],
            shape: vec![2, 3],
        };
        assert_eq!(b.n(), None);
        assert!(!b.contains_discrete(0));
        assert_eq!(b.flat_dim(), 6);

        let m = Space::MultiDiscrete { nvec: vec![2, 4] };
        assert_eq!(m.flat_dim(), 2);
    }

    #[test]
    fn space_serializes_with_type_tag() {
        let json = serde_json::to_value(Space::discrete(4)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "discrete", "n": 4}));
    }
}
