//! Data recorded while collecting rollouts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::env::AgentId;

/// One agent's view of one environment tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<O, A> {
    pub agent: AgentId,
    pub observation: O,
    pub action: A,
    pub reward: f64,
    /// `None` when the environment dropped the agent without a final observation.
    pub next_observation: Option<O>,
    pub terminated: bool,
    pub truncated: bool,
}

/// How much a `collect` call should gather.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectTarget {
    /// Stop once this many episodes have finished.
    Episodes(usize),
    /// Stop once this many environment ticks have been taken.
    Steps(usize),
}

impl CollectTarget {
    fn is_zero(&self) -> bool {
        matches!(self, Self::Episodes(0) | Self::Steps(0))
    }

    pub(crate) fn reached(&self, episodes: usize, steps: usize) -> bool {
        self.is_zero()
            || match *self {
                Self::Episodes(n) => episodes >= n,
                Self::Steps(n) => steps >= n,
            }
    }
}

/// Summary of one `collect` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectStats {
    /// Episodes that finished during the call.
    pub n_episodes: usize,
    /// Environment ticks taken during the call.
    pub n_steps: usize,
    /// Per finished episode: the mean over agents of each agent's return.
    pub episode_returns: Vec<f64>,
    /// Per finished episode: number of ticks.
    pub episode_lengths: Vec<usize>,
    /// Per agent: its return in each finished episode it took part in.
    pub agent_returns: BTreeMap<AgentId, Vec<f64>>,
}

impl CollectStats {
    pub fn mean_return(&self) -> f64 {
        mean(&self.episode_returns)
    }

    pub fn std_return(&self) -> f64 {
        if self.episode_returns.is_empty() {
            return 0.0;
        }
        let m = self.mean_return();
        let var = self
            .episode_returns
            .iter()
            .map(|r| (r - m).powi(2))
            .sum::<f64>()
            / self.episode_returns.len() as f64;
        var.sqrt()
    }

    pub fn mean_length(&self) -> f64 {
        if self.episode_lengths.is_empty() {
            return 0.0;
        }
        self.episode_lengths.iter().sum::<usize>() as f64 / self.episode_lengths.len() as f64
    }

    /// Mean return of a single agent over the finished episodes.
    pub fn agent_mean_return(&self, agent: &str) -> Option<f64> {
        self.agent_returns.get(agent).map(|r| mean(r))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
