//! Policies: the decision-making side of a run.
//!
//! A [`Policy`] maps one agent's observation to an action. With a
//! [`ParallelEnvAdapter`](crate::env::ParallelEnvAdapter) every agent shares
//! the same spaces, so one policy instance acts for all of them.

pub mod random;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::collector::Transition;

pub use random::RandomPolicy;

/// What a single `learn` call reports back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnStats {
    pub loss: f64,
    pub num_transitions: usize,
    /// Policy-specific values (learning rate, entropy, ...).
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub trait Policy {
    type Observation;
    type Action;

    /// Choose an action for `agent` given its current observation.
    fn act(&mut self, agent: &str, observation: &Self::Observation) -> Result<Self::Action>;

    /// Switch between training and evaluation behavior.
    fn set_training(&mut self, training: bool);

    fn is_training(&self) -> bool;

    /// Shorthand for `set_training(false)`.
    fn eval(&mut self) {
        self.set_training(false);
    }

    /// Update from a batch of collected transitions.
    fn learn(
        &mut self,
        batch: &[Transition<Self::Observation, Self::Action>],
    ) -> Result<LearnStats>;

    /// Serializable snapshot used by checkpoints.
    fn state(&self) -> Result<serde_json::Value>;

    /// Restore a snapshot produced by [`Policy::state`].
    fn load_state(&mut self, state: serde_json::Value) -> Result<()>;
}
