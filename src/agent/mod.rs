//! Agent module: factories that build the policy side of an experiment.
//!
//! The [`AgentFactory`] creates the policy, restores checkpoints, builds the
//! train/test collectors and the trainer.

pub mod factory;

pub use factory::{AgentFactory, RandomAgentFactory};
