//! Shoal: multi-agent reinforcement learning experiments over parallel
//! environments.
//!
//! A parallel environment is adapted into a single-policy view (every agent
//! shares one observation and action space), and an [`experiment::Experiment`]
//! wires environment, logger and agent factories into one seeded run.

pub mod agent;
pub mod collector;
pub mod config;
pub mod env;
pub mod error;
pub mod experiment;
pub mod logger;
pub mod policy;
pub mod rng;
pub mod training;
