//! Parallel environment abstractions and concrete implementations.
//!
//! Every environment implements the [`ParallelEnv`] trait. The
//! [`ParallelEnvAdapter`] presents one as a single-policy environment with a
//! shared observation and action space, and [`EnvFactory`] implementations
//! build the train/test [`Environments`] bundle for a run.
//!
//! Included environments:
//! - **Matrix games** ([`matrix_game`]) -- repeated two-player
//!   simultaneous-move games (rock-paper-scissors, coordination, prisoner's
//!   dilemma).

pub mod adapter;
pub mod factory;
pub mod matrix_game;
pub mod traits;

pub use adapter::ParallelEnvAdapter;
pub use factory::{EnvFactory, EnvSpec, Environments, MatrixGameEnvFactory};
pub use matrix_game::{MatrixGame, MatrixGameEnv};
pub use traits::{AgentId, AgentMap, Info, ParallelEnv, ParallelReset, ParallelStep, Space};
