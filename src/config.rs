use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::env::MatrixGame;

/// Complete configuration for one experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoalConfig {
    pub experiment: ExperimentConfig,
    pub logger: LoggerConfig,
    pub agent: AgentConfig,
    pub sampling: SamplingConfig,
    pub env: EnvConfig,
}

/// Compute device handed to policy factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Cpu,
    Cuda(usize),
}

/// Run-level settings: seeding, resuming, and the final watch pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Seed for the run's random source (default: 42).
    pub seed: u64,
    /// Device the policy is built for (default: cpu).
    pub device: Device,
    /// Run id to log under; a fresh one is generated when absent.
    pub resume_id: Option<String>,
    /// Checkpoint to restore the policy from before collecting.
    pub resume_path: Option<PathBuf>,
    /// Skip training and only watch the (restored) policy (default: false).
    pub watch: bool,
    /// Episodes to run in the final watch pass (default: 10).
    pub watch_num_episodes: usize,
    /// Render frames during the watch pass (default: false).
    pub render: bool,
}

/// Which logger backend to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LoggerKind {
    /// Structured `tracing` events only.
    Tracing,
    /// JSON lines under `log_dir`, plus tracing events.
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Backend (default: tracing).
    pub kind: LoggerKind,
    /// Root directory for file-backed loggers (default: "logs").
    pub log_dir: PathBuf,
}

/// Settings consumed by agent factories when building policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Discount factor (default: 0.99).
    pub gamma: f64,
    /// Learning rate (default: 1e-3).
    pub learning_rate: f64,
    /// Where the trainer writes the best policy, if anywhere.
    pub save_best_path: Option<PathBuf>,
}

/// Collection and trainer-loop sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Training epochs (default: 10).
    pub num_epochs: usize,
    /// Environment steps per epoch (default: 1000).
    pub step_per_epoch: usize,
    /// Environment steps between policy updates (default: 100).
    pub step_per_collect: usize,
    /// Evaluation episodes after every epoch (default: 10).
    pub episode_per_test: usize,
    /// Transitions kept by the training collector (default: 10000).
    pub buffer_size: usize,
    /// Parallel environments for training (default: 4).
    pub num_train_envs: usize,
    /// Parallel environments for evaluation (default: 2).
    pub num_test_envs: usize,
    /// Stop training once the test mean return reaches this value.
    pub reward_threshold: Option<f64>,
}

/// Which built-in environment to build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Matrix game preset (default: rock_paper_scissors).
    pub game: MatrixGame,
    /// Ticks per episode before both players are truncated (default: 20).
    pub max_cycles: usize,
    /// Reject environments whose agents declare different spaces (default: true).
    pub strict_spaces: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            device: Device::Cpu,
            resume_id: None,
            resume_path: None,
            watch: false,
            watch_num_episodes: 10,
            render: false,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            kind: LoggerKind::Tracing,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            learning_rate: 1e-3,
            save_best_path: None,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            step_per_epoch: 1000,
            step_per_collect: 100,
            episode_per_test: 10,
            buffer_size: 10_000,
            num_train_envs: 4,
            num_test_envs: 2,
            reward_threshold: None,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            game: MatrixGame::RockPaperScissors,
            max_cycles: 20,
            strict_spaces: true,
        }
    }
}

impl Default for ShoalConfig {
    fn default() -> Self {
        Self {
            experiment: ExperimentConfig::default(),
            logger: LoggerConfig::default(),
            agent: AgentConfig::default(),
            sampling: SamplingConfig::default(),
            env: EnvConfig::default(),
        }
    }
}
