//! Shoal: run multi-agent experiments on the built-in matrix games.
//!
//! - `run`            -- train a policy, then watch it for a few episodes
//! - `watch`          -- skip training and only watch the (restored) policy
//! - `spaces`         -- print the shared spaces of the selected game
//! - `default-config` -- print the default configuration as JSON

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shoal::agent::RandomAgentFactory;
use shoal::config::{LoggerKind, ShoalConfig};
use shoal::env::{MatrixGame, MatrixGameEnv, MatrixGameEnvFactory, ParallelEnvAdapter};
use shoal::experiment::{Experiment, ExperimentOutcome};
use shoal::logger::DefaultLoggerFactory;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Shoal: multi-agent RL experiments over parallel environments
#[derive(Parser)]
#[command(name = "shoal", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Which matrix game to play (overrides the config file).
    #[arg(long, global = true)]
    game: Option<MatrixGame>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct RunArgs {
    /// Name of the run, used for the log directory.
    #[arg(long, default_value = "shoal")]
    log_name: String,

    /// Seed for the run's random source.
    #[arg(long)]
    seed: Option<u64>,

    /// Checkpoint to restore the policy from before running.
    #[arg(long)]
    resume_path: Option<PathBuf>,

    /// Run id to resume logging under.
    #[arg(long)]
    resume_id: Option<String>,

    /// Number of episodes to watch at the end of the run.
    #[arg(long)]
    episodes: Option<usize>,

    /// Print every frame of the watch pass.
    #[arg(long)]
    render: bool,

    /// Logger backend (overrides the config file).
    #[arg(long)]
    logger: Option<LoggerKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a policy and watch it afterwards.
    Run(RunArgs),

    /// Only watch a policy; nothing is trained.
    Watch(RunArgs),

    /// Print the observation and action spaces of the selected game.
    Spaces,

    /// Print the default configuration as JSON.
    DefaultConfig,
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str::<ShoalConfig>(&text)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        }
        None => ShoalConfig::default(),
    };
    if let Some(game) = cli.game {
        config.env.game = game;
    }

    match cli.command {
        Commands::Run(args) => cmd_run(config, args, false),
        Commands::Watch(args) => cmd_run(config, args, true),
        Commands::Spaces => cmd_spaces(&config),
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&ShoalConfig::default())?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_run(mut config: ShoalConfig, args: RunArgs, watch: bool) -> Result<()> {
    let experiment = &mut config.experiment;
    if let Some(seed) = args.seed {
        experiment.seed = seed;
    }
    if args.resume_path.is_some() {
        experiment.resume_path = args.resume_path;
    }
    if args.resume_id.is_some() {
        experiment.resume_id = args.resume_id;
    }
    if let Some(episodes) = args.episodes {
        experiment.watch_num_episodes = episodes;
    }
    experiment.render |= args.render;
    experiment.watch |= watch;
    if let Some(kind) = args.logger {
        config.logger.kind = kind;
    }

    tracing::info!(
        game = config.env.game.as_str(),
        seed = config.experiment.seed,
        watch = config.experiment.watch,
        "Starting run"
    );

    let experiment = Experiment::from_config(
        &config,
        MatrixGameEnvFactory::new(config.env.clone(), &config.sampling),
        DefaultLoggerFactory::new(config.logger.clone()),
        RandomAgentFactory::new(config.agent.clone(), config.sampling.clone()),
    );
    let outcome = experiment.run(&args.log_name)?;
    print_summary(&outcome);
    Ok(())
}

fn cmd_spaces(config: &ShoalConfig) -> Result<()> {
    let env = MatrixGameEnv::preset(config.env.game, config.env.max_cycles)?;
    let adapter = ParallelEnvAdapter::new(env)?;

    let game = adapter.inner();
    println!("Game: {}", game.name());
    println!("  Agents: {}", adapter.agents().join(", "));
    println!("  Actions per player: {}", game.num_actions());
    println!("  Max cycles: {}", game.max_cycles());
    println!(
        "  Observation space: {}",
        serde_json::to_string(adapter.observation_space())?
    );
    println!(
        "  Action space: {}",
        serde_json::to_string(adapter.action_space())?
    );
    Ok(())
}

fn print_summary(outcome: &ExperimentOutcome) {
    println!("Run summary (seed {})", outcome.seed);
    if let Some(result) = &outcome.train_result {
        println!("  Epochs: {}", result.epochs);
        println!("  Env steps: {}", result.env_steps);
        println!(
            "  Best reward: {:.3} +/- {:.3} (epoch {})",
            result.best_reward, result.best_reward_std, result.best_epoch
        );
        println!("  Duration: {:.2}s", result.duration_secs);
        if result.stopped_early {
            println!("  Stopped early: reward threshold reached");
        }
    } else {
        println!("  Training skipped");
    }

    let stats = &outcome.watch_stats;
    println!(
        "  Watch: {} episodes, reward {:.3}, length {:.1}",
        stats.n_episodes,
        stats.mean_return(),
        stats.mean_length()
    );
    for agent in stats.agent_returns.keys() {
        let mean = stats.agent_mean_return(agent).unwrap_or_default();
        println!("    {agent}: {mean:.3}");
    }
}
