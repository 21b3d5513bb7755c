//! Experiment loggers.
//!
//! An [`ExperimentLogger`] receives the collection and update statistics the
//! trainer produces. Two backends are provided:
//! - [`TracingLogger`] -- structured `tracing` events.
//! - [`JsonlLogger`] -- one JSON record per event in
//!   `<log_dir>/<log_name>/<run_id>/events.jsonl`, next to a `config.json`
//!   holding the run's config dict. Also emits the tracing events.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::collector::CollectStats;
use crate::config::{LoggerConfig, LoggerKind};
use crate::policy::LearnStats;

pub type ConfigDict = serde_json::Map<String, serde_json::Value>;

pub trait ExperimentLogger {
    /// Statistics of a training collection, at `step` environment steps.
    fn log_train_data(&mut self, stats: &CollectStats, step: usize) -> Result<()>;

    /// Statistics of an evaluation pass, at `step` environment steps.
    fn log_test_data(&mut self, stats: &CollectStats, step: usize) -> Result<()>;

    /// Statistics of a policy update, at `step` gradient steps.
    fn log_update_data(&mut self, stats: &LearnStats, step: usize) -> Result<()>;

    /// Final result of a training run.
    fn log_result(&mut self, result: &serde_json::Value) -> Result<()>;

    /// Flush and release any resources.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Builds the logger for a run.
pub trait LoggerFactory {
    fn create_logger(
        &self,
        log_name: &str,
        run_id: Option<&str>,
        config_dict: &ConfigDict,
    ) -> Result<Box<dyn ExperimentLogger>>;
}

// ---------------------------------------------------------------------------
// Tracing backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TracingLogger {
    log_name: String,
    run_id: String,
}

impl TracingLogger {
    pub fn new(log_name: &str, run_id: &str) -> Self {
        Self {
            log_name: log_name.to_string(),
            run_id: run_id.to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn collect_event(&self, scope: &str, stats: &CollectStats, step: usize) {
        info!(
            run = %self.log_name,
            run_id = %self.run_id,
            scope,
            step,
            episodes = stats.n_episodes,
            steps = stats.n_steps,
            mean_return = stats.mean_return(),
            std_return = stats.std_return(),
            mean_length = stats.mean_length(),
            "collect stats"
        );
    }
}

impl ExperimentLogger for TracingLogger {
    fn log_train_data(&mut self, stats: &CollectStats, step: usize) -> Result<()> {
        self.collect_event("train", stats, step);
        Ok(())
    }

    fn log_test_data(&mut self, stats: &CollectStats, step: usize) -> Result<()> {
        self.collect_event("test", stats, step);
        Ok(())
    }

    fn log_update_data(&mut self, stats: &LearnStats, step: usize) -> Result<()> {
        tracing::debug!(
            run = %self.log_name,
            run_id = %self.run_id,
            step,
            loss = stats.loss,
            transitions = stats.num_transitions,
            "update stats"
        );
        Ok(())
    }

    fn log_result(&mut self, result: &serde_json::Value) -> Result<()> {
        info!(
            run = %self.log_name,
            run_id = %self.run_id,
            result = %result,
            "training result"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON-lines backend
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LogRecord<'a, T: Serialize> {
    timestamp: DateTime<Utc>,
    scope: &'a str,
    step: Option<usize>,
    data: &'a T,
}

pub struct JsonlLogger {
    dir: PathBuf,
    events: BufWriter<File>,
    tracing: TracingLogger,
}

impl JsonlLogger {
    /// Create `<log_dir>/<log_name>/<run_id>/`, write `config.json` and open
    /// `events.jsonl` for appending.
    pub fn create(
        log_dir: &Path,
        log_name: &str,
        run_id: &str,
        config_dict: &ConfigDict,
    ) -> Result<Self> {
        let dir = log_dir.join(log_name).join(run_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let config_path = dir.join("config.json");
        let json = serde_json::to_string_pretty(config_dict)
            .context("Failed to serialize run config")?;
        std::fs::write(&config_path, json)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        let events_path = dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)
            .with_context(|| format!("Failed to open {}", events_path.display()))?;

        info!(path = %dir.display(), "JSONL logger ready");

        Ok(Self {
            dir,
            events: BufWriter::new(file),
            tracing: TracingLogger::new(log_name, run_id),
        })
    }

    /// Directory holding `config.json` and `events.jsonl`.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write<T: Serialize>(&mut self, scope: &str, step: Option<usize>, data: &T) -> Result<()> {
        let record = LogRecord {
            timestamp: Utc::now(),
            scope,
            step,
            data,
        };
        serde_json::to_writer(&mut self.events, &record).context("Failed to encode log record")?;
        self.events.write_all(b"\n")?;
        self.events.flush().context("Failed to flush events.jsonl")?;
        Ok(())
    }
}

impl ExperimentLogger for JsonlLogger {
    fn log_train_data(&mut self, stats: &CollectStats, step: usize) -> Result<()> {
        self.tracing.log_train_data(stats, step)?;
        self.write("train", Some(step), stats)
    }

    fn log_test_data(&mut self, stats: &CollectStats, step: usize) -> Result<()> {
        self.tracing.log_test_data(stats, step)?;
        self.write("test", Some(step), stats)
    }

    fn log_update_data(&mut self, stats: &LearnStats, step: usize) -> Result<()> {
        self.tracing.log_update_data(stats, step)?;
        self.write("update", Some(step), stats)
    }

    fn log_result(&mut self, result: &serde_json::Value) -> Result<()> {
        self.tracing.log_result(result)?;
        self.write("result", None, result)
    }

    fn finish(&mut self) -> Result<()> {
        self.events.flush().context("Failed to flush events.jsonl")
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Picks a backend from [`LoggerConfig::kind`]; a missing run id becomes a
/// fresh UUID v4.
#[derive(Debug, Clone)]
pub struct DefaultLoggerFactory {
    config: LoggerConfig,
}

impl DefaultLoggerFactory {
    pub fn new(config: LoggerConfig) -> Self {
        Self { config }
    }
}

impl LoggerFactory for DefaultLoggerFactory {
    fn create_logger(
        &self,
        log_name: &str,
        run_id: Option<&str>,
        config_dict: &ConfigDict,
    ) -> Result<Box<dyn ExperimentLogger>> {
        let run_id = run_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        info!(log_name, run_id = %run_id, kind = ?self.config.kind, "creating logger");

        Ok(match self.config.kind {
            LoggerKind::Tracing => Box::new(TracingLogger::new(log_name, &run_id)),
            LoggerKind::Jsonl => Box::new(JsonlLogger::create(
                &self.config.log_dir,
                log_name,
                &run_id,
                config_dict,
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("shoal_logger_{name}_{}", Uuid::new_v4()))
    }

    fn sample_stats() -> CollectStats {
        CollectStats {
            n_episodes: 2,
            n_steps: 8,
            episode_returns: vec![1.0, 3.0],
            episode_lengths: vec![4, 4],
            ..CollectStats::default()
        }
    }

    #[test]
    fn jsonl_logger_writes_config_and_events() {
        let root = temp_log_dir("events");
        let mut config = ConfigDict::new();
        config.insert("seed".into(), 7.into());

        let mut logger = JsonlLogger::create(&root, "demo", "run-1", &config).unwrap();
        logger.log_train_data(&sample_stats(), 8).unwrap();
        logger.log_test_data(&sample_stats(), 8).unwrap();
        logger
            .log_update_data(&LearnStats::default(), 1)
            .unwrap();
        logger
            .log_result(&serde_json::json!({"best_reward": 2.0}))
            .unwrap();
        logger.finish().unwrap();

        let dir = root.join("demo").join("run-1");
        assert_eq!(logger.dir(), dir.as_path());

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("config.json")).unwrap())
                .unwrap();
        assert_eq!(saved["seed"], 7);

        let events = std::fs::read_to_string(dir.join("events.jsonl")).unwrap();
        let records: Vec<serde_json::Value> = events
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0]["scope"], "train");
        assert_eq!(records[0]["step"], 8);
        assert_eq!(records[0]["data"]["n_steps"], 8);
        assert_eq!(records[2]["scope"], "update");
        assert_eq!(records[3]["scope"], "result");
        assert!(records[3]["step"].is_null());
        assert!(records[3]["timestamp"].is_string());

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn factory_uses_given_run_id() {
        let root = temp_log_dir("factory");
        let factory = DefaultLoggerFactory::new(LoggerConfig {
            kind: LoggerKind::Jsonl,
            log_dir: root.clone(),
        });
        let mut logger = factory
            .create_logger("demo", Some("resume-me"), &ConfigDict::new())
            .unwrap();
        logger.log_train_data(&sample_stats(), 1).unwrap();
        logger.finish().unwrap();

        assert!(root.join("demo/resume-me/events.jsonl").exists());
        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn factory_generates_run_id_when_missing() {
        let root = temp_log_dir("fresh");
        let factory = DefaultLoggerFactory::new(LoggerConfig {
            kind: LoggerKind::Jsonl,
            log_dir: root.clone(),
        });
        factory
            .create_logger("demo", None, &ConfigDict::new())
            .unwrap();

        let runs: Vec<_> = std::fs::read_dir(root.join("demo"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(runs.len(), 1);
        assert!(Uuid::parse_str(&runs[0]).is_ok());
        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn tracing_logger_accepts_everything() {
        let mut logger = TracingLogger::new("demo", "run");
        assert_eq!(logger.run_id(), "run");
        logger.log_train_data(&sample_stats(), 1).unwrap();
        logger.log_test_data(&sample_stats(), 1).unwrap();
        logger.log_update_data(&LearnStats::default(), 1).unwrap();
        logger.log_result(&serde_json::Value::Null).unwrap();
        logger.finish().unwrap();
    }
}
