//! Policy checkpoints on disk.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::Policy;

/// A serialized policy snapshot plus where in training it was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub policy: serde_json::Value,
    /// Epoch the snapshot was taken after (0 = before training).
    pub epoch: usize,
    /// Test mean return at that epoch, if known.
    pub best_reward: Option<f64>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn from_policy<P: Policy>(policy: &P, epoch: usize, best_reward: Option<f64>) -> Result<Self> {
        Ok(Self {
            policy: policy.state()?,
            epoch,
            best_reward,
            saved_at: Utc::now(),
        })
    }

    /// Restore the snapshot into `policy`.
    pub fn restore<P: Policy>(self, policy: &mut P) -> Result<()> {
        policy
            .load_state(self.policy)
            .context("Failed to restore policy from checkpoint")
    }

    /// Serialize the checkpoint to a JSON file, creating parent directories.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize checkpoint to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write checkpoint to {}", path.display()))?;
        tracing::info!(path = %path.display(), epoch = self.epoch, "Saved checkpoint");
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint from {}", path.display()))?;
        let checkpoint: Self =
            serde_json::from_str(&data).context("Failed to deserialize checkpoint JSON")?;
        tracing::info!(path = %path.display(), epoch = checkpoint.epoch, "Loaded checkpoint");
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Transition;
    use crate::env::Space;
    use crate::policy::RandomPolicy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn save_and_load_roundtrip() {
        let mut policy: RandomPolicy<usize> =
            RandomPolicy::new(&Space::discrete(3), StdRng::seed_from_u64(0)).unwrap();
        let batch: Vec<Transition<usize, usize>> = Vec::new();
        policy.learn(&batch).unwrap();
        policy.learn(&batch).unwrap();

        let path = std::env::temp_dir()
            .join(format!("shoal_ckpt_{}", uuid::Uuid::new_v4()))
            .join("best.json");
        Checkpoint::from_policy(&policy, 3, Some(1.5))
            .unwrap()
            .save_to_file(&path)
            .unwrap();

        let loaded = Checkpoint::load_from_file(&path).unwrap();
        assert_eq!(loaded.epoch, 3);
        assert_eq!(loaded.best_reward, Some(1.5));

        let mut fresh: RandomPolicy<usize> =
            RandomPolicy::new(&Space::discrete(3), StdRng::seed_from_u64(1)).unwrap();
        loaded.restore(&mut fresh).unwrap();
        assert_eq!(fresh.updates(), 2);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("shoal_no_such_checkpoint.json");
        assert!(Checkpoint::load_from_file(path).is_err());
    }
}
