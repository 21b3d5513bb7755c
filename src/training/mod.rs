//! Training: the epoch loop that alternates collection, policy updates and
//! evaluation, plus on-disk policy checkpoints.

pub mod checkpoint;
pub mod trainer;

pub use checkpoint::Checkpoint;
pub use trainer::{EpochTrainer, TrainResult, Trainer};
