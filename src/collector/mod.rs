//! Rollout collection for parallel environments.
//!
//! This module provides:
//! - [`types::Transition`], [`types::CollectStats`], [`types::CollectTarget`] --
//!   what a collection run records and how long it runs.
//! - [`collector::Collector`] -- drives a policy through adapted parallel
//!   environments and optionally buffers transitions for training.

#[allow(clippy::module_inception)]
pub mod collector;
pub mod types;

pub use collector::Collector;
pub use types::{CollectStats, CollectTarget, Transition};
