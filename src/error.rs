//! Typed errors for structural problems with environments.
//!
//! Everything else in the crate propagates `anyhow::Error`; these variants
//! exist so callers can tell a badly-shaped environment apart from a failure
//! inside `reset`/`step`.

use thiserror::Error;

/// Which kind of per-agent space a check was looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    Observation,
    Action,
}

impl std::fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observation => f.write_str("observation"),
            Self::Action => f.write_str("action"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("environment declares no agents")]
    NoAgents,

    #[error("agent {agent} has no declared {kind} space")]
    MissingSpace { agent: String, kind: SpaceKind },

    #[error("agent {agent} has a {kind} space that differs from agent {reference}")]
    HeterogeneousSpaces {
        agent: String,
        reference: String,
        kind: SpaceKind,
    },
}
