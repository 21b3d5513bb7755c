//! A uniform-random baseline policy.

use std::marker::PhantomData;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{LearnStats, Policy};
use crate::collector::Transition;
use crate::env::Space;

/// Picks uniformly among the actions of a `Discrete` space.
///
/// `learn` only counts how many updates and transitions it has seen; the
/// counts survive a checkpoint round trip.
#[derive(Debug, Clone)]
pub struct RandomPolicy<O> {
    num_actions: usize,
    rng: StdRng,
    training: bool,
    updates: usize,
    transitions_seen: usize,
    _observation: PhantomData<fn(&O)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RandomPolicyState {
    num_actions: usize,
    updates: usize,
    transitions_seen: usize,
}

impl<O> RandomPolicy<O> {
    pub fn new(action_space: &Space, rng: StdRng) -> Result<Self> {
        let Some(num_actions) = action_space.n() else {
            bail!("RandomPolicy needs a discrete action space, got {action_space:?}");
        };
        if num_actions == 0 {
            bail!("RandomPolicy needs at least one action");
        }
        Ok(Self {
            num_actions,
            rng,
            training: true,
            updates: 0,
            transitions_seen: 0,
            _observation: PhantomData,
        })
    }

    /// Number of `learn` calls so far, including any restored from a checkpoint.
    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn transitions_seen(&self) -> usize {
        self.transitions_seen
    }
}

impl<O> Policy for RandomPolicy<O> {
    type Observation = O;
    type Action = usize;

    fn act(&mut self, _agent: &str, _observation: &O) -> Result<usize> {
        Ok(self.rng.gen_range(0..self.num_actions))
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn learn(&mut self, batch: &[Transition<O, usize>]) -> Result<LearnStats> {
        self.updates += 1;
        self.transitions_seen += batch.len();
        Ok(LearnStats {
            loss: 0.0,
            num_transitions: batch.len(),
            extra: serde_json::Map::new(),
        })
    }

    fn state(&self) -> Result<serde_json::Value> {
        let state = RandomPolicyState {
            num_actions: self.num_actions,
            updates: self.updates,
            transitions_seen: self.transitions_seen,
        };
        serde_json::to_value(state).context("failed to serialize RandomPolicy state")
    }

    fn load_state(&mut self, state: serde_json::Value) -> Result<()> {
        let state: RandomPolicyState =
            serde_json::from_value(state).context("failed to parse RandomPolicy state")?;
        if state.num_actions != self.num_actions {
            bail!(
                "checkpoint was saved for {} actions, policy has {}",
                state.num_actions,
                self.num_actions
            );
        }
        self.updates = state.updates;
        self.transitions_seen = state.transitions_seen;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn policy(n: usize, seed: u64) -> RandomPolicy<usize> {
        RandomPolicy::new(&Space::discrete(n), StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn actions_stay_in_range() {
        let mut p = policy(3, 0);
        for _ in 0..200 {
            assert!(p.act("player_0", &0).unwrap() < 3);
        }
    }

    #[test]
    fn same_seed_same_actions() {
        let mut a = policy(5, 9);
        let mut b = policy(5, 9);
        let xs: Vec<_> = (0..20).map(|_| a.act("x", &0).unwrap()).collect();
        let ys: Vec<_> = (0..20).map(|_| b.act("x", &0).unwrap()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn rejects_non_discrete_spaces() {
        let space = Space::Box {
            low: vec![0.0],
            high: vec![1.0],
            shape: vec![1],
        };
        assert!(RandomPolicy::<usize>::new(&space, StdRng::seed_from_u64(0)).is_err());
        assert!(RandomPolicy::<usize>::new(&Space::discrete(0), StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn eval_switches_off_training() {
        let mut p = policy(2, 0);
        assert!(p.is_training());
        p.eval();
        assert!(!p.is_training());
        p.set_training(true);
        assert!(p.is_training());
    }

    #[test]
    fn state_round_trip_keeps_counters() {
        let mut p = policy(3, 0);
        let batch = vec![
            Transition {
                agent: "player_0".into(),
                observation: 3,
                action: 1,
                reward: 1.0,
                next_observation: Some(2),
                terminated: false,
                truncated: false,
            };
            4
        ];
        let stats = p.learn(&batch).unwrap();
        assert_eq!(stats.num_transitions, 4);

        let mut restored = policy(3, 1);
        restored.load_state(p.state().unwrap()).unwrap();
        assert_eq!(restored.updates(), 1);
        assert_eq!(restored.transitions_seen(), 4);
    }

    #[test]
    fn load_state_rejects_mismatched_action_count() {
        let p = policy(3, 0);
        let mut other = policy(4, 0);
        assert!(other.load_state(p.state().unwrap()).is_err());
    }
}
