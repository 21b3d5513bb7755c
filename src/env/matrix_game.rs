//! Repeated two-player matrix games.
//!
//! Both players pick one of `n` actions each tick and are paid according to
//! a pair of payoff tables. Each player observes the opponent's previous
//! action (`n` before the first move). The episode is truncated for both
//! players after `max_cycles` ticks.
//!
//! Presets:
//! - [`MatrixGameEnv::rock_paper_scissors`] -- zero-sum, 3 actions.
//! - [`MatrixGameEnv::coordination`] -- both paid 1 when the actions match.
//! - [`MatrixGameEnv::prisoners_dilemma`] -- cooperate / defect.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::traits::{AgentId, AgentMap, ParallelEnv, ParallelReset, ParallelStep, Space};

const PLAYERS: [&str; 2] = ["player_0", "player_1"];

/// Which payoff table a [`MatrixGameEnv`] is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MatrixGame {
    RockPaperScissors,
    Coordination,
    PrisonersDilemma,
}

impl MatrixGame {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RockPaperScissors => "rock_paper_scissors",
            Self::Coordination => "coordination",
            Self::PrisonersDilemma => "prisoners_dilemma",
        }
    }
}

/// A two-player repeated matrix game.
#[derive(Debug, Clone)]
pub struct MatrixGameEnv {
    name: String,
    num_actions: usize,
    /// `payoffs[a0][a1] = (reward_0, reward_1)`.
    payoffs: Vec<Vec<(f64, f64)>>,
    max_cycles: usize,
    possible_agents: Vec<AgentId>,
    observation_spaces: AgentMap<Space>,
    action_spaces: AgentMap<Space>,
    agents: Vec<AgentId>,
    cycle: usize,
    last_actions: Option<(usize, usize)>,
    seed: Option<u64>,
}

impl MatrixGameEnv {
    /// Build a game from a square payoff table.
    pub fn new(name: &str, payoffs: Vec<Vec<(f64, f64)>>, max_cycles: usize) -> Result<Self> {
        let num_actions = payoffs.len();
        if num_actions == 0 {
            bail!("payoff table for {name} is empty");
        }
        if payoffs.iter().any(|row| row.len() != num_actions) {
            bail!("payoff table for {name} is not square");
        }
        if max_cycles == 0 {
            bail!("max_cycles must be at least 1");
        }

        let possible_agents: Vec<AgentId> = PLAYERS.iter().map(|p| p.to_string()).collect();
        let observation_spaces = possible_agents
            .iter()
            .map(|a| (a.clone(), Space::discrete(num_actions + 1)))
            .collect();
        let action_spaces = possible_agents
            .iter()
            .map(|a| (a.clone(), Space::discrete(num_actions)))
            .collect();

        Ok(Self {
            name: name.to_string(),
            num_actions,
            payoffs,
            max_cycles,
            possible_agents,
            observation_spaces,
            action_spaces,
            agents: Vec::new(),
            cycle: 0,
            last_actions: None,
            seed: None,
        })
    }

    /// Build one of the preset games.
    pub fn preset(game: MatrixGame, max_cycles: usize) -> Result<Self> {
        match game {
            MatrixGame::RockPaperScissors => Self::rock_paper_scissors(max_cycles),
            MatrixGame::Coordination => Self::coordination(3, max_cycles),
            MatrixGame::PrisonersDilemma => Self::prisoners_dilemma(max_cycles),
        }
    }

    pub fn rock_paper_scissors(max_cycles: usize) -> Result<Self> {
        // rock, paper, scissors
        let payoffs = (0..3)
            .map(|a| {
                (0..3)
                    .map(|b| match (3 + a - b) % 3 {
                        0 => (0.0, 0.0),
                        1 => (1.0, -1.0),
                        _ => (-1.0, 1.0),
                    })
                    .collect()
            })
            .collect();
        Self::new(MatrixGame::RockPaperScissors.as_str(), payoffs, max_cycles)
    }

    pub fn coordination(num_actions: usize, max_cycles: usize) -> Result<Self> {
        let payoffs = (0..num_actions)
            .map(|a| {
                (0..num_actions)
                    .map(|b| if a == b { (1.0, 1.0) } else { (0.0, 0.0) })
                    .collect()
            })
            .collect();
        Self::new(MatrixGame::Coordination.as_str(), payoffs, max_cycles)
    }

    pub fn prisoners_dilemma(max_cycles: usize) -> Result<Self> {
        // 0 = cooperate, 1 = defect
        let payoffs = vec![
            vec![(3.0, 3.0), (0.0, 5.0)],
            vec![(5.0, 0.0), (1.0, 1.0)],
        ];
        Self::new(MatrixGame::PrisonersDilemma.as_str(), payoffs, max_cycles)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn max_cycles(&self) -> usize {
        self.max_cycles
    }

    /// Agents still taking part in the current episode.
    pub fn live_agents(&self) -> &[AgentId] {
        &self.agents
    }

    fn observation_for(&self, player: usize) -> usize {
        match self.last_actions {
            Some((a0, a1)) => {
                if player == 0 {
                    a1
                } else {
                    a0
                }
            }
            None => self.num_actions,
        }
    }

    fn action_of(&self, actions: &AgentMap<usize>, player: usize) -> Result<usize> {
        let agent = PLAYERS[player];
        let Some(&action) = actions.get(agent) else {
            bail!("missing action for {agent}");
        };
        if action >= self.num_actions {
            bail!(
                "action {action} for {agent} is out of range (game has {} actions)",
                self.num_actions
            );
        }
        Ok(action)
    }
}

impl ParallelEnv for MatrixGameEnv {
    type Observation = usize;
    type Action = usize;

    fn possible_agents(&self) -> &[AgentId] {
        &self.possible_agents
    }

    fn observation_spaces(&self) -> &AgentMap<Space> {
        &self.observation_spaces
    }

    fn action_spaces(&self) -> &AgentMap<Space> {
        &self.action_spaces
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<ParallelReset<usize>> {
        if seed.is_some() {
            self.seed = seed;
        }
        self.agents = self.possible_agents.clone();
        self.cycle = 0;
        self.last_actions = None;

        tracing::debug!(game = %self.name, seed = ?self.seed, "matrix game reset");

        let observations = self
            .agents
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), self.observation_for(i)))
            .collect();
        let infos = self
            .agents
            .iter()
            .map(|a| (a.clone(), serde_json::json!({ "seed": self.seed })))
            .collect();

        Ok(ParallelReset { observations, infos })
    }

    fn step(&mut self, actions: AgentMap<usize>) -> Result<ParallelStep<usize>> {
        if self.agents.is_empty() {
            bail!("cannot step a finished episode; call reset first");
        }
        if let Some(unknown) = actions.keys().find(|a| !self.agents.contains(a)) {
            bail!("action submitted for unknown agent {unknown}");
        }

        let a0 = self.action_of(&actions, 0)?;
        let a1 = self.action_of(&actions, 1)?;
        let (r0, r1) = self.payoffs[a0][a1];

        self.cycle += 1;
        self.last_actions = Some((a0, a1));
        let truncated = self.cycle >= self.max_cycles;

        let mut step = ParallelStep {
            observations: AgentMap::new(),
            rewards: AgentMap::new(),
            terminations: AgentMap::new(),
            truncations: AgentMap::new(),
            infos: AgentMap::new(),
        };
        for (i, (agent, reward)) in PLAYERS.iter().zip([r0, r1]).enumerate() {
            let agent = agent.to_string();
            step.observations.insert(agent.clone(), self.observation_for(i));
            step.rewards.insert(agent.clone(), reward);
            step.terminations.insert(agent.clone(), false);
            step.truncations.insert(agent.clone(), truncated);
            step.infos
                .insert(agent, serde_json::json!({ "cycle": self.cycle }));
        }

        if truncated {
            self.agents.clear();
        }

        Ok(step)
    }

    fn seed(&mut self, seed: Option<u64>) -> Result<()> {
        self.seed = seed;
        Ok(())
    }

    fn render(&mut self) -> Result<Option<String>> {
        let frame = match self.last_actions {
            Some((a0, a1)) => format!(
                "{} cycle {}/{}: player_0={a0} player_1={a1}",
                self.name, self.cycle, self.max_cycles
            ),
            None => format!("{} cycle 0/{}: no moves yet", self.name, self.max_cycles),
        };
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joint(a0: usize, a1: usize) -> AgentMap<usize> {
        [("player_0".to_string(), a0), ("player_1".to_string(), a1)]
            .into_iter()
            .collect()
    }

    #[test]
    fn rock_paper_scissors_payoffs() {
        let mut env = MatrixGameEnv::rock_paper_scissors(10).unwrap();
        env.reset(None).unwrap();

        // paper beats rock
        let step = env.step(joint(1, 0)).unwrap();
        assert_eq!(step.rewards["player_0"], 1.0);
        assert_eq!(step.rewards["player_1"], -1.0);

        // rock beats scissors
        let step = env.step(joint(0, 2)).unwrap();
        assert_eq!(step.rewards["player_0"], 1.0);

        // scissors loses to rock
        let step = env.step(joint(2, 0)).unwrap();
        assert_eq!(step.rewards["player_0"], -1.0);

        let step = env.step(joint(2, 2)).unwrap();
        assert_eq!(step.rewards["player_0"], 0.0);
        assert_eq!(step.rewards["player_1"], 0.0);
    }

    #[test]
    fn players_observe_opponent_previous_action() {
        let mut env = MatrixGameEnv::coordination(3, 5).unwrap();
        let reset = env.reset(None).unwrap();
        assert_eq!(reset.observations["player_0"], 3);
        assert_eq!(reset.observations["player_1"], 3);

        let step = env.step(joint(0, 2)).unwrap();
        assert_eq!(step.observations["player_0"], 2);
        assert_eq!(step.observations["player_1"], 0);
        assert_eq!(step.rewards["player_0"], 0.0);

        let step = env.step(joint(1, 1)).unwrap();
        assert_eq!(step.rewards["player_0"], 1.0);
        assert_eq!(step.rewards["player_1"], 1.0);
    }

    #[test]
    fn truncates_after_max_cycles() {
        let mut env = MatrixGameEnv::prisoners_dilemma(2).unwrap();
        env.reset(None).unwrap();

        let step = env.step(joint(0, 0)).unwrap();
        assert!(!step.all_done());
        let step = env.step(joint(1, 0)).unwrap();
        assert!(step.all_done());
        assert!(step.truncations["player_0"]);
        assert!(!step.terminations["player_0"]);
        assert_eq!(step.rewards["player_0"], 5.0);
        assert!(env.live_agents().is_empty());

        assert!(env.step(joint(0, 0)).is_err());
        env.reset(None).unwrap();
        assert_eq!(env.live_agents().len(), 2);
    }

    #[test]
    fn rejects_bad_actions() {
        let mut env = MatrixGameEnv::rock_paper_scissors(3).unwrap();
        env.reset(None).unwrap();

        assert!(env.step(joint(3, 0)).is_err());

        let mut missing = AgentMap::new();
        missing.insert("player_0".to_string(), 0);
        assert!(env.step(missing).is_err());

        let mut unknown = joint(0, 0);
        unknown.insert("player_9".to_string(), 0);
        assert!(env.step(unknown).is_err());
    }

    #[test]
    fn rejects_malformed_tables() {
        assert!(MatrixGameEnv::new("empty", Vec::new(), 1).is_err());
        assert!(MatrixGameEnv::new("ragged", vec![vec![(0.0, 0.0)], vec![]], 1).is_err());
        assert!(MatrixGameEnv::coordination(2, 0).is_err());
    }

    #[test]
    fn seed_is_reported_in_reset_infos() {
        let mut env = MatrixGameEnv::coordination(2, 1).unwrap();
        env.seed(Some(11)).unwrap();
        let reset = env.reset(None).unwrap();
        assert_eq!(reset.infos["player_0"]["seed"], 11);

        let reset = env.reset(Some(12)).unwrap();
        assert_eq!(reset.infos["player_1"]["seed"], 12);
    }

    #[test]
    fn render_describes_last_joint_action() {
        let mut env = MatrixGameEnv::rock_paper_scissors(4).unwrap();
        env.reset(None).unwrap();
        assert!(env.render().unwrap().unwrap().contains("no moves yet"));
        env.step(joint(1, 2)).unwrap();
        let frame = env.render().unwrap().unwrap();
        assert!(frame.contains("player_0=1"));
        assert!(frame.contains("player_1=2"));
    }

    #[test]
    fn spaces_are_uniform_across_players() {
        let env = MatrixGameEnv::rock_paper_scissors(1).unwrap();
        assert_eq!(env.action_spaces()["player_0"], Space::discrete(3));
        assert_eq!(env.action_spaces()["player_1"], Space::discrete(3));
        assert_eq!(env.observation_spaces()["player_1"], Space::discrete(4));
    }

    #[test]
    fn presets_report_their_shape() {
        let env = MatrixGameEnv::preset(MatrixGame::Coordination, 7).unwrap();
        assert_eq!(env.name(), "coordination");
        assert_eq!(env.num_actions(), 3);
        assert_eq!(env.max_cycles(), 7);

        let env = MatrixGameEnv::preset(MatrixGame::PrisonersDilemma, 2).unwrap();
        assert_eq!(env.name(), "prisoners_dilemma");
        assert_eq!(env.num_actions(), 2);
    }
}
