//! Random masked self-play.

use monopoly_core::{
    ActionManager, ActionSpace, GameAction, GameError, GameEvent, GameState, HierarchicalChoice,
    StructuredMask,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SimConfig;

/// Hierarchical samples to try before falling back to a flat index.
const HIERARCHICAL_ATTEMPTS: usize = 16;

const CHAT_LINES: &[&str] = &["gl hf", "nice roll", "want to trade?", "gg"];

/// Result of one simulated game
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub seed: u64,
    pub winner: Option<String>,
    pub turns: u32,
    pub steps: usize,
    /// Actions absorbed as no-ops. Should stay zero under masked play.
    pub ignored: usize,
    pub truncated: bool,
}

/// Agent that picks uniformly among masked-in choices.
pub struct RandomAgent {
    manager: ActionManager,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(manager: ActionManager, seed: u64) -> Self {
        Self {
            manager,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn choose(&mut self, state: &GameState) -> Result<GameAction, GameError> {
        match self.manager.space() {
            ActionSpace::Flat => self.choose_flat(state),
            ActionSpace::Hierarchical => {
                let mask = self.manager.structured_mask(state);
                for _ in 0..HIERARCHICAL_ATTEMPTS {
                    let Some(choice) = self.sample_choice(&mask) else {
                        continue;
                    };
                    match self.manager.decode_hierarchical(state, &choice) {
                        Ok(action) => return Ok(action),
                        Err(e) => debug!(error = %e, "hierarchical sample rejected"),
                    }
                }
                self.choose_flat(state)
            }
        }
    }

    fn choose_flat(&mut self, state: &GameState) -> Result<GameAction, GameError> {
        // The flat view is needed even for a hierarchical manager.
        let flat = ActionManager::new(self.manager.config().clone(), ActionSpace::Flat, false);
        let legal = flat.legal_indices(state);
        if legal.is_empty() {
            return Err(GameError::NoActor);
        }
        let index = legal[self.rng.gen_range(0..legal.len())];
        flat.decode_flat(state, index)
    }

    fn sample_choice(&mut self, mask: &StructuredMask) -> Option<HierarchicalChoice> {
        let types: Vec<usize> = (0..mask.action_type.len())
            .filter(|&i| mask.action_type[i])
            .collect();
        if types.is_empty() {
            return None;
        }
        let action_type = types[self.rng.gen_range(0..types.len())];
        let kind = *self.manager.kinds().get(action_type)?;
        let params = mask.parameters.get(kind.name())?;

        let mut choice = HierarchicalChoice {
            action_type,
            message: Some(CHAT_LINES[self.rng.gen_range(0..CHAT_LINES.len())].to_string()),
            ..Default::default()
        };
        for spec in kind.params(self.manager.config()) {
            let legal: Vec<usize> = params
                .get(spec.name)?
                .iter()
                .enumerate()
                .filter(|(_, ok)| **ok)
                .map(|(i, _)| i)
                .collect();
            let values = if spec.multi_select {
                legal.into_iter().filter(|_| self.rng.gen_bool(0.15)).collect()
            } else if legal.is_empty() {
                return None;
            } else {
                vec![legal[self.rng.gen_range(0..legal.len())]]
            };
            choice.params.insert(spec.name.to_string(), values);
        }
        Some(choice)
    }
}

/// Play one game to completion or until the step limit.
pub fn run_game(config: &SimConfig, seed: u64) -> Result<GameSummary, GameError> {
    let names = (1..=config.players).map(|i| format!("Bot{}", i)).collect();
    let mut state = GameState::new(names, seed)?;
    let manager = ActionManager::for_game(&state, config.space, config.include_messages);
    let mut agent = RandomAgent::new(manager, seed.wrapping_add(1));

    let mut steps = 0;
    let mut ignored = 0;
    while !state.is_finished()
        && steps < config.max_steps
        && state.turn_number <= state.config.max_turns
    {
        let action = agent.choose(&state)?;
        let notation = action.to_notation(&state);
        let events = state.apply_action(action)?;
        steps += 1;

        for event in &events {
            if let GameEvent::Ignored { action, reason } = event {
                ignored += 1;
                warn!(?action, ?reason, "masked action was ignored");
            }
        }
        debug!(step = steps, turn = state.turn_number, %notation, "applied");

        debug_assert!(state.ownership_is_consistent());
        debug_assert!(state.bank_is_conserved());
    }

    let winner = state.winner().and_then(|id| state.player(id)).map(|p| p.name.clone());
    let summary = GameSummary {
        seed,
        winner,
        turns: state.turn_number,
        steps,
        ignored,
        truncated: !state.is_finished(),
    };
    info!(
        seed,
        turns = summary.turns,
        steps,
        winner = summary.winner.as_deref().unwrap_or("none"),
        "game finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(space: ActionSpace) -> SimConfig {
        SimConfig {
            games: 1,
            players: 3,
            seed: 0,
            max_steps: 300,
            space,
            include_messages: true,
        }
    }

    #[test]
    fn test_flat_game_runs_without_ignored_actions() {
        let summary = run_game(&sim(ActionSpace::Flat), 3).unwrap();
        assert_eq!(summary.ignored, 0);
        assert!(summary.steps > 0);
    }

    #[test]
    fn test_hierarchical_game_runs_without_ignored_actions() {
        let summary = run_game(&sim(ActionSpace::Hierarchical), 4).unwrap();
        assert_eq!(summary.ignored, 0);
        assert!(summary.truncated || summary.winner.is_some());
    }

    #[test]
    fn test_same_seed_same_game() {
        let a = run_game(&sim(ActionSpace::Flat), 9).unwrap();
        let b = run_game(&sim(ActionSpace::Flat), 9).unwrap();
        assert_eq!(a.turns, b.turns);
        assert_eq!(a.winner, b.winner);
    }
}
