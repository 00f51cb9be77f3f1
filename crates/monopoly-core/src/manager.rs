//! Action spaces for agents.
//!
//! `ActionManager` lays every [`ActionKind`] out in a fixed order and exposes
//! the legality of the current actor's choices in one of two shapes:
//!
//! - **Flat**: one discrete index space. Each kind owns a contiguous slice
//!   starting at its offset; the mask is the concatenation of the kinds'
//!   flat masks.
//! - **Hierarchical**: an outer action-type choice plus independently masked
//!   parameters per type.
//!
//! Decoding rejects anything outside the current mask, so an agent that
//! samples from the mask never produces an action the engine refuses.

use crate::actions::{ActionKind, GameAction};
use crate::board::PlayerId;
use crate::config::EngineConfig;
use crate::game::{GameError, GameState};
use crate::mask::{ParamChoice, ParamMask};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Which action space a manager exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActionSpace {
    #[default]
    Flat,
    Hierarchical,
}

/// Legality of every action type and of each type's parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredMask {
    pub action_type: Vec<bool>,
    /// Keyed by action name.
    pub parameters: BTreeMap<String, ParamMask>,
}

/// A mask in either shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionMask {
    Flat(Vec<bool>),
    Structured(StructuredMask),
}

/// A choice in the hierarchical space
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalChoice {
    /// Index into [`ActionManager::kinds`].
    pub action_type: usize,
    pub params: ParamChoice,
    /// Text for `SendMessage`; masks cannot describe free text.
    pub message: Option<String>,
}

/// Maps between agent-facing indices and engine actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionManager {
    config: EngineConfig,
    space: ActionSpace,
    kinds: Vec<ActionKind>,
    offsets: Vec<usize>,
    flat_size: usize,
}

impl ActionManager {
    /// `include_messages` adds `SendMessage` as the last action type.
    pub fn new(config: EngineConfig, space: ActionSpace, include_messages: bool) -> Self {
        let kinds: Vec<ActionKind> = ActionKind::ALL
            .iter()
            .copied()
            .filter(|kind| include_messages || *kind != ActionKind::SendMessage)
            .collect();

        let mut offsets = Vec::with_capacity(kinds.len());
        let mut flat_size = 0;
        for kind in &kinds {
            offsets.push(flat_size);
            flat_size += kind.flat_width(&config);
        }

        Self {
            config,
            space,
            kinds,
            offsets,
            flat_size,
        }
    }

    /// Manager sized by a game's own configuration.
    pub fn for_game(state: &GameState, space: ActionSpace, include_messages: bool) -> Self {
        Self::new(state.config.clone(), space, include_messages)
    }

    pub fn space(&self) -> ActionSpace {
        self.space
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn kinds(&self) -> &[ActionKind] {
        &self.kinds
    }

    /// Width of the flat space.
    pub fn flat_size(&self) -> usize {
        self.flat_size
    }

    pub fn offset(&self, kind: ActionKind) -> Option<usize> {
        self.kind_index(kind).map(|i| self.offsets[i])
    }

    fn kind_index(&self, kind: ActionKind) -> Option<usize> {
        self.kinds.iter().position(|k| *k == kind)
    }

    fn actor(&self, state: &GameState) -> Result<PlayerId, GameError> {
        if state.is_finished() {
            return Err(GameError::GameOver);
        }
        state.current_actor().ok_or(GameError::NoActor)
    }

    // ==================== Masks ====================

    /// Mask in this manager's configured shape.
    pub fn mask(&self, state: &GameState) -> ActionMask {
        match self.space {
            ActionSpace::Flat => ActionMask::Flat(self.flat_mask(state)),
            ActionSpace::Hierarchical => ActionMask::Structured(self.structured_mask(state)),
        }
    }

    pub fn flat_mask(&self, state: &GameState) -> Vec<bool> {
        let Ok(actor) = self.actor(state) else {
            return vec![false; self.flat_size];
        };
        let mut mask = Vec::with_capacity(self.flat_size);
        for kind in &self.kinds {
            mask.extend(kind.flat_mask(state, actor));
        }
        mask
    }

    pub fn structured_mask(&self, state: &GameState) -> StructuredMask {
        let actor = self.actor(state).ok();
        let mut action_type = Vec::with_capacity(self.kinds.len());
        let mut parameters = BTreeMap::new();

        for kind in &self.kinds {
            let masks = match actor {
                Some(actor) => kind.structured_mask(state, actor),
                None => kind
                    .params(&self.config)
                    .into_iter()
                    .map(|p| (p.name.to_string(), vec![false; p.width]))
                    .collect(),
            };
            action_type.push(masks.values().any(|mask| mask.iter().any(|ok| *ok)));
            parameters.insert(kind.name().to_string(), masks);
        }

        StructuredMask {
            action_type,
            parameters,
        }
    }

    /// Flat indices that are legal right now.
    pub fn legal_indices(&self, state: &GameState) -> Vec<usize> {
        self.flat_mask(state)
            .iter()
            .enumerate()
            .filter(|(_, ok)| **ok)
            .map(|(i, _)| i)
            .collect()
    }

    // ==================== Decoding ====================

    /// Action at a flat index, if it is currently legal.
    pub fn decode_flat(&self, state: &GameState, index: usize) -> Result<GameAction, GameError> {
        if index >= self.flat_size {
            return Err(GameError::ActionOutOfRange(index));
        }
        let actor = self.actor(state)?;
        let slot = self
            .offsets
            .iter()
            .rposition(|&offset| offset <= index)
            .ok_or(GameError::ActionOutOfRange(index))?;
        let kind = self.kinds[slot];
        let local = index - self.offsets[slot];

        let action = kind
            .flat_action(&self.config, actor, local)
            .ok_or(GameError::ActionOutOfRange(index))?;
        if !action.is_offered(state) {
            return Err(GameError::IllegalAction(format!(
                "{} at index {}",
                kind.name(),
                index
            )));
        }
        debug!(index, action = kind.name(), "decoded flat action");
        Ok(action)
    }

    /// Action named by a hierarchical choice, if it is currently legal.
    pub fn decode_hierarchical(
        &self,
        state: &GameState,
        choice: &HierarchicalChoice,
    ) -> Result<GameAction, GameError> {
        let kind = *self
            .kinds
            .get(choice.action_type)
            .ok_or(GameError::ActionOutOfRange(choice.action_type))?;
        let actor = self.actor(state)?;
        let masks = kind.structured_mask(state, actor);
        if !masks.values().any(|mask| mask.iter().any(|ok| *ok)) {
            return Err(GameError::IllegalAction(kind.name().to_string()));
        }

        for spec in kind.params(&self.config) {
            let values = choice.params.get(spec.name).map(Vec::as_slice).unwrap_or(&[]);
            if !spec.multi_select && values.len() != 1 {
                return Err(GameError::InvalidParameter(format!(
                    "{} needs exactly one value",
                    spec.name
                )));
            }
            let mask = masks
                .get(spec.name)
                .ok_or_else(|| GameError::InvalidParameter(spec.name.to_string()))?;
            if let Some(&bad) = values.iter().find(|&&v| !mask.get(v).copied().unwrap_or(false)) {
                return Err(GameError::IllegalAction(format!(
                    "{} {}={}",
                    kind.name(),
                    spec.name,
                    bad
                )));
            }
        }

        let action = kind.from_params(state, actor, &choice.params, choice.message.as_deref())?;
        if !action.is_offered(state) {
            return Err(GameError::IllegalAction(kind.name().to_string()));
        }
        debug!(action = kind.name(), "decoded hierarchical action");
        Ok(action)
    }

    /// Flat index of an action, when it has one.
    pub fn encode_flat(&self, action: &GameAction) -> Option<usize> {
        let kind = action.kind();
        let offset = self.offset(kind)?;
        let per_street = self.config.max_build_count as usize;
        let local = match action {
            GameAction::AuctionBid { amount, .. } => usize::try_from(*amount).ok()?,
            GameAction::Mortgage { property, .. } | GameAction::Unmortgage { property, .. } => {
                *property
            }
            GameAction::Build {
                street, quantity, ..
            }
            | GameAction::SellBuilding {
                street, quantity, ..
            } => street * per_street + (*quantity as usize).checked_sub(1)?,
            GameAction::ProposeTrade(_) | GameAction::SendMessage { .. } => return None,
            _ => 0,
        };
        (local < kind.flat_width(&self.config)).then_some(offset + local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn game() -> GameState {
        GameState::new(vec!["A".into(), "B".into()], 3).unwrap()
    }

    #[test]
    fn test_offsets_follow_kind_order() {
        let manager = ActionManager::new(EngineConfig::default(), ActionSpace::Flat, false);
        assert_eq!(manager.offset(ActionKind::RollDice), Some(0));
        assert_eq!(manager.offset(ActionKind::EndTurn), Some(1));
        assert_eq!(manager.offset(ActionKind::AuctionBid), Some(4));
        assert_eq!(manager.offset(ActionKind::Mortgage), Some(4 + 20_581));
        assert_eq!(manager.offset(ActionKind::SendMessage), None);
        // 11 single slots, one bid range, two property ranges, two build grids
        assert_eq!(manager.flat_size(), 11 + 20_581 + 2 * 28 + 2 * 110);
    }

    #[test]
    fn test_messages_are_optional() {
        let with = ActionManager::new(EngineConfig::default(), ActionSpace::Hierarchical, true);
        let without = ActionManager::new(EngineConfig::default(), ActionSpace::Hierarchical, false);
        assert_eq!(with.kinds().len(), 18);
        assert_eq!(without.kinds().len(), 17);
        assert_eq!(with.flat_size(), without.flat_size());
    }

    #[test]
    fn test_decode_flat_respects_mask() {
        let state = game();
        let manager = ActionManager::for_game(&state, ActionSpace::Flat, false);
        assert_eq!(manager.legal_indices(&state), vec![0]);
        assert_eq!(
            manager.decode_flat(&state, 0),
            Ok(GameAction::RollDice {
                player: 0,
                dice: None
            })
        );
        assert!(matches!(
            manager.decode_flat(&state, 1),
            Err(GameError::IllegalAction(_))
        ));
        assert_eq!(
            manager.decode_flat(&state, manager.flat_size()),
            Err(GameError::ActionOutOfRange(manager.flat_size()))
        );
    }

    #[test]
    fn test_encode_inverts_decode() {
        let state = game();
        let manager = ActionManager::for_game(&state, ActionSpace::Flat, false);
        let build = GameAction::Build {
            player: 0,
            street: 2,
            quantity: 3,
        };
        let index = manager.encode_flat(&build).unwrap();
        let offset = manager.offset(ActionKind::Build).unwrap();
        assert_eq!(index, offset + 2 * 5 + 2);
        assert_eq!(
            ActionKind::Build.flat_action(manager.config(), 0, index - offset),
            Some(build)
        );
    }

    #[test]
    fn test_structured_mask_at_start() {
        let state = game();
        let manager = ActionManager::for_game(&state, ActionSpace::Hierarchical, true);
        let mask = manager.structured_mask(&state);
        let legal: Vec<ActionKind> = manager
            .kinds()
            .iter()
            .zip(&mask.action_type)
            .filter(|(_, ok)| **ok)
            .map(|(kind, _)| *kind)
            .collect();
        assert_eq!(
            legal,
            vec![
                ActionKind::RollDice,
                ActionKind::ProposeTrade,
                ActionKind::SendMessage
            ]
        );
        assert_eq!(mask.parameters["RollDice"]["roll"], vec![true]);
    }

    #[test]
    fn test_decode_hierarchical_rejects_masked_values() {
        let state = game();
        let manager = ActionManager::for_game(&state, ActionSpace::Hierarchical, true);
        let roll = manager.kinds().iter().position(|k| *k == ActionKind::RollDice).unwrap();
        let mut choice = HierarchicalChoice {
            action_type: roll,
            ..Default::default()
        };
        choice.params.insert("roll".into(), vec![0]);
        assert!(manager.decode_hierarchical(&state, &choice).is_ok());

        let end = manager.kinds().iter().position(|k| *k == ActionKind::EndTurn).unwrap();
        let mut choice = HierarchicalChoice {
            action_type: end,
            ..Default::default()
        };
        choice.params.insert("valid".into(), vec![0]);
        assert!(manager.decode_hierarchical(&state, &choice).is_err());
    }

    #[test]
    fn test_decode_hierarchical_message() {
        let state = game();
        let manager = ActionManager::for_game(&state, ActionSpace::Hierarchical, true);
        let send = manager.kinds().len() - 1;
        let mut choice = HierarchicalChoice {
            action_type: send,
            message: Some("good luck".into()),
            ..Default::default()
        };
        choice.params.insert("recipient".into(), vec![0]);
        choice.params.insert("message".into(), vec![0]);
        assert_eq!(
            manager.decode_hierarchical(&state, &choice),
            Ok(GameAction::SendMessage {
                player: 0,
                recipient: None,
                message: "good luck".into()
            })
        );
    }

    #[test]
    fn test_finished_game_masks_nothing() {
        let mut state = game();
        state.apply_action(GameAction::Bankruptcy { player: 1 }).unwrap();
        assert!(state.is_finished());
        let manager = ActionManager::for_game(&state, ActionSpace::Flat, false);
        assert!(manager.legal_indices(&state).is_empty());
        assert_eq!(manager.decode_flat(&state, 0), Err(GameError::GameOver));
    }
}
