//! Bilateral trade offers.

use crate::board::{Money, PlayerId, PropertyId};
use crate::game::GameState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A trade offer from one player to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub proposer: PlayerId,
    pub responder: PlayerId,
    pub cash_offered: Money,
    pub properties_offered: BTreeSet<PropertyId>,
    pub jail_cards_offered: u8,
    pub cash_asked: Money,
    pub properties_asked: BTreeSet<PropertyId>,
    pub jail_cards_asked: u8,
}

/// Why a trade cannot go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeFailure {
    /// Nothing changes hands.
    Empty,
    SamePlayer,
    PlayerGone(PlayerId),
    NegativeCash,
    InsufficientCash(PlayerId),
    InsufficientJailCards(PlayerId),
    NotOwned { player: PlayerId, property: PropertyId },
    HasBuildings(PropertyId),
}

impl fmt::Display for TradeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeFailure::Empty => write!(f, "trade exchanges nothing"),
            TradeFailure::SamePlayer => write!(f, "cannot trade with yourself"),
            TradeFailure::PlayerGone(p) => write!(f, "player {} is no longer in the game", p),
            TradeFailure::NegativeCash => write!(f, "cash amounts must be non-negative"),
            TradeFailure::InsufficientCash(p) => write!(f, "player {} cannot cover the cash", p),
            TradeFailure::InsufficientJailCards(p) => {
                write!(f, "player {} lacks the jail cards", p)
            }
            TradeFailure::NotOwned { player, property } => {
                write!(f, "player {} does not own property {}", player, property)
            }
            TradeFailure::HasBuildings(p) => write!(f, "property {} has buildings", p),
        }
    }
}

impl TradeOffer {
    /// Offer with nothing on either side
    pub fn new(proposer: PlayerId, responder: PlayerId) -> Self {
        Self {
            proposer,
            responder,
            cash_offered: 0,
            properties_offered: BTreeSet::new(),
            jail_cards_offered: 0,
            cash_asked: 0,
            properties_asked: BTreeSet::new(),
            jail_cards_asked: 0,
        }
    }

    pub fn involves(&self, player: PlayerId) -> bool {
        self.proposer == player || self.responder == player
    }

    pub fn is_empty(&self) -> bool {
        self.cash_offered == 0
            && self.cash_asked == 0
            && self.jail_cards_offered == 0
            && self.jail_cards_asked == 0
            && self.properties_offered.is_empty()
            && self.properties_asked.is_empty()
    }

    /// Check the proposer's side only. Used when the offer is made.
    pub fn validate_proposal(&self, state: &GameState) -> Result<(), TradeFailure> {
        if self.proposer == self.responder {
            return Err(TradeFailure::SamePlayer);
        }
        if self.is_empty() {
            return Err(TradeFailure::Empty);
        }
        if self.cash_offered < 0 || self.cash_asked < 0 {
            return Err(TradeFailure::NegativeCash);
        }
        if state.player(self.responder).is_none() {
            return Err(TradeFailure::PlayerGone(self.responder));
        }
        check_side(
            state,
            self.proposer,
            self.cash_offered,
            &self.properties_offered,
            self.jail_cards_offered,
        )
    }

    /// Check both sides against the live state. Used at acceptance.
    pub fn validate(&self, state: &GameState) -> Result<(), TradeFailure> {
        self.validate_proposal(state)?;
        check_side(
            state,
            self.responder,
            self.cash_asked,
            &self.properties_asked,
            self.jail_cards_asked,
        )
    }
}

fn check_side(
    state: &GameState,
    player: PlayerId,
    cash: Money,
    properties: &BTreeSet<PropertyId>,
    jail_cards: u8,
) -> Result<(), TradeFailure> {
    let holder = state
        .player(player)
        .ok_or(TradeFailure::PlayerGone(player))?;
    if !holder.can_afford(cash) {
        return Err(TradeFailure::InsufficientCash(player));
    }
    if holder.jail_free_cards < jail_cards {
        return Err(TradeFailure::InsufficientJailCards(player));
    }
    for &property in properties {
        let owned = state
            .board
            .property(property)
            .map(|p| p.owner == Some(player) && holder.owns(property))
            .unwrap_or(false);
        if !owned {
            return Err(TradeFailure::NotOwned { player, property });
        }
        if state.color_set_has_buildings(property) {
            return Err(TradeFailure::HasBuildings(property));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> GameState {
        GameState::new(vec!["A".into(), "B".into(), "C".into()], 1).unwrap()
    }

    #[test]
    fn test_empty_offer_rejected() {
        let state = game();
        let offer = TradeOffer::new(0, 1);
        assert!(offer.is_empty());
        assert_eq!(offer.validate(&state), Err(TradeFailure::Empty));
    }

    #[test]
    fn test_cash_checked_on_both_sides() {
        let mut state = game();
        let mut offer = TradeOffer::new(0, 1);
        offer.cash_offered = 100;
        offer.cash_asked = 2000;
        assert_eq!(offer.validate_proposal(&state), Ok(()));
        assert_eq!(offer.validate(&state), Err(TradeFailure::InsufficientCash(1)));

        state.players[0].balance = 50;
        assert_eq!(
            offer.validate_proposal(&state),
            Err(TradeFailure::InsufficientCash(0))
        );
    }

    #[test]
    fn test_properties_must_be_owned() {
        let state = game();
        let mut offer = TradeOffer::new(0, 2);
        offer.properties_asked.insert(4);
        assert_eq!(
            offer.validate(&state),
            Err(TradeFailure::NotOwned {
                player: 2,
                property: 4
            })
        );
    }
}
