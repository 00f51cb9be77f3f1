//! Player state.
//!
//! Players hold cash, a board position, jail status and the indices of the
//! properties they own. Ownership is mirrored on the property itself;
//! `GameState` keeps both sides in step.

use crate::board::{Money, PlayerId, PropertyId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A seated player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Short code used in action records and notation ("P1", "P2", ...).
    pub code: String,
    pub balance: Money,
    pub position: usize,
    pub properties: BTreeSet<PropertyId>,
    pub in_jail: bool,
    /// Failed attempts to roll out of jail.
    pub jail_turns: u8,
    pub jail_free_cards: u8,
    pub is_bankrupt: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, balance: Money) -> Self {
        Self {
            id,
            name: name.into(),
            code: Self::code_for(id),
            balance,
            position: 0,
            properties: BTreeSet::new(),
            in_jail: false,
            jail_turns: 0,
            jail_free_cards: 0,
            is_bankrupt: false,
        }
    }

    /// Code for a player id
    pub fn code_for(id: PlayerId) -> String {
        format!("P{}", id as u32 + 1)
    }

    pub fn can_afford(&self, amount: Money) -> bool {
        self.balance >= amount
    }

    pub fn owns(&self, property: PropertyId) -> bool {
        self.properties.contains(&property)
    }

    /// Release from jail without moving.
    pub fn release(&mut self) {
        self.in_jail = false;
        self.jail_turns = 0;
    }
}
