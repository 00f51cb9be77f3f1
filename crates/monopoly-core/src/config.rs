//! Engine configuration.
//!
//! Every fixed-width bound that sizes a legality mask, and every rule constant
//! that a variant ruleset might want to change, lives here. `GameState` and
//! `ActionManager` each own a copy.

use serde::{Deserialize, Serialize};

use crate::game::GameError;

/// Rule constants and mask bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on seated players (sizes trade-partner and chat masks).
    pub max_players: usize,
    /// Upper bound on any single cash amount a mask can express.
    pub max_cash: i64,
    /// Number of purchasable properties on the board.
    pub max_properties: usize,
    /// Number of buildable streets on the board.
    pub max_streets: usize,
    /// Largest build/sell quantity in one action.
    pub max_build_count: u8,

    /// Cash each player starts with.
    pub starting_balance: i64,
    /// Salary for passing GO.
    pub go_salary: i64,
    /// Fine paid to leave jail.
    pub jail_fine: i64,
    /// Failed jail rolls before the fine is forced.
    pub max_jail_turns: u8,

    /// Houses held by the bank at the start of a game.
    pub bank_houses: u32,
    /// Hotels held by the bank at the start of a game.
    pub bank_hotels: u32,
    /// A house build triggers a shortage auction at or below this stock.
    pub house_shortage_threshold: u32,
    /// A hotel build triggers a shortage auction at or below this stock.
    pub hotel_shortage_threshold: u32,
    /// Competitors needed (besides the builder) for a house shortage auction.
    pub house_auction_competitors: usize,
    /// Competitors needed (besides the builder) for a hotel shortage auction.
    pub hotel_auction_competitors: usize,

    /// Allow declaring bankruptcy with a non-negative balance.
    pub voluntary_bankruptcy: bool,
    /// Chat messages are truncated to this many characters.
    pub max_message_length: usize,
    /// Turn limit after which a driver should stop the game.
    pub max_turns: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            max_cash: 20_580,
            max_properties: 28,
            max_streets: 22,
            max_build_count: 5,
            starting_balance: 1500,
            go_salary: 200,
            jail_fine: 50,
            max_jail_turns: 3,
            bank_houses: 32,
            bank_hotels: 12,
            house_shortage_threshold: 1,
            hotel_shortage_threshold: 1,
            house_auction_competitors: 2,
            hotel_auction_competitors: 2,
            voluntary_bankruptcy: true,
            max_message_length: 500,
            max_turns: 10_000,
        }
    }
}

impl EngineConfig {
    /// Standard rules.
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
    }

    /// Check that the bounds can describe a game with `player_count` seats.
    pub fn validate(&self, player_count: usize) -> Result<(), GameError> {
        if !(2..=self.max_players).contains(&player_count) {
            return Err(GameError::InvalidPlayerCount(player_count));
        }
        if self.max_build_count == 0 || self.max_cash < self.starting_balance {
            return Err(GameError::InvalidConfig);
        }
        Ok(())
    }

    /// Largest amount expressible by a cash parameter mask.
    pub fn cash_width(&self) -> usize {
        self.max_cash.max(0) as usize + 1
    }
}
