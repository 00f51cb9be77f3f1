//! Monopoly-style rule engine for agent simulation
//!
//! This crate provides the authoritative game logic, including:
//! - The 40-tile board with streets, railroads, utilities and card decks
//! - Player state: cash, position, jail status and owned properties
//! - A turn state machine with dice, doubles, jail and landing resolution
//! - Property and building-shortage auctions, bilateral trades and bankruptcy
//! - Legality masks and an action manager for flat or hierarchical action spaces
//!
//! # Architecture
//!
//! [`GameState`] is the aggregate root. Every change goes through
//! [`GameState::apply_action`], which re-checks the action against the live
//! state and returns the [`GameEvent`]s it caused. Infeasible requests are
//! absorbed as [`GameEvent::Ignored`]; structural violations and bad
//! references are [`GameError`]s.
//!
//! # Modules
//!
//! - [`board`]: Tiles, properties, color sets and rent tables
//! - [`cards`]: Chance and Community Chest decks
//! - [`player`]: Player state
//! - [`game`]: Game state machine and rule primitives
//! - [`auction`]: Auction sub-state
//! - [`trade`]: Trade offers
//! - [`actions`]: Actions, events and no-op reasons
//! - [`mask`]: Per-action legality masks
//! - [`record`]: Action records and notation
//! - [`manager`]: Flat and hierarchical action spaces

pub mod actions;
pub mod auction;
pub mod board;
pub mod cards;
pub mod config;
pub mod game;
pub mod manager;
pub mod mask;
pub mod player;
pub mod record;
pub mod trade;

// Re-export commonly used types
pub use actions::{ActionKind, GameAction, GameEvent, NoOpReason};
pub use auction::{AuctionBid, AuctionItem, AuctionState};
pub use board::{
    Board, BuildingType, ColorSet, Money, PlayerId, Property, PropertyGroup, PropertyId,
    PropertyKind, StreetId, Tile,
};
pub use cards::{Card, CardEffect, Deck, DeckKind};
pub use config::EngineConfig;
pub use game::{ChatMessage, GameError, GameSnapshot, GameState};
pub use manager::{ActionManager, ActionMask, ActionSpace, HierarchicalChoice, StructuredMask};
pub use mask::{ParamChoice, ParamMask, ParamSpec};
pub use player::Player;
pub use record::ActionRecord;
pub use trade::{TradeFailure, TradeOffer};
