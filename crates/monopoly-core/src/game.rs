//! Core game state machine.
//!
//! `GameState` is the aggregate root. It owns the board, the players, the bank
//! inventory, the card decks and the optional auction and trade sub-states.
//! Actions (see [`crate::actions`]) validate against it and mutate it through
//! the rule primitives defined here: movement, landing resolution, rent, jail,
//! build planning, auction resolution, trades and bankruptcy.

use crate::actions::{GameEvent, NoOpReason};
use crate::auction::{AuctionItem, AuctionState};
use crate::board::{
    Board, BuildingType, ColorSet, Money, PlayerId, Property, PropertyId, StreetId, Tile,
    JAIL_POSITION,
};
use crate::cards::{CardEffect, Deck, DeckKind};
use crate::config::EngineConfig;
use crate::player::Player;
use crate::trade::TradeOffer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur when applying or decoding actions
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Invalid player count: {0}")]
    InvalidPlayerCount(usize),

    #[error("Invalid engine configuration")]
    InvalidConfig,

    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("Unknown player code {0}")]
    UnknownPlayerCode(String),

    #[error("Unknown property {0}")]
    UnknownProperty(PropertyId),

    #[error("Unknown street {0}")]
    UnknownStreet(StreetId),

    #[error("Player {player} does not own property {property}")]
    NotOwner {
        player: PlayerId,
        property: PropertyId,
    },

    #[error("Property {0} is mortgaged")]
    Mortgaged(PropertyId),

    #[error("Street {0} already has a hotel")]
    HotelPresent(StreetId),

    #[error("Color set {0:?} is not fully owned")]
    IncompleteColorSet(ColorSet),

    #[error("Street {0} would break the even-build rule")]
    UnevenBuild(StreetId),

    #[error("Invalid building quantity {0}")]
    InvalidQuantity(u8),

    #[error("Street {street} holds fewer than {quantity} building units")]
    NotEnoughBuildings { street: StreetId, quantity: u8 },

    #[error("The won building is a {0:?}")]
    WrongBuildingType(BuildingType),

    #[error("Invalid dice ({0}, {1})")]
    InvalidDice(u8, u8),

    #[error("Malformed action record: {0}")]
    InvalidRecord(String),

    #[error("Invalid action parameter: {0}")]
    InvalidParameter(String),

    #[error("Action index {0} is out of range")]
    ActionOutOfRange(usize),

    #[error("{0} is not legal in the current state")]
    IllegalAction(String),

    #[error("No player can act")]
    NoActor,

    #[error("Game is over")]
    GameOver,
}

/// A chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub turn: u32,
    pub from: PlayerId,
    /// `None` for everyone.
    pub to: Option<PlayerId>,
    pub text: String,
}

/// A structurally valid build request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildPlan {
    pub property: PropertyId,
    pub street: StreetId,
    pub color: ColorSet,
    pub building: BuildingType,
    pub quantity: u8,
    pub cost: Money,
}

/// What happens when a structurally valid build is attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Build,
    /// Bank is short and others want the unit too.
    ShortageAuction { competitors: Vec<PlayerId> },
    Blocked(NoOpReason),
}

/// A structurally valid sell request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellPlan {
    pub property: PropertyId,
    pub street: StreetId,
    pub quantity: u8,
    pub refund: Money,
    pub sells_hotel: bool,
    pub houses_after: u8,
    /// Houses taken from the bank to re-seat a partially sold hotel.
    pub houses_from_bank: u32,
}

fn default_rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

/// The complete game state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub config: EngineConfig,
    pub board: Board,
    /// Players still in the game, in turn order.
    pub players: Vec<Player>,
    /// Players removed by bankruptcy, in elimination order.
    pub eliminated: Vec<Player>,
    pub current_player_index: usize,
    pub houses_available: u32,
    pub hotels_available: u32,
    pub auction: Option<AuctionState>,
    pub pending_trade: Option<TradeOffer>,
    pub doubles_count: u8,
    pub rolled_this_turn: bool,
    pub decision_made_this_landing: bool,
    pub last_roll: Option<(u8, u8)>,
    /// Turn number (starts at 1)
    pub turn_number: u32,
    pub chance: Deck,
    pub community_chest: Deck,
    pub chat_log: Vec<ChatMessage>,
    /// Random number generator seed (for deterministic replays)
    rng_seed: u64,
    #[serde(skip, default = "default_rng")]
    rng: StdRng,
}

impl GameState {
    /// Create a standard game with one player per name
    pub fn new(player_names: Vec<String>, seed: u64) -> Result<Self, GameError> {
        Self::with_config(EngineConfig::default(), player_names, seed)
    }

    pub fn with_config(
        config: EngineConfig,
        player_names: Vec<String>,
        seed: u64,
    ) -> Result<Self, GameError> {
        config.validate(player_names.len())?;

        let players: Vec<Player> = player_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Player::new(i as PlayerId, name, config.starting_balance))
            .collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let chance = Deck::shuffled(DeckKind::Chance, &mut rng);
        let community_chest = Deck::shuffled(DeckKind::CommunityChest, &mut rng);

        debug!(players = players.len(), seed, "new game");

        Ok(Self {
            board: Board::standard(),
            players,
            eliminated: Vec::new(),
            current_player_index: 0,
            houses_available: config.bank_houses,
            hotels_available: config.bank_hotels,
            auction: None,
            pending_trade: None,
            doubles_count: 0,
            rolled_this_turn: false,
            decision_made_this_landing: true,
            last_roll: None,
            turn_number: 1,
            chance,
            community_chest,
            chat_log: Vec::new(),
            rng_seed: seed,
            rng,
            config,
        })
    }

    /// Start over with the same seats and configuration.
    pub fn reset(&mut self, seed: u64) -> Result<(), GameError> {
        let mut seats: Vec<(PlayerId, String)> = self
            .players
            .iter()
            .chain(self.eliminated.iter())
            .map(|p| (p.id, p.name.clone()))
            .collect();
        seats.sort_by_key(|(id, _)| *id);
        let names = seats.into_iter().map(|(_, name)| name).collect();
        *self = Self::with_config(self.config.clone(), names, seed)?;
        Ok(())
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    // ==================== Queries ====================

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn player_by_code(&self, code: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.code == code)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player_index)
    }

    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player().map(|p| p.id)
    }

    pub fn is_finished(&self) -> bool {
        self.players.len() <= 1
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self.players.as_slice() {
            [last] => Some(last.id),
            _ => None,
        }
    }

    /// Player expected to act next.
    ///
    /// The winner of a building auction while they place it, then the current
    /// bidder of a running auction, then the responder of a pending trade,
    /// then the turn player.
    pub fn current_actor(&self) -> Option<PlayerId> {
        if self.is_finished() {
            return None;
        }
        if let Some(auction) = &self.auction {
            if auction.placing_building {
                return auction.winner;
            }
            if let Some(bidder) = auction.current_bidder() {
                return Some(bidder);
            }
        }
        if let Some(trade) = &self.pending_trade {
            return Some(trade.responder);
        }
        self.current_player_id()
    }

    /// The unowned property under the turn player awaiting a buy/auction choice.
    pub fn pending_property(&self) -> Option<PropertyId> {
        if self.decision_made_this_landing {
            return None;
        }
        let player = self.current_player()?;
        let id = self.board.property_at(player.position)?;
        match self.board.property(id)?.owner {
            None => Some(id),
            Some(_) => None,
        }
    }

    pub fn property_decision_pending(&self) -> bool {
        self.pending_property().is_some()
    }

    /// Whether any street in this property's color set has buildings.
    pub fn color_set_has_buildings(&self, property: PropertyId) -> bool {
        let Some(color) = self.board.property(property).and_then(|p| p.color()) else {
            return false;
        };
        self.board
            .properties
            .iter()
            .any(|p| p.color() == Some(color) && p.has_buildings())
    }

    /// Units paid for at a building auction but not yet placed: (houses, hotels).
    pub fn reserved_units(&self) -> (u32, u32) {
        match &self.auction {
            Some(AuctionState {
                item: AuctionItem::Building { building, .. },
                placing_building: true,
                ..
            }) => match building {
                BuildingType::House => (1, 0),
                BuildingType::Hotel => (0, 1),
            },
            _ => (0, 0),
        }
    }

    /// Every building unit is either in the bank, on the board or reserved.
    pub fn bank_is_conserved(&self) -> bool {
        let (reserved_houses, reserved_hotels) = self.reserved_units();
        self.houses_available + self.board.houses_on_board() + reserved_houses
            == self.config.bank_houses
            && self.hotels_available + self.board.hotels_on_board() + reserved_hotels
                == self.config.bank_hotels
    }

    /// Property owners and player property sets agree.
    pub fn ownership_is_consistent(&self) -> bool {
        let owners_ok = self.board.properties.iter().all(|property| match property.owner {
            None => self.players.iter().all(|p| !p.owns(property.id)),
            Some(owner) => self.player(owner).map(|p| p.owns(property.id)).unwrap_or(false),
        });
        let sets_ok = self.players.iter().all(|player| {
            player.properties.iter().all(|&id| {
                self.board
                    .property(id)
                    .map(|p| p.owner == Some(player.id))
                    .unwrap_or(false)
            })
        });
        owners_ok && sets_ok
    }

    // ==================== Building Rules ====================

    fn set_members(&self, color: ColorSet) -> impl Iterator<Item = &Property> + '_ {
        self.board
            .properties
            .iter()
            .filter(move |p| p.color() == Some(color))
    }

    /// Structural checks for building `quantity` units on a street.
    ///
    /// Shared by the legality masks and by execution, so both agree on the
    /// even-build rule.
    pub fn plan_build(
        &self,
        player: PlayerId,
        street: StreetId,
        quantity: u8,
    ) -> Result<BuildPlan, GameError> {
        let id = self
            .board
            .street(street)
            .ok_or(GameError::UnknownStreet(street))?;
        let property = self
            .board
            .property(id)
            .ok_or(GameError::UnknownProperty(id))?;
        let color = property.color().ok_or(GameError::UnknownStreet(street))?;

        if property.owner != Some(player) {
            return Err(GameError::NotOwner {
                player,
                property: id,
            });
        }
        if quantity == 0 || quantity > self.config.max_build_count {
            return Err(GameError::InvalidQuantity(quantity));
        }
        if !self.board.owns_buildable_set(player, color) {
            if !self.board.owns_full_set(player, color) {
                return Err(GameError::IncompleteColorSet(color));
            }
            let mortgaged = self.set_members(color).find(|p| p.mortgaged).map(|p| p.id);
            return Err(GameError::Mortgaged(mortgaged.unwrap_or(id)));
        }
        if property.hotels() > 0 {
            return Err(GameError::HotelPresent(street));
        }

        let houses = property.houses() as u16;
        let requested = quantity as u16;
        let (building, sibling_floor) = if houses + requested <= 4 {
            (BuildingType::House, (houses + requested - 1) as u8)
        } else if houses == 4 && requested == 1 {
            (BuildingType::Hotel, 4)
        } else {
            return Err(GameError::InvalidQuantity(quantity));
        };

        let uneven = self
            .set_members(color)
            .any(|p| p.id != id && p.building_level() < sibling_floor);
        if uneven {
            return Err(GameError::UnevenBuild(street));
        }

        Ok(BuildPlan {
            property: id,
            street,
            color,
            building,
            quantity,
            cost: color.unit_cost(building) * quantity as Money,
        })
    }

    /// Economic outcome of a structurally valid build.
    pub fn build_outcome(&self, player: PlayerId, plan: &BuildPlan) -> BuildOutcome {
        let affordable = self.player(player).is_some_and(|p| p.can_afford(plan.cost));
        if !affordable {
            return BuildOutcome::Blocked(NoOpReason::InsufficientFunds);
        }

        let (stock, threshold, needed_competitors) = match plan.building {
            BuildingType::House => (
                self.houses_available,
                self.config.house_shortage_threshold,
                self.config.house_auction_competitors,
            ),
            BuildingType::Hotel => (
                self.hotels_available,
                self.config.hotel_shortage_threshold,
                self.config.hotel_auction_competitors,
            ),
        };

        if stock >= 1 && stock <= threshold {
            let competitors = self.shortage_competitors(player, plan.building);
            if competitors.len() >= needed_competitors {
                return BuildOutcome::ShortageAuction { competitors };
            }
        }

        let needed = match plan.building {
            BuildingType::House => plan.quantity as u32,
            BuildingType::Hotel => 1,
        };
        if stock < needed {
            BuildOutcome::Blocked(NoOpReason::BankDepleted)
        } else {
            BuildOutcome::Build
        }
    }

    /// Streets where `player` could put a single unit of `building`.
    pub fn placement_options(
        &self,
        player: PlayerId,
        building: BuildingType,
        require_funds: bool,
    ) -> Vec<StreetId> {
        let Some(owner) = self.player(player) else {
            return Vec::new();
        };
        (0..self.board.street_count())
            .filter(|&street| match self.plan_build(player, street, 1) {
                Ok(plan) => {
                    plan.building == building && (!require_funds || owner.can_afford(plan.cost))
                }
                Err(_) => false,
            })
            .collect()
    }

    /// Other players who could afford and place one unit of `building`.
    pub fn shortage_competitors(&self, initiator: PlayerId, building: BuildingType) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.id != initiator)
            .filter(|p| !self.placement_options(p.id, building, true).is_empty())
            .map(|p| p.id)
            .collect()
    }

    /// Structural checks for selling `quantity` units from a street.
    pub fn plan_sell(
        &self,
        player: PlayerId,
        street: StreetId,
        quantity: u8,
    ) -> Result<SellPlan, GameError> {
        let id = self
            .board
            .street(street)
            .ok_or(GameError::UnknownStreet(street))?;
        let property = self
            .board
            .property(id)
            .ok_or(GameError::UnknownProperty(id))?;
        let color = property.color().ok_or(GameError::UnknownStreet(street))?;

        if property.owner != Some(player) {
            return Err(GameError::NotOwner {
                player,
                property: id,
            });
        }
        if quantity == 0 || quantity > self.config.max_build_count {
            return Err(GameError::InvalidQuantity(quantity));
        }
        let level = property.building_level();
        if level < quantity {
            return Err(GameError::NotEnoughBuildings { street, quantity });
        }
        let new_level = level - quantity;
        let uneven = self
            .set_members(color)
            .any(|p| p.id != id && p.building_level() > new_level + 1);
        if uneven {
            return Err(GameError::UnevenBuild(street));
        }

        let sells_hotel = property.hotels() > 0;
        Ok(SellPlan {
            property: id,
            street,
            quantity,
            refund: color.house_cost() * quantity as Money / 2,
            sells_hotel,
            houses_after: new_level,
            houses_from_bank: if sells_hotel { new_level as u32 } else { 0 },
        })
    }

    // ==================== Money & Ownership ====================

    pub(crate) fn adjust_balance(&mut self, player: PlayerId, delta: Money) {
        if let Some(p) = self.player_mut(player) {
            p.balance += delta;
        }
    }

    pub(crate) fn balance_of(&self, player: PlayerId) -> Money {
        self.player(player).map(|p| p.balance).unwrap_or(0)
    }

    /// Move a property to a new owner (or back to the bank), updating both sides.
    pub(crate) fn transfer_property(&mut self, id: PropertyId, to: Option<PlayerId>) {
        let Some(property) = self.board.property_mut(id) else {
            return;
        };
        let from = property.owner;
        property.owner = to;
        if let Some(prev) = from.and_then(|p| self.player_mut(p)) {
            prev.properties.remove(&id);
        }
        if let Some(next) = to.and_then(|p| self.player_mut(p)) {
            next.properties.insert(id);
        }
    }

    // ==================== Dice & Movement ====================

    /// Use the supplied dice, or roll fresh ones from the seeded generator.
    pub(crate) fn roll_dice(&mut self, dice: Option<(u8, u8)>) -> Result<(u8, u8), GameError> {
        match dice {
            Some((a, b)) if (1..=6).contains(&a) && (1..=6).contains(&b) => Ok((a, b)),
            Some((a, b)) => Err(GameError::InvalidDice(a, b)),
            None => Ok((self.rng.gen_range(1..=6), self.rng.gen_range(1..=6))),
        }
    }

    /// Move forward by `steps` tiles.
    pub(crate) fn advance_player(&mut self, player: PlayerId, steps: usize) -> Vec<GameEvent> {
        let from = self.player(player).map(|p| p.position).unwrap_or(0);
        let to = (from + steps) % self.board.tiles.len();
        self.move_forward_to(player, to)
    }

    /// Move forward to `to`, collecting the GO salary when wrapping around.
    fn move_forward_to(&mut self, player: PlayerId, to: usize) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let salary = self.config.go_salary;
        let Some(p) = self.player_mut(player) else {
            return events;
        };
        let from = p.position;
        p.position = to;
        let passed_go = to < from;
        if passed_go {
            p.balance += salary;
        }

        events.push(GameEvent::PlayerMoved { player, from, to });
        if passed_go {
            events.push(GameEvent::SalaryCollected {
                player,
                amount: salary,
            });
        }
        events
    }

    /// Resolve the tile the player is standing on.
    pub(crate) fn resolve_landing(&mut self, player: PlayerId, dice_total: u32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(position) = self.player(player).map(|p| p.position) else {
            return events;
        };
        self.decision_made_this_landing = true;

        match self.board.tile(position).clone() {
            Tile::Go => {
                let salary = self.config.go_salary;
                self.adjust_balance(player, salary);
                events.push(GameEvent::SalaryCollected {
                    player,
                    amount: salary,
                });
            }

            Tile::Property(id) => match self.board.property(id).and_then(|p| p.owner) {
                None => {
                    self.decision_made_this_landing = false;
                    events.push(GameEvent::PropertyDecisionRequired {
                        player,
                        property: id,
                    });
                }
                Some(owner) if owner == player => {}
                Some(owner) => {
                    let rent = self.board.rent(id, dice_total);
                    if rent > 0 {
                        self.adjust_balance(player, -rent);
                        self.adjust_balance(owner, rent);
                        debug!(player, owner, property = id, rent, "rent paid");
                        events.push(GameEvent::RentPaid {
                            payer: player,
                            owner,
                            property: id,
                            amount: rent,
                        });
                    }
                }
            },

            Tile::Tax { amount, .. } => {
                self.adjust_balance(player, -amount);
                events.push(GameEvent::TaxPaid { player, amount });
            }

            Tile::Chance => events.extend(self.draw_card(player, DeckKind::Chance)),
            Tile::CommunityChest => events.extend(self.draw_card(player, DeckKind::CommunityChest)),
            Tile::GoToJail => events.extend(self.send_to_jail(player)),
            Tile::Jail | Tile::FreeParking => {}
        }

        events
    }

    // ==================== Cards ====================

    fn deck_mut(&mut self, kind: DeckKind) -> &mut Deck {
        match kind {
            DeckKind::Chance => &mut self.chance,
            DeckKind::CommunityChest => &mut self.community_chest,
        }
    }

    fn draw_card(&mut self, player: PlayerId, kind: DeckKind) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(card) = self.deck_mut(kind).draw() else {
            return events;
        };
        debug!(player, deck = ?kind, card = card.id, "card drawn");
        events.push(GameEvent::CardDrawn {
            player,
            deck: kind,
            card: card.id,
        });
        for effect in &card.effects {
            events.extend(self.apply_card_effect(player, effect));
        }
        self.deck_mut(kind).requeue(card);
        events
    }

    /// Interpret one card effect. Card moves do not resolve the new tile.
    pub(crate) fn apply_card_effect(&mut self, player: PlayerId, effect: &CardEffect) -> Vec<GameEvent> {
        let mut events = Vec::new();
        match *effect {
            CardEffect::AdvanceTo { position } => {
                events.extend(self.move_forward_to(player, position % self.board.tiles.len()));
            }
            CardEffect::AdvanceToNearest { group } => {
                let from = self.player(player).map(|p| p.position).unwrap_or(0);
                if let Some(to) = self.board.nearest(from, group) {
                    events.extend(self.move_forward_to(player, to));
                }
            }
            CardEffect::MoveBack { spaces } => {
                let size = self.board.tiles.len();
                if let Some(p) = self.player_mut(player) {
                    let from = p.position;
                    p.position = (from + size - spaces % size) % size;
                    events.push(GameEvent::PlayerMoved {
                        player,
                        from,
                        to: p.position,
                    });
                }
            }
            CardEffect::GoToJail => events.extend(self.send_to_jail(player)),
            CardEffect::Collect { amount } => {
                self.adjust_balance(player, amount);
                events.push(GameEvent::CashTransferred {
                    from: None,
                    to: Some(player),
                    amount,
                });
            }
            CardEffect::Pay { amount } => {
                self.adjust_balance(player, -amount);
                events.push(GameEvent::CashTransferred {
                    from: Some(player),
                    to: None,
                    amount,
                });
            }
            CardEffect::Repairs {
                per_house,
                per_hotel,
            } => {
                let (houses, hotels) = self.board.buildings_owned_by(player);
                let amount = houses as Money * per_house + hotels as Money * per_hotel;
                if amount > 0 {
                    self.adjust_balance(player, -amount);
                    events.push(GameEvent::CashTransferred {
                        from: Some(player),
                        to: None,
                        amount,
                    });
                }
            }
            CardEffect::PayEachPlayer { amount } => {
                let others: Vec<PlayerId> = self
                    .players
                    .iter()
                    .filter(|p| p.id != player)
                    .map(|p| p.id)
                    .collect();
                for other in others {
                    self.adjust_balance(player, -amount);
                    self.adjust_balance(other, amount);
                    events.push(GameEvent::CashTransferred {
                        from: Some(player),
                        to: Some(other),
                        amount,
                    });
                }
            }
            CardEffect::CollectFromEachPlayer { amount } => {
                let others: Vec<(PlayerId, Money)> = self
                    .players
                    .iter()
                    .filter(|p| p.id != player)
                    .map(|p| (p.id, amount.min(p.balance.max(0))))
                    .collect();
                for (other, paid) in others {
                    if paid == 0 {
                        continue;
                    }
                    self.adjust_balance(other, -paid);
                    self.adjust_balance(player, paid);
                    events.push(GameEvent::CashTransferred {
                        from: Some(other),
                        to: Some(player),
                        amount: paid,
                    });
                }
            }
            CardEffect::GetOutOfJailFree => {
                if let Some(p) = self.player_mut(player) {
                    p.jail_free_cards += 1;
                }
                events.push(GameEvent::JailFreeCardGained { player });
            }
        }
        events
    }

    /// Put one withheld jail-free card back into whichever deck is missing it.
    pub(crate) fn return_jail_card(&mut self) {
        if !self.chance.return_jail_card() {
            self.community_chest.return_jail_card();
        }
    }

    // ==================== Jail & Turns ====================

    /// Send a player to jail. Ends the turn if it is theirs.
    pub(crate) fn send_to_jail(&mut self, player: PlayerId) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if let Some(p) = self.player_mut(player) {
            p.position = JAIL_POSITION;
            p.in_jail = true;
            p.jail_turns = 0;
        }
        self.doubles_count = 0;
        info!(player, "sent to jail");
        events.push(GameEvent::SentToJail { player });

        if self.current_player_id() == Some(player) {
            events.push(self.advance_turn());
        }
        events
    }

    /// Hand the turn to the next player in order.
    pub(crate) fn advance_turn(&mut self) -> GameEvent {
        let player = self.current_player_id().unwrap_or_default();
        if !self.players.is_empty() {
            self.current_player_index = (self.current_player_index + 1) % self.players.len();
        }
        self.start_turn();
        let next_player = self.current_player_id().unwrap_or_default();
        debug!(player, next_player, turn = self.turn_number, "turn ended");
        GameEvent::TurnEnded {
            player,
            next_player,
        }
    }

    fn start_turn(&mut self) {
        self.doubles_count = 0;
        self.rolled_this_turn = false;
        self.decision_made_this_landing = true;
        self.last_roll = None;
        self.turn_number += 1;
    }

    // ==================== Auctions ====================

    pub(crate) fn start_property_auction(&mut self, initiator: PlayerId, property: PropertyId) -> GameEvent {
        let participants: Vec<PlayerId> = self.players.iter().map(|p| p.id).collect();
        let auction = AuctionState::new(
            AuctionItem::Property(property),
            initiator,
            participants.clone(),
            self.current_player_index,
        );
        self.decision_made_this_landing = true;
        self.auction = Some(auction);
        info!(initiator, property, "property auction started");
        GameEvent::AuctionStarted {
            item: AuctionItem::Property(property),
            participants,
        }
    }

    pub(crate) fn start_building_auction(
        &mut self,
        initiator: PlayerId,
        plan: &BuildPlan,
        competitors: Vec<PlayerId>,
    ) -> GameEvent {
        let item = AuctionItem::Building {
            building: plan.building,
            street: plan.street,
        };
        let mut participants = vec![initiator];
        participants.extend(competitors);
        self.auction = Some(AuctionState::new(item, initiator, participants.clone(), 0));
        info!(initiator, building = ?plan.building, "shortage auction started");
        GameEvent::AuctionStarted { item, participants }
    }

    /// Settle a finished auction.
    ///
    /// A won building auction hands the turn to the winner so they can place
    /// the unit. When the winner is not the builder, the builder's turn ends.
    pub(crate) fn resolve_auction(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(mut auction) = self.auction.take() else {
            return events;
        };
        if let AuctionItem::Property(_) = auction.item {
            self.decision_made_this_landing = true;
        }

        let Some((winner, price)) = auction.outcome() else {
            debug!(item = ?auction.item, "auction ended without bids");
            events.push(GameEvent::AuctionEnded { item: auction.item });
            return events;
        };
        if self.balance_of(winner) < price {
            warn!(winner, price, "auction winner cannot cover the bid");
        }

        match auction.item {
            AuctionItem::Property(id) => {
                self.adjust_balance(winner, -price);
                self.transfer_property(id, Some(winner));
                info!(winner, property = id, price, "property auction won");
                events.push(GameEvent::AuctionWon {
                    winner,
                    item: auction.item,
                    price,
                });
            }
            AuctionItem::Building { building, .. } => {
                let stock = match building {
                    BuildingType::House => &mut self.houses_available,
                    BuildingType::Hotel => &mut self.hotels_available,
                };
                if *stock == 0 {
                    warn!(winner, ?building, "bank emptied before the auction resolved");
                    events.push(GameEvent::AuctionEnded { item: auction.item });
                    return events;
                }
                let Some(index) = self.player_index(winner) else {
                    events.push(GameEvent::AuctionEnded { item: auction.item });
                    return events;
                };
                if self.placement_options(winner, building, false).is_empty() {
                    warn!(winner, ?building, "auction winner has nowhere to place the unit");
                    events.push(GameEvent::AuctionEnded { item: auction.item });
                    return events;
                }

                match building {
                    BuildingType::House => self.houses_available -= 1,
                    BuildingType::Hotel => self.hotels_available -= 1,
                }
                self.adjust_balance(winner, -price);
                self.current_player_index = index;
                self.rolled_this_turn = true;
                self.decision_made_this_landing = true;
                self.doubles_count = 0;

                auction.placing_building = true;
                auction.winner = Some(winner);
                info!(winner, ?building, price, "building auction won");
                events.push(GameEvent::AuctionWon {
                    winner,
                    item: auction.item,
                    price,
                });
                self.auction = Some(auction);
            }
        }
        events
    }

    // ==================== Building ====================

    /// Put units on a street and take them out of the bank (or the auction reserve).
    pub(crate) fn place_buildings(&mut self, plan: &BuildPlan, from_reserve: bool) {
        let Some(property) = self.board.property_mut(plan.property) else {
            return;
        };
        match plan.building {
            BuildingType::House => {
                let houses = property.houses() + plan.quantity;
                property.set_buildings(houses, 0);
                if !from_reserve {
                    self.houses_available -= plan.quantity as u32;
                }
            }
            BuildingType::Hotel => {
                let returned = property.houses() as u32;
                property.set_buildings(0, 1);
                self.houses_available += returned;
                if !from_reserve {
                    self.hotels_available -= 1;
                }
            }
        }
    }

    pub(crate) fn remove_buildings(&mut self, plan: &SellPlan) {
        let Some(property) = self.board.property_mut(plan.property) else {
            return;
        };
        if plan.sells_hotel {
            property.set_buildings(plan.houses_after, 0);
            self.hotels_available += 1;
            self.houses_available -= plan.houses_from_bank;
        } else {
            property.set_buildings(plan.houses_after, 0);
            self.houses_available += plan.quantity as u32;
        }
    }

    // ==================== Trades ====================

    /// Swap everything in a validated offer.
    pub(crate) fn execute_trade(&mut self, offer: &TradeOffer) {
        let (a, b) = (offer.proposer, offer.responder);
        self.adjust_balance(a, offer.cash_asked - offer.cash_offered);
        self.adjust_balance(b, offer.cash_offered - offer.cash_asked);
        if let Some(p) = self.player_mut(a) {
            p.jail_free_cards = p.jail_free_cards - offer.jail_cards_offered + offer.jail_cards_asked;
        }
        if let Some(p) = self.player_mut(b) {
            p.jail_free_cards = p.jail_free_cards - offer.jail_cards_asked + offer.jail_cards_offered;
        }
        for &id in &offer.properties_offered {
            self.transfer_property(id, Some(b));
        }
        for &id in &offer.properties_asked {
            self.transfer_property(id, Some(a));
        }
    }

    // ==================== Bankruptcy ====================

    /// Remove a player, returning everything they own to the bank.
    pub(crate) fn declare_bankruptcy(&mut self, player: PlayerId) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(removed_index) = self.player_index(player) else {
            return events;
        };

        let owned: Vec<PropertyId> = self.players[removed_index].properties.iter().copied().collect();
        for id in owned {
            if let Some(property) = self.board.property_mut(id) {
                self.houses_available += property.houses() as u32;
                self.hotels_available += property.hotels() as u32;
                property.set_buildings(0, 0);
                property.mortgaged = false;
            }
            self.transfer_property(id, None);
        }
        for _ in 0..self.players[removed_index].jail_free_cards {
            self.return_jail_card();
        }

        let was_current = removed_index == self.current_player_index;
        let mut removed = self.players.remove(removed_index);
        removed.jail_free_cards = 0;
        removed.is_bankrupt = true;
        self.eliminated.push(removed);

        if removed_index < self.current_player_index {
            self.current_player_index -= 1;
        }
        if self.players.is_empty() {
            self.current_player_index = 0;
        } else {
            self.current_player_index %= self.players.len();
        }

        warn!(player, remaining = self.players.len(), "player bankrupt");
        events.push(GameEvent::PlayerBankrupt { player });

        if self
            .pending_trade
            .as_ref()
            .map(|t| t.involves(player))
            .unwrap_or(false)
        {
            self.pending_trade = None;
            events.push(GameEvent::TradeCancelled);
        }

        if was_current && !self.players.is_empty() {
            self.start_turn();
            if let Some(next_player) = self.current_player_id() {
                events.push(GameEvent::TurnEnded {
                    player,
                    next_player,
                });
            }
        }

        let (reserved_houses, reserved_hotels) = self.reserved_units();
        let mut cancelled = None;
        let mut settle = false;
        if let Some(auction) = self.auction.as_mut() {
            if auction.placing_building {
                if auction.winner == Some(player) {
                    cancelled = Some(auction.item);
                }
            } else if auction.remove_participant(player) {
                auction.bids.retain(|bid| bid.bidder != player);
                settle = auction.is_done();
            }
        }
        if let Some(item) = cancelled {
            self.houses_available += reserved_houses;
            self.hotels_available += reserved_hotels;
            self.auction = None;
            events.push(GameEvent::AuctionEnded { item });
        }
        if settle {
            events.extend(self.resolve_auction());
        }

        if let Some(winner) = self.winner() {
            self.current_player_index = 0;
            info!(winner, "game won");
            events.push(GameEvent::GameWon { player: winner });
        }
        events
    }

    // ==================== Snapshot ====================

    /// Serializable read-only view of the whole game.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            turn_number: self.turn_number,
            current_player: self.current_player_id(),
            current_actor: self.current_actor(),
            players: self.players.clone(),
            eliminated: self.eliminated.iter().map(|p| p.id).collect(),
            tiles: (0..self.board.tiles.len())
                .map(|pos| TileView {
                    position: pos,
                    name: self.board.tile_name(pos),
                    property: self.board.property_at(pos),
                })
                .collect(),
            properties: self.board.properties.clone(),
            houses_available: self.houses_available,
            hotels_available: self.hotels_available,
            auction: self.auction.clone(),
            pending_trade: self.pending_trade.clone(),
            doubles_count: self.doubles_count,
            rolled_this_turn: self.rolled_this_turn,
            pending_property: self.pending_property(),
            last_roll: self.last_roll,
            chat_log: self.chat_log.clone(),
            winner: self.winner(),
        }
    }
}

/// A board square as seen from outside
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileView {
    pub position: usize,
    pub name: String,
    pub property: Option<PropertyId>,
}

/// Read-only view for rendering, logging or observation building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub turn_number: u32,
    pub current_player: Option<PlayerId>,
    pub current_actor: Option<PlayerId>,
    pub players: Vec<Player>,
    pub eliminated: Vec<PlayerId>,
    pub tiles: Vec<TileView>,
    pub properties: Vec<Property>,
    pub houses_available: u32,
    pub hotels_available: u32,
    pub auction: Option<AuctionState>,
    pub pending_trade: Option<TradeOffer>,
    pub doubles_count: u8,
    pub rolled_this_turn: bool,
    pub pending_property: Option<PropertyId>,
    pub last_roll: Option<(u8, u8)>,
    pub chat_log: Vec<ChatMessage>,
    pub winner: Option<PlayerId>,
}

impl GameSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
