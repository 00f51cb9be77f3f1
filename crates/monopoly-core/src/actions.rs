//! Game actions that players can take.
//!
//! This module defines every command a player can issue, the events that
//! result from applying them, and the reasons a well-formed but infeasible
//! command is ignored.
//!
//! Every action goes through [`GameAction::check`] before it mutates
//! anything. `check` is also what the legality masks are built from, so an
//! action offered by a mask is exactly an action that applies cleanly.

use crate::auction::{AuctionItem, AuctionState};
use crate::board::{BuildingType, Money, PlayerId, PropertyId, StreetId};
use crate::cards::DeckKind;
use crate::game::{BuildOutcome, ChatMessage, GameError, GameState};
use crate::trade::{TradeFailure, TradeOffer};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// All possible actions a player can take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    // ==================== Turn Actions ====================
    /// Roll and move. `dice` replays a known roll; `None` rolls from the game's generator.
    RollDice {
        player: PlayerId,
        dice: Option<(u8, u8)>,
    },
    /// End your turn
    EndTurn { player: PlayerId },

    // ==================== Landing Decisions ====================
    /// Buy the unowned property you are standing on
    Buy { player: PlayerId },
    /// Put the unowned property you are standing on up for auction
    Auction { player: PlayerId },

    // ==================== Auctions ====================
    AuctionBid { player: PlayerId, amount: Money },
    AuctionFold { player: PlayerId },

    // ==================== Property Management ====================
    Mortgage {
        player: PlayerId,
        property: PropertyId,
    },
    Unmortgage {
        player: PlayerId,
        property: PropertyId,
    },
    /// Build houses, or a hotel on a street with four houses
    Build {
        player: PlayerId,
        street: StreetId,
        quantity: u8,
    },
    /// Sell building units back to the bank at half price
    SellBuilding {
        player: PlayerId,
        street: StreetId,
        quantity: u8,
    },

    // ==================== Jail ====================
    UseJailCard { player: PlayerId },
    PayJailFine { player: PlayerId },
    RollJail {
        player: PlayerId,
        dice: Option<(u8, u8)>,
    },

    // ==================== Bankruptcy ====================
    Bankruptcy { player: PlayerId },

    // ==================== Trading ====================
    ProposeTrade(TradeOffer),
    AcceptTrade { player: PlayerId },
    RejectTrade { player: PlayerId },

    // ==================== Chat ====================
    /// `recipient: None` sends to everyone
    SendMessage {
        player: PlayerId,
        recipient: Option<PlayerId>,
        message: String,
    },
}

/// Action discriminant, in the fixed order used by the action spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    RollDice,
    EndTurn,
    Buy,
    Auction,
    AuctionBid,
    Mortgage,
    Unmortgage,
    Build,
    SellBuilding,
    UseJailCard,
    PayJailFine,
    RollJail,
    Bankruptcy,
    AuctionFold,
    ProposeTrade,
    AcceptTrade,
    RejectTrade,
    SendMessage,
}

impl ActionKind {
    pub const ALL: [ActionKind; 18] = [
        ActionKind::RollDice,
        ActionKind::EndTurn,
        ActionKind::Buy,
        ActionKind::Auction,
        ActionKind::AuctionBid,
        ActionKind::Mortgage,
        ActionKind::Unmortgage,
        ActionKind::Build,
        ActionKind::SellBuilding,
        ActionKind::UseJailCard,
        ActionKind::PayJailFine,
        ActionKind::RollJail,
        ActionKind::Bankruptcy,
        ActionKind::AuctionFold,
        ActionKind::ProposeTrade,
        ActionKind::AcceptTrade,
        ActionKind::RejectTrade,
        ActionKind::SendMessage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::RollDice => "RollDice",
            ActionKind::EndTurn => "EndTurn",
            ActionKind::Buy => "Buy",
            ActionKind::Auction => "Auction",
            ActionKind::AuctionBid => "AuctionBid",
            ActionKind::Mortgage => "Mortgage",
            ActionKind::Unmortgage => "Unmortgage",
            ActionKind::Build => "Build",
            ActionKind::SellBuilding => "SellBuilding",
            ActionKind::UseJailCard => "UseJailCard",
            ActionKind::PayJailFine => "PayJailFine",
            ActionKind::RollJail => "RollJail",
            ActionKind::Bankruptcy => "Bankruptcy",
            ActionKind::AuctionFold => "AuctionFold",
            ActionKind::ProposeTrade => "ProposeTrade",
            ActionKind::AcceptTrade => "AcceptTrade",
            ActionKind::RejectTrade => "RejectTrade",
            ActionKind::SendMessage => "SendMessage",
        }
    }

    pub fn from_name(name: &str) -> Option<ActionKind> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

/// Why an action was accepted but had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoOpReason {
    NotYourTurn,
    AuctionActive,
    TradePending,
    InJail,
    NotInJail,
    AlreadyRolled,
    NotRolled,
    DecisionPending,
    NoDecisionPending,
    NegativeBalance,
    InsufficientFunds,
    BankDepleted,
    AlreadyMortgaged,
    NotMortgaged,
    HasBuildings,
    NoAuction,
    NotParticipant,
    BidTooLow,
    NoJailCard,
    NotInDebt,
    NoPendingTrade,
    NotResponder,
    InvalidTrade(TradeFailure),
    InvalidRecipient,
    EmptyMessage,
}

/// Events that occur as a result of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    DiceRolled {
        player: PlayerId,
        roll: (u8, u8),
        total: u8,
    },
    PlayerMoved {
        player: PlayerId,
        from: usize,
        to: usize,
    },
    SalaryCollected {
        player: PlayerId,
        amount: Money,
    },
    /// Landed on an unowned property; buy or auction next.
    PropertyDecisionRequired {
        player: PlayerId,
        property: PropertyId,
    },
    RentPaid {
        payer: PlayerId,
        owner: PlayerId,
        property: PropertyId,
        amount: Money,
    },
    TaxPaid {
        player: PlayerId,
        amount: Money,
    },
    CardDrawn {
        player: PlayerId,
        deck: DeckKind,
        card: u8,
    },
    /// Cash moved by a card. `None` is the bank.
    CashTransferred {
        from: Option<PlayerId>,
        to: Option<PlayerId>,
        amount: Money,
    },
    JailFreeCardGained {
        player: PlayerId,
    },
    SentToJail {
        player: PlayerId,
    },
    ReleasedFromJail {
        player: PlayerId,
    },
    JailRollFailed {
        player: PlayerId,
        attempts: u8,
    },
    PropertyBought {
        player: PlayerId,
        property: PropertyId,
        price: Money,
    },
    PropertyMortgaged {
        player: PlayerId,
        property: PropertyId,
        amount: Money,
    },
    PropertyUnmortgaged {
        player: PlayerId,
        property: PropertyId,
        amount: Money,
    },
    BuildingsBuilt {
        player: PlayerId,
        street: StreetId,
        building: BuildingType,
        quantity: u8,
        cost: Money,
    },
    BuildingsSold {
        player: PlayerId,
        street: StreetId,
        quantity: u8,
        refund: Money,
    },
    AuctionStarted {
        item: AuctionItem,
        participants: Vec<PlayerId>,
    },
    BidPlaced {
        player: PlayerId,
        amount: Money,
    },
    BidderFolded {
        player: PlayerId,
    },
    AuctionWon {
        winner: PlayerId,
        item: AuctionItem,
        price: Money,
    },
    /// Auction closed with nothing changing hands
    AuctionEnded {
        item: AuctionItem,
    },
    TradeProposed {
        offer: TradeOffer,
    },
    TradeCompleted {
        proposer: PlayerId,
        responder: PlayerId,
    },
    /// Accepted, but no longer valid; nothing changed hands
    TradeFailed {
        proposer: PlayerId,
        responder: PlayerId,
        reason: TradeFailure,
    },
    TradeRejected {
        responder: PlayerId,
    },
    /// Pending trade dropped because a party left the game
    TradeCancelled,
    MessageSent {
        from: PlayerId,
        to: Option<PlayerId>,
    },
    PlayerBankrupt {
        player: PlayerId,
    },
    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },
    GameWon {
        player: PlayerId,
    },
    /// The action was well-formed but infeasible; state is unchanged
    Ignored {
        action: ActionKind,
        reason: NoOpReason,
    },
}

fn validate_dice(dice: Option<(u8, u8)>) -> Result<(), GameError> {
    match dice {
        Some((a, b)) if !(1..=6).contains(&a) || !(1..=6).contains(&b) => {
            Err(GameError::InvalidDice(a, b))
        }
        _ => Ok(()),
    }
}

fn ignored(action: ActionKind, reason: NoOpReason) -> Result<Vec<GameEvent>, GameError> {
    warn!(action = action.name(), ?reason, "action ignored");
    Ok(vec![GameEvent::Ignored { action, reason }])
}

fn won_building(auction: &AuctionState) -> Option<BuildingType> {
    match auction.item {
        AuctionItem::Building { building, .. } => Some(building),
        AuctionItem::Property(_) => None,
    }
}

impl GameAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            GameAction::RollDice { .. } => ActionKind::RollDice,
            GameAction::EndTurn { .. } => ActionKind::EndTurn,
            GameAction::Buy { .. } => ActionKind::Buy,
            GameAction::Auction { .. } => ActionKind::Auction,
            GameAction::AuctionBid { .. } => ActionKind::AuctionBid,
            GameAction::AuctionFold { .. } => ActionKind::AuctionFold,
            GameAction::Mortgage { .. } => ActionKind::Mortgage,
            GameAction::Unmortgage { .. } => ActionKind::Unmortgage,
            GameAction::Build { .. } => ActionKind::Build,
            GameAction::SellBuilding { .. } => ActionKind::SellBuilding,
            GameAction::UseJailCard { .. } => ActionKind::UseJailCard,
            GameAction::PayJailFine { .. } => ActionKind::PayJailFine,
            GameAction::RollJail { .. } => ActionKind::RollJail,
            GameAction::Bankruptcy { .. } => ActionKind::Bankruptcy,
            GameAction::ProposeTrade(_) => ActionKind::ProposeTrade,
            GameAction::AcceptTrade { .. } => ActionKind::AcceptTrade,
            GameAction::RejectTrade { .. } => ActionKind::RejectTrade,
            GameAction::SendMessage { .. } => ActionKind::SendMessage,
        }
    }

    /// The player issuing the action
    pub fn actor(&self) -> PlayerId {
        match self {
            GameAction::ProposeTrade(offer) => offer.proposer,
            GameAction::RollDice { player, .. }
            | GameAction::EndTurn { player }
            | GameAction::Buy { player }
            | GameAction::Auction { player }
            | GameAction::AuctionBid { player, .. }
            | GameAction::AuctionFold { player }
            | GameAction::Mortgage { player, .. }
            | GameAction::Unmortgage { player, .. }
            | GameAction::Build { player, .. }
            | GameAction::SellBuilding { player, .. }
            | GameAction::UseJailCard { player }
            | GameAction::PayJailFine { player }
            | GameAction::RollJail { player, .. }
            | GameAction::Bankruptcy { player }
            | GameAction::AcceptTrade { player }
            | GameAction::RejectTrade { player }
            | GameAction::SendMessage { player, .. } => *player,
        }
    }

    /// Precondition check against the live state.
    ///
    /// `Err` for structural violations and unresolvable references, `Ok(Some)`
    /// when the action would be ignored, `Ok(None)` when it would take effect.
    pub fn check(&self, state: &GameState) -> Result<Option<NoOpReason>, GameError> {
        use NoOpReason::*;

        if state.is_finished() {
            return Err(GameError::GameOver);
        }
        let actor = self.actor();
        let player = state
            .player(actor)
            .ok_or(GameError::UnknownPlayer(actor))?;
        let on_turn = state.current_player_id() == Some(actor);
        let blocker = if state.auction.is_some() {
            Some(AuctionActive)
        } else if state.pending_trade.is_some() {
            Some(TradePending)
        } else {
            None
        };
        // Ordinary turn actions: the turn player's, with no auction or trade open.
        let turn_gate = if !on_turn { Some(NotYourTurn) } else { blocker };

        let reason = match self {
            // ==================== Turn Actions ====================
            GameAction::RollDice { dice, .. } => {
                validate_dice(*dice)?;
                turn_gate.or(if player.in_jail {
                    Some(InJail)
                } else if state.rolled_this_turn {
                    Some(AlreadyRolled)
                } else if state.property_decision_pending() {
                    Some(DecisionPending)
                } else if player.balance < 0 {
                    Some(NegativeBalance)
                } else {
                    None
                })
            }

            GameAction::EndTurn { .. } => turn_gate.or(if !state.rolled_this_turn {
                Some(NotRolled)
            } else if state.property_decision_pending() {
                Some(DecisionPending)
            } else if player.balance < 0 {
                Some(NegativeBalance)
            } else {
                None
            }),

            // ==================== Landing Decisions ====================
            GameAction::Buy { .. } => turn_gate.or(match state.pending_property() {
                None => Some(NoDecisionPending),
                Some(id) => {
                    let price = state.board.property(id).map(|p| p.price).unwrap_or(0);
                    if !player.can_afford(price) {
                        Some(InsufficientFunds)
                    } else {
                        None
                    }
                }
            }),

            GameAction::Auction { .. } => turn_gate.or(if state.property_decision_pending() {
                None
            } else {
                Some(NoDecisionPending)
            }),

            // ==================== Auctions ====================
            GameAction::AuctionBid { amount, .. } => match &state.auction {
                Some(auction) if !auction.placing_building => {
                    if !auction.is_participant(actor) {
                        Some(NotParticipant)
                    } else if *amount < auction.minimum_bid() {
                        Some(BidTooLow)
                    } else if !player.can_afford(*amount) {
                        Some(InsufficientFunds)
                    } else {
                        None
                    }
                }
                _ => Some(NoAuction),
            },

            GameAction::AuctionFold { .. } => match &state.auction {
                Some(auction) if !auction.placing_building => {
                    if auction.is_participant(actor) {
                        None
                    } else {
                        Some(NotParticipant)
                    }
                }
                _ => Some(NoAuction),
            },

            // ==================== Property Management ====================
            GameAction::Mortgage { property, .. } => {
                let target = state
                    .board
                    .property(*property)
                    .ok_or(GameError::UnknownProperty(*property))?;
                if target.owner != Some(actor) {
                    return Err(GameError::NotOwner {
                        player: actor,
                        property: *property,
                    });
                }
                if state.auction.is_some() {
                    Some(AuctionActive)
                } else if target.mortgaged {
                    Some(AlreadyMortgaged)
                } else if state.color_set_has_buildings(*property) {
                    Some(HasBuildings)
                } else {
                    None
                }
            }

            GameAction::Unmortgage { property, .. } => {
                let target = state
                    .board
                    .property(*property)
                    .ok_or(GameError::UnknownProperty(*property))?;
                if target.owner != Some(actor) {
                    return Err(GameError::NotOwner {
                        player: actor,
                        property: *property,
                    });
                }
                if state.auction.is_some() {
                    Some(AuctionActive)
                } else if !target.mortgaged {
                    Some(NotMortgaged)
                } else if !player.can_afford(target.unmortgage_price) {
                    Some(InsufficientFunds)
                } else {
                    None
                }
            }

            GameAction::Build {
                street, quantity, ..
            } => match &state.auction {
                Some(auction) if auction.placing_building => {
                    if auction.winner != Some(actor) {
                        Some(NotYourTurn)
                    } else {
                        let plan = state.plan_build(actor, *street, *quantity)?;
                        let won = won_building(auction)
                            .ok_or_else(|| GameError::IllegalAction("Build".into()))?;
                        if *quantity != 1 {
                            return Err(GameError::InvalidQuantity(*quantity));
                        }
                        if plan.building != won {
                            return Err(GameError::WrongBuildingType(won));
                        }
                        None
                    }
                }
                Some(_) => Some(AuctionActive),
                None => {
                    if let Some(reason) = turn_gate {
                        Some(reason)
                    } else {
                        let plan = state.plan_build(actor, *street, *quantity)?;
                        match state.build_outcome(actor, &plan) {
                            BuildOutcome::Blocked(reason) => Some(reason),
                            BuildOutcome::Build | BuildOutcome::ShortageAuction { .. } => None,
                        }
                    }
                }
            },

            GameAction::SellBuilding {
                street, quantity, ..
            } => {
                if state.auction.is_some() {
                    Some(AuctionActive)
                } else {
                    let plan = state.plan_sell(actor, *street, *quantity)?;
                    if plan.houses_from_bank > state.houses_available {
                        Some(BankDepleted)
                    } else {
                        None
                    }
                }
            }

            // ==================== Jail ====================
            GameAction::UseJailCard { .. } => turn_gate.or(if !player.in_jail {
                Some(NotInJail)
            } else if state.rolled_this_turn {
                Some(AlreadyRolled)
            } else if player.jail_free_cards == 0 {
                Some(NoJailCard)
            } else {
                None
            }),

            GameAction::PayJailFine { .. } => turn_gate.or(if !player.in_jail {
                Some(NotInJail)
            } else if state.rolled_this_turn {
                Some(AlreadyRolled)
            } else if !player.can_afford(state.config.jail_fine) {
                Some(InsufficientFunds)
            } else {
                None
            }),

            GameAction::RollJail { dice, .. } => {
                validate_dice(*dice)?;
                turn_gate.or(if !player.in_jail {
                    Some(NotInJail)
                } else if state.rolled_this_turn {
                    Some(AlreadyRolled)
                } else {
                    None
                })
            }

            // ==================== Bankruptcy ====================
            GameAction::Bankruptcy { .. } => {
                if player.balance < 0 || state.config.voluntary_bankruptcy {
                    None
                } else {
                    Some(NotInDebt)
                }
            }

            // ==================== Trading ====================
            GameAction::ProposeTrade(offer) => {
                if state.player(offer.responder).is_none() {
                    return Err(GameError::UnknownPlayer(offer.responder));
                }
                turn_gate.or(offer.validate_proposal(state).err().map(InvalidTrade))
            }

            GameAction::AcceptTrade { .. } | GameAction::RejectTrade { .. } => {
                match &state.pending_trade {
                    None => Some(NoPendingTrade),
                    Some(offer) if offer.responder != actor => Some(NotResponder),
                    Some(_) => None,
                }
            }

            // ==================== Chat ====================
            GameAction::SendMessage {
                recipient, message, ..
            } => {
                if let Some(to) = recipient {
                    state.player(*to).ok_or(GameError::UnknownPlayer(*to))?;
                }
                if *recipient == Some(actor) {
                    Some(InvalidRecipient)
                } else if message.trim().is_empty() {
                    Some(EmptyMessage)
                } else {
                    None
                }
            }
        };

        Ok(reason)
    }

    /// Whether the action would take effect right now.
    pub fn is_legal(&self, state: &GameState) -> bool {
        matches!(self.check(state), Ok(None))
    }

    /// Validate and execute against the state.
    pub fn apply(self, state: &mut GameState) -> Result<Vec<GameEvent>, GameError> {
        let kind = self.kind();
        if let Some(reason) = self.check(state)? {
            return ignored(kind, reason);
        }

        let mut events = Vec::new();

        match self {
            // ==================== Turn Actions ====================
            GameAction::RollDice { player, dice } => {
                let (d1, d2) = state.roll_dice(dice)?;
                let total = d1 + d2;
                state.last_roll = Some((d1, d2));
                events.push(GameEvent::DiceRolled {
                    player,
                    roll: (d1, d2),
                    total,
                });

                if d1 == d2 {
                    state.doubles_count += 1;
                    if state.doubles_count >= 3 {
                        info!(player, "third consecutive doubles");
                        events.extend(state.send_to_jail(player));
                        return Ok(events);
                    }
                } else {
                    state.rolled_this_turn = true;
                }

                events.extend(state.advance_player(player, total as usize));
                events.extend(state.resolve_landing(player, total as u32));
            }

            GameAction::EndTurn { .. } => {
                events.push(state.advance_turn());
            }

            // ==================== Landing Decisions ====================
            GameAction::Buy { player } => {
                let id = state
                    .pending_property()
                    .ok_or_else(|| GameError::IllegalAction(kind.name().into()))?;
                let price = state
                    .board
                    .property(id)
                    .map(|p| p.price)
                    .ok_or(GameError::UnknownProperty(id))?;
                state.adjust_balance(player, -price);
                state.transfer_property(id, Some(player));
                state.decision_made_this_landing = true;
                info!(player, property = id, price, "property bought");
                events.push(GameEvent::PropertyBought {
                    player,
                    property: id,
                    price,
                });
            }

            GameAction::Auction { player } => {
                let id = state
                    .pending_property()
                    .ok_or_else(|| GameError::IllegalAction(kind.name().into()))?;
                events.push(state.start_property_auction(player, id));
            }

            // ==================== Auctions ====================
            GameAction::AuctionBid { player, amount } => {
                let mut done = false;
                if let Some(auction) = state.auction.as_mut() {
                    auction.record_bid(player, amount);
                    done = auction.is_done();
                }
                events.push(GameEvent::BidPlaced { player, amount });
                if done {
                    events.extend(state.resolve_auction());
                }
            }

            GameAction::AuctionFold { player } => {
                let mut done = false;
                if let Some(auction) = state.auction.as_mut() {
                    auction.remove_participant(player);
                    done = auction.is_done();
                }
                events.push(GameEvent::BidderFolded { player });
                if done {
                    events.extend(state.resolve_auction());
                }
            }

            // ==================== Property Management ====================
            GameAction::Mortgage { player, property } => {
                let target = state
                    .board
                    .property_mut(property)
                    .ok_or(GameError::UnknownProperty(property))?;
                target.mortgaged = true;
                let amount = target.mortgage_value;
                state.adjust_balance(player, amount);
                events.push(GameEvent::PropertyMortgaged {
                    player,
                    property,
                    amount,
                });
            }

            GameAction::Unmortgage { player, property } => {
                let target = state
                    .board
                    .property_mut(property)
                    .ok_or(GameError::UnknownProperty(property))?;
                target.mortgaged = false;
                let amount = target.unmortgage_price;
                state.adjust_balance(player, -amount);
                events.push(GameEvent::PropertyUnmortgaged {
                    player,
                    property,
                    amount,
                });
            }

            GameAction::Build {
                player,
                street,
                quantity,
            } => {
                let plan = state.plan_build(player, street, quantity)?;
                let placing = state
                    .auction
                    .as_ref()
                    .map(|a| a.placing_building)
                    .unwrap_or(false);

                if placing {
                    state.place_buildings(&plan, true);
                    state.auction = None;
                    info!(player, street, building = ?plan.building, "won building placed");
                    events.push(GameEvent::BuildingsBuilt {
                        player,
                        street,
                        building: plan.building,
                        quantity: 1,
                        cost: 0,
                    });
                } else {
                    match state.build_outcome(player, &plan) {
                        BuildOutcome::ShortageAuction { competitors } => {
                            events.push(state.start_building_auction(player, &plan, competitors));
                        }
                        BuildOutcome::Build => {
                            state.adjust_balance(player, -plan.cost);
                            state.place_buildings(&plan, false);
                            events.push(GameEvent::BuildingsBuilt {
                                player,
                                street,
                                building: plan.building,
                                quantity: plan.quantity,
                                cost: plan.cost,
                            });
                        }
                        BuildOutcome::Blocked(reason) => return ignored(kind, reason),
                    }
                }
            }

            GameAction::SellBuilding {
                player,
                street,
                quantity,
            } => {
                let plan = state.plan_sell(player, street, quantity)?;
                state.remove_buildings(&plan);
                state.adjust_balance(player, plan.refund);
                events.push(GameEvent::BuildingsSold {
                    player,
                    street,
                    quantity,
                    refund: plan.refund,
                });
            }

            // ==================== Jail ====================
            GameAction::UseJailCard { player } => {
                if let Some(p) = state.player_mut(player) {
                    p.jail_free_cards -= 1;
                    p.release();
                }
                state.return_jail_card();
                events.push(GameEvent::ReleasedFromJail { player });
            }

            GameAction::PayJailFine { player } => {
                let fine = state.config.jail_fine;
                if let Some(p) = state.player_mut(player) {
                    p.balance -= fine;
                    p.release();
                }
                events.push(GameEvent::ReleasedFromJail { player });
            }

            GameAction::RollJail { player, dice } => {
                let (d1, d2) = state.roll_dice(dice)?;
                let total = d1 + d2;
                state.last_roll = Some((d1, d2));
                state.rolled_this_turn = true;
                events.push(GameEvent::DiceRolled {
                    player,
                    roll: (d1, d2),
                    total,
                });

                let fine = state.config.jail_fine;
                let max_turns = state.config.max_jail_turns;
                let mut released = d1 == d2;
                if let Some(p) = state.player_mut(player) {
                    if released {
                        p.release();
                    } else {
                        p.jail_turns += 1;
                        if p.jail_turns >= max_turns {
                            p.balance -= fine;
                            p.release();
                            released = true;
                        }
                    }
                }

                if released {
                    events.push(GameEvent::ReleasedFromJail { player });
                    events.extend(state.advance_player(player, total as usize));
                    events.extend(state.resolve_landing(player, total as u32));
                } else {
                    let attempts = state.player(player).map(|p| p.jail_turns).unwrap_or(0);
                    events.push(GameEvent::JailRollFailed { player, attempts });
                }
            }

            // ==================== Bankruptcy ====================
            GameAction::Bankruptcy { player } => {
                events.extend(state.declare_bankruptcy(player));
            }

            // ==================== Trading ====================
            GameAction::ProposeTrade(offer) => {
                info!(proposer = offer.proposer, responder = offer.responder, "trade proposed");
                state.pending_trade = Some(offer.clone());
                events.push(GameEvent::TradeProposed { offer });
            }

            GameAction::AcceptTrade { .. } => {
                let offer = state
                    .pending_trade
                    .take()
                    .ok_or_else(|| GameError::IllegalAction(kind.name().into()))?;
                match offer.validate(state) {
                    Ok(()) => {
                        state.execute_trade(&offer);
                        info!(proposer = offer.proposer, responder = offer.responder, "trade completed");
                        events.push(GameEvent::TradeCompleted {
                            proposer: offer.proposer,
                            responder: offer.responder,
                        });
                    }
                    Err(reason) => {
                        warn!(%reason, "trade no longer valid");
                        events.push(GameEvent::TradeFailed {
                            proposer: offer.proposer,
                            responder: offer.responder,
                            reason,
                        });
                    }
                }
            }

            GameAction::RejectTrade { player } => {
                state.pending_trade = None;
                events.push(GameEvent::TradeRejected { responder: player });
            }

            // ==================== Chat ====================
            GameAction::SendMessage {
                player,
                recipient,
                message,
            } => {
                let text: String = message
                    .trim()
                    .chars()
                    .take(state.config.max_message_length)
                    .collect();
                state.chat_log.push(ChatMessage {
                    turn: state.turn_number,
                    from: player,
                    to: recipient,
                    text,
                });
                events.push(GameEvent::MessageSent {
                    from: player,
                    to: recipient,
                });
            }
        }

        Ok(events)
    }
}

impl GameState {
    /// Apply an action to the game state
    pub fn apply_action(&mut self, action: GameAction) -> Result<Vec<GameEvent>, GameError> {
        action.apply(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{ColorSet, PropertyGroup};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn game(players: usize) -> GameState {
        let names = ["Alice", "Bob", "Carol", "Dave"][..players]
            .iter()
            .map(|s| s.to_string())
            .collect();
        GameState::new(names, 11).unwrap()
    }

    fn give(state: &mut GameState, player: PlayerId, ids: &[PropertyId]) {
        for &id in ids {
            state.transfer_property(id, Some(player));
        }
    }

    fn set_of(state: &GameState, color: ColorSet) -> Vec<PropertyId> {
        state.board.group_members(PropertyGroup::Color(color))
    }

    fn street_of(state: &GameState, id: PropertyId) -> StreetId {
        state.board.properties[id].street_id().unwrap()
    }

    fn is_ignored(events: &[GameEvent], expected: NoOpReason) -> bool {
        matches!(events, [GameEvent::Ignored { reason, .. }] if *reason == expected)
    }

    #[test]
    fn test_action_kind_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ActionKind::from_name("Teleport"), None);
    }

    #[test]
    fn test_roll_moves_and_marks_rolled() {
        let mut state = game(2);
        let events = state
            .apply_action(GameAction::RollDice {
                player: 0,
                dice: Some((2, 3)),
            })
            .unwrap();
        assert_eq!(state.players[0].position, 5);
        assert!(state.rolled_this_turn);
        assert!(matches!(events[0], GameEvent::DiceRolled { total: 5, .. }));
        // Reading Railroad is unowned
        assert!(state.property_decision_pending());
    }

    #[test]
    fn test_doubles_allow_another_roll() {
        let mut state = game(2);
        state
            .apply_action(GameAction::RollDice {
                player: 0,
                dice: Some((5, 5)),
            })
            .unwrap();
        assert_eq!(state.players[0].position, 10);
        assert!(!state.rolled_this_turn);
        assert_eq!(state.doubles_count, 1);
        assert!(GameAction::RollDice {
            player: 0,
            dice: None
        }
        .is_legal(&state));
    }

    #[test]
    fn test_out_of_turn_roll_is_ignored() {
        let mut state = game(2);
        let events = state
            .apply_action(GameAction::RollDice {
                player: 1,
                dice: Some((1, 2)),
            })
            .unwrap();
        assert!(is_ignored(&events, NoOpReason::NotYourTurn));
        assert_eq!(state.players[1].position, 0);
    }

    #[test]
    fn test_invalid_dice_rejected() {
        let mut state = game(2);
        let result = state.apply_action(GameAction::RollDice {
            player: 0,
            dice: Some((0, 7)),
        });
        assert_eq!(result, Err(GameError::InvalidDice(0, 7)));
    }

    #[test]
    fn test_end_turn_requires_roll_and_decision() {
        let mut state = game(2);
        let events = state.apply_action(GameAction::EndTurn { player: 0 }).unwrap();
        assert!(is_ignored(&events, NoOpReason::NotRolled));

        state
            .apply_action(GameAction::RollDice {
                player: 0,
                dice: Some((1, 2)),
            })
            .unwrap();
        // Baltic Avenue, unowned
        let events = state.apply_action(GameAction::EndTurn { player: 0 }).unwrap();
        assert!(is_ignored(&events, NoOpReason::DecisionPending));

        state.apply_action(GameAction::Buy { player: 0 }).unwrap();
        assert_eq!(state.players[0].balance, 1440);
        assert!(state.players[0].owns(1));

        state.apply_action(GameAction::EndTurn { player: 0 }).unwrap();
        assert_eq!(state.current_player_id(), Some(1));
        assert!(!state.rolled_this_turn);
        assert_eq!(state.turn_number, 2);
    }

    #[test]
    fn test_buy_without_funds_is_ignored() {
        let mut state = game(2);
        state.players[0].balance = 100;
        state
            .apply_action(GameAction::RollDice {
                player: 0,
                dice: Some((1, 4)),
            })
            .unwrap();
        let events = state.apply_action(GameAction::Buy { player: 0 }).unwrap();
        assert!(is_ignored(&events, NoOpReason::InsufficientFunds));
        assert_eq!(state.players[0].balance, 100);
        assert!(GameAction::Auction { player: 0 }.is_legal(&state));
    }

    #[test]
    fn test_buy_with_exact_balance() {
        let mut state = game(2);
        state.players[0].balance = 200;
        state
            .apply_action(GameAction::RollDice {
                player: 0,
                dice: Some((1, 4)),
            })
            .unwrap();
        assert!(GameAction::Buy { player: 0 }.is_legal(&state));
        state.apply_action(GameAction::Buy { player: 0 }).unwrap();
        assert_eq!(state.players[0].balance, 0);
        assert!(state.players[0].owns(2));
    }

    #[test]
    fn test_mortgage_twice_is_noop() {
        let mut state = game(2);
        give(&mut state, 0, &[27]);
        state
            .apply_action(GameAction::Mortgage {
                player: 0,
                property: 27,
            })
            .unwrap();
        assert_eq!(state.players[0].balance, 1700);
        let events = state
            .apply_action(GameAction::Mortgage {
                player: 0,
                property: 27,
            })
            .unwrap();
        assert!(is_ignored(&events, NoOpReason::AlreadyMortgaged));
        assert_eq!(state.players[0].balance, 1700);

        state
            .apply_action(GameAction::Unmortgage {
                player: 0,
                property: 27,
            })
            .unwrap();
        assert_eq!(state.players[0].balance, 1480);
        assert!(!state.board.properties[27].mortgaged);
    }

    #[test]
    fn test_mortgage_not_owner_is_error() {
        let mut state = game(2);
        let result = state.apply_action(GameAction::Mortgage {
            player: 1,
            property: 0,
        });
        assert_eq!(
            result,
            Err(GameError::NotOwner {
                player: 1,
                property: 0
            })
        );
    }

    #[test]
    fn test_unmortgage_without_funds_is_noop() {
        let mut state = game(2);
        give(&mut state, 0, &[27]);
        state.board.properties[27].mortgaged = true;
        state.players[0].balance = 219;
        let events = state
            .apply_action(GameAction::Unmortgage {
                player: 0,
                property: 27,
            })
            .unwrap();
        assert!(is_ignored(&events, NoOpReason::InsufficientFunds));
        assert!(state.board.properties[27].mortgaged);
    }

    #[test]
    fn test_build_and_sell_houses() {
        let mut state = game(2);
        let set = set_of(&state, ColorSet::DarkBlue);
        give(&mut state, 0, &set);
        let park = street_of(&state, set[0]);
        let boardwalk = street_of(&state, set[1]);

        state
            .apply_action(GameAction::Build {
                player: 0,
                street: park,
                quantity: 1,
            })
            .unwrap();
        state
            .apply_action(GameAction::Build {
                player: 0,
                street: boardwalk,
                quantity: 2,
            })
            .unwrap();
        assert_eq!(state.board.properties[set[0]].houses(), 1);
        assert_eq!(state.board.properties[set[1]].houses(), 2);
        assert_eq!(state.players[0].balance, 1500 - 600);
        assert_eq!(state.houses_available, 29);

        state
            .apply_action(GameAction::SellBuilding {
                player: 0,
                street: boardwalk,
                quantity: 1,
            })
            .unwrap();
        assert_eq!(state.players[0].balance, 1500 - 600 + 100);
        assert_eq!(state.houses_available, 30);
        assert!(state.bank_is_conserved());
    }

    #[test]
    fn test_hotel_returns_houses_to_bank() {
        let mut state = game(2);
        let set = set_of(&state, ColorSet::Brown);
        give(&mut state, 0, &set);
        for &id in &set {
            state.board.properties[id].set_buildings(4, 0);
        }
        state.houses_available -= 8;
        let street = street_of(&state, set[0]);

        state
            .apply_action(GameAction::Build {
                player: 0,
                street,
                quantity: 1,
            })
            .unwrap();
        assert_eq!(state.board.properties[set[0]].hotels(), 1);
        assert_eq!(state.board.properties[set[0]].houses(), 0);
        assert_eq!(state.houses_available, 28);
        assert_eq!(state.hotels_available, 11);
        assert!(state.bank_is_conserved());
    }

    #[test]
    fn test_build_on_mortgaged_set_is_error() {
        let mut state = game(2);
        let set = set_of(&state, ColorSet::Brown);
        give(&mut state, 0, &set);
        state.board.properties[set[1]].mortgaged = true;
        let street = street_of(&state, set[0]);
        let result = state.apply_action(GameAction::Build {
            player: 0,
            street,
            quantity: 1,
        });
        assert_eq!(result, Err(GameError::Mortgaged(set[1])));
    }

    #[test]
    fn test_jail_fine_releases() {
        let mut state = game(2);
        state.players[0].in_jail = true;
        state.players[0].position = 10;
        let events = state
            .apply_action(GameAction::RollDice {
                player: 0,
                dice: None,
            })
            .unwrap();
        assert!(is_ignored(&events, NoOpReason::InJail));

        state.apply_action(GameAction::PayJailFine { player: 0 }).unwrap();
        assert!(!state.players[0].in_jail);
        assert_eq!(state.players[0].balance, 1450);
        assert!(GameAction::RollDice {
            player: 0,
            dice: None
        }
        .is_legal(&state));
    }

    #[test]
    fn test_roll_jail_third_failure_pays_and_moves() {
        let mut state = game(2);
        state.players[0].in_jail = true;
        state.players[0].position = 10;
        state.players[0].jail_turns = 2;
        state
            .apply_action(GameAction::RollJail {
                player: 0,
                dice: Some((1, 2)),
            })
            .unwrap();
        assert!(!state.players[0].in_jail);
        assert_eq!(state.players[0].position, 13);
        assert_eq!(state.players[0].balance, 1450);
        assert!(state.rolled_this_turn);
    }

    #[test]
    fn test_roll_jail_failure_stays() {
        let mut state = game(2);
        state.players[0].in_jail = true;
        state.players[0].position = 10;
        let events = state
            .apply_action(GameAction::RollJail {
                player: 0,
                dice: Some((1, 2)),
            })
            .unwrap();
        assert!(state.players[0].in_jail);
        assert_eq!(state.players[0].jail_turns, 1);
        assert!(matches!(
            events.last(),
            Some(GameEvent::JailRollFailed { attempts: 1, .. })
        ));
        assert!(GameAction::EndTurn { player: 0 }.is_legal(&state));
    }

    #[test]
    fn test_use_jail_card_returns_it_to_deck() {
        let mut state = game(2);
        state.players[0].in_jail = true;
        state.players[0].jail_free_cards = 1;
        // Cycle the chance deck once; its jail card is withheld on the way
        for _ in 0..16 {
            let card = state.chance.draw().unwrap();
            state.chance.requeue(card);
        }
        assert!(state.chance.jail_card_out());

        state.apply_action(GameAction::UseJailCard { player: 0 }).unwrap();
        assert!(!state.players[0].in_jail);
        assert_eq!(state.players[0].jail_free_cards, 0);
        assert!(!state.chance.jail_card_out());
        assert_eq!(state.chance.len(), 16);
    }

    #[test]
    fn test_voluntary_bankruptcy_follows_config() {
        let mut state = game(3);
        state.config.voluntary_bankruptcy = false;
        let events = state.apply_action(GameAction::Bankruptcy { player: 1 }).unwrap();
        assert!(is_ignored(&events, NoOpReason::NotInDebt));

        state.config.voluntary_bankruptcy = true;
        state.apply_action(GameAction::Bankruptcy { player: 1 }).unwrap();
        assert_eq!(state.players.len(), 2);
        assert!(state.player(1).is_none());
    }

    #[test]
    fn test_send_message_truncates() {
        let mut state = game(2);
        state.config.max_message_length = 5;
        state
            .apply_action(GameAction::SendMessage {
                player: 1,
                recipient: Some(0),
                message: "  hello there ".into(),
            })
            .unwrap();
        assert_eq!(state.chat_log.len(), 1);
        assert_eq!(state.chat_log[0].text, "hello");
        assert_eq!(state.chat_log[0].to, Some(0));

        let events = state
            .apply_action(GameAction::SendMessage {
                player: 1,
                recipient: None,
                message: "   ".into(),
            })
            .unwrap();
        assert!(is_ignored(&events, NoOpReason::EmptyMessage));
    }

    #[test]
    fn test_unknown_actor_is_error() {
        let mut state = game(2);
        let result = state.apply_action(GameAction::EndTurn { player: 7 });
        assert_eq!(result, Err(GameError::UnknownPlayer(7)));
    }

    proptest! {
        #[test]
        fn prop_build_quantity_moves_houses_cash_and_bank(
            color in prop::sample::select(ColorSet::ALL.to_vec()),
            existing in 0u8..4,
            quantity in 1u8..=4,
            funded in any::<bool>(),
        ) {
            prop_assume!(existing + quantity <= 4);
            let mut state = game(2);
            let set = set_of(&state, color);
            give(&mut state, 0, &set);
            for &id in &set[1..] {
                state.board.properties[id].set_buildings(4, 0);
            }
            state.board.properties[set[0]].set_buildings(existing, 0);
            state.houses_available -= 4 * (set.len() as u32 - 1) + existing as u32;

            let cost = color.house_cost() * quantity as Money;
            if !funded {
                state.players[0].balance = cost - 1;
            }
            let balance = state.players[0].balance;
            let bank = state.houses_available;
            let street = street_of(&state, set[0]);

            let events = state
                .apply_action(GameAction::Build { player: 0, street, quantity })
                .unwrap();

            if funded {
                prop_assert_eq!(state.board.properties[set[0]].houses(), existing + quantity);
                prop_assert_eq!(state.players[0].balance, balance - cost);
                prop_assert_eq!(state.houses_available, bank - quantity as u32);
            } else {
                prop_assert!(is_ignored(&events, NoOpReason::InsufficientFunds));
                prop_assert_eq!(state.board.properties[set[0]].houses(), existing);
                prop_assert_eq!(state.players[0].balance, balance);
                prop_assert_eq!(state.houses_available, bank);
            }
            prop_assert!(state.bank_is_conserved());
        }
    }
}
