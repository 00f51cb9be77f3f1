//! Legality masks.
//!
//! Each [`ActionKind`] exposes the choices open to an actor two ways: a flat
//! boolean vector over a fixed-width index range, and one boolean vector per
//! bounded parameter for the hierarchical action space. Both are derived from
//! [`GameAction::check`], so a masked-in choice always applies cleanly.

use crate::actions::{ActionKind, GameAction};
use crate::board::{Money, PlayerId, PropertyId};
use crate::config::EngineConfig;
use crate::game::{GameError, GameState};
use crate::trade::TradeOffer;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-parameter masks, keyed by parameter name
pub type ParamMask = BTreeMap<String, Vec<bool>>;

/// Chosen parameter indices, keyed by parameter name.
///
/// Single-valued parameters carry exactly one index; multi-select parameters
/// carry any number.
pub type ParamChoice = BTreeMap<String, Vec<usize>>;

/// A bounded discrete parameter of an action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub width: usize,
    pub multi_select: bool,
}

impl ParamSpec {
    const fn single(name: &'static str, width: usize) -> Self {
        Self {
            name,
            width,
            multi_select: false,
        }
    }

    const fn multi(name: &'static str, width: usize) -> Self {
        Self {
            name,
            width,
            multi_select: true,
        }
    }
}

// Trade parameter names
const TRADE_PARTNER: &str = "trade_partner";
const CASH_OFFERED: &str = "cash_offered";
const PROPERTIES_OFFERED: &str = "properties_offered";
const JAIL_CARDS_OFFERED: &str = "get_out_of_jail_cards_offered";
const CASH_ASKING: &str = "cash_asking";
const PROPERTIES_ASKING: &str = "properties_asking";
const JAIL_CARDS_ASKING: &str = "get_out_of_jail_cards_asking";

/// Everyone except `actor`, in seat order.
pub(crate) fn other_players(state: &GameState, actor: PlayerId) -> Vec<PlayerId> {
    state
        .players
        .iter()
        .filter(|p| p.id != actor)
        .map(|p| p.id)
        .collect()
}

fn range_mask(width: usize, low: Money, high: Money) -> Vec<bool> {
    (0..width)
        .map(|i| {
            let value = i as Money;
            value >= low && value <= high
        })
        .collect()
}

impl ActionKind {
    /// Width of this action's slice of the flat action space.
    pub fn flat_width(&self, config: &EngineConfig) -> usize {
        match self {
            ActionKind::AuctionBid => config.cash_width(),
            ActionKind::Mortgage | ActionKind::Unmortgage => config.max_properties,
            ActionKind::Build | ActionKind::SellBuilding => {
                config.max_streets * config.max_build_count as usize
            }
            ActionKind::ProposeTrade | ActionKind::SendMessage => 0,
            _ => 1,
        }
    }

    /// Parameters of the hierarchical action space.
    pub fn params(&self, config: &EngineConfig) -> Vec<ParamSpec> {
        let cash = config.cash_width();
        match self {
            ActionKind::RollDice => vec![ParamSpec::single("roll", 1)],
            ActionKind::EndTurn => vec![ParamSpec::single("valid", 1)],
            ActionKind::Buy => vec![ParamSpec::single("property", 1)],
            ActionKind::Auction => vec![ParamSpec::single("auction_item", 1)],
            ActionKind::AuctionBid => vec![ParamSpec::single("bid_amount", cash)],
            ActionKind::Mortgage | ActionKind::Unmortgage => {
                vec![ParamSpec::single("property", config.max_properties)]
            }
            ActionKind::Build | ActionKind::SellBuilding => vec![
                ParamSpec::single("street", config.max_streets),
                ParamSpec::single("quantity", config.max_build_count as usize),
            ],
            ActionKind::UseJailCard => vec![ParamSpec::single("use_card", 1)],
            ActionKind::PayJailFine => vec![ParamSpec::single("pay_fine", 1)],
            ActionKind::RollJail => vec![ParamSpec::single("roll", 1)],
            ActionKind::Bankruptcy => vec![ParamSpec::single("bankrupt", 1)],
            ActionKind::AuctionFold => vec![ParamSpec::single("fold", 1)],
            ActionKind::ProposeTrade => vec![
                ParamSpec::single(TRADE_PARTNER, config.max_players.saturating_sub(1)),
                ParamSpec::single(CASH_OFFERED, cash),
                ParamSpec::multi(PROPERTIES_OFFERED, config.max_properties),
                ParamSpec::single(JAIL_CARDS_OFFERED, 2),
                ParamSpec::single(CASH_ASKING, cash),
                ParamSpec::multi(PROPERTIES_ASKING, config.max_properties),
                ParamSpec::single(JAIL_CARDS_ASKING, 2),
            ],
            ActionKind::AcceptTrade => vec![ParamSpec::single("accept", 1)],
            ActionKind::RejectTrade => vec![ParamSpec::single("reject", 1)],
            ActionKind::SendMessage => vec![
                ParamSpec::single("recipient", config.max_players + 1),
                ParamSpec::single("message", 1),
            ],
        }
    }

    /// The action at a local flat index, or `None` past the width.
    pub fn flat_action(
        &self,
        config: &EngineConfig,
        actor: PlayerId,
        index: usize,
    ) -> Option<GameAction> {
        if index >= self.flat_width(config) {
            return None;
        }
        let per_street = config.max_build_count as usize;
        let action = match self {
            ActionKind::RollDice => GameAction::RollDice {
                player: actor,
                dice: None,
            },
            ActionKind::EndTurn => GameAction::EndTurn { player: actor },
            ActionKind::Buy => GameAction::Buy { player: actor },
            ActionKind::Auction => GameAction::Auction { player: actor },
            ActionKind::AuctionBid => GameAction::AuctionBid {
                player: actor,
                amount: index as Money,
            },
            ActionKind::Mortgage => GameAction::Mortgage {
                player: actor,
                property: index,
            },
            ActionKind::Unmortgage => GameAction::Unmortgage {
                player: actor,
                property: index,
            },
            ActionKind::Build => GameAction::Build {
                player: actor,
                street: index / per_street,
                quantity: (index % per_street) as u8 + 1,
            },
            ActionKind::SellBuilding => GameAction::SellBuilding {
                player: actor,
                street: index / per_street,
                quantity: (index % per_street) as u8 + 1,
            },
            ActionKind::UseJailCard => GameAction::UseJailCard { player: actor },
            ActionKind::PayJailFine => GameAction::PayJailFine { player: actor },
            ActionKind::RollJail => GameAction::RollJail {
                player: actor,
                dice: None,
            },
            ActionKind::Bankruptcy => GameAction::Bankruptcy { player: actor },
            ActionKind::AuctionFold => GameAction::AuctionFold { player: actor },
            ActionKind::AcceptTrade => GameAction::AcceptTrade { player: actor },
            ActionKind::RejectTrade => GameAction::RejectTrade { player: actor },
            ActionKind::ProposeTrade | ActionKind::SendMessage => return None,
        };
        Some(action)
    }

    /// Legal local flat indices for `actor`.
    pub fn flat_mask(&self, state: &GameState, actor: PlayerId) -> Vec<bool> {
        let width = self.flat_width(&state.config);
        match self {
            ActionKind::AuctionBid => {
                // Legality is monotone in the amount: test the floor, then fill up to the balance.
                let Some(auction) = &state.auction else {
                    return vec![false; width];
                };
                let floor = auction.minimum_bid();
                let probe = GameAction::AuctionBid {
                    player: actor,
                    amount: floor,
                };
                if !probe.is_offered(state) {
                    return vec![false; width];
                }
                range_mask(width, floor, state.balance_of(actor))
            }
            _ => (0..width)
                .map(|index| {
                    self.flat_action(&state.config, actor, index)
                        .map(|action| action.is_offered(state))
                        .unwrap_or(false)
                })
                .collect(),
        }
    }

    /// Per-parameter masks for `actor`.
    pub fn structured_mask(&self, state: &GameState, actor: PlayerId) -> ParamMask {
        let config = &state.config;
        let mut masks = ParamMask::new();
        match self {
            ActionKind::Build | ActionKind::SellBuilding => {
                let per_street = config.max_build_count as usize;
                let flat = self.flat_mask(state, actor);
                let mut streets = vec![false; config.max_streets];
                let mut quantities = vec![false; per_street];
                for (index, _) in flat.iter().enumerate().filter(|(_, ok)| **ok) {
                    streets[index / per_street] = true;
                    quantities[index % per_street] = true;
                }
                masks.insert("street".into(), streets);
                masks.insert("quantity".into(), quantities);
            }
            ActionKind::ProposeTrade => return trade_masks(state, actor),
            ActionKind::SendMessage => {
                let others = other_players(state, actor);
                let width = config.max_players + 1;
                let can_send = state.player(actor).is_some() && !others.is_empty();
                let recipients = (0..width)
                    .map(|i| can_send && i <= others.len())
                    .collect();
                masks.insert("recipient".into(), recipients);
                masks.insert("message".into(), vec![can_send]);
            }
            _ => {
                let params = self.params(config);
                if let Some(param) = params.first() {
                    masks.insert(param.name.into(), self.flat_mask(state, actor));
                }
            }
        }
        masks
    }

    /// Build the action named by a hierarchical choice.
    ///
    /// Indices are resolved against the live state (trade partners and chat
    /// recipients are "the k-th other player"). The result is not checked
    /// for legality here beyond what resolution needs.
    pub fn from_params(
        &self,
        state: &GameState,
        actor: PlayerId,
        params: &ParamChoice,
        message: Option<&str>,
    ) -> Result<GameAction, GameError> {
        let config = &state.config;
        match self {
            ActionKind::Build | ActionKind::SellBuilding => {
                let street = single(params, "street")?;
                let quantity = single(params, "quantity")?;
                let per_street = config.max_build_count as usize;
                if street >= config.max_streets || quantity >= per_street {
                    return Err(GameError::InvalidParameter(format!(
                        "street {} quantity {}",
                        street, quantity
                    )));
                }
                self.flat_action(config, actor, street * per_street + quantity)
                    .ok_or(GameError::ActionOutOfRange(street * per_street + quantity))
            }

            ActionKind::ProposeTrade => {
                let others = other_players(state, actor);
                let partner = single(params, TRADE_PARTNER)?;
                let responder = *others
                    .get(partner)
                    .ok_or_else(|| GameError::InvalidParameter(TRADE_PARTNER.into()))?;
                let mut offer = TradeOffer::new(actor, responder);
                offer.cash_offered = single(params, CASH_OFFERED)? as Money;
                offer.properties_offered = multi(params, PROPERTIES_OFFERED);
                offer.jail_cards_offered = single(params, JAIL_CARDS_OFFERED)? as u8;
                offer.cash_asked = single(params, CASH_ASKING)? as Money;
                offer.properties_asked = multi(params, PROPERTIES_ASKING);
                offer.jail_cards_asked = single(params, JAIL_CARDS_ASKING)? as u8;
                // The combination must hold on both sides, not just per parameter.
                offer.validate(state).map_err(|failure| {
                    GameError::IllegalAction(format!("{}: {}", self.name(), failure))
                })?;
                Ok(GameAction::ProposeTrade(offer))
            }

            ActionKind::SendMessage => {
                let others = other_players(state, actor);
                let recipient = match single(params, "recipient")? {
                    0 => None,
                    k => Some(
                        *others
                            .get(k - 1)
                            .ok_or_else(|| GameError::InvalidParameter("recipient".into()))?,
                    ),
                };
                Ok(GameAction::SendMessage {
                    player: actor,
                    recipient,
                    message: message.unwrap_or_default().to_string(),
                })
            }

            _ => {
                let params_spec = self.params(config);
                let name = params_spec
                    .first()
                    .map(|p| p.name)
                    .ok_or_else(|| GameError::InvalidParameter(self.name().into()))?;
                let index = single(params, name)?;
                self.flat_action(config, actor, index)
                    .ok_or(GameError::ActionOutOfRange(index))
            }
        }
    }
}

fn single(params: &ParamChoice, name: &str) -> Result<usize, GameError> {
    match params.get(name).map(Vec::as_slice) {
        Some([value]) => Ok(*value),
        _ => Err(GameError::InvalidParameter(format!(
            "{} needs exactly one value",
            name
        ))),
    }
}

fn multi(params: &ParamChoice, name: &str) -> BTreeSet<PropertyId> {
    params
        .get(name)
        .map(|values| values.iter().copied().collect())
        .unwrap_or_default()
}

fn trade_masks(state: &GameState, actor: PlayerId) -> ParamMask {
    let config = &state.config;
    let cash = config.cash_width();
    let mut masks = ParamMask::new();
    for spec in ActionKind::ProposeTrade.params(config) {
        masks.insert(spec.name.into(), vec![false; spec.width]);
    }

    let Some(proposer) = state.player(actor) else {
        return masks;
    };
    let can_propose = state.current_player_id() == Some(actor)
        && state.auction.is_none()
        && state.pending_trade.is_none();
    let others = other_players(state, actor);
    if !can_propose || others.is_empty() {
        return masks;
    }

    let tradable = |owner: PlayerId, id: PropertyId| {
        state
            .board
            .property(id)
            .map(|p| p.owner == Some(owner))
            .unwrap_or(false)
            && !state.color_set_has_buildings(id)
    };
    let richest_other = others
        .iter()
        .map(|&id| state.balance_of(id))
        .max()
        .unwrap_or(0);
    let others_hold_card = others
        .iter()
        .any(|&id| state.player(id).map(|p| p.jail_free_cards > 0).unwrap_or(false));

    masks.insert(
        TRADE_PARTNER.into(),
        (0..config.max_players.saturating_sub(1))
            .map(|i| i < others.len())
            .collect(),
    );
    masks.insert(CASH_OFFERED.into(), range_mask(cash, 0, proposer.balance));
    masks.insert(
        PROPERTIES_OFFERED.into(),
        (0..config.max_properties)
            .map(|id| tradable(actor, id))
            .collect(),
    );
    masks.insert(
        JAIL_CARDS_OFFERED.into(),
        vec![true, proposer.jail_free_cards > 0],
    );
    masks.insert(CASH_ASKING.into(), range_mask(cash, 0, richest_other));
    masks.insert(
        PROPERTIES_ASKING.into(),
        (0..config.max_properties)
            .map(|id| others.iter().any(|&other| tradable(other, id)))
            .collect(),
    );
    masks.insert(JAIL_CARDS_ASKING.into(), vec![true, others_hold_card]);
    masks
}

impl GameAction {
    /// Legal, and offered by the masks.
    ///
    /// `apply` accepts voluntary bankruptcy when the config allows it, but the
    /// masks only offer bankruptcy to an actor in debt.
    pub fn is_offered(&self, state: &GameState) -> bool {
        if !self.is_legal(state) {
            return false;
        }
        match self {
            GameAction::Bankruptcy { player } => state.balance_of(*player) < 0,
            _ => true,
        }
    }
}

impl GameState {
    /// Every flat-encodable action the current actor may take right now.
    pub fn valid_actions(&self) -> Vec<GameAction> {
        let Some(actor) = self.current_actor() else {
            return Vec::new();
        };
        ActionKind::ALL
            .iter()
            .flat_map(|kind| {
                kind.flat_mask(self, actor)
                    .into_iter()
                    .enumerate()
                    .filter(|(_, ok)| *ok)
                    .filter_map(|(index, _)| kind.flat_action(&self.config, actor, index))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
