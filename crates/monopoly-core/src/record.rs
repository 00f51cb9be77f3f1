//! Action records and notation.
//!
//! An [`ActionRecord`] is a flat JSON object: a `"type"` key naming the
//! action, player `code`s in place of ids, and index fields for properties
//! and streets. Records decode against a live state, so a code or index that
//! no longer resolves is an error.

use crate::actions::{ActionKind, GameAction};
use crate::board::{Money, PlayerId, PropertyId, StreetId};
use crate::game::{GameError, GameState};
use crate::player::Player;
use crate::trade::TradeOffer;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// Key-value encoding of one action
pub type ActionRecord = Map<String, Value>;

impl GameAction {
    /// Encode as a flat record.
    pub fn to_record(&self) -> ActionRecord {
        let mut record = ActionRecord::new();
        record.insert("type".into(), json!(self.kind().name()));

        match self {
            GameAction::ProposeTrade(offer) => {
                record.insert("proposer".into(), json!(Player::code_for(offer.proposer)));
                record.insert("responder".into(), json!(Player::code_for(offer.responder)));
                record.insert("cash_offered".into(), json!(offer.cash_offered));
                record.insert("properties_offered".into(), json!(offer.properties_offered));
                record.insert("jail_cards_offered".into(), json!(offer.jail_cards_offered));
                record.insert("cash_asked".into(), json!(offer.cash_asked));
                record.insert("properties_asked".into(), json!(offer.properties_asked));
                record.insert("jail_cards_asked".into(), json!(offer.jail_cards_asked));
                return record;
            }
            _ => {
                record.insert("player".into(), json!(Player::code_for(self.actor())));
            }
        }

        match self {
            GameAction::RollDice { dice, .. } | GameAction::RollJail { dice, .. } => {
                if let Some((a, b)) = dice {
                    record.insert("dice_roll".into(), json!([a, b]));
                }
            }
            GameAction::AuctionBid { amount, .. } => {
                record.insert("bid_amount".into(), json!(amount));
            }
            GameAction::Mortgage { property, .. } | GameAction::Unmortgage { property, .. } => {
                record.insert("property_index".into(), json!(property));
            }
            GameAction::Build {
                street, quantity, ..
            }
            | GameAction::SellBuilding {
                street, quantity, ..
            } => {
                record.insert("street_index".into(), json!(street));
                record.insert("quantity".into(), json!(quantity));
            }
            GameAction::SendMessage {
                recipient, message, ..
            } => {
                let to = recipient.map(Player::code_for);
                record.insert("recipient".into(), json!(to));
                record.insert("message".into(), json!(message));
            }
            _ => {}
        }
        record
    }

    /// Decode a record against the live state.
    pub fn from_record(record: &ActionRecord, state: &GameState) -> Result<GameAction, GameError> {
        let name = str_field(record, "type")?;
        let kind = ActionKind::from_name(name)
            .ok_or_else(|| GameError::InvalidRecord(format!("unknown action type {}", name)))?;

        let player = || player_field(record, "player", state);
        let action = match kind {
            ActionKind::ProposeTrade => {
                let mut offer = TradeOffer::new(
                    player_field(record, "proposer", state)?,
                    player_field(record, "responder", state)?,
                );
                offer.cash_offered = int_field(record, "cash_offered")?;
                offer.properties_offered = property_list(record, "properties_offered", state)?;
                offer.jail_cards_offered = small_field(record, "jail_cards_offered")?;
                offer.cash_asked = int_field(record, "cash_asked")?;
                offer.properties_asked = property_list(record, "properties_asked", state)?;
                offer.jail_cards_asked = small_field(record, "jail_cards_asked")?;
                GameAction::ProposeTrade(offer)
            }
            ActionKind::RollDice => GameAction::RollDice {
                player: player()?,
                dice: dice_field(record)?,
            },
            ActionKind::RollJail => GameAction::RollJail {
                player: player()?,
                dice: dice_field(record)?,
            },
            ActionKind::EndTurn => GameAction::EndTurn { player: player()? },
            ActionKind::Buy => GameAction::Buy { player: player()? },
            ActionKind::Auction => GameAction::Auction { player: player()? },
            ActionKind::AuctionBid => GameAction::AuctionBid {
                player: player()?,
                amount: int_field(record, "bid_amount")?,
            },
            ActionKind::AuctionFold => GameAction::AuctionFold { player: player()? },
            ActionKind::Mortgage => GameAction::Mortgage {
                player: player()?,
                property: property_field(record, state)?,
            },
            ActionKind::Unmortgage => GameAction::Unmortgage {
                player: player()?,
                property: property_field(record, state)?,
            },
            ActionKind::Build => GameAction::Build {
                player: player()?,
                street: street_field(record, state)?,
                quantity: small_field(record, "quantity")?,
            },
            ActionKind::SellBuilding => GameAction::SellBuilding {
                player: player()?,
                street: street_field(record, state)?,
                quantity: small_field(record, "quantity")?,
            },
            ActionKind::UseJailCard => GameAction::UseJailCard { player: player()? },
            ActionKind::PayJailFine => GameAction::PayJailFine { player: player()? },
            ActionKind::Bankruptcy => GameAction::Bankruptcy { player: player()? },
            ActionKind::AcceptTrade => GameAction::AcceptTrade { player: player()? },
            ActionKind::RejectTrade => GameAction::RejectTrade { player: player()? },
            ActionKind::SendMessage => {
                let recipient = match record.get("recipient") {
                    None | Some(Value::Null) => None,
                    Some(_) => Some(player_field(record, "recipient", state)?),
                };
                GameAction::SendMessage {
                    player: player()?,
                    recipient,
                    message: str_field(record, "message")?.to_string(),
                }
            }
        };
        Ok(action)
    }

    /// One-line notation for logs, e.g. `P1 B@5:$200` or `T(P1>P2:$50/#3)`.
    pub fn to_notation(&self, state: &GameState) -> String {
        let code = Player::code_for(self.actor());
        match self {
            GameAction::RollDice { dice, .. } => match dice {
                Some((a, b)) => format!("{} ROLL {}+{}", code, a, b),
                None => format!("{} ROLL", code),
            },
            GameAction::EndTurn { .. } => format!("{} END", code),
            GameAction::Buy { .. } => match state
                .pending_property()
                .and_then(|id| state.board.property(id))
            {
                Some(property) => format!("{} B@{}:${}", code, property.id, property.price),
                None => format!("{} B", code),
            },
            GameAction::Auction { .. } => match state.pending_property() {
                Some(id) => format!("{} AU@{}", code, id),
                None => format!("{} AU", code),
            },
            GameAction::AuctionBid { amount, .. } => format!("{} ${}", code, amount),
            GameAction::AuctionFold { .. } => format!("{} FOLD", code),
            GameAction::Mortgage { property, .. } => format!("{} M@{}", code, property),
            GameAction::Unmortgage { property, .. } => format!("{} U@{}", code, property),
            GameAction::Build {
                street, quantity, ..
            } => format!("{} H@{}x{}", code, street, quantity),
            GameAction::SellBuilding {
                street, quantity, ..
            } => format!("{} S@{}x{}", code, street, quantity),
            GameAction::UseJailCard { .. } => format!("{} GOOJF", code),
            GameAction::PayJailFine { .. } => format!("{} FINE", code),
            GameAction::RollJail { .. } => format!("{} JROLL", code),
            GameAction::Bankruptcy { .. } => format!("{} BANKRUPT", code),
            GameAction::ProposeTrade(offer) => format!(
                "T({}>{}:{}/{})",
                code,
                Player::code_for(offer.responder),
                trade_side(
                    offer.cash_offered,
                    &offer.properties_offered,
                    offer.jail_cards_offered
                ),
                trade_side(offer.cash_asked, &offer.properties_asked, offer.jail_cards_asked),
            ),
            GameAction::AcceptTrade { .. } => format!("{} ACCEPT", code),
            GameAction::RejectTrade { .. } => format!("{} REJECT", code),
            GameAction::SendMessage { recipient, .. } => match recipient {
                Some(to) => format!("{} MSG>{}", code, Player::code_for(*to)),
                None => format!("{} MSG>ALL", code),
            },
        }
    }
}

fn trade_side(cash: Money, properties: &BTreeSet<PropertyId>, jail_cards: u8) -> String {
    let mut parts = Vec::new();
    if cash > 0 {
        parts.push(format!("${}", cash));
    }
    parts.extend(properties.iter().map(|id| format!("#{}", id)));
    if jail_cards > 0 {
        parts.push(format!("J{}", jail_cards));
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join("+")
    }
}

// ==================== Field Decoding ====================

fn field<'a>(record: &'a ActionRecord, key: &str) -> Result<&'a Value, GameError> {
    record
        .get(key)
        .ok_or_else(|| GameError::InvalidRecord(format!("missing {}", key)))
}

fn str_field<'a>(record: &'a ActionRecord, key: &str) -> Result<&'a str, GameError> {
    field(record, key)?
        .as_str()
        .ok_or_else(|| GameError::InvalidRecord(format!("{} is not a string", key)))
}

fn int_field(record: &ActionRecord, key: &str) -> Result<Money, GameError> {
    field(record, key)?
        .as_i64()
        .ok_or_else(|| GameError::InvalidRecord(format!("{} is not an integer", key)))
}

fn small_field(record: &ActionRecord, key: &str) -> Result<u8, GameError> {
    let value = int_field(record, key)?;
    u8::try_from(value).map_err(|_| GameError::InvalidRecord(format!("{} out of range", key)))
}

fn index_field(record: &ActionRecord, key: &str) -> Result<usize, GameError> {
    let value = int_field(record, key)?;
    usize::try_from(value).map_err(|_| GameError::InvalidRecord(format!("{} out of range", key)))
}

fn player_field(record: &ActionRecord, key: &str, state: &GameState) -> Result<PlayerId, GameError> {
    let code = str_field(record, key)?;
    state
        .player_by_code(code)
        .map(|p| p.id)
        .ok_or_else(|| GameError::UnknownPlayerCode(code.to_string()))
}

fn property_field(record: &ActionRecord, state: &GameState) -> Result<PropertyId, GameError> {
    let id = index_field(record, "property_index")?;
    state
        .board
        .property(id)
        .map(|p| p.id)
        .ok_or(GameError::UnknownProperty(id))
}

fn street_field(record: &ActionRecord, state: &GameState) -> Result<StreetId, GameError> {
    let street = index_field(record, "street_index")?;
    state
        .board
        .street(street)
        .map(|_| street)
        .ok_or(GameError::UnknownStreet(street))
}

fn property_list(
    record: &ActionRecord,
    key: &str,
    state: &GameState,
) -> Result<BTreeSet<PropertyId>, GameError> {
    let values = field(record, key)?
        .as_array()
        .ok_or_else(|| GameError::InvalidRecord(format!("{} is not a list", key)))?;
    values
        .iter()
        .map(|value| {
            let id = value
                .as_u64()
                .ok_or_else(|| GameError::InvalidRecord(format!("bad entry in {}", key)))?
                as usize;
            state
                .board
                .property(id)
                .map(|p| p.id)
                .ok_or(GameError::UnknownProperty(id))
        })
        .collect()
}

fn dice_field(record: &ActionRecord) -> Result<Option<(u8, u8)>, GameError> {
    let Some(value) = record.get("dice_roll") else {
        return Ok(None);
    };
    let pair: Vec<u8> = value
        .as_array()
        .map(|dice| {
            dice.iter()
                .filter_map(|d| d.as_u64().and_then(|d| u8::try_from(d).ok()))
                .collect()
        })
        .unwrap_or_default();
    match pair.as_slice() {
        [a, b] => Ok(Some((*a, *b))),
        _ => Err(GameError::InvalidRecord("dice_roll needs two dice".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn game() -> GameState {
        GameState::new(vec!["A".into(), "B".into(), "C".into()], 9).unwrap()
    }

    #[test]
    fn test_build_record_fields() {
        let state = game();
        let action = GameAction::Build {
            player: 1,
            street: 4,
            quantity: 2,
        };
        let record = action.to_record();
        assert_eq!(record["type"], json!("Build"));
        assert_eq!(record["player"], json!("P2"));
        assert_eq!(record["street_index"], json!(4));
        assert_eq!(record["quantity"], json!(2));
        assert_eq!(GameAction::from_record(&record, &state), Ok(action));
    }

    #[test]
    fn test_trade_record_round_trip() {
        let state = game();
        let mut offer = TradeOffer::new(0, 2);
        offer.cash_offered = 75;
        offer.properties_asked.insert(5);
        offer.properties_asked.insert(12);
        offer.jail_cards_asked = 1;
        let action = GameAction::ProposeTrade(offer);

        let record = action.to_record();
        assert_eq!(record["proposer"], json!("P1"));
        assert_eq!(record["properties_asked"], json!([5, 12]));
        assert_eq!(GameAction::from_record(&record, &state), Ok(action));
    }

    #[test]
    fn test_record_survives_json_text() {
        let state = game();
        let action = GameAction::RollDice {
            player: 0,
            dice: Some((3, 4)),
        };
        let text = serde_json::to_string(&action.to_record()).unwrap();
        let parsed: ActionRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(GameAction::from_record(&parsed, &state), Ok(action));
    }

    #[test]
    fn test_unknown_code_is_error() {
        let state = game();
        let mut record = GameAction::EndTurn { player: 0 }.to_record();
        record.insert("player".into(), json!("P9"));
        assert_eq!(
            GameAction::from_record(&record, &state),
            Err(GameError::UnknownPlayerCode("P9".into()))
        );
    }

    #[test]
    fn test_unknown_property_and_type_are_errors() {
        let state = game();
        let mut record = GameAction::Mortgage {
            player: 0,
            property: 3,
        }
        .to_record();
        record.insert("property_index".into(), json!(40));
        assert_eq!(
            GameAction::from_record(&record, &state),
            Err(GameError::UnknownProperty(40))
        );

        record.insert("type".into(), json!("Teleport"));
        assert!(matches!(
            GameAction::from_record(&record, &state),
            Err(GameError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_notation() {
        let mut state = game();
        state.players[0].position = 5;
        state.decision_made_this_landing = false;
        let reading = state.board.property_at(5).unwrap();
        assert_eq!(
            GameAction::Buy { player: 0 }.to_notation(&state),
            format!("P1 B@{}:$200", reading)
        );
        assert_eq!(
            GameAction::Build {
                player: 1,
                street: 3,
                quantity: 2
            }
            .to_notation(&state),
            "P2 H@3x2"
        );

        let mut offer = TradeOffer::new(0, 1);
        offer.cash_offered = 50;
        offer.properties_asked.insert(3);
        assert_eq!(
            GameAction::ProposeTrade(offer).to_notation(&state),
            "T(P1>P2:$50/#3)"
        );
    }
}
