//! Auction sub-state.
//!
//! An auction is opened either by a player declining to buy the property
//! they landed on, or by a build attempt while the bank is short of the
//! requested building. Bidding rotates among the remaining participants;
//! the participant list only ever shrinks. Resolution is done by
//! `GameState`, which owns the balances and the bank.

use crate::board::{BuildingType, Money, PlayerId, PropertyId, StreetId};
use serde::{Deserialize, Serialize};

/// What is being auctioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionItem {
    Property(PropertyId),
    /// One unit from the bank, contested during a shortage.
    Building {
        building: BuildingType,
        street: StreetId,
    },
}

/// A single bid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionBid {
    pub bidder: PlayerId,
    pub amount: Money,
}

/// A running auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionState {
    pub item: AuctionItem,
    /// Player whose landing or build attempt opened the auction.
    pub initiator: PlayerId,
    pub participants: Vec<PlayerId>,
    pub bids: Vec<AuctionBid>,
    pub current_bidder_index: usize,
    /// Set once a building auction resolves; the winner must place the unit.
    pub placing_building: bool,
    pub winner: Option<PlayerId>,
}

impl AuctionState {
    pub fn new(
        item: AuctionItem,
        initiator: PlayerId,
        participants: Vec<PlayerId>,
        start_index: usize,
    ) -> Self {
        let current_bidder_index = if participants.is_empty() {
            0
        } else {
            start_index % participants.len()
        };
        Self {
            item,
            initiator,
            participants,
            bids: Vec::new(),
            current_bidder_index,
            placing_building: false,
            winner: None,
        }
    }

    pub fn current_bidder(&self) -> Option<PlayerId> {
        if self.placing_building {
            return None;
        }
        self.participants.get(self.current_bidder_index).copied()
    }

    pub fn is_participant(&self, player: PlayerId) -> bool {
        self.participants.contains(&player)
    }

    pub fn highest_bid(&self) -> Option<&AuctionBid> {
        self.bids.iter().max_by_key(|bid| bid.amount)
    }

    /// Smallest amount the next bid must reach.
    pub fn minimum_bid(&self) -> Money {
        self.highest_bid().map(|bid| bid.amount + 1).unwrap_or(1)
    }

    /// Record a bid and pass the turn to the participant after the bidder.
    ///
    /// The caller has already checked the amount and the bidder.
    pub fn record_bid(&mut self, bidder: PlayerId, amount: Money) {
        self.bids.push(AuctionBid { bidder, amount });
        if let Some(pos) = self.participants.iter().position(|&p| p == bidder) {
            self.current_bidder_index = (pos + 1) % self.participants.len();
        }
    }

    /// Drop a participant. Returns false if they were not bidding.
    pub fn remove_participant(&mut self, player: PlayerId) -> bool {
        let Some(pos) = self.participants.iter().position(|&p| p == player) else {
            return false;
        };
        self.participants.remove(pos);
        if pos < self.current_bidder_index {
            self.current_bidder_index -= 1;
        }
        if self.participants.is_empty() {
            self.current_bidder_index = 0;
        } else {
            self.current_bidder_index %= self.participants.len();
        }
        true
    }

    /// No one left, or a single participant left with at least one bid on the table.
    pub fn is_done(&self) -> bool {
        self.participants.is_empty() || (self.participants.len() == 1 && !self.bids.is_empty())
    }

    /// Who takes the item and at what price, once the auction is done.
    ///
    /// A last participant standing takes the item at the standing high bid.
    /// If everyone folded, the high bidder takes it.
    pub fn outcome(&self) -> Option<(PlayerId, Money)> {
        let high = self.highest_bid()?;
        let winner = match self.participants.as_slice() {
            [last] => *last,
            _ => high.bidder,
        };
        Some((winner, high.amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property_auction(participants: Vec<PlayerId>, start: usize) -> AuctionState {
        AuctionState::new(AuctionItem::Property(3), participants[0], participants, start)
    }

    #[test]
    fn test_bids_rotate_among_participants() {
        let mut auction = property_auction(vec![0, 1, 2], 1);
        assert_eq!(auction.current_bidder(), Some(1));
        assert_eq!(auction.minimum_bid(), 1);

        auction.record_bid(1, 40);
        assert_eq!(auction.current_bidder(), Some(2));
        assert_eq!(auction.minimum_bid(), 41);

        auction.record_bid(2, 60);
        assert_eq!(auction.current_bidder(), Some(0));
    }

    #[test]
    fn test_fold_adjusts_current_index() {
        let mut auction = property_auction(vec![0, 1, 2], 2);
        assert!(auction.remove_participant(0));
        assert_eq!(auction.current_bidder(), Some(2));

        assert!(auction.remove_participant(2));
        assert_eq!(auction.current_bidder(), Some(1));
        assert!(!auction.remove_participant(2));
        assert!(!auction.is_done());
    }

    #[test]
    fn test_last_participant_takes_standing_bid() {
        let mut auction = property_auction(vec![0, 1], 0);
        auction.record_bid(0, 120);
        auction.record_bid(1, 125);
        auction.remove_participant(1);
        assert!(auction.is_done());
        assert_eq!(auction.outcome(), Some((0, 125)));
    }

    #[test]
    fn test_everyone_folds_high_bidder_wins() {
        let mut auction = property_auction(vec![0, 1], 0);
        auction.record_bid(0, 10);
        auction.remove_participant(1);
        auction.remove_participant(0);
        assert!(auction.is_done());
        assert_eq!(auction.outcome(), Some((0, 10)));
    }

    #[test]
    fn test_no_bids_no_outcome() {
        let mut auction = property_auction(vec![0, 1], 0);
        auction.remove_participant(0);
        assert!(!auction.is_done());
        auction.remove_participant(1);
        assert!(auction.is_done());
        assert_eq!(auction.outcome(), None);
    }
}
