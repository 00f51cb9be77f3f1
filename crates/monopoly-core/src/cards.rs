//! Chance and Community Chest decks.
//!
//! Cards are plain data: an id, the printed text and a list of effects that
//! `GameState` interprets. Decks draw from the back and put used cards back
//! at the front. The "get out of jail free" card is not put back; it stays
//! out of circulation until its holder uses it or goes bankrupt.

use crate::board::{Money, PropertyGroup, GO_POSITION};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which deck a card belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckKind {
    Chance,
    CommunityChest,
}

/// One operation attached to a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardEffect {
    /// Move forward to a position, collecting GO salary when wrapping.
    AdvanceTo { position: usize },
    /// Move forward to the next property of a group.
    AdvanceToNearest { group: PropertyGroup },
    /// Move backwards a number of tiles.
    MoveBack { spaces: usize },
    GoToJail,
    /// Bank pays the player.
    Collect { amount: Money },
    /// Player pays the bank.
    Pay { amount: Money },
    /// Pay per building owned.
    Repairs { per_house: Money, per_hotel: Money },
    PayEachPlayer { amount: Money },
    CollectFromEachPlayer { amount: Money },
    GetOutOfJailFree,
}

/// A printed card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: u8,
    pub text: String,
    pub effects: Vec<CardEffect>,
}

impl Card {
    fn new(id: u8, text: &str, effects: Vec<CardEffect>) -> Self {
        Self {
            id,
            text: text.to_string(),
            effects,
        }
    }

    /// Whether this card is kept by the player instead of going back in the deck.
    pub fn is_jail_free(&self) -> bool {
        self.effects.contains(&CardEffect::GetOutOfJailFree)
    }
}

/// A 16-card deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub kind: DeckKind,
    cards: VecDeque<Card>,
    /// The jail-free card while a player holds it.
    withheld: Option<Card>,
}

impl Deck {
    pub fn new(kind: DeckKind, cards: Vec<Card>) -> Self {
        Self {
            kind,
            cards: cards.into(),
            withheld: None,
        }
    }

    /// Standard deck in printed order
    pub fn standard(kind: DeckKind) -> Self {
        match kind {
            DeckKind::Chance => Self::new(kind, chance_cards()),
            DeckKind::CommunityChest => Self::new(kind, community_chest_cards()),
        }
    }

    /// Standard deck, shuffled
    pub fn shuffled<R: Rng>(kind: DeckKind, rng: &mut R) -> Self {
        let mut cards: Vec<Card> = Self::standard(kind).cards.into();
        cards.shuffle(rng);
        Self::new(kind, cards)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop_back()
    }

    /// Put a drawn card back. The jail-free card is withheld instead.
    pub fn requeue(&mut self, card: Card) {
        if card.is_jail_free() {
            self.withheld = Some(card);
        } else {
            self.cards.push_front(card);
        }
    }

    pub fn jail_card_out(&self) -> bool {
        self.withheld.is_some()
    }

    /// Reinsert the withheld jail-free card. Returns false if none was out.
    pub fn return_jail_card(&mut self) -> bool {
        match self.withheld.take() {
            Some(card) => {
                self.cards.push_front(card);
                true
            }
            None => false,
        }
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }
}

fn chance_cards() -> Vec<Card> {
    use CardEffect::*;
    vec![
        Card::new(1, "Advance to Go (Collect $200).", vec![AdvanceTo { position: GO_POSITION }]),
        Card::new(
            2,
            "Advance to Illinois Avenue. If you pass Go, collect $200.",
            vec![AdvanceTo { position: 24 }],
        ),
        Card::new(
            3,
            "Advance to St. Charles Place. If you pass Go, collect $200.",
            vec![AdvanceTo { position: 11 }],
        ),
        Card::new(
            4,
            "Advance token to the nearest Utility.",
            vec![AdvanceToNearest { group: PropertyGroup::Utility }],
        ),
        Card::new(
            5,
            "Advance token to the nearest Railroad.",
            vec![AdvanceToNearest { group: PropertyGroup::Railroad }],
        ),
        Card::new(6, "Bank pays you dividend of $50.", vec![Collect { amount: 50 }]),
        Card::new(
            7,
            "Get Out of Jail Free. This card may be kept until needed, or traded.",
            vec![GetOutOfJailFree],
        ),
        Card::new(8, "Go Back 3 Spaces.", vec![MoveBack { spaces: 3 }]),
        Card::new(
            9,
            "Go to Jail. Go directly to jail, do not pass Go, do not collect $200.",
            vec![GoToJail],
        ),
        Card::new(
            10,
            "Make general repairs on all your property: For each house pay $25, for each hotel pay $100.",
            vec![Repairs { per_house: 25, per_hotel: 100 }],
        ),
        Card::new(11, "Pay poor tax of $15.", vec![Pay { amount: 15 }]),
        Card::new(
            12,
            "Take a trip to Reading Railroad. If you pass Go, collect $200.",
            vec![AdvanceTo { position: 5 }],
        ),
        Card::new(
            13,
            "Take a walk on the Boardwalk. Advance token to Boardwalk.",
            vec![AdvanceTo { position: 39 }],
        ),
        Card::new(
            14,
            "You have been elected Chairman of the Board. Pay each player $50.",
            vec![PayEachPlayer { amount: 50 }],
        ),
        Card::new(15, "Your building loan matures. Collect $150.", vec![Collect { amount: 150 }]),
        Card::new(16, "Receive for services $25.", vec![Collect { amount: 25 }]),
    ]
}

fn community_chest_cards() -> Vec<Card> {
    use CardEffect::*;
    vec![
        Card::new(1, "Advance to Go (Collect $200).", vec![AdvanceTo { position: GO_POSITION }]),
        Card::new(2, "Bank error in your favor. Collect $200.", vec![Collect { amount: 200 }]),
        Card::new(3, "Doctor's fees. Pay $50.", vec![Pay { amount: 50 }]),
        Card::new(4, "From sale of stock you get $50.", vec![Collect { amount: 50 }]),
        Card::new(
            5,
            "Get Out of Jail Free. This card may be kept until needed, or traded.",
            vec![GetOutOfJailFree],
        ),
        Card::new(
            6,
            "Go to Jail. Go directly to jail, do not pass Go, do not collect $200.",
            vec![GoToJail],
        ),
        Card::new(
            7,
            "Grand Opera Night. Collect $50 from every player for opening night seats.",
            vec![CollectFromEachPlayer { amount: 50 }],
        ),
        Card::new(8, "Holiday Fund matures. Receive $100.", vec![Collect { amount: 100 }]),
        Card::new(9, "Income tax refund. Collect $20.", vec![Collect { amount: 20 }]),
        Card::new(
            10,
            "It is your birthday. Collect $10 from every player.",
            vec![CollectFromEachPlayer { amount: 10 }],
        ),
        Card::new(11, "Life insurance matures. Collect $100.", vec![Collect { amount: 100 }]),
        Card::new(12, "Pay hospital fees of $100.", vec![Pay { amount: 100 }]),
        Card::new(13, "Pay school fees of $150.", vec![Pay { amount: 150 }]),
        Card::new(14, "Receive $25 consultancy fee.", vec![Collect { amount: 25 }]),
        Card::new(
            15,
            "You inherit $100.",
            vec![Collect { amount: 100 }],
        ),
        Card::new(
            16,
            "You are assessed for street repairs: $40 per house, $115 per hotel.",
            vec![Repairs { per_house: 40, per_hotel: 115 }],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_standard_decks_have_sixteen_cards() {
        for kind in [DeckKind::Chance, DeckKind::CommunityChest] {
            let deck = Deck::standard(kind);
            assert_eq!(deck.len(), 16);
            assert_eq!(deck.cards().filter(|c| c.is_jail_free()).count(), 1);
        }
    }

    #[test]
    fn test_draw_from_back_requeue_at_front() {
        let mut deck = Deck::standard(DeckKind::Chance);
        let card = deck.draw().unwrap();
        assert_eq!(card.id, 16);
        deck.requeue(card);
        assert_eq!(deck.len(), 16);
        assert_eq!(deck.cards().next().unwrap().id, 16);
        assert_eq!(deck.draw().unwrap().id, 15);
    }

    #[test]
    fn test_jail_card_is_withheld_until_returned() {
        let mut deck = Deck::standard(DeckKind::CommunityChest);
        let mut drawn = None;
        while let Some(card) = deck.draw() {
            if card.is_jail_free() {
                drawn = Some(card);
                break;
            }
            deck.requeue(card);
        }
        deck.requeue(drawn.unwrap());
        assert_eq!(deck.len(), 15);
        assert!(deck.jail_card_out());

        assert!(deck.return_jail_card());
        assert_eq!(deck.len(), 16);
        assert!(!deck.jail_card_out());
        assert!(!deck.return_jail_card());
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let a = Deck::shuffled(DeckKind::Chance, &mut StdRng::seed_from_u64(7));
        let b = Deck::shuffled(DeckKind::Chance, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
