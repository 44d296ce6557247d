//! Conquest card trading.
//!
//! Capturing at least one territory in a turn earns one weighted-random
//! card. Hands are traded in sets of three for an escalating IPC payout
//! indexed by the player's personal trade count.

use crate::rng::Dice;
use serde::{Deserialize, Serialize};

/// Symbols printed on conquest cards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardSymbol {
    Infantry,
    Cavalry,
    Artillery,
    /// Substitutes for any regular symbol.
    Wild,
}

impl CardSymbol {
    pub const REGULARS: [CardSymbol; 3] =
        [CardSymbol::Infantry, CardSymbol::Cavalry, CardSymbol::Artillery];
}

/// Draw weight of each regular symbol.
const REGULAR_WEIGHT: u32 = 6;
/// Draw weight of the wild symbol.
const WILD_WEIGHT: u32 = 2;

/// Draw one card with the standard weighting: the three regular symbols at
/// equal higher weight, wild rarer.
pub fn draw_card(rng: &mut dyn Dice) -> CardSymbol {
    let total = REGULAR_WEIGHT * 3 + WILD_WEIGHT;
    let pick = rng.next_range(total);
    match pick / REGULAR_WEIGHT {
        0 => CardSymbol::Infantry,
        1 => CardSymbol::Cavalry,
        2 => CardSymbol::Artillery,
        _ => CardSymbol::Wild,
    }
}

/// A set of three cards is tradeable when the wilds can complete either a
/// three-of-a-kind or a one-of-each-regular run.
pub fn is_valid_set(set: &[CardSymbol; 3]) -> bool {
    let wilds = set.iter().filter(|c| **c == CardSymbol::Wild).count();
    if wilds >= 1 {
        // Any pair of cards is completable by a wild.
        return true;
    }
    let all_same = set[0] == set[1] && set[1] == set[2];
    let one_of_each = CardSymbol::REGULARS
        .iter()
        .all(|symbol| set.contains(symbol));
    all_same || one_of_each
}

/// A player's hand of conquest cards, as a multiset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHand {
    infantry: u32,
    cavalry: u32,
    artillery: u32,
    wild: u32,
}

impl CardHand {
    /// An empty hand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cards of a symbol.
    pub fn count(&self, symbol: CardSymbol) -> u32 {
        match symbol {
            CardSymbol::Infantry => self.infantry,
            CardSymbol::Cavalry => self.cavalry,
            CardSymbol::Artillery => self.artillery,
            CardSymbol::Wild => self.wild,
        }
    }

    fn count_mut(&mut self, symbol: CardSymbol) -> &mut u32 {
        match symbol {
            CardSymbol::Infantry => &mut self.infantry,
            CardSymbol::Cavalry => &mut self.cavalry,
            CardSymbol::Artillery => &mut self.artillery,
            CardSymbol::Wild => &mut self.wild,
        }
    }

    /// Total cards held.
    pub fn total(&self) -> u32 {
        self.infantry + self.cavalry + self.artillery + self.wild
    }

    /// Add one card.
    pub fn add(&mut self, symbol: CardSymbol) {
        *self.count_mut(symbol) += 1;
    }

    /// Whether the hand contains all three cards of a candidate set.
    pub fn contains_set(&self, set: &[CardSymbol; 3]) -> bool {
        let mut needed = CardHand::new();
        for &symbol in set {
            needed.add(symbol);
        }
        self.infantry >= needed.infantry
            && self.cavalry >= needed.cavalry
            && self.artillery >= needed.artillery
            && self.wild >= needed.wild
    }

    /// Whether any tradeable set can be formed from this hand.
    pub fn can_trade(&self) -> bool {
        self.find_set().is_some()
    }

    /// Find a tradeable set, preferring to spend as few wilds as possible.
    pub fn find_set(&self) -> Option<[CardSymbol; 3]> {
        // Three of a regular kind
        for symbol in CardSymbol::REGULARS {
            if self.count(symbol) >= 3 {
                return Some([symbol, symbol, symbol]);
            }
        }
        // One of each regular
        if CardSymbol::REGULARS.iter().all(|s| self.count(*s) >= 1) {
            return Some(CardSymbol::REGULARS);
        }
        // Two cards completed by one wild
        if self.wild >= 1 {
            for symbol in CardSymbol::REGULARS {
                if self.count(symbol) >= 2 {
                    return Some([symbol, symbol, CardSymbol::Wild]);
                }
            }
            let held: Vec<CardSymbol> = CardSymbol::REGULARS
                .into_iter()
                .filter(|s| self.count(*s) >= 1)
                .collect();
            if held.len() >= 2 {
                return Some([held[0], held[1], CardSymbol::Wild]);
            }
        }
        // One regular and two wilds
        if self.wild >= 2 {
            for symbol in CardSymbol::REGULARS {
                if self.count(symbol) >= 1 {
                    return Some([symbol, CardSymbol::Wild, CardSymbol::Wild]);
                }
            }
        }
        // Three wilds
        if self.wild >= 3 {
            return Some([CardSymbol::Wild, CardSymbol::Wild, CardSymbol::Wild]);
        }
        None
    }

    /// Remove exactly the three cards of a set. Returns false (and leaves
    /// the hand unchanged) if the set is invalid or not held.
    pub fn remove_set(&mut self, set: &[CardSymbol; 3]) -> bool {
        if !is_valid_set(set) || !self.contains_set(set) {
            return false;
        }
        for &symbol in set {
            *self.count_mut(symbol) -= 1;
        }
        true
    }
}
