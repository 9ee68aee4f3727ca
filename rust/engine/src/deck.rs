use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::cards::{full_deck, Card};

/// An ordered run of the 52 cards for one hand. Cards are drawn from the
/// front; the undealt remainder stays private to the engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
    position: usize,
}

impl Deck {
    /// Fresh deck shuffled with a CSPRNG seeded from OS entropy.
    pub fn shuffled() -> Self {
        let mut rng = ChaCha20Rng::from_os_rng();
        let mut cards = full_deck();
        cards.shuffle(&mut rng);
        Self { cards, position: 0 }
    }

    /// Deterministic shuffle for reproducible games.
    pub fn shuffled_with_seed(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut cards = full_deck();
        cards.shuffle(&mut rng);
        Self { cards, position: 0 }
    }

    /// Injected permutation, dealt exactly in the given order.
    pub fn from_order(cards: Vec<Card>) -> Self {
        Self { cards, position: 0 }
    }

    pub fn draw(&mut self) -> Option<Card> {
        let c = self.cards.get(self.position).copied();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.position)
    }

    /// Undealt cards, in order. Test-facing; never crosses the wire.
    pub fn undealt(&self) -> &[Card] {
        &self.cards[self.position.min(self.cards.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn shuffled_deck_is_a_permutation() {
        let mut deck = Deck::shuffled();
        let mut seen = HashSet::new();
        while let Some(c) = deck.draw() {
            assert!(seen.insert(c), "duplicate card {c}");
        }
        assert_eq!(seen.len(), 52);
    }

    #[test]
    fn same_seed_same_order() {
        let mut a = Deck::shuffled_with_seed(7);
        let mut b = Deck::shuffled_with_seed(7);
        for _ in 0..52 {
            assert_eq!(a.draw(), b.draw());
        }
    }

    #[test]
    fn injected_order_is_preserved() {
        let order = full_deck();
        let mut deck = Deck::from_order(order.clone());
        for expected in order {
            assert_eq!(deck.draw(), Some(expected));
        }
        assert_eq!(deck.draw(), None);
    }
}
