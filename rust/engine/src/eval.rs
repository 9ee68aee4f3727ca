//! Seven-card hand evaluation with standard Hold'em rankings.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cards::{Card, Rank, Suit};

/// Hand categories in ascending strength. A royal flush is ranked as its
/// own category above an ordinary straight flush.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    HighCard = 0,
    Pair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
    RoyalFlush = 9,
}

/// Evaluated strength of a best-of-five hand: the category plus an ordered
/// tiebreaker vector, high to low. Two strengths compare by category first,
/// then lexicographically by tiebreakers.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HandStrength {
    pub category: Category,
    pub tiebreak: [u8; 5],
}

impl Ord for HandStrength {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.tiebreak.cmp(&other.tiebreak))
    }
}

impl PartialOrd for HandStrength {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl HandStrength {
    /// Human-readable description used in showdown payloads,
    /// e.g. `"Full House, Kings over Twos"`.
    pub fn describe(&self) -> String {
        match self.category {
            Category::RoyalFlush => "Royal Flush".to_string(),
            Category::StraightFlush => {
                format!("Straight Flush, {} high", rank_name(self.tiebreak[0]))
            }
            Category::FourOfAKind => {
                format!("Four of a Kind, {}", rank_plural(self.tiebreak[0]))
            }
            Category::FullHouse => format!(
                "Full House, {} over {}",
                rank_plural(self.tiebreak[0]),
                rank_plural(self.tiebreak[1])
            ),
            Category::Flush => format!("Flush, {} high", rank_name(self.tiebreak[0])),
            Category::Straight => format!("Straight, {} high", rank_name(self.tiebreak[0])),
            Category::ThreeOfAKind => {
                format!("Three of a Kind, {}", rank_plural(self.tiebreak[0]))
            }
            Category::TwoPair => format!(
                "Two Pair, {} and {}",
                rank_plural(self.tiebreak[0]),
                rank_plural(self.tiebreak[1])
            ),
            Category::Pair => format!("Pair of {}", rank_plural(self.tiebreak[0])),
            Category::HighCard => format!("High Card, {}", rank_name(self.tiebreak[0])),
        }
    }
}

fn rank_name(v: u8) -> &'static str {
    match v {
        2 => "Two",
        3 => "Three",
        4 => "Four",
        5 => "Five",
        6 => "Six",
        7 => "Seven",
        8 => "Eight",
        9 => "Nine",
        10 => "Ten",
        11 => "Jack",
        12 => "Queen",
        13 => "King",
        _ => "Ace",
    }
}

fn rank_plural(v: u8) -> &'static str {
    match v {
        2 => "Twos",
        3 => "Threes",
        4 => "Fours",
        5 => "Fives",
        6 => "Sixes",
        7 => "Sevens",
        8 => "Eights",
        9 => "Nines",
        10 => "Tens",
        11 => "Jacks",
        12 => "Queens",
        13 => "Kings",
        _ => "Aces",
    }
}

/// Evaluate the best 5-card hand out of 7 cards (2 hole + 5 community).
///
/// ```
/// use felt_engine::cards::Card;
/// use felt_engine::eval::{evaluate_seven, Category};
///
/// let cards: Vec<Card> = ["Ah", "Kh", "Qh", "Jh", "Th", "2c", "3d"]
///     .iter()
///     .map(|s| s.parse().unwrap())
///     .collect();
/// let strength = evaluate_seven(&cards.try_into().unwrap());
/// assert_eq!(strength.category, Category::RoyalFlush);
/// ```
pub fn evaluate_seven(cards: &[Card; 7]) -> HandStrength {
    let mut rank_counts = [0u8; 15];
    let mut by_suit: [Vec<u8>; 4] = [vec![], vec![], vec![], vec![]];
    for &c in cards {
        rank_counts[c.rank.value() as usize] += 1;
        by_suit[suit_index(c.suit)].push(c.rank.value());
    }

    let flush_suit = by_suit.iter().position(|v| v.len() >= 5);

    // Straight flush (royal when ace-high).
    if let Some(s) = flush_suit {
        let mut suited = by_suit[s].clone();
        suited.sort_unstable();
        suited.dedup();
        if let Some(high) = straight_high(&suited) {
            return if high == 14 {
                HandStrength {
                    category: Category::RoyalFlush,
                    tiebreak: [14, 0, 0, 0, 0],
                }
            } else {
                HandStrength {
                    category: Category::StraightFlush,
                    tiebreak: [high, 0, 0, 0, 0],
                }
            };
        }
    }

    let (quads, trips, pairs, singles) = group_ranks(&rank_counts);

    if let Some(&q) = quads.first() {
        let kicker = best_excluding(&rank_counts, &[q]);
        return HandStrength {
            category: Category::FourOfAKind,
            tiebreak: [q, kicker, 0, 0, 0],
        };
    }

    // Full house: best trips plus best remaining trips-or-pair.
    if let Some(&t) = trips.first() {
        let pair_part = trips
            .get(1)
            .copied()
            .into_iter()
            .chain(pairs.first().copied())
            .max();
        if let Some(p) = pair_part {
            return HandStrength {
                category: Category::FullHouse,
                tiebreak: [t, p, 0, 0, 0],
            };
        }
    }

    if let Some(s) = flush_suit {
        let mut suited = by_suit[s].clone();
        suited.sort_unstable_by(|a, b| b.cmp(a));
        let mut tb = [0u8; 5];
        tb.copy_from_slice(&suited[..5]);
        return HandStrength {
            category: Category::Flush,
            tiebreak: tb,
        };
    }

    let mut uniq: Vec<u8> = (2..=14).filter(|&r| rank_counts[r as usize] > 0).collect();
    uniq.sort_unstable();
    if let Some(high) = straight_high(&uniq) {
        return HandStrength {
            category: Category::Straight,
            tiebreak: [high, 0, 0, 0, 0],
        };
    }

    if let Some(&t) = trips.first() {
        let mut rest: Vec<u8> = singles.iter().chain(pairs.iter()).copied().collect();
        rest.sort_unstable_by(|a, b| b.cmp(a));
        return HandStrength {
            category: Category::ThreeOfAKind,
            tiebreak: [t, rest[0], rest[1], 0, 0],
        };
    }

    if pairs.len() >= 2 {
        let kicker = best_excluding(&rank_counts, &pairs[..2]);
        return HandStrength {
            category: Category::TwoPair,
            tiebreak: [pairs[0], pairs[1], kicker, 0, 0],
        };
    }

    if let Some(&p) = pairs.first() {
        let mut rest = singles.clone();
        rest.sort_unstable_by(|a, b| b.cmp(a));
        return HandStrength {
            category: Category::Pair,
            tiebreak: [p, rest[0], rest[1], rest[2], 0],
        };
    }

    let mut rest = singles.clone();
    rest.sort_unstable_by(|a, b| b.cmp(a));
    let mut tb = [0u8; 5];
    tb.copy_from_slice(&rest[..5]);
    HandStrength {
        category: Category::HighCard,
        tiebreak: tb,
    }
}

fn suit_index(s: Suit) -> usize {
    match s {
        Suit::Clubs => 0,
        Suit::Diamonds => 1,
        Suit::Hearts => 2,
        Suit::Spades => 3,
    }
}

/// Highest straight high-card in a sorted, deduplicated rank list.
/// The wheel (A-2-3-4-5) counts with a high card of 5.
fn straight_high(sorted_unique: &[u8]) -> Option<u8> {
    let mut ranks = sorted_unique.to_vec();
    if ranks.contains(&Rank::Ace.value()) {
        ranks.insert(0, 1);
    }
    let mut run = 1;
    let mut best = None;
    for i in 1..ranks.len() {
        if ranks[i] == ranks[i - 1] + 1 {
            run += 1;
            if run >= 5 {
                best = Some(ranks[i]);
            }
        } else {
            run = 1;
        }
    }
    best
}

/// Rank groups (quads, trips, pairs, singles), each sorted high to low.
fn group_ranks(rank_counts: &[u8; 15]) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
    let mut quads = vec![];
    let mut trips = vec![];
    let mut pairs = vec![];
    let mut singles = vec![];
    for r in (2..=14u8).rev() {
        match rank_counts[r as usize] {
            4 => quads.push(r),
            3 => trips.push(r),
            2 => pairs.push(r),
            1 => singles.push(r),
            _ => {}
        }
    }
    (quads, trips, pairs, singles)
}

fn best_excluding(rank_counts: &[u8; 15], excluded: &[u8]) -> u8 {
    (2..=14u8)
        .rev()
        .find(|r| rank_counts[*r as usize] > 0 && !excluded.contains(r))
        .unwrap_or(0)
}
