//! Rule-based reference strategies.

use felt_engine::cards::{Card, Rank};
use felt_engine::eval::{evaluate_seven, Category};
use felt_engine::rules::ActionType;

use crate::{BotStrategy, TurnView};

/// Always takes the cheapest live option: check when free, call any
/// price. Useful as a deterministic sparring partner in tests.
#[derive(Debug, Default)]
pub struct CallingStation;

impl CallingStation {
    pub fn new() -> Self {
        Self
    }
}

impl BotStrategy for CallingStation {
    fn decide(&mut self, view: &TurnView) -> (ActionType, Option<u64>) {
        if view.legal.allows(ActionType::Check) {
            (ActionType::Check, None)
        } else if view.legal.allows(ActionType::Call) {
            (ActionType::Call, None)
        } else {
            (ActionType::Fold, None)
        }
    }

    fn name(&self) -> &'static str {
        "caller"
    }
}

/// Tight-aggressive baseline: opens strong hands, calls at a sane price,
/// value-bets made hands after the flop.
#[derive(Debug, Default)]
pub struct BaselineBot;

impl BaselineBot {
    pub fn new() -> Self {
        Self
    }

    /// Coarse pre-flop strength 0..=10.
    fn preflop_score(hole: &[Card; 2]) -> u8 {
        let (a, b) = (hole[0].rank, hole[1].rank);
        let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
        let suited = hole[0].suit == hole[1].suit;
        let paired = hi == lo;

        if paired && hi >= Rank::Ten {
            return 10;
        }
        if hi == Rank::Ace && lo >= Rank::Queen {
            return 9;
        }
        if paired && hi >= Rank::Seven {
            return 8;
        }
        if hi == Rank::Ace && lo >= Rank::Ten {
            return 7;
        }
        if hi >= Rank::King && lo >= Rank::Ten {
            return 6;
        }
        if paired {
            return 5;
        }
        let connected = hi.value() - lo.value() <= 2;
        if suited && connected && lo >= Rank::Five {
            return 4;
        }
        if hi == Rank::Ace {
            return 3;
        }
        2
    }

    /// Made-hand strength once the board is out.
    fn postflop_category(view: &TurnView) -> Category {
        let mut cards: Vec<Card> = view.hole_cards.to_vec();
        cards.extend(view.community.iter().copied());
        // The evaluator wants a full 7 cards; before the river, settle
        // for pair detection.
        if cards.len() == 7 {
            let seven: [Card; 7] = cards.try_into().expect("length checked");
            return evaluate_seven(&seven).category;
        }
        let paired_board = view
            .community
            .iter()
            .any(|c| view.hole_cards.iter().any(|h| h.rank == c.rank));
        if view.hole_cards[0].rank == view.hole_cards[1].rank {
            Category::Pair
        } else if paired_board {
            Category::Pair
        } else {
            Category::HighCard
        }
    }
}

impl BotStrategy for BaselineBot {
    fn decide(&mut self, view: &TurnView) -> (ActionType, Option<u64>) {
        let legal = &view.legal;
        let strong = if view.community.is_empty() {
            Self::preflop_score(&view.hole_cards) >= 7
        } else {
            Self::postflop_category(view) >= Category::TwoPair
        };
        let decent = if view.community.is_empty() {
            Self::preflop_score(&view.hole_cards) >= 4
        } else {
            Self::postflop_category(view) >= Category::Pair
        };

        if strong {
            if let (true, Some(min)) = (legal.allows(ActionType::Raise), legal.min_raise_to) {
                let target = min.max(view.pot / 2).min(legal.max_raise_to.unwrap_or(min));
                return (ActionType::Raise, Some(target));
            }
            if let (true, Some(min)) = (legal.allows(ActionType::Bet), legal.min_bet) {
                let target = min
                    .max((view.pot * 2) / 3)
                    .min(legal.max_bet.unwrap_or(min));
                return (ActionType::Bet, Some(target));
            }
            if legal.allows(ActionType::Call) {
                return (ActionType::Call, None);
            }
        }

        if legal.allows(ActionType::Check) {
            return (ActionType::Check, None);
        }

        // Facing a bet: call when the price is small or the hand is live.
        let cheap = legal.to_call <= view.big_blind.saturating_mul(3)
            || legal.to_call.saturating_mul(4) <= view.pot;
        if legal.allows(ActionType::Call) && (decent || cheap) {
            return (ActionType::Call, None);
        }
        (ActionType::Fold, None)
    }

    fn name(&self) -> &'static str {
        "baseline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use felt_engine::rules::LegalActions;

    fn view(hole: [&str; 2], community: &[&str], legal: LegalActions) -> TurnView {
        TurnView {
            hole_cards: [hole[0].parse().unwrap(), hole[1].parse().unwrap()],
            community: community.iter().map(|s| s.parse().unwrap()).collect(),
            pot: 30,
            stack: 1_000,
            big_blind: 10,
            legal,
        }
    }

    fn facing_bet() -> LegalActions {
        LegalActions {
            actions: vec![ActionType::Fold, ActionType::Call, ActionType::Raise],
            to_call: 50,
            min_bet: None,
            max_bet: None,
            min_raise_to: Some(100),
            max_raise_to: Some(1_000),
        }
    }

    fn free_turn() -> LegalActions {
        LegalActions {
            actions: vec![ActionType::Fold, ActionType::Check, ActionType::Bet],
            to_call: 0,
            min_bet: Some(10),
            max_bet: Some(1_000),
            min_raise_to: None,
            max_raise_to: None,
        }
    }

    #[test]
    fn baseline_raises_premium_pairs_preflop() {
        let mut bot = BaselineBot::new();
        let (action, amount) = bot.decide(&view(["Ah", "As"], &[], facing_bet()));
        assert_eq!(action, ActionType::Raise);
        assert_eq!(amount, Some(100));
    }

    #[test]
    fn baseline_folds_junk_to_a_big_bet() {
        let mut bot = BaselineBot::new();
        let (action, _) = bot.decide(&view(["7h", "2c"], &[], facing_bet()));
        assert_eq!(action, ActionType::Fold);
    }

    #[test]
    fn baseline_checks_when_free() {
        let mut bot = BaselineBot::new();
        let (action, _) = bot.decide(&view(["7h", "2c"], &["Ah", "9d", "4s"], free_turn()));
        assert_eq!(action, ActionType::Check);
    }

    #[test]
    fn calling_station_never_raises() {
        let mut bot = CallingStation::new();
        let (action, _) = bot.decide(&view(["Ah", "As"], &[], facing_bet()));
        assert_eq!(action, ActionType::Call);
    }
}
