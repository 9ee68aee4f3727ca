//! # felt-bot: headless opponents for felt tables
//!
//! Strategies that decide from the same redacted view a human client
//! receives: own hole cards, the board, pot, and the legal-action menu
//! for the current turn. A bot never sees opponents' cards or the deck.
//!
//! ## Quick start
//!
//! ```rust
//! use felt_bot::{create_strategy, TurnView};
//! use felt_engine::rules::{ActionType, LegalActions};
//!
//! let mut bot = create_strategy("caller");
//! let view = TurnView {
//!     hole_cards: ["Ah".parse().unwrap(), "Kh".parse().unwrap()],
//!     community: vec![],
//!     pot: 15,
//!     stack: 1_000,
//!     big_blind: 10,
//!     legal: LegalActions {
//!         actions: vec![ActionType::Fold, ActionType::Call, ActionType::AllIn],
//!         to_call: 10,
//!         min_bet: None,
//!         max_bet: None,
//!         min_raise_to: None,
//!         max_raise_to: None,
//!     },
//! };
//! let (action, _amount) = bot.decide(&view);
//! assert_eq!(action, ActionType::Call);
//! ```

use felt_engine::cards::Card;
use felt_engine::rules::{ActionType, LegalActions};

pub mod baseline;

/// Everything a bot is allowed to know when it is asked to act.
#[derive(Debug, Clone)]
pub struct TurnView {
    pub hole_cards: [Card; 2],
    pub community: Vec<Card>,
    pub pot: u64,
    pub stack: u64,
    pub big_blind: u64,
    pub legal: LegalActions,
}

/// A decision procedure for one seat. Implementations must pick from
/// `view.legal.actions`; the runner treats anything else as a fold.
pub trait BotStrategy: Send {
    /// Choose the next action, with an amount when the action takes one.
    fn decide(&mut self, view: &TurnView) -> (ActionType, Option<u64>);

    /// Strategy name surfaced in registry listings.
    fn name(&self) -> &'static str;
}

/// Build a strategy by name; unknown names fall back to the baseline.
pub fn create_strategy(kind: &str) -> Box<dyn BotStrategy> {
    match kind {
        "caller" => Box::new(baseline::CallingStation::new()),
        _ => Box::new(baseline::BaselineBot::new()),
    }
}
