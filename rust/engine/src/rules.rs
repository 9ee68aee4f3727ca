use serde::{Deserialize, Serialize};

/// Largest chip amount accepted anywhere: 2^53 - 1, so every amount
/// survives a round-trip through a JSON number.
pub const MAX_AMOUNT: u64 = (1 << 53) - 1;

/// The betting moves a player may submit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

/// The actions currently legal for one player, with bounds where an
/// amount applies. `BET` amounts and `RAISE` targets are street-bet
/// totals ("raise to"), not increments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalActions {
    pub actions: Vec<ActionType>,
    pub to_call: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bet: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bet: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_raise_to: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_raise_to: Option<u64>,
}

impl LegalActions {
    pub fn allows(&self, action: ActionType) -> bool {
        self.actions.contains(&action)
    }

    /// Substitute action when the turn timer expires: check when free,
    /// otherwise fold.
    pub fn timeout_default(&self) -> ActionType {
        if self.allows(ActionType::Check) {
            ActionType::Check
        } else {
            ActionType::Fold
        }
    }
}
