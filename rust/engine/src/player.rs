use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cards::Card;

pub type PlayerId = Uuid;

/// How a participant is attached to the table. Spectators hold no seat,
/// no stack, and are never dealt in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Spectator,
}

/// One participant's slice of the table state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    /// Seat index, lowest free index at join time. `None` for spectators.
    pub seat: Option<usize>,
    pub stack: u64,
    /// Chips committed in the current street only.
    pub street_bet: u64,
    /// Chips committed across the whole hand, street bets included.
    pub total_contributed: u64,
    pub folded: bool,
    pub all_in: bool,
    pub ready: bool,
    pub connected: bool,
    pub is_bot: bool,
    /// Dealt hole cards; `Some` exactly while the player is in the
    /// current (or just-finished) hand.
    pub hole_cards: Option<[Card; 2]>,
    /// Whether the player has acted in the current street. Cleared on a
    /// full raise so that action reopens; a short all-in leaves it set.
    pub acted_this_street: bool,
    /// Voluntarily showed their hole cards after the hand ended.
    pub revealed: bool,
    /// Marked when a seated player leaves mid-hand; purged at hand end so
    /// their contributed chips stay in the pot.
    pub leaving: bool,
}

impl PlayerState {
    pub fn new(id: PlayerId, name: String, role: Role, seat: Option<usize>, stack: u64) -> Self {
        Self {
            id,
            name,
            role,
            seat,
            stack,
            street_bet: 0,
            total_contributed: 0,
            folded: false,
            all_in: false,
            ready: false,
            connected: true,
            is_bot: false,
            hole_cards: None,
            acted_this_street: false,
            revealed: false,
            leaving: false,
        }
    }

    pub fn is_seated(&self) -> bool {
        self.role == Role::Player && self.seat.is_some()
    }

    /// Dealt into the current hand.
    pub fn in_hand(&self) -> bool {
        self.hole_cards.is_some()
    }

    /// Still contending for the pot.
    pub fn contending(&self) -> bool {
        self.in_hand() && !self.folded
    }

    /// Allowed to act: contending and not already all-in.
    pub fn can_act(&self) -> bool {
        self.contending() && !self.all_in
    }

    /// Move chips from the stack into the current street bet, capped at
    /// the stack. Going to zero marks the player all-in. Returns the
    /// amount actually committed.
    pub fn commit(&mut self, amount: u64) -> u64 {
        let committed = amount.min(self.stack);
        self.stack -= committed;
        self.street_bet += committed;
        self.total_contributed += committed;
        if self.stack == 0 && committed > 0 {
            self.all_in = true;
        }
        committed
    }
}
