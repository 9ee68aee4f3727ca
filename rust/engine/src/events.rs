use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::player::{PlayerId, Role};
use crate::rules::ActionType;

/// Which blind a post covers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Blind {
    Small,
    Big,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlindPost {
    pub player_id: PlayerId,
    pub blind: Blind,
    pub amount: u64,
    pub all_in: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowdownReveal {
    pub player_id: PlayerId,
    pub hole_cards: [Card; 2],
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotWinner {
    pub player_id: PlayerId,
    pub amount: u64,
}

/// One pot's resolution: total amount and who took which share of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotAward {
    pub amount: u64,
    pub winners: Vec<PotWinner>,
}

/// Ordered events emitted by engine transitions. Within a hand the
/// sequence is `HAND_START`, `BLINDS_POSTED`, `DEAL`, actions and street
/// deals, then `SHOWDOWN` (unless everyone but one folded) and
/// `HAND_END`. Join/leave/reveal events occur outside that sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandEvent {
    #[serde(rename_all = "camelCase")]
    HandStart {
        hand_number: u64,
        dealer_seat: usize,
    },
    BlindsPosted {
        posts: Vec<BlindPost>,
    },
    #[serde(rename_all = "camelCase")]
    Deal {
        hand_number: u64,
    },
    #[serde(rename_all = "camelCase")]
    PlayerAction {
        player_id: PlayerId,
        action: ActionType,
        amount: u64,
        all_in: bool,
    },
    #[serde(rename_all = "camelCase")]
    PlayerTimeout {
        player_id: PlayerId,
    },
    Flop {
        cards: [Card; 3],
    },
    Turn {
        card: Card,
    },
    River {
        card: Card,
    },
    Showdown {
        reveals: Vec<ShowdownReveal>,
    },
    #[serde(rename_all = "camelCase")]
    HandEnd {
        hand_number: u64,
        awards: Vec<PotAward>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        seat: Option<usize>,
        role: Role,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    PlayerRevealed {
        player_id: PlayerId,
        hole_cards: [Card; 2],
    },
}

impl HandEvent {
    /// Wire name of the event, e.g. `"HAND_START"`.
    pub fn kind(&self) -> &'static str {
        match self {
            HandEvent::HandStart { .. } => "HAND_START",
            HandEvent::BlindsPosted { .. } => "BLINDS_POSTED",
            HandEvent::Deal { .. } => "DEAL",
            HandEvent::PlayerAction { .. } => "PLAYER_ACTION",
            HandEvent::PlayerTimeout { .. } => "PLAYER_TIMEOUT",
            HandEvent::Flop { .. } => "FLOP",
            HandEvent::Turn { .. } => "TURN",
            HandEvent::River { .. } => "RIVER",
            HandEvent::Showdown { .. } => "SHOWDOWN",
            HandEvent::HandEnd { .. } => "HAND_END",
            HandEvent::PlayerJoined { .. } => "PLAYER_JOINED",
            HandEvent::PlayerLeft { .. } => "PLAYER_LEFT",
            HandEvent::PlayerRevealed { .. } => "PLAYER_REVEALED",
        }
    }
}
