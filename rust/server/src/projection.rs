//! Per-viewer projections of engine state. The engine always holds full
//! ground truth; everything a client learns about cards flows through
//! here, so redaction bugs cannot originate anywhere else.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use felt_engine::cards::Card;
use felt_engine::player::{PlayerId, PlayerState, Role};
use felt_engine::rules::LegalActions;
use felt_engine::state::{Stage, TableState, VisibilityPolicy};

/// Who a projection is being built for.
#[derive(Debug, Copy, Clone)]
pub struct Viewer {
    pub player_id: PlayerId,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub name: String,
    pub role: Role,
    pub seat: Option<usize>,
    pub stack: u64,
    pub street_bet: u64,
    pub folded: bool,
    pub all_in: bool,
    pub ready: bool,
    pub connected: bool,
    pub is_bot: bool,
    /// Redacted to `None` for everyone the viewer is not entitled to see.
    pub hole_cards: Option<[Card; 2]>,
}

/// What one viewer is shown of a table. Never carries deck contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub game_id: Uuid,
    pub hand_number: u64,
    pub stage: Stage,
    pub community_cards: Vec<Card>,
    pub pot: u64,
    pub current_high_bet: u64,
    pub small_blind: u64,
    pub big_blind: u64,
    pub dealer_seat: usize,
    pub active_player_id: Option<PlayerId>,
    pub hand_in_progress: bool,
    pub players: Vec<PlayerView>,
}

/// Attached to `gameState` only on the active player's copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(flatten)]
    pub legal: LegalActions,
    pub hand_number: u64,
    pub deadline_ms: u64,
}

/// Build the personalized view of `state` for `viewer`.
pub fn project(state: &TableState, viewer: Viewer) -> GameStateView {
    let players = state
        .players
        .iter()
        .map(|p| {
            let hole_cards = if show_hole_cards(state, viewer, p) {
                p.hole_cards
            } else {
                None
            };
            PlayerView {
                player_id: p.id,
                name: p.name.clone(),
                role: p.role,
                seat: p.seat,
                stack: p.stack,
                street_bet: p.street_bet,
                folded: p.folded,
                all_in: p.all_in,
                ready: p.ready,
                connected: p.connected,
                is_bot: p.is_bot,
                hole_cards,
            }
        })
        .collect();

    GameStateView {
        game_id: state.table_id,
        hand_number: state.hand_number,
        stage: state.stage,
        community_cards: state.community.clone(),
        pot: state.pot,
        current_high_bet: state.current_high_bet,
        small_blind: state.config.small_blind,
        big_blind: state.config.big_blind,
        dealer_seat: state.dealer_seat,
        active_player_id: state.active_player,
        hand_in_progress: state.hand_in_progress,
        players,
    }
}

fn show_hole_cards(state: &TableState, viewer: Viewer, subject: &PlayerState) -> bool {
    if subject.id == viewer.player_id {
        return true;
    }
    if subject.revealed {
        return true;
    }
    if viewer.role == Role::Spectator && state.config.visibility == VisibilityPolicy::Immediate {
        return true;
    }
    // Cards shown at showdown stay shown until the next deal wipes them.
    state.stage == Stage::Showdown && !state.hand_in_progress && !subject.folded
}
