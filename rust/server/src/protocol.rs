//! Wire envelope: every message is a JSON object `{action, payload}`,
//! with one discriminated union per direction. Inbound payloads are
//! validated before anything is routed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use felt_engine::errors::EngineError;
use felt_engine::events::HandEvent;
use felt_engine::player::{PlayerId, Role};
use felt_engine::rules::{ActionType, MAX_AMOUNT};

use crate::projection::{ActionRequest, GameStateView};
use crate::registry::TableStatus;

pub const MAX_DISPLAY_NAME: usize = 32;
pub const MAX_CHAT_LEN: usize = 500;

/// Client → server actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Identify {
        display_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reconnect_token: Option<String>,
    },
    ListGames {},
    #[serde(rename_all = "camelCase")]
    JoinGame { game_id: Uuid, role: Role },
    Ready {},
    #[serde(rename_all = "camelCase")]
    PlayerAction {
        hand_number: u64,
        #[serde(rename = "type")]
        action_type: ActionType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    RevealCards { hand_number: u64 },
    Chat { message: String },
    LeaveGame {},
}

/// Server → client actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Identified {
        player_id: PlayerId,
        display_name: String,
        reconnect_token: String,
    },
    GameList {
        games: Vec<GameSummary>,
    },
    #[serde(rename_all = "camelCase")]
    GameJoined {
        game_id: Uuid,
        seat: Option<usize>,
        role: Role,
        game_state: GameStateView,
    },
    #[serde(rename_all = "camelCase")]
    GameState {
        game_state: GameStateView,
        event: HandEvent,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_request: Option<ActionRequest>,
    },
    #[serde(rename_all = "camelCase")]
    TimeWarning {
        remaining_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    GameOver {
        game_id: Uuid,
        reason: GameOverReason,
        standings: Vec<Standing>,
    },
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        player_id: PlayerId,
        display_name: String,
        role: Role,
        message: String,
    },
    Error {
        code: ErrorCode,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub game_id: Uuid,
    pub name: String,
    pub status: TableStatus,
    pub players: usize,
    pub bots: usize,
    pub max_seats: usize,
    pub small_blind: u64,
    pub big_blind: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub player_id: PlayerId,
    pub display_name: String,
    pub stack: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOverReason {
    Completed,
    Cancelled,
}

/// Wire error codes, one per rejection class.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidAction,
    OutOfTurn,
    InvalidAmount,
    NotInGame,
    GameNotFound,
    GameFull,
    AlreadyInGame,
    NotIdentified,
    InvalidMessage,
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::OutOfTurn => ErrorCode::OutOfTurn,
            EngineError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
            EngineError::GameFull => ErrorCode::GameFull,
            EngineError::AlreadyInGame => ErrorCode::AlreadyInGame,
            EngineError::UnknownPlayer => ErrorCode::NotInGame,
            EngineError::InvalidAction(_)
            | EngineError::NotEnoughPlayers { .. }
            | EngineError::HandInProgress
            | EngineError::NoHandInProgress => ErrorCode::InvalidAction,
        }
    }
}

pub fn engine_error_reply(err: &EngineError) -> ServerMessage {
    ServerMessage::error(ErrorCode::from(err), err.to_string())
}

/// Payload-level validation on top of schema shape.
pub fn validate(msg: &ClientMessage) -> Result<(), ServerMessage> {
    match msg {
        ClientMessage::Identify { display_name, .. } => {
            let len = display_name.chars().count();
            if len == 0 || len > MAX_DISPLAY_NAME {
                return Err(ServerMessage::error(
                    ErrorCode::InvalidMessage,
                    format!("displayName must be 1-{MAX_DISPLAY_NAME} characters"),
                ));
            }
        }
        ClientMessage::Chat { message } => {
            let len = message.chars().count();
            if len == 0 || len > MAX_CHAT_LEN {
                return Err(ServerMessage::error(
                    ErrorCode::InvalidMessage,
                    format!("chat message must be 1-{MAX_CHAT_LEN} characters"),
                ));
            }
        }
        ClientMessage::PlayerAction { amount, .. } => {
            if let Some(a) = amount {
                if *a > MAX_AMOUNT {
                    return Err(ServerMessage::error(
                        ErrorCode::InvalidAmount,
                        "amount exceeds the representable maximum",
                    ));
                }
            }
        }
        _ => {}
    }
    Ok(())
}
