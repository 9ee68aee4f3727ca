use thiserror::Error;

/// Pure rule-violation classifications. Returning one of these never
/// mutates table state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("action is out of turn")]
    OutOfTurn,
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("invalid amount {amount}, minimum {minimum}")]
    InvalidAmount { amount: u64, minimum: u64 },
    #[error("table is full")]
    GameFull,
    #[error("player is already at the table")]
    AlreadyInGame,
    #[error("fewer than {required} players are ready with chips")]
    NotEnoughPlayers { required: usize },
    #[error("a hand is already in progress")]
    HandInProgress,
    #[error("no hand is in progress")]
    NoHandInProgress,
    #[error("unknown player")]
    UnknownPlayer,
}
