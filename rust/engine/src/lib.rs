//! # felt-engine: hold'em table engine core
//!
//! The pure rules core of the `felt` poker server. Every public
//! operation takes the current table state plus an input and returns an
//! ordered list of `(state, event)` transitions, or a rule-violation
//! error that leaves the state untouched. The engine performs no I/O,
//! reads no clocks, and draws randomness only when shuffling a deck the
//! caller did not inject, which keeps full hands replayable in tests.
//!
//! ## Modules
//!
//! - [`cards`] - Card, rank, and suit types with the 2-character wire encoding
//! - [`deck`] - CSPRNG-shuffled decks and injected permutations
//! - [`eval`] - 7-card hand evaluation and tie-breaking
//! - [`events`] - The ordered event vocabulary a hand emits
//! - [`state`] - Table state and the hand-lifecycle operations
//! - [`pots`] - Layered side-pot construction
//! - [`rules`] - Action types and per-turn legality
//! - [`player`] - Per-participant state
//! - [`errors`] - Pure rule-violation classifications
//!
//! ## Quick start
//!
//! ```rust
//! use felt_engine::player::Role;
//! use felt_engine::state::{TableConfig, TableState};
//! use uuid::Uuid;
//!
//! let table = TableState::create(Uuid::new_v4(), TableConfig::default());
//! let a = Uuid::new_v4();
//! let b = Uuid::new_v4();
//! let table = table
//!     .add_player(a, "alice".into(), Role::Player, false)
//!     .unwrap()
//!     .pop()
//!     .unwrap()
//!     .state;
//! let table = table
//!     .add_player(b, "bob".into(), Role::Player, false)
//!     .unwrap()
//!     .pop()
//!     .unwrap()
//!     .state;
//! let table = table.set_ready(a).unwrap().set_ready(b).unwrap();
//!
//! let transitions = table.start_hand(None).unwrap();
//! let table = transitions.last().unwrap().state.clone();
//! assert!(table.hand_in_progress);
//! assert!(table.active_player.is_some());
//! ```

pub mod cards;
pub mod deck;
pub mod errors;
pub mod eval;
pub mod events;
pub mod player;
pub mod pots;
pub mod rules;
pub mod state;
