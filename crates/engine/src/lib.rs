//! Game rules for the two-team word guessing game.
//!
//! This crate is pure state: no networking, no timers, no async. A
//! [`Session`] is mutated only through its methods, each of which either
//! fails without touching state or reports an [`Outcome`] telling the
//! caller whether to broadcast and whether a turn boundary occurred.

pub mod board;
pub mod error;
pub mod session;

pub use board::{
    generate_board, Card, Remaining, AGENTS_PER_TEAM, GRID_SIZE, NEUTRAL_CARDS, TRAP_CARDS,
};
pub use error::{BoardError, GameError};
pub use session::{
    clean_name, Outcome, Round, Session, SessionSettings, Stage, WordSource, MAX_NAME_CHARS,
};
