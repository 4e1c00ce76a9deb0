use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{CardKind, Phase, PlayerId, PlayerInfo, SessionCode, Team},
    error::ApiError,
};

/// Messages a client sends over the real-time channel.
///
/// Session codes arrive as raw strings; the server normalizes them with
/// [`SessionCode::parse`] so that `k7qd` finds `K7QD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientRequest {
    CreateGame {
        #[serde(default)]
        theme_hint: Option<String>,
        #[serde(default)]
        custom_words: Option<Vec<String>>,
        #[serde(default)]
        timer_duration: Option<u32>,
        #[serde(default)]
        player_name: Option<String>,
    },
    JoinGame {
        session_code: String,
        #[serde(default)]
        player_name: Option<String>,
    },
    SetPlayerName {
        session_code: String,
        player_id: PlayerId,
        name: String,
    },
    JoinTeam {
        session_code: String,
        player_id: PlayerId,
        team: Team,
    },
    BecomeSpymaster {
        session_code: String,
        player_id: PlayerId,
    },
    RequestStartGame {
        session_code: String,
    },
    CardClick {
        session_code: String,
        /// Signed so that a negative index reaches the game as an off-grid click.
        card_index: i64,
    },
    EndTurn {
        session_code: String,
    },
    RemovePlayer {
        session_code: String,
        player_id: PlayerId,
    },
}

impl ClientRequest {
    pub fn session_code(&self) -> Option<&str> {
        match self {
            ClientRequest::CreateGame { .. } => None,
            ClientRequest::JoinGame { session_code, .. }
            | ClientRequest::SetPlayerName { session_code, .. }
            | ClientRequest::JoinTeam { session_code, .. }
            | ClientRequest::BecomeSpymaster { session_code, .. }
            | ClientRequest::RequestStartGame { session_code }
            | ClientRequest::CardClick { session_code, .. }
            | ClientRequest::EndTurn { session_code }
            | ClientRequest::RemovePlayer { session_code, .. } => Some(session_code),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    pub players: Vec<PlayerInfo>,
    pub spymaster_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub word: String,
    pub kind: CardKind,
    pub revealed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingSnapshot {
    pub red: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub cards: Vec<CardSnapshot>,
    pub current_turn: Team,
    pub starting_team: Team,
    pub remaining: RemainingSnapshot,
    pub is_game_over: bool,
    pub winner: Option<Team>,
    /// Absolute deadline of the running turn so clients can count down independent of latency.
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub turn_end_time: Option<DateTime<Utc>>,
}

/// Full authoritative view of one session, sent after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub phase: Phase,
    pub red_team: TeamSnapshot,
    pub blue_team: TeamSnapshot,
    pub unassigned_players: Vec<PlayerInfo>,
    pub message: String,
    pub turn_timer_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_words: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<BoardSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    GameCreated {
        session_code: SessionCode,
        state: GameSnapshot,
        player_id: PlayerId,
    },
    GameJoined {
        session_code: SessionCode,
        state: GameSnapshot,
        player_id: PlayerId,
    },
    UpdateState {
        state: GameSnapshot,
    },
    Error(ApiError),
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
