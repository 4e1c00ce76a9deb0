use chrono::{DateTime, Utc};
use rand::Rng;
use shared::{
    domain::{CardKind, Phase, PlayerId, PlayerInfo, SessionCode, Team},
    protocol::{BoardSnapshot, GameSnapshot, TeamSnapshot},
};

use crate::{
    board::{ensure_unique, generate_board, Card, Remaining, GRID_SIZE},
    error::{BoardError, GameError},
};

pub const MAX_NAME_CHARS: usize = 24;
const MIN_TEAM_SIZE: usize = 2;

const WAITING_MESSAGE: &str = "Waiting for players to join teams.";

/// Options fixed when the session is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSettings {
    turn_timer_secs: Option<u32>,
    theme_hint: Option<String>,
    custom_words: Option<Vec<String>>,
}

impl SessionSettings {
    /// A zero timer means no timer. Blank theme hints are dropped and custom words are
    /// trimmed and uppercased, empty entries removed. A full grid of custom words must
    /// survive that intact and be unique, or the board could never be built.
    pub fn new(
        turn_timer_secs: Option<u32>,
        theme_hint: Option<String>,
        custom_words: Option<Vec<String>>,
    ) -> Result<Self, BoardError> {
        let theme_hint = theme_hint
            .map(|hint| hint.trim().to_string())
            .filter(|hint| !hint.is_empty());
        let custom_words = match custom_words {
            Some(raw) => {
                let words: Vec<String> = raw
                    .iter()
                    .map(|word| word.trim().to_uppercase())
                    .filter(|word| !word.is_empty())
                    .collect();
                if raw.len() == GRID_SIZE && words.len() < GRID_SIZE {
                    return Err(BoardError::BlankWords {
                        blank: GRID_SIZE - words.len(),
                    });
                }
                if words.len() == GRID_SIZE {
                    ensure_unique(&words)?;
                }
                Some(words).filter(|words| !words.is_empty())
            }
            None => None,
        };
        Ok(Self {
            turn_timer_secs: turn_timer_secs.filter(|secs| *secs > 0),
            theme_hint,
            custom_words,
        })
    }

    pub fn turn_timer_secs(&self) -> Option<u32> {
        self.turn_timer_secs
    }

    pub fn theme_hint(&self) -> Option<&str> {
        self.theme_hint.as_deref()
    }

    pub fn custom_words(&self) -> Option<&[String]> {
        self.custom_words.as_deref()
    }
}

/// Where the words of the next board come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordSource {
    Custom(Vec<String>),
    Supplier { theme_hint: Option<String> },
}

#[derive(Debug, Clone, Default)]
struct Roster {
    players: Vec<PlayerInfo>,
    spymaster: Option<PlayerId>,
}

impl Roster {
    fn take(&mut self, player_id: PlayerId) -> Option<PlayerInfo> {
        let index = self.players.iter().position(|p| p.id == player_id)?;
        if self.spymaster == Some(player_id) {
            self.spymaster = None;
        }
        Some(self.players.remove(index))
    }

    fn contains(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    fn snapshot(&self) -> TeamSnapshot {
        TeamSnapshot {
            players: self.players.clone(),
            spymaster_id: self.spymaster,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Round {
    cards: Vec<Card>,
    current_turn: Team,
    starting_team: Team,
    remaining: Remaining,
    turn_deadline: Option<DateTime<Utc>>,
}

impl Round {
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn current_turn(&self) -> Team {
        self.current_turn
    }

    pub fn starting_team(&self) -> Team {
        self.starting_team
    }

    pub fn remaining(&self) -> Remaining {
        self.remaining
    }

    pub fn turn_deadline(&self) -> Option<DateTime<Utc>> {
        self.turn_deadline
    }
}

/// Phase of a session together with the data that only exists in that phase.
#[derive(Debug, Clone)]
pub enum Stage {
    TeamSelect,
    InProgress(Round),
    GameOver { round: Round, winner: Team },
}

/// What a successful operation did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed; no broadcast needed.
    Unchanged,
    /// State changed within the same turn.
    Updated,
    /// The active team changed or the game ended.
    TurnBoundary,
}

impl Outcome {
    pub fn is_changed(self) -> bool {
        self != Outcome::Unchanged
    }

    pub fn is_turn_boundary(self) -> bool {
        self == Outcome::TurnBoundary
    }
}

enum Resolution {
    Continue { message: String, boundary: bool },
    Win { winner: Team, message: String },
}

/// Trims a display name and caps its length. Blank names yield `None`.
pub fn clean_name(raw: &str) -> Option<String> {
    let name: String = raw.trim().chars().take(MAX_NAME_CHARS).collect();
    let name = name.trim_end().to_string();
    (!name.is_empty()).then_some(name)
}

#[derive(Debug, Clone)]
pub struct Session {
    code: SessionCode,
    red: Roster,
    blue: Roster,
    unassigned: Vec<PlayerInfo>,
    stage: Stage,
    message: String,
    settings: SessionSettings,
}

impl Session {
    pub fn new(code: SessionCode, creator: PlayerInfo, settings: SessionSettings) -> Self {
        Self {
            code,
            red: Roster::default(),
            blue: Roster::default(),
            unassigned: vec![creator],
            stage: Stage::TeamSelect,
            message: WAITING_MESSAGE.to_string(),
            settings,
        }
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn phase(&self) -> Phase {
        match self.stage {
            Stage::TeamSelect => Phase::TeamSelect,
            Stage::InProgress(_) => Phase::InProgress,
            Stage::GameOver { .. } => Phase::GameOver,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.stage, Stage::InProgress(_))
    }

    pub fn winner(&self) -> Option<Team> {
        match self.stage {
            Stage::GameOver { winner, .. } => Some(winner),
            _ => None,
        }
    }

    pub fn round(&self) -> Option<&Round> {
        match &self.stage {
            Stage::TeamSelect => None,
            Stage::InProgress(round) | Stage::GameOver { round, .. } => Some(round),
        }
    }

    pub fn players(&self, team: Team) -> &[PlayerInfo] {
        &self.roster(team).players
    }

    pub fn spymaster(&self, team: Team) -> Option<PlayerId> {
        self.roster(team).spymaster
    }

    pub fn unassigned(&self) -> &[PlayerInfo] {
        &self.unassigned
    }

    pub fn team_of(&self, player_id: PlayerId) -> Option<Team> {
        Team::ALL
            .into_iter()
            .find(|team| self.roster(*team).contains(player_id))
    }

    pub fn contains_player(&self, player_id: PlayerId) -> bool {
        self.team_of(player_id).is_some() || self.unassigned.iter().any(|p| p.id == player_id)
    }

    fn roster(&self, team: Team) -> &Roster {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }

    fn roster_mut(&mut self, team: Team) -> &mut Roster {
        match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        }
    }

    pub fn add_player(&mut self, player: PlayerInfo) -> Outcome {
        self.unassigned.push(player);
        Outcome::Updated
    }

    pub fn rename_player(&mut self, player_id: PlayerId, name: &str) -> Outcome {
        let Some(name) = clean_name(name) else {
            return Outcome::Unchanged;
        };
        let player = self
            .unassigned
            .iter_mut()
            .chain(self.red.players.iter_mut())
            .chain(self.blue.players.iter_mut())
            .find(|p| p.id == player_id);
        match player {
            Some(player) if player.name != name => {
                player.name = name;
                Outcome::Updated
            }
            _ => Outcome::Unchanged,
        }
    }

    /// Removes the player from wherever they are, clearing a spymaster reference to them.
    fn take_player(&mut self, player_id: PlayerId) -> Option<PlayerInfo> {
        if let Some(index) = self.unassigned.iter().position(|p| p.id == player_id) {
            return Some(self.unassigned.remove(index));
        }
        self.red
            .take(player_id)
            .or_else(|| self.blue.take(player_id))
    }

    pub fn join_team(&mut self, player_id: PlayerId, team: Team) -> Outcome {
        if self.roster(team).contains(player_id) {
            return Outcome::Unchanged;
        }
        let Some(player) = self.take_player(player_id) else {
            return Outcome::Unchanged;
        };
        self.roster_mut(team).players.push(player);
        Outcome::Updated
    }

    pub fn become_spymaster(&mut self, player_id: PlayerId) -> Outcome {
        let Some(team) = self.team_of(player_id) else {
            return Outcome::Unchanged;
        };
        let roster = self.roster_mut(team);
        if roster.spymaster == Some(player_id) {
            return Outcome::Unchanged;
        }
        roster.spymaster = Some(player_id);
        Outcome::Updated
    }

    pub fn remove_player(&mut self, player_id: PlayerId) -> Outcome {
        match self.take_player(player_id) {
            Some(_) => Outcome::Updated,
            None => Outcome::Unchanged,
        }
    }

    /// Checks the start conditions and tells the caller where to get words from.
    pub fn prepare_start(&self) -> Result<WordSource, GameError> {
        if !matches!(self.stage, Stage::TeamSelect) {
            return Err(GameError::InvalidAction("game has already started"));
        }
        for team in Team::ALL {
            let roster = self.roster(team);
            if roster.spymaster.is_none() {
                return Err(GameError::InvalidAction("each team needs a spymaster"));
            }
            if roster.players.len() < MIN_TEAM_SIZE {
                return Err(GameError::InvalidAction(
                    "each team needs a spymaster and at least one operative",
                ));
            }
        }
        Ok(match self.settings.custom_words() {
            Some(words) if words.len() == GRID_SIZE => WordSource::Custom(words.to_vec()),
            _ => WordSource::Supplier {
                theme_hint: self.settings.theme_hint.clone(),
            },
        })
    }

    /// Builds the board and enters IN_PROGRESS. Start conditions are checked again
    /// since rosters may have changed while words were being produced.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        words: &[String],
        starting_team: Team,
        rng: &mut R,
    ) -> Result<Outcome, GameError> {
        self.prepare_start()?;
        let (cards, remaining) = generate_board(words, starting_team, rng)?;
        self.stage = Stage::InProgress(Round {
            cards,
            current_turn: starting_team,
            starting_team,
            remaining,
            turn_deadline: None,
        });
        self.message = format!("The {starting_team} team starts. Spymaster, give a clue.");
        Ok(Outcome::TurnBoundary)
    }

    pub fn reveal(&mut self, index: usize) -> Result<Outcome, GameError> {
        let Stage::InProgress(round) = &mut self.stage else {
            return Err(GameError::InvalidAction("game is not in progress"));
        };
        let Some(card) = round.cards.get_mut(index) else {
            return Ok(Outcome::Unchanged);
        };
        if card.revealed {
            return Ok(Outcome::Unchanged);
        }
        card.revealed = true;
        let kind = card.kind;
        let team = round.current_turn;

        let resolution = match kind {
            CardKind::Trap => {
                let winner = team.other();
                Resolution::Win {
                    winner,
                    message: format!("The trap card was revealed! The {winner} team wins!"),
                }
            }
            CardKind::Neutral => {
                let next = team.other();
                round.current_turn = next;
                Resolution::Continue {
                    message: format!("A neutral card. Turn over. Now it's the {next} team's turn."),
                    boundary: true,
                }
            }
            kind if kind.team() == Some(team) => {
                if round.remaining.decrement(team) == 0 {
                    Resolution::Win {
                        winner: team,
                        message: all_agents_found(team),
                    }
                } else {
                    Resolution::Continue {
                        message: "Correct! Keep guessing.".to_string(),
                        boundary: false,
                    }
                }
            }
            _ => {
                // The opposing team's card: their count drops and they take the turn,
                // winning outright if that was their last agent.
                let opponent = team.other();
                let left = round.remaining.decrement(opponent);
                round.current_turn = opponent;
                if left == 0 {
                    Resolution::Win {
                        winner: opponent,
                        message: all_agents_found(opponent),
                    }
                } else {
                    Resolution::Continue {
                        message: format!(
                            "That word belongs to the {opponent} team! Turn over. Now it's the {opponent} team's turn."
                        ),
                        boundary: true,
                    }
                }
            }
        };

        match resolution {
            Resolution::Continue { message, boundary } => {
                self.message = message;
                Ok(if boundary {
                    Outcome::TurnBoundary
                } else {
                    Outcome::Updated
                })
            }
            Resolution::Win { winner, message } => {
                self.message = message;
                self.finish(winner);
                Ok(Outcome::TurnBoundary)
            }
        }
    }

    /// Passes the turn to the other team. Used for voluntary passes and timer expiry.
    pub fn end_turn(&mut self) -> Result<Outcome, GameError> {
        let Stage::InProgress(round) = &mut self.stage else {
            return Err(GameError::InvalidAction("game is not in progress"));
        };
        let next = round.current_turn.other();
        round.current_turn = next;
        self.message = format!("Turn passed to the {next} team.");
        Ok(Outcome::TurnBoundary)
    }

    fn finish(&mut self, winner: Team) {
        let stage = std::mem::replace(&mut self.stage, Stage::TeamSelect);
        self.stage = match stage {
            Stage::InProgress(mut round) => {
                round.turn_deadline = None;
                Stage::GameOver { round, winner }
            }
            other => other,
        };
    }

    pub fn turn_deadline(&self) -> Option<DateTime<Utc>> {
        match &self.stage {
            Stage::InProgress(round) => round.turn_deadline,
            _ => None,
        }
    }

    /// Records the deadline of the running turn. Ignored outside IN_PROGRESS.
    pub fn set_turn_deadline(&mut self, deadline: Option<DateTime<Utc>>) {
        if let Stage::InProgress(round) = &mut self.stage {
            round.turn_deadline = deadline;
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let board = self.round().map(|round| BoardSnapshot {
            cards: round.cards.iter().map(Card::snapshot).collect(),
            current_turn: round.current_turn,
            starting_team: round.starting_team,
            remaining: round.remaining.snapshot(),
            is_game_over: self.winner().is_some(),
            winner: self.winner(),
            turn_end_time: self.turn_deadline(),
        });
        GameSnapshot {
            phase: self.phase(),
            red_team: self.red.snapshot(),
            blue_team: self.blue.snapshot(),
            unassigned_players: self.unassigned.clone(),
            message: self.message.clone(),
            turn_timer_duration: self.settings.turn_timer_secs,
            theme_hint: self.settings.theme_hint.clone(),
            custom_words: self.settings.custom_words.clone(),
            board,
        }
    }
}

fn all_agents_found(team: Team) -> String {
    format!("The {team} team found all their agents! They win!")
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
