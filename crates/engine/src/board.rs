use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};
use shared::{
    domain::{CardKind, Team},
    protocol::{CardSnapshot, RemainingSnapshot},
};

use crate::error::BoardError;

pub const GRID_SIZE: usize = 25;
/// Ally cards per team before the starting team's +1 bonus.
pub const AGENTS_PER_TEAM: u8 = 8;
pub const NEUTRAL_CARDS: usize = 7;
pub const TRAP_CARDS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub word: String,
    pub kind: CardKind,
    pub revealed: bool,
}

impl Card {
    pub fn snapshot(&self) -> CardSnapshot {
        CardSnapshot {
            word: self.word.clone(),
            kind: self.kind,
            revealed: self.revealed,
        }
    }
}

/// Unrevealed ally cards left per team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub red: u8,
    pub blue: u8,
}

impl Remaining {
    pub fn get(&self, team: Team) -> u8 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }

    /// Decrements the team's count and returns what is left.
    pub(crate) fn decrement(&mut self, team: Team) -> u8 {
        let slot = match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        };
        *slot = slot.saturating_sub(1);
        *slot
    }

    pub fn snapshot(&self) -> RemainingSnapshot {
        RemainingSnapshot {
            red: self.red,
            blue: self.blue,
        }
    }
}

pub(crate) fn ensure_unique(words: &[String]) -> Result<(), BoardError> {
    let mut seen = HashSet::with_capacity(words.len());
    for word in words {
        if !seen.insert(word.as_str()) {
            return Err(BoardError::DuplicateWord(word.clone()));
        }
    }
    Ok(())
}

/// Pairs `words` with a shuffled category multiset: the starting team gets one
/// extra ally card. Words and categories are shuffled independently.
pub fn generate_board<R: Rng + ?Sized>(
    words: &[String],
    starting_team: Team,
    rng: &mut R,
) -> Result<(Vec<Card>, Remaining), BoardError> {
    if words.len() != GRID_SIZE {
        return Err(BoardError::WrongWordCount {
            expected: GRID_SIZE,
            actual: words.len(),
        });
    }
    ensure_unique(words)?;

    let allies = |team: Team| {
        if team == starting_team {
            AGENTS_PER_TEAM + 1
        } else {
            AGENTS_PER_TEAM
        }
    };
    let remaining = Remaining {
        red: allies(Team::Red),
        blue: allies(Team::Blue),
    };

    let mut kinds = Vec::with_capacity(GRID_SIZE);
    for team in Team::ALL {
        kinds.extend(std::iter::repeat(CardKind::ally_of(team)).take(remaining.get(team) as usize));
    }
    kinds.extend(std::iter::repeat(CardKind::Neutral).take(NEUTRAL_CARDS));
    kinds.extend(std::iter::repeat(CardKind::Trap).take(TRAP_CARDS));
    debug_assert_eq!(kinds.len(), GRID_SIZE);

    let mut shuffled_words = words.to_vec();
    kinds.shuffle(rng);
    shuffled_words.shuffle(rng);

    let cards = shuffled_words
        .into_iter()
        .zip(kinds)
        .map(|(word, kind)| Card {
            word,
            kind,
            revealed: false,
        })
        .collect();
    Ok((cards, remaining))
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
