use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("expected {expected} words, got {actual}")]
    WrongWordCount { expected: usize, actual: usize },
    #[error("duplicate word {0}")]
    DuplicateWord(String),
    #[error("custom word list has {blank} blank entries")]
    BlankWords { blank: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("{0}")]
    InvalidAction(&'static str),
    #[error("cannot build board: {0}")]
    InvalidBoard(#[from] BoardError),
}

impl From<GameError> for ApiError {
    fn from(value: GameError) -> Self {
        match value {
            GameError::InvalidAction(reason) => ApiError::invalid_action(reason),
            GameError::InvalidBoard(_) => ApiError::validation(value.to_string()),
        }
    }
}
