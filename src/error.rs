use thiserror::Error as ThisError;

use crate::db;

/// Why a command could not be carried out. Rendered to clients as `-ERR <message>`.
#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("value is not an integer or out of range")]
    NotInteger,
    #[error("increment or decrement would overflow")]
    Overflow,
    #[error("value is not a valid float")]
    NotFloat,
    #[error("increment would produce NaN or Infinity")]
    NotFinite,
    #[error("resulting score is not a number (NaN)")]
    NanScore,
    #[error("min or max is not a float")]
    InvalidScoreRange,
    #[error("syntax error")]
    Syntax,
    #[error("Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("not yet implemented")]
    NotImplemented,
    /// A handler and the command table disagree about a command's arguments.
    #[error("invalid command binding: {0}")]
    Binding(String),
    #[error("storage failure: {0}")]
    Storage(#[from] db::Error),
}

impl CommandError {
    /// Faults of the server itself, as opposed to a client sending something unacceptable.
    pub fn is_internal(&self) -> bool {
        matches!(self, CommandError::Binding(_) | CommandError::Storage(_))
    }
}
