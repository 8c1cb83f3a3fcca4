use bytes::Bytes;
use std::vec;

use crate::db::ScoreBound;
use crate::error::CommandError;
use crate::number;

/// Hands a command's arguments to its handler one at a time, coercing them on the way.
///
/// The dispatcher checks the argument count against the command's shape before the handler
/// runs, so reading a required argument can only fail if handler and shape disagree. That is
/// reported as a binding error.
pub struct CommandParser {
    command: &'static str,
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    pub fn new(command: &'static str, args: Vec<Bytes>) -> CommandParser {
        CommandParser {
            command,
            parts: args.into_iter(),
        }
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn next_bytes(&mut self) -> Result<Bytes, CommandError> {
        self.parts.next().ok_or_else(|| {
            CommandError::Binding(format!(
                "'{}' read past the arguments its shape guarantees",
                self.command
            ))
        })
    }

    pub fn next_optional(&mut self) -> Option<Bytes> {
        self.parts.next()
    }

    pub fn next_integer(&mut self) -> Result<i64, CommandError> {
        number::parse_integer(&self.next_bytes()?)
    }

    pub fn next_float(&mut self) -> Result<f64, CommandError> {
        number::parse_float(&self.next_bytes()?)
    }

    pub fn next_score_bound(&mut self) -> Result<ScoreBound, CommandError> {
        ScoreBound::parse(&self.next_bytes()?).ok_or(CommandError::InvalidScoreRange)
    }

    /// Takes every argument not read yet.
    pub fn remaining(&mut self) -> Vec<Bytes> {
        self.parts.by_ref().collect()
    }

    pub fn wrong_arity(&self) -> CommandError {
        CommandError::WrongArity(self.command.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(args: &[&'static str]) -> CommandParser {
        CommandParser::new("test", args.iter().copied().map(Bytes::from).collect())
    }

    #[test]
    fn coerces_arguments_in_order() {
        let mut args = parser(&["key", "-3", "1.5", "(2", "rest", "more"]);

        assert_eq!(args.next_bytes().unwrap(), "key");
        assert_eq!(args.next_integer().unwrap(), -3);
        assert_eq!(args.next_float().unwrap(), 1.5);
        assert_eq!(args.next_score_bound().unwrap(), ScoreBound::exclusive(2.0));
        assert_eq!(args.remaining(), vec!["rest", "more"]);
        assert_eq!(args.next_optional(), None);
    }

    #[test]
    fn reports_malformed_numbers() {
        assert!(matches!(parser(&["x"]).next_integer(), Err(CommandError::NotInteger)));
        assert!(matches!(parser(&["x"]).next_float(), Err(CommandError::NotFloat)));
        assert!(matches!(
            parser(&["x"]).next_score_bound(),
            Err(CommandError::InvalidScoreRange)
        ));
    }

    #[test]
    fn reading_past_the_end_is_a_binding_error() {
        let mut args = parser(&[]);
        let err = args.next_bytes().unwrap_err();

        assert!(err.is_internal());
        assert!(matches!(err, CommandError::Binding(_)));
    }
}
