//! Error types shared by the lexer, parser and evaluator.

use std::{error::Error as StdError, fmt::Display};

use colored::Colorize;

use crate::interpreter::Value;
use crate::lexer::PlaceInCode;

/// Malformed source, raised by the lexer or the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingError {
    pub place: PlaceInCode,
    pub message: String,
}

impl ParsingError {
    pub fn new(place: PlaceInCode, message: impl Into<String>) -> Self {
        Self {
            place,
            message: message.into(),
        }
    }
}

impl Display for ParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{}): {}", self.place.row, self.place.column, self.message)
    }
}

impl StdError for ParsingError {}

/// Runtime violation, raised by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    pub place: PlaceInCode,
    pub message: String,
}

impl ExecutionError {
    pub fn new(place: PlaceInCode, message: impl Into<String>) -> Self {
        Self {
            place,
            message: message.into(),
        }
    }
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{}): {}", self.place.row, self.place.column, self.message)
    }
}

impl StdError for ExecutionError {}

/// Everything `Interpreter::execute` can fail with.
#[derive(Debug, Clone)]
pub enum Error {
    Parsing(ParsingError),
    Execution(ExecutionError),
    /// A script `throw` that no `catch` consumed, carrying the thrown value
    /// and the place of the `throw`.
    UncaughtThrow { place: PlaceInCode, value: Value },
}

impl Error {
    pub fn place(&self) -> PlaceInCode {
        match self {
            Error::Parsing(err) => err.place,
            Error::Execution(err) => err.place,
            Error::UncaughtThrow { place, .. } => *place,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::Parsing(err) => err.message.clone(),
            Error::Execution(err) => err.message.clone(),
            Error::UncaughtThrow { value, .. } => {
                format!("Uncaught exception: {}.", value.describe())
            }
        }
    }

    /// Renders the offending line with a caret underneath, for terminal
    /// output. Falls back to the plain message when the place does not map
    /// into `source`.
    pub fn pretty(&self, source: &str) -> String {
        let PlaceInCode { row, column, .. } = self.place();
        let lines: Vec<&str> = source.lines().collect();
        if row == 0 || row > lines.len() {
            return self.to_string();
        }

        let prev_line = if row > 1 { lines[row - 2] } else { "" };
        let line_str = lines[row - 1];
        let left_margin_fill = " ".repeat(format!("{row}").len());
        let left_padding_fill = " ".repeat(column.saturating_sub(1));
        let caret = "^".red();

        format!(
            "{left_margin_fill} |{prev_line}\n{row} |{line_str}\n{left_margin_fill} |{left_padding_fill}{caret} {}",
            self.message()
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let place = self.place();
        write!(f, "({},{}): {}", place.row, place.column, self.message())
    }
}

impl StdError for Error {}

impl From<ParsingError> for Error {
    fn from(value: ParsingError) -> Self {
        Error::Parsing(value)
    }
}

impl From<ExecutionError> for Error {
    fn from(value: ExecutionError) -> Self {
        Error::Execution(value)
    }
}
