//! Parser for Minnow.
//!
//! Recursive descent over the token vector with a rewindable index. The
//! expression grammar is the 17-level precedence ladder implemented in
//! [`ast::Expression`]; statements live in [`ast::Statement`].

pub mod ast;
mod parse_state;

pub use parse_state::*;

use crate::error::ParsingError;
use crate::lexer::Token;

use ast::{Block, Script, Statement};

/// Implemented by AST nodes that parse themselves from the token stream.
pub trait FromTokens: Sized {
    fn parse(tokens: &mut ParseState) -> Result<Self, ParsingError>;
}

/// Parses a whole script. The entire input must be consumed.
pub fn parse(tokens: Vec<Token>) -> Result<Script, ParsingError> {
    let mut state = ParseState::new(tokens);
    let body = parse_block(&mut state)?;
    if !state.is_end() {
        return Err(ParsingError::new(state.place(), "Parsing error."));
    }
    Ok(Script { body })
}

/// Parses statements until one cannot start anymore (end of input, a
/// closing brace, a switch label).
pub(crate) fn parse_block(state: &mut ParseState) -> Result<Block, ParsingError> {
    let place = state.place();
    let mut statements = vec![];
    while let Some(statement) = Statement::try_parse(state)? {
        statements.push(statement);
    }
    Ok(Block { place, statements })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_source(input: &str) -> Result<Script, ParsingError> {
        parse(Lexer::new(input).lex()?)
    }

    #[test]
    fn test_parse_script() {
        let script = parse_source("a = 1; print(a); { a = a + 1; }").expect("should parse");

        assert_eq!(script.body.statements.len(), 3);
    }

    #[test]
    fn test_garbage_after_last_statement() {
        let result = parse_source("print(1); }");

        assert!(result.is_err());
    }

    #[test]
    fn test_empty_script() {
        let script = parse_source("// nothing but comments\n;;;;").expect("should parse");

        assert_eq!(script.body.statements.len(), 4);
    }
}
