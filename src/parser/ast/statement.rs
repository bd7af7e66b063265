use std::rc::Rc;

use crate::error::ParsingError;
use crate::lexer::{PlaceInCode, Symbol};
use crate::parser::{parse_block, FromTokens, ParseState};

use super::expression::{
    parse_function_definition, try_parse_constant_value, try_parse_object_literal,
};
use super::{BinaryOperator, Block, ConstantValue, Expression, IdentifierScope};

/// One `case`/`default` arm of a switch. `value` is `None` for `default`.
#[derive(Debug, Clone)]
pub struct SwitchItem {
    pub place: PlaceInCode,
    pub value: Option<ConstantValue>,
    pub block: Block,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub variable: String,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Empty {
        place: PlaceInCode,
    },
    Block(Block),
    Condition {
        place: PlaceInCode,
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        place: PlaceInCode,
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        place: PlaceInCode,
        condition: Expression,
        body: Box<Statement>,
    },
    For {
        place: PlaceInCode,
        init: Option<Expression>,
        condition: Option<Expression>,
        iteration: Option<Expression>,
        body: Box<Statement>,
    },
    RangeFor {
        place: PlaceInCode,
        key_name: Option<String>,
        value_name: String,
        range: Expression,
        body: Box<Statement>,
    },
    Break {
        place: PlaceInCode,
    },
    Continue {
        place: PlaceInCode,
    },
    Return {
        place: PlaceInCode,
        value: Option<Expression>,
    },
    Switch {
        place: PlaceInCode,
        scrutinee: Expression,
        items: Vec<SwitchItem>,
    },
    Throw {
        place: PlaceInCode,
        thrown: Expression,
    },
    Try {
        place: PlaceInCode,
        body: Box<Statement>,
        handler: Option<CatchClause>,
        finalizer: Option<Box<Statement>>,
    },
    Expression(Expression),
}

impl FromTokens for Statement {
    fn parse(tokens: &mut ParseState) -> Result<Self, ParsingError> {
        let place = tokens.place();
        Statement::try_parse(tokens)?
            .ok_or_else(|| ParsingError::new(place, "Expected statement."))
    }
}

impl Statement {
    /// Parses one statement, or `None` when the current token cannot start
    /// one (end of input, a closing brace, a `case` label, ...).
    pub fn try_parse(state: &mut ParseState) -> Result<Option<Statement>, ParsingError> {
        let place = state.place();

        // Empty statement: ';'
        if state.accept_symbol(Symbol::Semicolon) {
            return Ok(Some(Statement::Empty { place }));
        }

        // Block — unless the brace opens an object literal (`{key: ...}`).
        let opens_literal = state.peek_is_symbol(0, Symbol::CurlyOpen)
            && (state.peek_is_identifier(1) || state.peek_is_string(1))
            && state.peek_is_symbol(2, Symbol::Colon);
        if !opens_literal && state.accept_symbol(Symbol::CurlyOpen) {
            let block = parse_block(state)?;
            state.expect_symbol(Symbol::CurlyClose)?;
            return Ok(Some(Statement::Block(block)));
        }

        if state.accept_symbol(Symbol::If) {
            state.expect_symbol(Symbol::RoundOpen)?;
            let condition = Expression::parse(state)?;
            state.expect_symbol(Symbol::RoundClose)?;
            let then_branch = Box::new(Statement::parse(state)?);
            let else_branch = if state.accept_symbol(Symbol::Else) {
                Some(Box::new(Statement::parse(state)?))
            } else {
                None
            };
            return Ok(Some(Statement::Condition {
                place,
                condition,
                then_branch,
                else_branch,
            }));
        }

        if state.accept_symbol(Symbol::While) {
            state.expect_symbol(Symbol::RoundOpen)?;
            let condition = Expression::parse(state)?;
            state.expect_symbol(Symbol::RoundClose)?;
            let body = Box::new(Statement::parse(state)?);
            return Ok(Some(Statement::While {
                place,
                condition,
                body,
            }));
        }

        if state.accept_symbol(Symbol::Do) {
            let body = Box::new(Statement::parse(state)?);
            state.expect_symbol(Symbol::While)?;
            state.expect_symbol(Symbol::RoundOpen)?;
            let condition = Expression::parse(state)?;
            state.expect_symbol(Symbol::RoundClose)?;
            state.expect_symbol(Symbol::Semicolon)?;
            return Ok(Some(Statement::DoWhile {
                place,
                condition,
                body,
            }));
        }

        if state.accept_symbol(Symbol::For) {
            return Ok(Some(Self::parse_for(state, place)?));
        }

        if state.accept_symbol(Symbol::Break) {
            state.expect_symbol(Symbol::Semicolon)?;
            return Ok(Some(Statement::Break { place }));
        }

        if state.accept_symbol(Symbol::Continue) {
            state.expect_symbol(Symbol::Semicolon)?;
            return Ok(Some(Statement::Continue { place }));
        }

        if state.accept_symbol(Symbol::Return) {
            let value = Expression::try_parse(state)?;
            state.expect_symbol(Symbol::Semicolon)?;
            return Ok(Some(Statement::Return { place, value }));
        }

        if state.accept_symbol(Symbol::Switch) {
            return Ok(Some(Self::parse_switch(state, place)?));
        }

        if state.accept_symbol(Symbol::Throw) {
            let thrown = Expression::parse(state)?;
            state.expect_symbol(Symbol::Semicolon)?;
            return Ok(Some(Statement::Throw { place, thrown }));
        }

        if state.accept_symbol(Symbol::Try) {
            return Ok(Some(Self::parse_try(state, place)?));
        }

        // Named function: `function name(...) {...}` lowers to
        // `name = function(...) {...};` through the usual l-value rules.
        if state.peek_is_symbol(0, Symbol::Function) && state.peek_is_identifier(1) {
            state.advance();
            let name = state.expect_identifier()?;
            let definition = parse_function_definition(state, place)?;
            return Ok(Some(Self::assignment(
                place,
                name,
                Expression::Function {
                    place,
                    definition: Rc::new(definition),
                },
            )));
        }

        // `class Name [: Base] { ... }` lowers to `Name = {...}` with the
        // base expression attached to the object literal.
        if state.accept_symbol(Symbol::Class) {
            let name = state.expect_identifier()?;
            let base = if state.accept_symbol(Symbol::Colon) {
                let base = Expression::try_parse_expr16(state)?
                    .ok_or_else(|| ParsingError::new(state.place(), "Expected expression."))?;
                Some(Box::new(base))
            } else {
                None
            };
            let Some(mut literal) = try_parse_object_literal(state)? else {
                return Err(ParsingError::new(state.place(), "Expected object."));
            };
            literal.base = base;
            return Ok(Some(Self::assignment(
                place,
                name,
                Expression::ObjectLiteral(literal),
            )));
        }

        // Expression statement: Expr17 ';'
        if let Some(expr) = Expression::try_parse(state)? {
            state.expect_symbol(Symbol::Semicolon)?;
            return Ok(Some(Statement::Expression(expr)));
        }

        Ok(None)
    }

    fn assignment(place: PlaceInCode, name: String, value: Expression) -> Statement {
        Statement::Expression(Expression::Binary {
            place,
            operator: BinaryOperator::Assign,
            left: Box::new(Expression::Identifier {
                place,
                scope: IdentifierScope::None,
                name,
            }),
            right: Box::new(value),
        })
    }

    fn parse_for(state: &mut ParseState, place: PlaceInCode) -> Result<Statement, ParsingError> {
        state.expect_symbol(Symbol::RoundOpen)?;

        // Range-based: 'for' '(' id [',' id] ':' Expr17 ')' Statement
        let is_range = (state.peek_is_identifier(0) && state.peek_is_symbol(1, Symbol::Colon))
            || (state.peek_is_identifier(0)
                && state.peek_is_symbol(1, Symbol::Comma)
                && state.peek_is_identifier(2)
                && state.peek_is_symbol(3, Symbol::Colon));
        if is_range {
            let mut key_name = None;
            let mut value_name = state.expect_identifier()?;
            if state.accept_symbol(Symbol::Comma) {
                key_name = Some(value_name);
                value_name = state.expect_identifier()?;
            }
            state.expect_symbol(Symbol::Colon)?;
            let range = Expression::parse(state)?;
            state.expect_symbol(Symbol::RoundClose)?;
            let body = Box::new(Statement::parse(state)?);
            return Ok(Statement::RangeFor {
                place,
                key_name,
                value_name,
                range,
                body,
            });
        }

        // C-style: 'for' '(' Expr17? ';' Expr17? ';' Expr17? ')' Statement
        let mut init = None;
        if !state.accept_symbol(Symbol::Semicolon) {
            init = Some(Expression::parse(state)?);
            state.expect_symbol(Symbol::Semicolon)?;
        }
        let mut condition = None;
        if !state.accept_symbol(Symbol::Semicolon) {
            condition = Some(Expression::parse(state)?);
            state.expect_symbol(Symbol::Semicolon)?;
        }
        let mut iteration = None;
        if !state.accept_symbol(Symbol::RoundClose) {
            iteration = Some(Expression::parse(state)?);
            state.expect_symbol(Symbol::RoundClose)?;
        }
        let body = Box::new(Statement::parse(state)?);
        Ok(Statement::For {
            place,
            init,
            condition,
            iteration,
            body,
        })
    }

    fn parse_switch(state: &mut ParseState, place: PlaceInCode) -> Result<Statement, ParsingError> {
        state.expect_symbol(Symbol::RoundOpen)?;
        let scrutinee = Expression::parse(state)?;
        state.expect_symbol(Symbol::RoundClose)?;
        state.expect_symbol(Symbol::CurlyOpen)?;

        let mut items = vec![];
        while let Some(item) = Self::try_parse_switch_item(state)? {
            items.push(item);
        }
        state.expect_symbol(Symbol::CurlyClose)?;

        // Arm constants and the default arm must be unique.
        for i in 0..items.len() {
            for j in i + 1..items.len() {
                let duplicate = match (&items[i].value, &items[j].value) {
                    (None, None) => true,
                    (Some(left), Some(right)) => left == right,
                    _ => false,
                };
                if duplicate {
                    return Err(ParsingError::new(items[j].place, "Expected unique constant."));
                }
            }
        }

        Ok(Statement::Switch {
            place,
            scrutinee,
            items,
        })
    }

    fn try_parse_switch_item(state: &mut ParseState) -> Result<Option<SwitchItem>, ParsingError> {
        let place = state.place();
        if state.accept_symbol(Symbol::Default) {
            state.expect_symbol(Symbol::Colon)?;
            let block = parse_block(state)?;
            return Ok(Some(SwitchItem {
                place,
                value: None,
                block,
            }));
        }
        if state.accept_symbol(Symbol::Case) {
            let Some(value) = try_parse_constant_value(state) else {
                return Err(ParsingError::new(state.place(), "Expected constant value."));
            };
            state.expect_symbol(Symbol::Colon)?;
            let block = parse_block(state)?;
            return Ok(Some(SwitchItem {
                place,
                value: Some(value),
                block,
            }));
        }
        Ok(None)
    }

    fn parse_try(state: &mut ParseState, place: PlaceInCode) -> Result<Statement, ParsingError> {
        let body = Box::new(Statement::parse(state)?);

        if state.accept_symbol(Symbol::Finally) {
            let finalizer = Some(Box::new(Statement::parse(state)?));
            return Ok(Statement::Try {
                place,
                body,
                handler: None,
                finalizer,
            });
        }

        if !state.accept_symbol(Symbol::Catch) {
            return Err(ParsingError::new(
                state.place(),
                "Expected 'catch' or 'finally'.",
            ));
        }
        state.expect_symbol(Symbol::RoundOpen)?;
        let variable = state.expect_identifier()?;
        state.expect_symbol(Symbol::RoundClose)?;
        let handler = Some(CatchClause {
            variable,
            body: Box::new(Statement::parse(state)?),
        });
        let finalizer = if state.accept_symbol(Symbol::Finally) {
            Some(Box::new(Statement::parse(state)?))
        } else {
            None
        };
        Ok(Statement::Try {
            place,
            body,
            handler,
            finalizer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(input: &str) -> Statement {
        let mut state: ParseState = Lexer::new(input).lex().expect("should lex").into();
        Statement::parse(&mut state).expect("should parse")
    }

    fn parse_err(input: &str) -> ParsingError {
        let mut state: ParseState = Lexer::new(input).lex().expect("should lex").into();
        Statement::parse(&mut state).unwrap_err()
    }

    #[test]
    fn test_if_else() {
        let Statement::Condition { else_branch, .. } = parse("if (x) y = 1; else y = 2;") else {
            panic!("expected condition");
        };

        assert!(else_branch.is_some());
    }

    #[test]
    fn test_expression_statement_needs_semicolon() {
        let err = parse_err("f(1)");
        assert_eq!(err.message, "Expected symbol ';'.");
    }

    #[test]
    fn test_do_while_needs_trailing_semicolon() {
        assert!(matches!(parse("do x = x + 1; while (x < 3);"), Statement::DoWhile { .. }));
        assert_eq!(parse_err("do ; while (1)").message, "Expected symbol ';'.");
    }

    #[test]
    fn test_for_with_empty_sections() {
        let Statement::For {
            init,
            condition,
            iteration,
            ..
        } = parse("for (;;) break;")
        else {
            panic!("expected for loop");
        };

        assert!(init.is_none());
        assert!(condition.is_none());
        assert!(iteration.is_none());
    }

    #[test]
    fn test_range_for_forms() {
        let Statement::RangeFor { key_name, value_name, .. } = parse("for (v : a) print(v);")
        else {
            panic!("expected range for");
        };
        assert_eq!(key_name, None);
        assert_eq!(value_name, "v");

        let Statement::RangeFor { key_name, value_name, .. } = parse("for (k, v : a) print(k);")
        else {
            panic!("expected range for");
        };
        assert_eq!(key_name.as_deref(), Some("k"));
        assert_eq!(value_name, "v");
    }

    #[test]
    fn test_switch_rejects_duplicate_cases() {
        let err = parse_err("switch (x) { case 1: case 1: }");
        assert_eq!(err.message, "Expected unique constant.");

        let err = parse_err("switch (x) { default: default: }");
        assert_eq!(err.message, "Expected unique constant.");
    }

    #[test]
    fn test_switch_parses_arms_and_fallthrough_blocks() {
        let Statement::Switch { items, .. } =
            parse("switch (x) { case 1: f(); case 'a': default: g(); }")
        else {
            panic!("expected switch");
        };

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].value, Some(ConstantValue::Number(1.0)));
        assert_eq!(items[1].value, Some(ConstantValue::String("a".into())));
        assert_eq!(items[2].value, None);
        assert!(items[1].block.statements.is_empty());
    }

    #[test]
    fn test_function_sugar_lowers_to_assignment() {
        let Statement::Expression(Expression::Binary {
            operator,
            left,
            right,
            ..
        }) = parse("function inc(x) { return x + 1; }")
        else {
            panic!("expected assignment expression");
        };

        assert_eq!(operator, BinaryOperator::Assign);
        assert!(matches!(*left, Expression::Identifier { ref name, .. } if name == "inc"));
        assert!(matches!(*right, Expression::Function { .. }));
    }

    #[test]
    fn test_class_sugar_attaches_base() {
        let Statement::Expression(Expression::Binary { right, .. }) =
            parse("class Derived : Base { x: 1 }")
        else {
            panic!("expected assignment expression");
        };

        let Expression::ObjectLiteral(literal) = *right else {
            panic!("expected object literal");
        };
        assert!(literal.base.is_some());
        assert_eq!(literal.entries.len(), 1);
    }

    #[test]
    fn test_brace_disambiguation() {
        assert!(matches!(parse("{ x = 1; }"), Statement::Block(_)));
        assert!(matches!(parse("{}"), Statement::Block(_)));
        assert!(matches!(
            parse("{ a: 1 };"),
            Statement::Expression(Expression::ObjectLiteral(_))
        ));
    }

    #[test]
    fn test_try_requires_catch_or_finally() {
        let err = parse_err("try { f(); }");
        assert_eq!(err.message, "Expected 'catch' or 'finally'.");

        assert!(matches!(
            parse("try f(); catch (e) g(); finally h();"),
            Statement::Try { handler: Some(_), finalizer: Some(_), .. }
        ));
        assert!(matches!(
            parse("try f(); finally h();"),
            Statement::Try { handler: None, finalizer: Some(_), .. }
        ));
    }
}
