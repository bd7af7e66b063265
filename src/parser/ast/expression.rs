use std::collections::HashSet;
use std::rc::Rc;

use crate::error::ParsingError;
use crate::lexer::{PlaceInCode, Symbol, Token};
use crate::parser::{parse_block, FromTokens, ParseState};

use super::{Block, ConstantValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierScope {
    None,
    Local,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    ShiftLeft,
    ShiftRight,
    Assign,
    AssignAdd,
    AssignSub,
    AssignMul,
    AssignDiv,
    AssignMod,
    AssignShiftLeft,
    AssignShiftRight,
    AssignBitAnd,
    AssignBitXor,
    AssignBitOr,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
    Comma,
    Index,
}

/// A function literal: parameter names plus a body block. Wrapped in `Rc`
/// so function values compare by node identity and stay alive as long as
/// any value references them.
#[derive(Debug)]
pub struct FunctionDefinition {
    pub place: PlaceInCode,
    pub parameters: Vec<String>,
    pub body: Block,
}

/// An object literal. `base` is only ever attached by the `class` sugar;
/// the evaluator copies the base object member-wise before applying the
/// entries.
#[derive(Debug, Clone)]
pub struct ObjectLiteral {
    pub place: PlaceInCode,
    pub base: Option<Box<Expression>>,
    pub entries: Vec<(String, Expression)>,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Constant {
        place: PlaceInCode,
        value: ConstantValue,
    },
    Identifier {
        place: PlaceInCode,
        scope: IdentifierScope,
        name: String,
    },
    This {
        place: PlaceInCode,
    },
    Function {
        place: PlaceInCode,
        definition: Rc<FunctionDefinition>,
    },
    ObjectLiteral(ObjectLiteral),
    ArrayLiteral {
        place: PlaceInCode,
        items: Vec<Expression>,
    },
    Unary {
        place: PlaceInCode,
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        place: PlaceInCode,
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Ternary {
        place: PlaceInCode,
        condition: Box<Expression>,
        when_true: Box<Expression>,
        when_false: Box<Expression>,
    },
    Call {
        place: PlaceInCode,
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Member {
        place: PlaceInCode,
        object: Box<Expression>,
        member: String,
    },
}

impl Expression {
    pub fn place(&self) -> PlaceInCode {
        match self {
            Expression::Constant { place, .. } => *place,
            Expression::Identifier { place, .. } => *place,
            Expression::This { place } => *place,
            Expression::Function { place, .. } => *place,
            Expression::ObjectLiteral(literal) => literal.place,
            Expression::ArrayLiteral { place, .. } => *place,
            Expression::Unary { place, .. } => *place,
            Expression::Binary { place, .. } => *place,
            Expression::Ternary { place, .. } => *place,
            Expression::Call { place, .. } => *place,
            Expression::Member { place, .. } => *place,
        }
    }
}

impl FromTokens for Expression {
    fn parse(tokens: &mut ParseState) -> Result<Self, ParsingError> {
        let expr = Expression::try_parse(tokens)?;
        require(expr, tokens)
    }
}

fn require(expr: Option<Expression>, state: &ParseState) -> Result<Expression, ParsingError> {
    expr.ok_or_else(|| ParsingError::new(state.place(), "Expected expression."))
}

/// One left-associative level of the ladder: parse the tighter level, then
/// fold as long as one of `operators` is next.
fn parse_binary_level(
    state: &mut ParseState,
    operators: &[(Symbol, BinaryOperator)],
    next: fn(&mut ParseState) -> Result<Option<Expression>, ParsingError>,
) -> Result<Option<Expression>, ParsingError> {
    let Some(mut expr) = next(state)? else {
        return Ok(None);
    };
    'fold: loop {
        let place = state.place();
        for (symbol, operator) in operators {
            if state.accept_symbol(*symbol) {
                let right = require(next(state)?, state)?;
                expr = Expression::Binary {
                    place,
                    operator: *operator,
                    left: Box::new(expr),
                    right: Box::new(right),
                };
                continue 'fold;
            }
        }
        break;
    }
    Ok(Some(expr))
}

const LEVEL_5: &[(Symbol, BinaryOperator)] = &[
    (Symbol::Asterisk, BinaryOperator::Mul),
    (Symbol::Slash, BinaryOperator::Div),
    (Symbol::Percent, BinaryOperator::Mod),
];
const LEVEL_6: &[(Symbol, BinaryOperator)] = &[
    (Symbol::Plus, BinaryOperator::Add),
    (Symbol::Dash, BinaryOperator::Sub),
];
const LEVEL_7: &[(Symbol, BinaryOperator)] = &[
    (Symbol::DoubleLess, BinaryOperator::ShiftLeft),
    (Symbol::DoubleGreater, BinaryOperator::ShiftRight),
];
const LEVEL_9: &[(Symbol, BinaryOperator)] = &[
    (Symbol::Less, BinaryOperator::Less),
    (Symbol::LessEquals, BinaryOperator::LessEqual),
    (Symbol::Greater, BinaryOperator::Greater),
    (Symbol::GreaterEquals, BinaryOperator::GreaterEqual),
];
const LEVEL_10: &[(Symbol, BinaryOperator)] = &[
    (Symbol::DoubleEquals, BinaryOperator::Equal),
    (Symbol::ExclamationEquals, BinaryOperator::NotEqual),
];
const LEVEL_11: &[(Symbol, BinaryOperator)] = &[(Symbol::Amp, BinaryOperator::BitAnd)];
const LEVEL_12: &[(Symbol, BinaryOperator)] = &[(Symbol::Caret, BinaryOperator::BitXor)];
const LEVEL_13: &[(Symbol, BinaryOperator)] = &[(Symbol::Pipe, BinaryOperator::BitOr)];
const LEVEL_14: &[(Symbol, BinaryOperator)] = &[(Symbol::DoubleAmp, BinaryOperator::LogicalAnd)];
const LEVEL_15: &[(Symbol, BinaryOperator)] = &[(Symbol::DoublePipe, BinaryOperator::LogicalOr)];

const PREFIX_OPERATORS: &[(Symbol, UnaryOperator)] = &[
    (Symbol::DoublePlus, UnaryOperator::PreIncrement),
    (Symbol::DoubleDash, UnaryOperator::PreDecrement),
    (Symbol::Plus, UnaryOperator::Plus),
    (Symbol::Dash, UnaryOperator::Minus),
    (Symbol::ExclamationMark, UnaryOperator::LogicalNot),
    (Symbol::Tilde, UnaryOperator::BitwiseNot),
];

const ASSIGNMENTS: &[(Symbol, BinaryOperator)] = &[
    (Symbol::Equals, BinaryOperator::Assign),
    (Symbol::PlusEquals, BinaryOperator::AssignAdd),
    (Symbol::DashEquals, BinaryOperator::AssignSub),
    (Symbol::AsteriskEquals, BinaryOperator::AssignMul),
    (Symbol::SlashEquals, BinaryOperator::AssignDiv),
    (Symbol::PercentEquals, BinaryOperator::AssignMod),
    (Symbol::DoubleLessEquals, BinaryOperator::AssignShiftLeft),
    (Symbol::DoubleGreaterEquals, BinaryOperator::AssignShiftRight),
    (Symbol::AmpEquals, BinaryOperator::AssignBitAnd),
    (Symbol::CaretEquals, BinaryOperator::AssignBitXor),
    (Symbol::PipeEquals, BinaryOperator::AssignBitOr),
];

impl Expression {
    /// Level 17: comma sequences. The entry point for full expressions.
    pub fn try_parse(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(
            state,
            &[(Symbol::Comma, BinaryOperator::Comma)],
            Self::try_parse_expr16,
        )
    }

    /// Level 16: ternary and assignments, both right associative.
    pub(crate) fn try_parse_expr16(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        let Some(expr) = Self::try_parse_expr15(state)? else {
            return Ok(None);
        };

        let place = state.place();
        if state.accept_symbol(Symbol::QuestionMark) {
            let when_true = require(Self::try_parse_expr16(state)?, state)?;
            state.expect_symbol(Symbol::Colon)?;
            let when_false = require(Self::try_parse_expr16(state)?, state)?;
            return Ok(Some(Expression::Ternary {
                place,
                condition: Box::new(expr),
                when_true: Box::new(when_true),
                when_false: Box::new(when_false),
            }));
        }
        for (symbol, operator) in ASSIGNMENTS {
            if state.accept_symbol(*symbol) {
                let right = require(Self::try_parse_expr16(state)?, state)?;
                return Ok(Some(Expression::Binary {
                    place,
                    operator: *operator,
                    left: Box::new(expr),
                    right: Box::new(right),
                }));
            }
        }
        Ok(Some(expr))
    }

    fn try_parse_expr15(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_15, Self::try_parse_expr14)
    }

    fn try_parse_expr14(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_14, Self::try_parse_expr13)
    }

    fn try_parse_expr13(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_13, Self::try_parse_expr12)
    }

    fn try_parse_expr12(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_12, Self::try_parse_expr11)
    }

    fn try_parse_expr11(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_11, Self::try_parse_expr10)
    }

    fn try_parse_expr10(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_10, Self::try_parse_expr9)
    }

    fn try_parse_expr9(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_9, Self::try_parse_expr7)
    }

    fn try_parse_expr7(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_7, Self::try_parse_expr6)
    }

    fn try_parse_expr6(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_6, Self::try_parse_expr5)
    }

    fn try_parse_expr5(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        parse_binary_level(state, LEVEL_5, Self::try_parse_expr3)
    }

    /// Level 3: prefix operators, right associative.
    fn try_parse_expr3(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        let place = state.place();
        for (symbol, operator) in PREFIX_OPERATORS {
            if state.accept_symbol(*symbol) {
                let operand = require(Self::try_parse_expr3(state)?, state)?;
                return Ok(Some(Expression::Unary {
                    place,
                    operator: *operator,
                    operand: Box::new(operand),
                }));
            }
        }
        Self::try_parse_expr2(state)
    }

    /// Level 2: postfix `++`/`--`, calls, indexing and member access.
    fn try_parse_expr2(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        let Some(mut expr) = Self::try_parse_expr0(state)? else {
            return Ok(None);
        };

        loop {
            let place = state.place();
            if state.accept_symbol(Symbol::DoublePlus) {
                expr = Expression::Unary {
                    place,
                    operator: UnaryOperator::PostIncrement,
                    operand: Box::new(expr),
                };
            } else if state.accept_symbol(Symbol::DoubleDash) {
                expr = Expression::Unary {
                    place,
                    operator: UnaryOperator::PostDecrement,
                    operand: Box::new(expr),
                };
            } else if state.accept_symbol(Symbol::RoundOpen) {
                let mut arguments = vec![];
                if let Some(first) = Self::try_parse_expr16(state)? {
                    arguments.push(first);
                    while state.accept_symbol(Symbol::Comma) {
                        arguments.push(require(Self::try_parse_expr16(state)?, state)?);
                    }
                }
                state.expect_symbol(Symbol::RoundClose)?;
                expr = Expression::Call {
                    place,
                    callee: Box::new(expr),
                    arguments,
                };
            } else if state.accept_symbol(Symbol::SquareOpen) {
                let index = require(Self::try_parse(state)?, state)?;
                state.expect_symbol(Symbol::SquareClose)?;
                expr = Expression::Binary {
                    place,
                    operator: BinaryOperator::Index,
                    left: Box::new(expr),
                    right: Box::new(index),
                };
            } else if state.accept_symbol(Symbol::Dot) {
                let member = state.expect_identifier()?;
                expr = Expression::Member {
                    place,
                    object: Box::new(expr),
                    member,
                };
            } else {
                return Ok(Some(expr));
            }
        }
    }

    /// Level 0: primaries.
    fn try_parse_expr0(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
        let place = state.place();

        // '(' Expr17 ')' — grouping has no node of its own.
        if state.accept_symbol(Symbol::RoundOpen) {
            let expr = require(Self::try_parse(state)?, state)?;
            state.expect_symbol(Symbol::RoundClose)?;
            return Ok(Some(expr));
        }

        if let Some(literal) = try_parse_object_literal(state)? {
            return Ok(Some(Expression::ObjectLiteral(literal)));
        }

        if state.accept_symbol(Symbol::SquareOpen) {
            let items = parse_array_items(state)?;
            return Ok(Some(Expression::ArrayLiteral { place, items }));
        }

        // Anonymous function: 'function' '(' ... ')' '{' ... '}'
        if state.peek_is_symbol(0, Symbol::Function) && state.peek_is_symbol(1, Symbol::RoundOpen) {
            state.advance();
            let definition = parse_function_definition(state, place)?;
            return Ok(Some(Expression::Function {
                place,
                definition: Rc::new(definition),
            }));
        }

        if let Some(value) = try_parse_constant_value(state) {
            return Ok(Some(Expression::Constant { place, value }));
        }

        if let Some(identifier) = try_parse_identifier_value(state)? {
            return Ok(Some(identifier));
        }

        if state.accept_symbol(Symbol::This) {
            return Ok(Some(Expression::This { place }));
        }

        Ok(None)
    }
}

/// Constant tokens: numbers, strings, `null`, `false`, `true`.
pub(crate) fn try_parse_constant_value(state: &mut ParseState) -> Option<ConstantValue> {
    let value = match state.peek() {
        Token::Number { value, .. } => ConstantValue::Number(*value),
        Token::Str { value, .. } => ConstantValue::String(value.clone()),
        Token::Symbol {
            symbol: Symbol::Null,
            ..
        } => ConstantValue::Null,
        Token::Symbol {
            symbol: Symbol::False,
            ..
        } => ConstantValue::Number(0.0),
        Token::Symbol {
            symbol: Symbol::True,
            ..
        } => ConstantValue::Number(1.0),
        _ => return None,
    };
    state.advance();
    Some(value)
}

/// `local.name`, `global.name` or a plain identifier.
fn try_parse_identifier_value(state: &mut ParseState) -> Result<Option<Expression>, ParsingError> {
    let place = state.place();

    let scope = match state.peek().symbol() {
        Some(Symbol::Local) => Some(IdentifierScope::Local),
        Some(Symbol::Global) => Some(IdentifierScope::Global),
        _ => None,
    };
    if let Some(scope) = scope {
        state.advance();
        state.expect_symbol(Symbol::Dot)?;
        let name = state.expect_identifier()?;
        return Ok(Some(Expression::Identifier { place, scope, name }));
    }

    if let Some(name) = state.accept_identifier() {
        return Ok(Some(Expression::Identifier {
            place,
            scope: IdentifierScope::None,
            name,
        }));
    }
    Ok(None)
}

/// Parses `( params ) { body }` after the `function` keyword was consumed.
pub(crate) fn parse_function_definition(
    state: &mut ParseState,
    place: PlaceInCode,
) -> Result<FunctionDefinition, ParsingError> {
    state.expect_symbol(Symbol::RoundOpen)?;
    let mut parameters = vec![];
    if state.peek_is_identifier(0) {
        parameters.push(state.expect_identifier()?);
        while state.accept_symbol(Symbol::Comma) {
            parameters.push(state.expect_identifier()?);
        }
    }
    for i in 0..parameters.len() {
        for j in i + 1..parameters.len() {
            if parameters[i] == parameters[j] {
                return Err(ParsingError::new(place, "Parameter names must be unique."));
            }
        }
    }
    state.expect_symbol(Symbol::RoundClose)?;
    state.expect_symbol(Symbol::CurlyOpen)?;
    let body = parse_block(state)?;
    state.expect_symbol(Symbol::CurlyClose)?;
    Ok(FunctionDefinition {
        place,
        parameters,
        body,
    })
}

/// An object literal starts only when the brace is followed by `}`, a
/// `key :` pair, or a named function member.
pub(crate) fn try_parse_object_literal(
    state: &mut ParseState,
) -> Result<Option<ObjectLiteral>, ParsingError> {
    let starts_literal = state.peek_is_symbol(0, Symbol::CurlyOpen)
        && (state.peek_is_symbol(1, Symbol::CurlyClose)
            || ((state.peek_is_identifier(1) || state.peek_is_string(1))
                && state.peek_is_symbol(2, Symbol::Colon))
            || (state.peek_is_symbol(1, Symbol::Function) && state.peek_is_identifier(2)));
    if !starts_literal {
        return Ok(None);
    }

    let place = state.place();
    state.advance();
    let mut entries: Vec<(String, Expression)> = vec![];
    let mut seen = HashSet::new();

    if !state.accept_symbol(Symbol::CurlyClose) {
        parse_checked_member(state, &mut entries, &mut seen)?;
        if !state.accept_symbol(Symbol::CurlyClose) {
            while state.accept_symbol(Symbol::Comma) {
                // Trailing comma before the closing brace is allowed.
                if state.accept_symbol(Symbol::CurlyClose) {
                    return Ok(Some(ObjectLiteral {
                        place,
                        base: None,
                        entries,
                    }));
                }
                parse_checked_member(state, &mut entries, &mut seen)?;
            }
            state.expect_symbol(Symbol::CurlyClose)?;
        }
    }

    Ok(Some(ObjectLiteral {
        place,
        base: None,
        entries,
    }))
}

fn parse_checked_member(
    state: &mut ParseState,
    entries: &mut Vec<(String, Expression)>,
    seen: &mut HashSet<String>,
) -> Result<(), ParsingError> {
    let member_place = state.place();
    let Some((key, value)) = try_parse_object_member(state)? else {
        return Err(ParsingError::new(member_place, "Expected object member."));
    };
    if !seen.insert(key.clone()) {
        return Err(ParsingError::new(member_place, "Repeating key in object."));
    }
    entries.push((key, value));
    Ok(())
}

/// `key : Expr16`, `'key' : Expr16`, or `function key(...) {...}`.
fn try_parse_object_member(
    state: &mut ParseState,
) -> Result<Option<(String, Expression)>, ParsingError> {
    let place = state.place();

    if state.peek_is_symbol(0, Symbol::Function) && state.peek_is_identifier(1) {
        state.advance();
        let name = state.expect_identifier()?;
        let definition = parse_function_definition(state, place)?;
        return Ok(Some((
            name,
            Expression::Function {
                place,
                definition: Rc::new(definition),
            },
        )));
    }

    let key = match state.peek() {
        Token::Str { value, .. } if state.peek_is_symbol(1, Symbol::Colon) => value.clone(),
        Token::Identifier { value, .. } if state.peek_is_symbol(1, Symbol::Colon) => value.clone(),
        _ => return Ok(None),
    };
    state.advance();
    state.advance();
    let value = require(Expression::try_parse_expr16(state)?, state)?;
    Ok(Some((key, value)))
}

/// Items of `[ ... ]` after the opening bracket was consumed.
fn parse_array_items(state: &mut ParseState) -> Result<Vec<Expression>, ParsingError> {
    let mut items = vec![];
    if state.accept_symbol(Symbol::SquareClose) {
        return Ok(items);
    }
    items.push(require(Expression::try_parse_expr16(state)?, state)?);
    if state.accept_symbol(Symbol::SquareClose) {
        return Ok(items);
    }
    while state.accept_symbol(Symbol::Comma) {
        if state.accept_symbol(Symbol::SquareClose) {
            return Ok(items);
        }
        items.push(require(Expression::try_parse_expr16(state)?, state)?);
    }
    state.expect_symbol(Symbol::SquareClose)?;
    Ok(items)
}
