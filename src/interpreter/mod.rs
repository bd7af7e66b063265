//! Tree-walking evaluator and the host-facing interpreter.
//!
//! Statements execute for effect; expressions evaluate to a value plus an
//! optional candidate `this` binding, which only a handful of syntactic
//! forms propagate through to a call site. Non-local control flow
//! (break/continue/return/throw and runtime failures) travels as
//! [`Interrupt`] through the `Err` channel.

mod builtins;
mod context;
mod lvalue;
mod value;

pub use builtins::SystemFunction;
pub use context::{ExecuteContext, ThisBinding, LOCAL_SCOPE_STACK_MAX_SIZE};
pub use lvalue::LValue;
pub use value::{
    format_number, Array, ArrayRef, Object, ObjectRef, StringRef, Value, ValueType,
};

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, ExecutionError};
use crate::lexer::{Lexer, PlaceInCode};
use crate::parser::ast::{
    BinaryOperator, Block, CatchClause, ConstantValue, Expression, IdentifierScope, ObjectLiteral,
    Statement, SwitchItem, UnaryOperator,
};
use crate::parser;

use value::number_to_index;

/// Non-local control flow signals threaded through execution.
#[derive(Debug)]
enum Interrupt {
    Break(PlaceInCode),
    Continue(PlaceInCode),
    Return(Value),
    Thrown { value: Value, place: PlaceInCode },
    Failure(ExecutionError),
}

impl From<ExecutionError> for Interrupt {
    fn from(value: ExecutionError) -> Self {
        Interrupt::Failure(value)
    }
}

type Exec<T> = Result<T, Interrupt>;

/// The host facade. Owns the global scope and the output buffer; both
/// persist across `execute` calls, so one interpreter can run several
/// sources against the same globals.
#[derive(Debug)]
pub struct Interpreter {
    global_scope: ObjectRef,
    output: String,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            global_scope: Rc::new(RefCell::new(Object::new())),
            output: String::new(),
        }
    }

    /// Parses and runs `source`. Returns the value of an outermost
    /// `return`, or null when the script runs to completion.
    pub fn execute(&mut self, source: &str) -> Result<Value, Error> {
        let tokens = Lexer::new(source).lex()?;
        let script = parser::parse(tokens)?;

        let mut ctx = ExecuteContext::new(self.global_scope.clone(), &mut self.output);
        match execute_block(&mut ctx, &script.body) {
            Ok(()) => Ok(Value::Null),
            Err(Interrupt::Return(value)) => Ok(value),
            Err(Interrupt::Break(place)) => {
                Err(ExecutionError::new(place, "Break without a loop.").into())
            }
            Err(Interrupt::Continue(place)) => {
                Err(ExecutionError::new(place, "Continue without a loop.").into())
            }
            Err(Interrupt::Thrown { value, place }) => Err(Error::UncaughtThrow { place, value }),
            Err(Interrupt::Failure(err)) => Err(err.into()),
        }
    }

    /// Accumulated `print` output over the interpreter's lifetime.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn execute_block(ctx: &mut ExecuteContext, block: &Block) -> Exec<()> {
    for statement in &block.statements {
        execute_statement(ctx, statement)?;
    }
    Ok(())
}

/// Whether a loop body broke out of the loop. Continue signals are
/// consumed here; everything else propagates.
enum LoopFlow {
    Normal,
    Broke,
}

fn execute_loop_body(ctx: &mut ExecuteContext, body: &Statement) -> Exec<LoopFlow> {
    match execute_statement(ctx, body) {
        Ok(()) | Err(Interrupt::Continue(_)) => Ok(LoopFlow::Normal),
        Err(Interrupt::Break(_)) => Ok(LoopFlow::Broke),
        Err(other) => Err(other),
    }
}

fn execute_statement(ctx: &mut ExecuteContext, statement: &Statement) -> Exec<()> {
    match statement {
        Statement::Empty { .. } => Ok(()),
        Statement::Block(block) => execute_block(ctx, block),
        Statement::Expression(expression) => {
            evaluate_value(ctx, expression)?;
            Ok(())
        }
        Statement::Condition {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            if evaluate_value(ctx, condition)?.is_true() {
                execute_statement(ctx, then_branch)
            } else if let Some(else_branch) = else_branch {
                execute_statement(ctx, else_branch)
            } else {
                Ok(())
            }
        }
        Statement::While {
            condition, body, ..
        } => {
            while evaluate_value(ctx, condition)?.is_true() {
                if let LoopFlow::Broke = execute_loop_body(ctx, body)? {
                    break;
                }
            }
            Ok(())
        }
        Statement::DoWhile {
            condition, body, ..
        } => {
            loop {
                if let LoopFlow::Broke = execute_loop_body(ctx, body)? {
                    break;
                }
                if !evaluate_value(ctx, condition)?.is_true() {
                    break;
                }
            }
            Ok(())
        }
        Statement::For {
            init,
            condition,
            iteration,
            body,
            ..
        } => {
            if let Some(init) = init {
                evaluate_value(ctx, init)?;
            }
            loop {
                if let Some(condition) = condition {
                    if !evaluate_value(ctx, condition)?.is_true() {
                        break;
                    }
                }
                if let LoopFlow::Broke = execute_loop_body(ctx, body)? {
                    break;
                }
                if let Some(iteration) = iteration {
                    evaluate_value(ctx, iteration)?;
                }
            }
            Ok(())
        }
        Statement::RangeFor {
            place,
            key_name,
            value_name,
            range,
            body,
        } => execute_range_for(ctx, *place, key_name.as_deref(), value_name, range, body),
        Statement::Break { place } => Err(Interrupt::Break(*place)),
        Statement::Continue { place } => Err(Interrupt::Continue(*place)),
        Statement::Return { value, .. } => {
            let value = match value {
                Some(expression) => evaluate_value(ctx, expression)?,
                None => Value::Null,
            };
            Err(Interrupt::Return(value))
        }
        Statement::Switch {
            scrutinee, items, ..
        } => execute_switch(ctx, scrutinee, items),
        Statement::Throw { place, thrown } => {
            let value = evaluate_value(ctx, thrown)?;
            Err(Interrupt::Thrown {
                value,
                place: *place,
            })
        }
        Statement::Try {
            place,
            body,
            handler,
            finalizer,
        } => execute_try(ctx, *place, body, handler.as_ref(), finalizer.as_deref()),
    }
}

fn execute_switch(
    ctx: &mut ExecuteContext,
    scrutinee: &Expression,
    items: &[SwitchItem],
) -> Exec<()> {
    let value = evaluate_value(ctx, scrutinee)?;

    let mut selected = None;
    let mut default_index = None;
    for (index, item) in items.iter().enumerate() {
        match &item.value {
            Some(constant) => {
                if constant_to_value(constant).is_equal(&value) {
                    selected = Some(index);
                    break;
                }
            }
            None => default_index = Some(index),
        }
    }
    let Some(start) = selected.or(default_index) else {
        return Ok(());
    };

    // Classic fall-through: execution continues into following arms until
    // a break or the end of the switch.
    for item in &items[start..] {
        match execute_block(ctx, &item.block) {
            Ok(()) => {}
            Err(Interrupt::Break(_)) => break,
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

fn execute_range_for(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    key_name: Option<&str>,
    value_name: &str,
    range: &Expression,
    body: &Statement,
) -> Exec<()> {
    let range_value = evaluate_value(ctx, range)?;
    let scope = ctx.innermost_scope();

    let assign_loop_var = |name: &str, value: Value| -> Exec<()> {
        LValue::ObjectMember {
            object: scope.clone(),
            key: name.to_string(),
        }
        .assign(value, place)
        .map_err(Interrupt::from)
    };

    match &range_value {
        Value::String(string) => {
            let count = string.borrow().len();
            for index in 0..count {
                let Some(byte) = string.borrow().as_bytes().get(index).copied() else {
                    break;
                };
                if let Some(key_name) = key_name {
                    assign_loop_var(key_name, Value::Number(index as f64))?;
                }
                assign_loop_var(value_name, Value::string((byte as char).to_string()))?;
                if let LoopFlow::Broke = execute_loop_body(ctx, body)? {
                    break;
                }
            }
        }
        Value::Object(object) => {
            let entries = object.borrow().entries();
            for (key, value) in entries {
                if let Some(key_name) = key_name {
                    assign_loop_var(key_name, Value::string(key))?;
                }
                assign_loop_var(value_name, value)?;
                if let LoopFlow::Broke = execute_loop_body(ctx, body)? {
                    break;
                }
            }
        }
        Value::Array(array) => {
            let count = array.borrow().items.len();
            for index in 0..count {
                let Some(item) = array.borrow().items.get(index).cloned() else {
                    break;
                };
                if let Some(key_name) = key_name {
                    assign_loop_var(key_name, Value::Number(index as f64))?;
                }
                assign_loop_var(value_name, item)?;
                if let LoopFlow::Broke = execute_loop_body(ctx, body)? {
                    break;
                }
            }
        }
        _ => return Err(ExecutionError::new(place, "Invalid type.").into()),
    }

    // The loop variables are observably reset to null afterwards.
    if let Some(key_name) = key_name {
        assign_loop_var(key_name, Value::Null)?;
    }
    assign_loop_var(value_name, Value::Null)?;
    Ok(())
}

fn execute_try(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    body: &Statement,
    handler: Option<&CatchClause>,
    finalizer: Option<&Statement>,
) -> Exec<()> {
    match execute_statement(ctx, body) {
        Ok(()) => {
            // A throw inside the finalizer on the normal path becomes the
            // outgoing exception.
            if let Some(finalizer) = finalizer {
                execute_statement(ctx, finalizer)?;
            }
            Ok(())
        }
        Err(Interrupt::Thrown {
            value,
            place: thrown_place,
        }) => match handler {
            Some(handler) => run_catch(ctx, handler, finalizer, place, value),
            None => run_finalizer_rethrowing(
                ctx,
                finalizer,
                Interrupt::Thrown {
                    value,
                    place: thrown_place,
                },
            ),
        },
        Err(Interrupt::Failure(err)) => match handler {
            Some(handler) => {
                let descriptor = execution_error_to_object(&err);
                run_catch(ctx, handler, finalizer, place, descriptor)
            }
            None => run_finalizer_rethrowing(ctx, finalizer, Interrupt::Failure(err)),
        },
        Err(signal) => {
            // break/continue/return run the finalizer and re-raise.
            if let Some(finalizer) = finalizer {
                execute_statement(ctx, finalizer)?;
            }
            Err(signal)
        }
    }
}

/// Binds the exception to the catch variable in the innermost scope, runs
/// the handler, clears the variable, then runs the finalizer.
fn run_catch(
    ctx: &mut ExecuteContext,
    handler: &CatchClause,
    finalizer: Option<&Statement>,
    place: PlaceInCode,
    exception: Value,
) -> Exec<()> {
    let binding = LValue::ObjectMember {
        object: ctx.innermost_scope(),
        key: handler.variable.clone(),
    };
    binding.assign(exception, place).map_err(Interrupt::from)?;
    execute_statement(ctx, &handler.body)?;
    binding.assign(Value::Null, place).map_err(Interrupt::from)?;
    if let Some(finalizer) = finalizer {
        execute_statement(ctx, finalizer)?;
    }
    Ok(())
}

/// Finally without catch on the exception path: a new exception raised by
/// the finalizer is swallowed and the original wins; loop/return signals
/// from the finalizer still take over.
fn run_finalizer_rethrowing(
    ctx: &mut ExecuteContext,
    finalizer: Option<&Statement>,
    original: Interrupt,
) -> Exec<()> {
    if let Some(finalizer) = finalizer {
        match execute_statement(ctx, finalizer) {
            Ok(()) | Err(Interrupt::Thrown { .. }) | Err(Interrupt::Failure(_)) => {}
            Err(signal) => return Err(signal),
        }
    }
    Err(original)
}

fn execution_error_to_object(err: &ExecutionError) -> Value {
    let mut object = Object::new();
    object.set("Type", Value::string("ExecutionError"));
    object.set("Index", Value::Number(err.place.index as f64));
    object.set("Row", Value::Number(err.place.row as f64));
    object.set("Column", Value::Number(err.place.column as f64));
    object.set("Message", Value::string(err.message.clone()));
    Value::Object(Rc::new(RefCell::new(object)))
}

fn constant_to_value(constant: &ConstantValue) -> Value {
    match constant {
        ConstantValue::Null => Value::Null,
        ConstantValue::Number(n) => Value::Number(*n),
        ConstantValue::String(s) => Value::string(s.clone()),
    }
}

fn evaluate_value(ctx: &mut ExecuteContext, expression: &Expression) -> Exec<Value> {
    Ok(evaluate(ctx, expression)?.0)
}

/// Evaluates an expression to its value plus an optional candidate `this`.
/// Only member access, object/array indexing, grouping, and the
/// value-producing operands of `,` and `?:` propagate the candidate; every
/// other form yields an empty binding.
fn evaluate(ctx: &mut ExecuteContext, expression: &Expression) -> Exec<(Value, ThisBinding)> {
    match expression {
        Expression::Constant { value, .. } => Ok((constant_to_value(value), ThisBinding::Empty)),
        Expression::Identifier { place, scope, name } => {
            evaluate_identifier(ctx, *place, *scope, name)
        }
        Expression::This { place } => {
            let this_object = ctx.current_this().and_then(ThisBinding::object).cloned();
            match this_object {
                Some(object) => Ok((Value::Object(object), ThisBinding::Empty)),
                None => Err(ExecutionError::new(*place, "There is no 'this' here.").into()),
            }
        }
        Expression::Function { definition, .. } => Ok((
            Value::Function(Rc::clone(definition)),
            ThisBinding::Empty,
        )),
        Expression::ObjectLiteral(literal) => evaluate_object_literal(ctx, literal),
        Expression::ArrayLiteral { items, .. } => {
            let mut array = Array::new();
            for item in items {
                array.items.push(evaluate_value(ctx, item)?);
            }
            Ok((
                Value::Array(Rc::new(RefCell::new(array))),
                ThisBinding::Empty,
            ))
        }
        Expression::Unary {
            place,
            operator,
            operand,
        } => evaluate_unary(ctx, *place, *operator, operand),
        Expression::Binary {
            place,
            operator,
            left,
            right,
        } => evaluate_binary(ctx, *place, *operator, left, right),
        Expression::Ternary {
            condition,
            when_true,
            when_false,
            ..
        } => {
            if evaluate_value(ctx, condition)?.is_true() {
                evaluate(ctx, when_true)
            } else {
                evaluate(ctx, when_false)
            }
        }
        Expression::Call {
            place,
            callee,
            arguments,
        } => evaluate_call(ctx, *place, callee, arguments),
        Expression::Member {
            place,
            object,
            member,
        } => evaluate_member(ctx, *place, object, member),
    }
}

/// Read resolution order: local scope, `this` members (communicating the
/// receiver), global scope, built-in type names, built-in functions, null.
fn evaluate_identifier(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    scope: IdentifierScope,
    name: &str,
) -> Exec<(Value, ThisBinding)> {
    if scope == IdentifierScope::Local && !ctx.is_local() {
        return Err(ExecutionError::new(place, "There is no local scope here.").into());
    }

    if ctx.is_local() {
        if scope != IdentifierScope::Global {
            if let Some(local) = ctx.current_local_scope() {
                if let Some(value) = local.borrow().get(name) {
                    return Ok((value, ThisBinding::Empty));
                }
            }
        }
        if scope == IdentifierScope::None {
            if let Some(this_object) = ctx.current_this().and_then(ThisBinding::object).cloned() {
                let found = this_object.borrow().get(name);
                if let Some(value) = found {
                    return Ok((value, ThisBinding::Object(this_object)));
                }
            }
        }
    }

    if scope != IdentifierScope::Local {
        if let Some(value) = ctx.global_scope.borrow().get(name) {
            return Ok((value, ThisBinding::Empty));
        }
        for type_value in ValueType::ALL {
            if name == type_value.name() {
                return Ok((Value::Type(type_value), ThisBinding::Empty));
            }
        }
        for function in SystemFunction::ALL {
            if name == function.name() {
                return Ok((Value::SystemFunction(function), ThisBinding::Empty));
            }
        }
    }

    Ok((Value::Null, ThisBinding::Empty))
}

fn evaluate_member(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    object_expression: &Expression,
    member: &str,
) -> Exec<(Value, ThisBinding)> {
    let object_value = evaluate_value(ctx, object_expression)?;
    match &object_value {
        Value::Object(object) => {
            if let Some(value) = object.borrow().get(member) {
                return Ok((value, ThisBinding::Object(Rc::clone(object))));
            }
            if member == "count" {
                let count = object.borrow().count();
                return Ok((Value::Number(count as f64), ThisBinding::Empty));
            }
            Ok((Value::Null, ThisBinding::Empty))
        }
        Value::String(string) => {
            if member == "count" {
                let count = string.borrow().len();
                return Ok((Value::Number(count as f64), ThisBinding::Empty));
            }
            Err(ExecutionError::new(place, "Invalid member.").into())
        }
        Value::Array(array) => {
            let this = ThisBinding::Array(Rc::clone(array));
            match member {
                "count" => Ok((Value::Number(array.borrow().items.len() as f64), this)),
                "add" => Ok((Value::SystemFunction(SystemFunction::ArrayAdd), this)),
                "insert" => Ok((Value::SystemFunction(SystemFunction::ArrayInsert), this)),
                "remove" => Ok((Value::SystemFunction(SystemFunction::ArrayRemove), this)),
                _ => Err(ExecutionError::new(place, "Invalid member.").into()),
            }
        }
        _ => Err(ExecutionError::new(place, "Invalid type.").into()),
    }
}

fn expect_number(value: &Value, place: PlaceInCode) -> Exec<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(ExecutionError::new(place, "Expected number.").into()),
    }
}

fn evaluate_unary(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    operator: UnaryOperator,
    operand: &Expression,
) -> Exec<(Value, ThisBinding)> {
    match operator {
        UnaryOperator::PreIncrement
        | UnaryOperator::PreDecrement
        | UnaryOperator::PostIncrement
        | UnaryOperator::PostDecrement => {
            let lvalue = get_lvalue(ctx, operand)?;
            let current = lvalue.read_in_place(place).map_err(Interrupt::from)?;
            let n = expect_number(&current, place)?;
            let delta = match operator {
                UnaryOperator::PreIncrement | UnaryOperator::PostIncrement => 1.0,
                _ => -1.0,
            };
            lvalue
                .store(Value::Number(n + delta), place)
                .map_err(Interrupt::from)?;
            let result = match operator {
                UnaryOperator::PreIncrement | UnaryOperator::PreDecrement => n + delta,
                _ => n,
            };
            Ok((Value::Number(result), ThisBinding::Empty))
        }
        UnaryOperator::Plus
        | UnaryOperator::Minus
        | UnaryOperator::LogicalNot
        | UnaryOperator::BitwiseNot => {
            let value = evaluate_value(ctx, operand)?;
            let n = expect_number(&value, place)?;
            let result = match operator {
                UnaryOperator::Plus => n,
                UnaryOperator::Minus => -n,
                UnaryOperator::LogicalNot => {
                    if n != 0.0 {
                        0.0
                    } else {
                        1.0
                    }
                }
                _ => !(n as i64) as f64,
            };
            Ok((Value::Number(result), ThisBinding::Empty))
        }
    }
}

fn evaluate_binary(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    operator: BinaryOperator,
    left: &Expression,
    right: &Expression,
) -> Exec<(Value, ThisBinding)> {
    use BinaryOperator::*;

    match operator {
        // Discards the left value; the right side's `this` propagates.
        Comma => {
            evaluate_value(ctx, left)?;
            return evaluate(ctx, right);
        }
        Assign | AssignAdd | AssignSub | AssignMul | AssignDiv | AssignMod | AssignShiftLeft
        | AssignShiftRight | AssignBitAnd | AssignBitXor | AssignBitOr => {
            let lvalue = get_lvalue(ctx, left)?;
            let rhs = evaluate_value(ctx, right)?;
            let value = apply_assignment(operator, &lvalue, rhs, place)?;
            return Ok((value, ThisBinding::Empty));
        }
        Index => return evaluate_index(ctx, place, left, right),
        _ => {}
    }

    let lhs = evaluate_value(ctx, left)?;

    // Short circuit: the result is the last evaluated operand, uncoerced.
    if operator == LogicalAnd {
        if !lhs.is_true() {
            return Ok((lhs, ThisBinding::Empty));
        }
        return Ok((evaluate_value(ctx, right)?, ThisBinding::Empty));
    }
    if operator == LogicalOr {
        if lhs.is_true() {
            return Ok((lhs, ThisBinding::Empty));
        }
        return Ok((evaluate_value(ctx, right)?, ThisBinding::Empty));
    }

    let rhs = evaluate_value(ctx, right)?;

    let value = match operator {
        Add => match (&lhs, &rhs) {
            (Value::Number(l), Value::Number(r)) => Value::Number(l + r),
            (Value::String(l), Value::String(r)) => {
                let mut text = l.borrow().clone();
                text.push_str(&r.borrow());
                Value::string(text)
            }
            _ => return Err(ExecutionError::new(place, "Incompatible types.").into()),
        },
        Equal => Value::Number(if lhs.is_equal(&rhs) { 1.0 } else { 0.0 }),
        NotEqual => Value::Number(if lhs.is_equal(&rhs) { 0.0 } else { 1.0 }),
        Less | LessEqual | Greater | GreaterEqual => {
            if lhs.type_of() != rhs.type_of() {
                return Err(ExecutionError::new(place, "Incompatible types.").into());
            }
            let result = match (&lhs, &rhs) {
                (Value::Number(l), Value::Number(r)) => match operator {
                    Less => l < r,
                    LessEqual => l <= r,
                    Greater => l > r,
                    _ => l >= r,
                },
                (Value::String(l), Value::String(r)) => {
                    let (l, r) = (l.borrow(), r.borrow());
                    match operator {
                        Less => *l < *r,
                        LessEqual => *l <= *r,
                        Greater => *l > *r,
                        _ => *l >= *r,
                    }
                }
                _ => return Err(ExecutionError::new(place, "Invalid type.").into()),
            };
            Value::Number(if result { 1.0 } else { 0.0 })
        }
        _ => {
            // The rest are numeric; mismatches report at the operand.
            let l = expect_number(&lhs, left.place())?;
            let r = expect_number(&rhs, right.place())?;
            let result = match operator {
                Mul => l * r,
                Div => l / r,
                Mod => l % r,
                Sub => l - r,
                ShiftLeft => shift_left(l, r),
                ShiftRight => shift_right(l, r),
                BitAnd => ((l as i64) & (r as i64)) as f64,
                BitXor => ((l as i64) ^ (r as i64)) as f64,
                _ => ((l as i64) | (r as i64)) as f64,
            };
            Value::Number(result)
        }
    };
    Ok((value, ThisBinding::Empty))
}

/// Signed 64-bit shifts; amounts outside 0..64 wrap, which the language
/// leaves implementation-defined.
fn shift_left(l: f64, r: f64) -> f64 {
    (l as i64).wrapping_shl(r as i64 as u32) as f64
}

fn shift_right(l: f64, r: f64) -> f64 {
    (l as i64).wrapping_shr(r as i64 as u32) as f64
}

fn evaluate_index(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    left: &Expression,
    right: &Expression,
) -> Exec<(Value, ThisBinding)> {
    let lhs = evaluate_value(ctx, left)?;
    let rhs = evaluate_value(ctx, right)?;

    match &lhs {
        Value::String(string) => {
            let n = expect_number(&rhs, place)?;
            let index = number_to_index(n)
                .ok_or_else(|| ExecutionError::new(place, "Invalid index."))?;
            let string = string.borrow();
            let byte = *string
                .as_bytes()
                .get(index)
                .ok_or_else(|| ExecutionError::new(place, "Index out of bounds."))?;
            Ok((
                Value::string((byte as char).to_string()),
                ThisBinding::Empty,
            ))
        }
        Value::Object(object) => {
            let Value::String(key) = &rhs else {
                return Err(ExecutionError::new(place, "Expected string.").into());
            };
            let key = key.borrow();
            match object.borrow().get(key.as_str()) {
                Some(value) => Ok((value, ThisBinding::Object(Rc::clone(object)))),
                None => Ok((Value::Null, ThisBinding::Empty)),
            }
        }
        Value::Array(array) => {
            let n = expect_number(&rhs, place)?;
            let item = number_to_index(n)
                .and_then(|index| array.borrow().items.get(index).cloned())
                .ok_or_else(|| ExecutionError::new(place, "Invalid index."))?;
            Ok((item, ThisBinding::Array(Rc::clone(array))))
        }
        _ => Err(ExecutionError::new(place, "Invalid type.").into()),
    }
}

fn apply_assignment(
    operator: BinaryOperator,
    lvalue: &LValue,
    rhs: Value,
    place: PlaceInCode,
) -> Exec<Value> {
    use BinaryOperator::*;

    // Plain assignment may create the location; null removes object keys.
    if operator == Assign {
        lvalue.assign(rhs.clone(), place).map_err(Interrupt::from)?;
        return Ok(rhs);
    }

    // Compound forms require the location to exist already.
    let current = lvalue.read_in_place(place).map_err(Interrupt::from)?;

    if operator == AssignAdd {
        return match (&current, &rhs) {
            (Value::Number(l), Value::Number(r)) => {
                let value = Value::Number(l + r);
                lvalue.store(value.clone(), place).map_err(Interrupt::from)?;
                Ok(value)
            }
            (Value::String(l), Value::String(r)) => {
                // In-place append through the shared buffer.
                let addition = r.borrow().clone();
                l.borrow_mut().push_str(&addition);
                Ok(current.clone())
            }
            _ => Err(ExecutionError::new(place, "Incompatible types.").into()),
        };
    }

    let l = expect_number(&current, place)?;
    let r = expect_number(&rhs, place)?;
    let result = match operator {
        AssignSub => l - r,
        AssignMul => l * r,
        AssignDiv => l / r,
        AssignMod => l % r,
        AssignShiftLeft => shift_left(l, r),
        AssignShiftRight => shift_right(l, r),
        AssignBitAnd => ((l as i64) & (r as i64)) as f64,
        AssignBitXor => ((l as i64) ^ (r as i64)) as f64,
        _ => ((l as i64) | (r as i64)) as f64,
    };
    lvalue
        .store(Value::Number(result), place)
        .map_err(Interrupt::from)?;
    Ok(Value::Number(result))
}

fn evaluate_object_literal(
    ctx: &mut ExecuteContext,
    literal: &ObjectLiteral,
) -> Exec<(Value, ThisBinding)> {
    let object = match &literal.base {
        Some(base_expression) => {
            let base = evaluate_value(ctx, base_expression)?;
            let Value::Object(base_object) = base else {
                return Err(ExecutionError::new(literal.place, "Base must be object.").into());
            };
            let copy = base_object.borrow().shallow_copy();
            Rc::new(RefCell::new(copy))
        }
        None => Rc::new(RefCell::new(Object::new())),
    };

    for (key, value_expression) in &literal.entries {
        let value = evaluate_value(ctx, value_expression)?;
        match value {
            // Null entries remove inherited keys; without a base they
            // simply do not materialise.
            Value::Null => {
                if literal.base.is_some() {
                    object.borrow_mut().remove(key);
                }
            }
            value => object.borrow_mut().set(key.clone(), value),
        }
    }

    Ok((Value::Object(object), ThisBinding::Empty))
}

fn evaluate_call(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    callee: &Expression,
    argument_expressions: &[Expression],
) -> Exec<(Value, ThisBinding)> {
    let (mut callee_value, mut this) = evaluate(ctx, callee)?;

    let mut arguments = Vec::with_capacity(argument_expressions.len());
    for argument in argument_expressions {
        arguments.push(evaluate_value(ctx, argument)?);
    }

    // Calling an object dispatches to the function under its '' key, with
    // the object as the receiver.
    let call_operator = if let Value::Object(object) = &callee_value {
        match object.borrow().get("") {
            Some(Value::Function(function)) => Some((Rc::clone(object), function)),
            _ => None,
        }
    } else {
        None
    };
    if let Some((object, function)) = call_operator {
        this = ThisBinding::Object(object);
        callee_value = Value::Function(function);
    }

    match callee_value {
        Value::Function(definition) => {
            if arguments.len() != definition.parameters.len() {
                return Err(
                    ExecutionError::new(place, "Invalid number of arguments.").into()
                );
            }
            let local_scope = Rc::new(RefCell::new(Object::new()));
            {
                let mut scope = local_scope.borrow_mut();
                for (parameter, argument) in definition.parameters.iter().zip(arguments) {
                    scope.set(parameter.clone(), argument);
                }
            }
            ctx.push_local(local_scope, this, place)
                .map_err(Interrupt::from)?;
            let result = execute_block(ctx, &definition.body);
            ctx.pop_local();
            match result {
                Ok(()) => Ok((Value::Null, ThisBinding::Empty)),
                Err(Interrupt::Return(value)) => Ok((value, ThisBinding::Empty)),
                Err(Interrupt::Break(_)) => {
                    Err(ExecutionError::new(place, "Break without a loop.").into())
                }
                Err(Interrupt::Continue(_)) => {
                    Err(ExecutionError::new(place, "Continue without a loop.").into())
                }
                Err(other) => Err(other),
            }
        }
        Value::SystemFunction(function) => {
            let value = builtins::call_system_function(ctx, function, &this, place, arguments)
                .map_err(Interrupt::from)?;
            Ok((value, ThisBinding::Empty))
        }
        Value::Type(type_value) => {
            let value = builtins::call_type_constructor(type_value, place, arguments)
                .map_err(Interrupt::from)?;
            Ok((value, ThisBinding::Empty))
        }
        _ => Err(ExecutionError::new(place, "Invalid function.").into()),
    }
}

/// L-value resolution. Only identifiers, member access, indexing and the
/// pre-increment forms produce locations.
fn get_lvalue(ctx: &mut ExecuteContext, expression: &Expression) -> Exec<LValue> {
    match expression {
        Expression::Identifier { place, scope, name } => {
            lvalue_identifier(ctx, *place, *scope, name)
        }
        Expression::Member {
            place,
            object,
            member,
        } => {
            let object_value = evaluate_value(ctx, object)?;
            let Value::Object(object) = object_value else {
                return Err(ExecutionError::new(*place, "Expected object.").into());
            };
            Ok(LValue::ObjectMember {
                object,
                key: member.clone(),
            })
        }
        Expression::Binary {
            place,
            operator: BinaryOperator::Index,
            left,
            right,
        } => lvalue_index(ctx, *place, left, right),
        Expression::Unary {
            place,
            operator: operator @ (UnaryOperator::PreIncrement | UnaryOperator::PreDecrement),
            operand,
        } => {
            // `++x` is itself an l-value referring to the updated location.
            let lvalue = get_lvalue(ctx, operand)?;
            let LValue::ObjectMember { object, key } = &lvalue else {
                return Err(ExecutionError::new(*place, "Invalid l-value.").into());
            };
            let current = object
                .borrow()
                .get(key)
                .ok_or_else(|| ExecutionError::new(*place, "Variable doesn't exist."))?;
            let n = expect_number(&current, *place)?;
            let delta = if *operator == UnaryOperator::PreIncrement {
                1.0
            } else {
                -1.0
            };
            object.borrow_mut().set(key.clone(), Value::Number(n + delta));
            Ok(lvalue)
        }
        other => Err(ExecutionError::new(other.place(), "Expected l-value.").into()),
    }
}

/// L-value resolution order mirrors reads, but a miss yields a location
/// for a new variable in the innermost eligible scope.
fn lvalue_identifier(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    scope: IdentifierScope,
    name: &str,
) -> Exec<LValue> {
    let is_local = ctx.is_local();
    if scope == IdentifierScope::Local && !is_local {
        return Err(ExecutionError::new(place, "There is no local scope here.").into());
    }

    if is_local {
        if scope != IdentifierScope::Global {
            if let Some(local) = ctx.current_local_scope() {
                if local.borrow().has_key(name) {
                    return Ok(LValue::ObjectMember {
                        object: local.clone(),
                        key: name.to_string(),
                    });
                }
            }
        }
        if scope == IdentifierScope::None {
            if let Some(this_object) = ctx.current_this().and_then(ThisBinding::object) {
                if this_object.borrow().has_key(name) {
                    return Ok(LValue::ObjectMember {
                        object: this_object.clone(),
                        key: name.to_string(),
                    });
                }
            }
        }
    }

    if scope != IdentifierScope::Local && ctx.global_scope.borrow().has_key(name) {
        return Ok(LValue::ObjectMember {
            object: ctx.global_scope.clone(),
            key: name.to_string(),
        });
    }

    // Unbound: writes create a variable in the innermost eligible scope.
    if scope != IdentifierScope::Global && is_local {
        if let Some(local) = ctx.current_local_scope() {
            return Ok(LValue::ObjectMember {
                object: local.clone(),
                key: name.to_string(),
            });
        }
    }
    Ok(LValue::ObjectMember {
        object: ctx.global_scope.clone(),
        key: name.to_string(),
    })
}

fn lvalue_index(
    ctx: &mut ExecuteContext,
    place: PlaceInCode,
    left: &Expression,
    right: &Expression,
) -> Exec<LValue> {
    let base = get_lvalue(ctx, left)?;
    let base_value = base.read_in_place(place).map_err(Interrupt::from)?;
    let index_value = evaluate_value(ctx, right)?;

    match base_value {
        Value::String(string) => {
            let n = expect_number(&index_value, place)?;
            let index = number_to_index(n)
                .ok_or_else(|| ExecutionError::new(place, "Invalid index."))?;
            Ok(LValue::StringCharacter { string, index })
        }
        Value::Object(object) => {
            let Value::String(key) = index_value else {
                return Err(ExecutionError::new(place, "Expected string.").into());
            };
            let key = key.borrow().clone();
            Ok(LValue::ObjectMember { object, key })
        }
        Value::Array(array) => {
            let n = expect_number(&index_value, place)?;
            let index = number_to_index(n)
                .ok_or_else(|| ExecutionError::new(place, "Invalid index."))?;
            Ok(LValue::ArrayElement { array, index })
        }
        _ => Err(ExecutionError::new(place, "Expected l-value.").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> String {
        let mut interpreter = Interpreter::new();
        interpreter.execute(source).expect("should execute");
        interpreter.output().to_string()
    }

    #[test]
    fn test_execute_arithmetic() {
        assert_eq!(run("print(2 + 3 * 4);"), "14\n");
    }

    #[test]
    fn test_globals_persist_across_executions() {
        let mut interpreter = Interpreter::new();
        interpreter.execute("counter = 1;").expect("should execute");
        interpreter
            .execute("counter = counter + 1; print(counter);")
            .expect("should execute");

        assert_eq!(interpreter.output(), "2\n");
    }

    #[test]
    fn test_outermost_return_value() {
        let mut interpreter = Interpreter::new();
        let value = interpreter.execute("return 2 + 3;").expect("should execute");
        assert!(value.is_equal(&Value::Number(5.0)));

        let value = interpreter.execute("1 + 1;").expect("should execute");
        assert!(value.is_equal(&Value::Null));
    }

    #[test]
    fn test_break_outside_loop_is_an_error() {
        let mut interpreter = Interpreter::new();
        let err = interpreter.execute("break;").unwrap_err();

        let Error::Execution(err) = err else {
            panic!("expected execution error, got {err:?}");
        };
        assert_eq!(err.message, "Break without a loop.");
    }

    #[test]
    fn test_uncaught_throw_reaches_the_host() {
        let mut interpreter = Interpreter::new();
        let err = interpreter.execute("throw 'boom';").unwrap_err();

        let Error::UncaughtThrow { value, .. } = err else {
            panic!("expected uncaught throw, got {err:?}");
        };
        assert!(value.is_equal(&Value::string("boom")));
    }

    #[test]
    fn test_parse_error_leaves_output_untouched() {
        let mut interpreter = Interpreter::new();
        let err = interpreter.execute("print(1)").unwrap_err();

        assert!(matches!(err, Error::Parsing(_)));
        assert_eq!(interpreter.output(), "");
    }
}
