//! The fixed built-ins: free functions, array methods and type
//! constructors.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ExecutionError;
use crate::lexer::PlaceInCode;

use super::context::{ExecuteContext, ThisBinding};
use super::value::{format_number, number_to_index, Array, Object, Value, ValueType};

/// Built-in callables. The array methods resolve through member access
/// with the receiver bound as `this`, but the names also resolve bare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemFunction {
    TypeOf,
    Print,
    ArrayAdd,
    ArrayInsert,
    ArrayRemove,
}

impl SystemFunction {
    pub const ALL: [SystemFunction; 5] = [
        SystemFunction::TypeOf,
        SystemFunction::Print,
        SystemFunction::ArrayAdd,
        SystemFunction::ArrayInsert,
        SystemFunction::ArrayRemove,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemFunction::TypeOf => "typeOf",
            SystemFunction::Print => "print",
            SystemFunction::ArrayAdd => "add",
            SystemFunction::ArrayInsert => "insert",
            SystemFunction::ArrayRemove => "remove",
        }
    }
}

type BuiltinResult = Result<Value, ExecutionError>;

pub(crate) fn call_system_function(
    ctx: &mut ExecuteContext,
    function: SystemFunction,
    this: &ThisBinding,
    place: PlaceInCode,
    mut args: Vec<Value>,
) -> BuiltinResult {
    match function {
        SystemFunction::TypeOf => {
            if args.len() != 1 {
                return Err(ExecutionError::new(place, "Expected 1 argument."));
            }
            Ok(Value::Type(args[0].type_of()))
        }
        SystemFunction::Print => {
            for value in &args {
                print_value(ctx, value);
            }
            Ok(Value::Null)
        }
        SystemFunction::ArrayAdd => {
            let array = expect_this_array(this, place)?;
            if args.len() != 1 {
                return Err(ExecutionError::new(place, "Expected 1 argument."));
            }
            array.borrow_mut().items.push(args.remove(0));
            Ok(Value::Null)
        }
        SystemFunction::ArrayInsert => {
            let array = expect_this_array(this, place)?;
            if args.len() != 2 {
                return Err(ExecutionError::new(place, "Expected 2 arguments."));
            }
            let index = expect_index(&args[0], place)?;
            let mut array = array.borrow_mut();
            if index > array.items.len() {
                return Err(ExecutionError::new(place, "Invalid index."));
            }
            array.items.insert(index, args.remove(1));
            Ok(Value::Null)
        }
        SystemFunction::ArrayRemove => {
            let array = expect_this_array(this, place)?;
            if args.len() != 1 {
                return Err(ExecutionError::new(place, "Expected 1 argument."));
            }
            let index = expect_index(&args[0], place)?;
            let mut array = array.borrow_mut();
            if index >= array.items.len() {
                return Err(ExecutionError::new(place, "Invalid index."));
            }
            array.items.remove(index);
            Ok(Value::Null)
        }
    }
}

fn expect_this_array<'a>(
    this: &'a ThisBinding,
    place: PlaceInCode,
) -> Result<&'a super::value::ArrayRef, ExecutionError> {
    this.array()
        .ok_or_else(|| ExecutionError::new(place, "Expected array."))
}

fn expect_index(value: &Value, place: PlaceInCode) -> Result<usize, ExecutionError> {
    let Value::Number(n) = value else {
        return Err(ExecutionError::new(place, "Invalid index."));
    };
    number_to_index(*n).ok_or_else(|| ExecutionError::new(place, "Invalid index."))
}

fn print_value(ctx: &mut ExecuteContext, value: &Value) {
    match value {
        Value::Null => ctx.print("null\n"),
        Value::Number(n) => {
            ctx.print(&format_number(*n));
            ctx.print("\n");
        }
        Value::String(s) => {
            ctx.print(&s.borrow());
            ctx.print("\n");
        }
        Value::Function(_) | Value::SystemFunction(_) => ctx.print("function\n"),
        Value::Object(_) => ctx.print("object\n"),
        Value::Array(_) => ctx.print("array\n"),
        Value::Type(t) => {
            ctx.print(t.name());
            ctx.print("\n");
        }
    }
}

/// Calling a type value constructs a default or copies the single
/// argument of the matching kind.
pub(crate) fn call_type_constructor(
    type_value: ValueType,
    place: PlaceInCode,
    args: Vec<Value>,
) -> BuiltinResult {
    match type_value {
        ValueType::Null => {
            let valid = args.is_empty() || (args.len() == 1 && matches!(args[0], Value::Null));
            if !valid {
                return Err(ExecutionError::new(
                    place,
                    "Null can be constructed only from no arguments or from another null value.",
                ));
            }
            Ok(Value::Null)
        }
        ValueType::Number => match args.as_slice() {
            [Value::Number(n)] => Ok(Value::Number(*n)),
            _ => Err(ExecutionError::new(
                place,
                "Number can be constructed only from another number.",
            )),
        },
        ValueType::String => {
            if args.is_empty() {
                return Ok(Value::string(""));
            }
            match args.as_slice() {
                [value @ Value::String(_)] => Ok(value.clone()),
                _ => Err(ExecutionError::new(
                    place,
                    "String can be constructed only from no arguments or from another string value.",
                )),
            }
        }
        ValueType::Object => {
            if args.is_empty() {
                return Ok(Value::Object(Rc::new(RefCell::new(Object::new()))));
            }
            match args.as_slice() {
                [Value::Object(object)] => Ok(Value::Object(Rc::new(RefCell::new(
                    object.borrow().shallow_copy(),
                )))),
                _ => Err(ExecutionError::new(
                    place,
                    "Object can be constructed only from no arguments or from another object value.",
                )),
            }
        }
        ValueType::Array => {
            if args.is_empty() {
                return Ok(Value::Array(Rc::new(RefCell::new(Array::new()))));
            }
            match args.as_slice() {
                [Value::Array(array)] => Ok(Value::Array(Rc::new(RefCell::new(
                    array.borrow().shallow_copy(),
                )))),
                _ => Err(ExecutionError::new(
                    place,
                    "Array can be constructed only from no arguments or from another array value.",
                )),
            }
        }
        ValueType::Function | ValueType::SystemFunction => match args.as_slice() {
            [value @ (Value::Function(_) | Value::SystemFunction(_))] => Ok(value.clone()),
            _ => Err(ExecutionError::new(
                place,
                "Function can be constructed only from another function value.",
            )),
        },
        ValueType::Type => match args.as_slice() {
            [value @ Value::Type(_)] => Ok(value.clone()),
            _ => Err(ExecutionError::new(
                place,
                "Type can be constructed only from another type value.",
            )),
        },
    }
}
