use crate::error::ExecutionError;
use crate::lexer::PlaceInCode;

use super::value::{ArrayRef, ObjectRef, StringRef, Value};

/// A transient reference to a mutable location. Produced only while an
/// assignment or increment is being evaluated; never stored in a value.
#[derive(Debug, Clone)]
pub enum LValue {
    /// A member of an object (or a variable — scopes are objects).
    /// Writing may create the key; writing null removes it.
    ObjectMember { object: ObjectRef, key: String },
    /// An element of an array. Must be in bounds for reads and writes.
    ArrayElement { array: ArrayRef, index: usize },
    /// A single character of a string. Writable only with a
    /// one-character string.
    StringCharacter { string: StringRef, index: usize },
}

type LValueResult<T> = Result<T, ExecutionError>;

impl LValue {
    /// Reads a copy of the referenced value. A string character reads as a
    /// fresh one-character string.
    pub fn read(&self, place: PlaceInCode) -> LValueResult<Value> {
        match self {
            LValue::ObjectMember { object, key } => object
                .borrow()
                .get(key)
                .ok_or_else(|| ExecutionError::new(place, "Object member doesn't exist.")),
            LValue::ArrayElement { array, index } => array
                .borrow()
                .items
                .get(*index)
                .cloned()
                .ok_or_else(|| ExecutionError::new(place, "Index out of bounds.")),
            LValue::StringCharacter { string, index } => {
                let string = string.borrow();
                let byte = *string
                    .as_bytes()
                    .get(*index)
                    .ok_or_else(|| ExecutionError::new(place, "Index out of bounds."))?;
                Ok(Value::string((byte as char).to_string()))
            }
        }
    }

    /// Reads a payload-sharing copy for in-place updates (`+=`, `++`, and
    /// the base of an indexing l-value). String characters are not
    /// updatable in place.
    pub(crate) fn read_in_place(&self, place: PlaceInCode) -> LValueResult<Value> {
        match self {
            LValue::ObjectMember { object, key } => object
                .borrow()
                .get_shared(key)
                .ok_or_else(|| ExecutionError::new(place, "Object member doesn't exist.")),
            LValue::ArrayElement { array, index } => array
                .borrow()
                .items
                .get(*index)
                .map(Value::share)
                .ok_or_else(|| ExecutionError::new(place, "Index out of bounds.")),
            LValue::StringCharacter { .. } => {
                Err(ExecutionError::new(place, "Invalid l-value."))
            }
        }
    }

    /// Plain `=` assignment. Assigning null to an object member removes
    /// the key; array writes must be in bounds; string characters accept
    /// exactly one-character strings and keep the length invariant.
    pub fn assign(&self, value: Value, place: PlaceInCode) -> LValueResult<()> {
        match self {
            LValue::ObjectMember { object, key } => {
                if let Value::Null = value {
                    object.borrow_mut().remove(key);
                } else {
                    object.borrow_mut().set(key.clone(), value);
                }
                Ok(())
            }
            LValue::ArrayElement { .. } => self.store(value, place),
            LValue::StringCharacter { string, index } => {
                let Value::String(replacement) = value else {
                    return Err(ExecutionError::new(place, "Expected string."));
                };
                let byte = {
                    let replacement = replacement.borrow();
                    if replacement.len() != 1 {
                        return Err(ExecutionError::new(
                            place,
                            "Expected single character string.",
                        ));
                    }
                    replacement.as_bytes()[0]
                };
                let mut bytes = string.borrow().clone().into_bytes();
                let slot = bytes
                    .get_mut(*index)
                    .ok_or_else(|| ExecutionError::new(place, "Index out of bounds."))?;
                *slot = byte;
                let updated = String::from_utf8(bytes)
                    .map_err(|_| ExecutionError::new(place, "Invalid index."))?;
                *string.borrow_mut() = updated;
                Ok(())
            }
        }
    }

    /// Writes back a computed value without the null-removal rule. Used by
    /// compound assignments and increments, which require the location to
    /// exist already.
    pub(crate) fn store(&self, value: Value, place: PlaceInCode) -> LValueResult<()> {
        match self {
            LValue::ObjectMember { object, key } => {
                object.borrow_mut().set(key.clone(), value);
                Ok(())
            }
            LValue::ArrayElement { array, index } => {
                let mut array = array.borrow_mut();
                let slot = array
                    .items
                    .get_mut(*index)
                    .ok_or_else(|| ExecutionError::new(place, "Index out of bounds."))?;
                *slot = value;
                Ok(())
            }
            LValue::StringCharacter { .. } => {
                Err(ExecutionError::new(place, "Invalid l-value."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use super::super::value::Object;

    fn place() -> PlaceInCode {
        PlaceInCode::start()
    }

    #[test]
    fn test_assigning_null_removes_the_member() {
        let object = Rc::new(RefCell::new(Object::new()));
        object.borrow_mut().set("a", Value::Number(1.0));

        let lvalue = LValue::ObjectMember {
            object: Rc::clone(&object),
            key: "a".into(),
        };
        lvalue.assign(Value::Null, place()).expect("should assign");

        assert!(!object.borrow().has_key("a"));
    }

    #[test]
    fn test_string_character_write_keeps_length() {
        let string = Rc::new(RefCell::new("abc".to_string()));
        let lvalue = LValue::StringCharacter {
            string: Rc::clone(&string),
            index: 1,
        };

        lvalue
            .assign(Value::string("X"), place())
            .expect("should assign");
        assert_eq!(*string.borrow(), "aXc");

        assert!(lvalue.assign(Value::string("no"), place()).is_err());
        assert!(lvalue.assign(Value::Number(1.0), place()).is_err());
    }

    #[test]
    fn test_string_character_out_of_bounds() {
        let string = Rc::new(RefCell::new("ab".to_string()));
        let lvalue = LValue::StringCharacter {
            string,
            index: 2,
        };

        assert!(lvalue.assign(Value::string("X"), place()).is_err());
        assert!(lvalue.read(place()).is_err());
    }

    #[test]
    fn test_missing_member_fails_reads() {
        let object = Rc::new(RefCell::new(Object::new()));
        let lvalue = LValue::ObjectMember {
            object,
            key: "missing".into(),
        };

        assert!(lvalue.read(place()).is_err());
        assert!(lvalue.read_in_place(place()).is_err());
    }
}
