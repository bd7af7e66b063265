//! Minnow is an embeddable interpreter for a small, dynamically typed
//! scripting language with C-like syntax.
//!
//! A host hands a source string to an [`Interpreter`] and gets back a
//! final value or a typed error; everything a script prints accumulates
//! in the interpreter's output buffer.
//!
//! ```
//! use minnow_lang::Interpreter;
//!
//! let mut interpreter = Interpreter::new();
//! interpreter.execute("print(2 + 3 * 4);").unwrap();
//! assert_eq!(interpreter.output(), "14\n");
//! ```

pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;

pub use error::Error;
pub use interpreter::{Interpreter, Value};
