//! # Minnow
//!
//! Command line runner for Minnow scripts: reads a file, executes it, and
//! prints whatever the script printed.

use std::fs;

use clap::{Parser, ValueEnum};
use log::{error, info};

use minnow_lang::{lexer::Lexer, parser, Interpreter, Value};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// The script file to run.
    file: std::path::PathBuf,

    /// Specify the log level of the interpreter.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,

    /// Log the parsed syntax tree before running.
    #[arg(long)]
    dump_ast: bool,
}

/// Enum for specifying the log level of the runner.
#[derive(ValueEnum, Clone, Default, Debug)]
enum LogLevel {
    /// Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    #[value(alias("1"))]
    Warn,

    /// Also log information about what is being executed.
    #[value(alias("2"))]
    Info,

    #[value(alias("3"))]
    Debug,

    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn main() {
    let args = Cli::parse();

    simple_logger::init_with_level((&args.verbosity).into()).expect("logger init");

    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(err) => {
            error!("Could not read file '{}': {}", args.file.to_string_lossy(), err);
            std::process::exit(-1);
        }
    };

    if args.dump_ast {
        match Lexer::new(&source).lex().and_then(parser::parse) {
            Ok(script) => info!("Parsed AST:\n{script:#?}"),
            Err(err) => {
                error!("{}", minnow_lang::Error::Parsing(err).pretty(&source));
                std::process::exit(-1);
            }
        }
    }

    let mut interpreter = Interpreter::new();
    match interpreter.execute(&source) {
        Ok(value) => {
            print!("{}", interpreter.output());
            if !matches!(value, Value::Null) {
                info!("Script returned: {value:?}");
            }
        }
        Err(err) => {
            print!("{}", interpreter.output());
            error!("{}", err.pretty(&source));
            std::process::exit(-1);
        }
    }
}
