pub mod ast;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod reporter;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use log::debug;

use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::reporter::Reporter;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

/// Run one chunk of source through the full pipeline: scan, parse, resolve,
/// execute.  Diagnostics land in the reporter; execution is skipped as soon
/// as any scan, parse or static error has been recorded.
pub fn run(source: &str, interpreter: &mut Interpreter, reporter: &mut Reporter) {
    let mut tokens: Vec<Token> = Vec::new();

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => reporter.report(&e),
        }
    }

    debug!("Scanned {} token(s)", tokens.len());

    let mut parser = Parser::new(tokens, reporter);
    let statements = parser.parse();

    if reporter.had_error() {
        return;
    }

    Resolver::new(interpreter, reporter).resolve(&statements);

    if reporter.had_error() {
        return;
    }

    if let Err(e) = interpreter.interpret(&statements) {
        reporter.report(&e);
    }
}
