use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser as ClapParser;
use log::info;

use klox::error::KloxError;
use klox::interpreter::Interpreter;
use klox::reporter::Reporter;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script to execute; omit to start the REPL
    script: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.script.as_slice() {
        [] => run_repl()?,

        [script] => run_file(script)?,

        _ => {
            eprintln!("Usage: klox [script]");
            process::exit(64);
        }
    }

    Ok(())
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    info!("Running file {}", path.display());

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,

        Err(e) => {
            eprintln!("klox: {}: {}", path.display(), e);
            process::exit(66);
        }
    };

    let source = match String::from_utf8(bytes) {
        Ok(source) => source,

        Err(e) => {
            eprintln!("{}", KloxError::from(e));
            process::exit(65);
        }
    };

    let mut interpreter = Interpreter::new();
    let mut reporter = Reporter::new();

    klox::run(&source, &mut interpreter, &mut reporter);

    if reporter.had_error() {
        process::exit(65);
    }

    if reporter.had_runtime_error() {
        process::exit(70);
    }

    Ok(())
}

fn run_repl() -> anyhow::Result<()> {
    println!("Klox REPL [ctrl+D to quit]");

    let mut interpreter = Interpreter::new();
    interpreter.set_repl_echo(true);

    let mut reporter = Reporter::new();

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();

        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        klox::run(&line, &mut interpreter, &mut reporter);

        // Keep the session alive after bad input.
        reporter.reset();
    }

    Ok(())
}
