use log::debug;

use crate::error::KloxError;

/// Error sink shared by the scanner, parser, resolver and runtime.
///
/// Diagnostics are rendered to standard error as soon as they are recorded;
/// the flags only remember *that* something went wrong, which is what drives
/// the exit-code policy.  The REPL resets the flags between lines so the
/// session survives bad input.
#[derive(Debug, Default)]
pub struct Reporter {
    had_error: bool,
    had_runtime_error: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Reporter::default()
    }

    /// Render the diagnostic to stderr and remember its class.
    pub fn report(&mut self, error: &KloxError) {
        debug!("Reporting error: {error}");

        eprintln!("{error}");

        match error {
            KloxError::Runtime { .. } => self.had_runtime_error = true,
            _ => self.had_error = true,
        }
    }

    /// Any scan, parse or static error so far?
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Clear both flags (between REPL lines).
    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }
}
