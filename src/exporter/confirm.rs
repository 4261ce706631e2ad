//! Overwrite confirmation
//!
//! Interactive callers are asked; headless callers get the default they pass in.
//! The export treats a `false` answer in interactive mode as an abort.

use std::io::{BufRead, Write};
use tracing::{debug, warn};

/// Answers yes/no prompts before destructive steps
pub trait Confirmer: Send + Sync {
    /// Ask for confirmation
    ///
    /// # Arguments
    /// * `prompt_key` - Identifies the question (e.g. [`super::config::OVERWRITE_CSV`])
    /// * `interactive` - Whether a person can answer
    /// * `default_if_non_interactive` - Answer to use when nobody can
    fn confirm(
        &self,
        prompt_key: &str,
        interactive: bool,
        default_if_non_interactive: bool,
    ) -> bool;
}

/// Never prompts; always answers with a fixed value in interactive mode and
/// the caller's default otherwise.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm {
    answer: bool,
}

impl AutoConfirm {
    /// Confirmer that answers yes to interactive prompts
    pub fn yes() -> Self {
        Self { answer: true }
    }

    /// Confirmer that answers no to interactive prompts
    pub fn no() -> Self {
        Self { answer: false }
    }
}

impl Default for AutoConfirm {
    fn default() -> Self {
        Self::yes()
    }
}

impl Confirmer for AutoConfirm {
    fn confirm(
        &self,
        prompt_key: &str,
        interactive: bool,
        default_if_non_interactive: bool,
    ) -> bool {
        let answer = if interactive {
            self.answer
        } else {
            default_if_non_interactive
        };
        debug!(prompt = prompt_key, interactive, answer, "Auto-confirmed prompt");
        answer
    }
}

/// Asks on the terminal and reads a `y`/`n` answer from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl StdinConfirm {
    fn question(prompt_key: &str) -> String {
        match prompt_key {
            super::config::OVERWRITE_CSV => {
                "A CSV for this table already exists. Overwrite it? [y/N] ".to_string()
            }
            other => format!("Confirm {other}? [y/N] "),
        }
    }

    fn ask<R: BufRead, W: Write>(prompt_key: &str, input: &mut R, output: &mut W) -> bool {
        if write!(output, "{}", Self::question(prompt_key))
            .and_then(|_| output.flush())
            .is_err()
        {
            return false;
        }

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(_) => parse_answer(&line),
            Err(e) => {
                warn!(error = %e, "Failed to read confirmation answer");
                false
            }
        }
    }
}

impl Confirmer for StdinConfirm {
    fn confirm(
        &self,
        prompt_key: &str,
        interactive: bool,
        default_if_non_interactive: bool,
    ) -> bool {
        if !interactive {
            return default_if_non_interactive;
        }
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stderr();
        Self::ask(prompt_key, &mut input, &mut output)
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
