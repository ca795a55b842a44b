//! Confirmation seam between the safety gate and the presentation layer.
//!
//! The [`Confirmer`] trait decouples step execution from how the question is
//! actually asked (terminal prompt, UI dialog, scripted answers in tests).

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::debug;

/// Abstraction over confirmation prompts.
pub trait Confirmer {
    /// Ask the user to approve an action. Returns `false` on refusal.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Terminal confirmer: writes the prompt to stderr and reads one line from
/// stdin. Accepts `y`/`yes` (case-insensitive); anything else refuses.
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let mut stderr = std::io::stderr().lock();
        write!(stderr, "{prompt} [y/N] ").context("write confirmation prompt")?;
        stderr.flush().context("flush confirmation prompt")?;

        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("read confirmation answer")?;
        let approved = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
        debug!(approved, "confirmation answered");
        Ok(approved)
    }
}

/// Non-interactive confirmer: approves everything. Used by `--yes` runs and
/// by tests that exercise the happy path.
pub struct AutoConfirmer;

impl Confirmer for AutoConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        debug!(prompt, "auto-approving confirmation");
        Ok(true)
    }
}
