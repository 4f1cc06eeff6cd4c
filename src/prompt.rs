//! Interactive prompt provider.
//!
//! Core code never talks to the terminal; it asks a [`Prompter`] to pick from
//! a set of options or to confirm a question.
use anyhow::{Context as _, Result};
use dialoguer::{Confirm, Select};
use std::io::IsTerminal as _;

/// Source of answers for interactive questions.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter: Send + Sync {
    /// Ask the user to pick one of `options`; returns the chosen option.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be shown or was cancelled.
    fn ask_choice(&self, prompt: &str, options: &[String]) -> Result<String>;

    /// Ask a yes/no question.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be shown.
    fn ask_yes_no(&self, prompt: &str, default: bool) -> Result<bool>;
}

/// Terminal prompter backed by `dialoguer`.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask_choice(&self, prompt: &str, options: &[String]) -> Result<String> {
        let index = Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact_opt()
            .context("failed to read selection")?
            .context("selection cancelled")?;
        options
            .get(index)
            .cloned()
            .context("selection out of range")
    }

    fn ask_yes_no(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("failed to read confirmation")
    }
}

/// Non-interactive prompter.
///
/// Choices resolve to the first option. Confirmations resolve to `yes` when
/// `assume_yes` is set and to the question's default otherwise.
#[derive(Debug, Default)]
pub struct AutoPrompter {
    /// Answer `yes` to every confirmation.
    pub assume_yes: bool,
}

impl Prompter for AutoPrompter {
    fn ask_choice(&self, _prompt: &str, options: &[String]) -> Result<String> {
        options.first().cloned().context("no options to choose from")
    }

    fn ask_yes_no(&self, _prompt: &str, default: bool) -> Result<bool> {
        Ok(self.assume_yes || default)
    }
}

/// Pick the prompter for this run: automatic with `--yes` or without a
/// terminal on stdin, interactive otherwise.
#[must_use]
pub fn select_prompter(assume_yes: bool) -> Box<dyn Prompter> {
    if assume_yes || !std::io::stdin().is_terminal() {
        Box::new(AutoPrompter { assume_yes })
    } else {
        Box::new(TerminalPrompter)
    }
}

/// Whether answers come from a person rather than defaults.
#[must_use]
pub fn is_interactive(assume_yes: bool) -> bool {
    !assume_yes && std::io::stdin().is_terminal()
}
