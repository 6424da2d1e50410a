//! Terminal prompts backed by inquire.

use std::io::IsTerminal;

use inquire::validator::Validation;
use inquire::{Confirm, InquireError, Select, Text};
use relkit_core::prompt::{PromptError, PromptResult, Prompter};
use relkit_core::SemVer;

/// [`Prompter`] that asks on the terminal.
///
/// The only free-text question relkit asks is a custom version, so text
/// answers are validated as versions and re-asked until they parse.
#[derive(Debug, Default)]
pub struct InquirePrompter;

impl InquirePrompter {
    /// A terminal prompter.
    pub const fn new() -> Self {
        Self
    }
}

impl Prompter for InquirePrompter {
    fn select(&mut self, message: &str, options: &[String], default: usize) -> PromptResult<usize> {
        ensure_terminal()?;
        Select::new(message, options.to_vec())
            .with_starting_cursor(default)
            .raw_prompt()
            .map(|choice| choice.index)
            .map_err(into_prompt_error)
    }

    fn input(&mut self, message: &str, initial: &str) -> PromptResult<String> {
        ensure_terminal()?;
        Text::new(message)
            .with_initial_value(initial)
            .with_help_message("MAJOR.MINOR.PATCH with an optional -PRERELEASE")
            .with_validator(|text: &str| {
                Ok(match text.trim().parse::<SemVer>() {
                    Ok(_) => Validation::Valid,
                    Err(err) => Validation::Invalid(err.to_string().into()),
                })
            })
            .prompt()
            .map(|text| text.trim().to_string())
            .map_err(into_prompt_error)
    }

    fn confirm(&mut self, message: &str, default: bool) -> PromptResult<bool> {
        ensure_terminal()?;
        Confirm::new(message)
            .with_default(default)
            .prompt()
            .map_err(into_prompt_error)
    }
}

// Don't prompt if running non-interactively
fn ensure_terminal() -> PromptResult<()> {
    if std::io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(into_prompt_error(InquireError::NotTTY))
    }
}

fn into_prompt_error(err: InquireError) -> PromptError {
    match err {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => PromptError::Cancelled,
        InquireError::NotTTY => {
            PromptError::Failed("not an interactive terminal (pass --yes to accept defaults)".into())
        }
        other => PromptError::Failed(other.to_string()),
    }
}
