//! Prompt seam between the core and whatever drives it.
//!
//! The core never talks to a terminal. The CLI implements [`Prompter`] with
//! inquire, tests implement it with scripted answers, and [`AssumeYes`]
//! serves unattended runs.

use thiserror::Error;

/// Errors from a prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// The user declined to answer (Esc, Ctrl-C, closed input).
    #[error("prompt cancelled")]
    Cancelled,

    /// The prompt could not be shown.
    #[error("prompt failed: {0}")]
    Failed(String),
}

/// Result alias for prompt operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Synchronous user interaction on the controlling thread.
pub trait Prompter {
    /// Pick one of `options`; returns its index.
    fn select(&mut self, message: &str, options: &[String], default: usize) -> PromptResult<usize>;

    /// Free text entry, pre-filled with `initial`.
    fn input(&mut self, message: &str, initial: &str) -> PromptResult<String>;

    /// Yes/no question.
    fn confirm(&mut self, message: &str, default: bool) -> PromptResult<bool>;
}

/// Answers every prompt with its default and every confirmation with yes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn select(&mut self, _message: &str, options: &[String], default: usize) -> PromptResult<usize> {
        if default < options.len() {
            Ok(default)
        } else {
            Err(PromptError::Failed(format!(
                "default choice {default} out of range ({} options)",
                options.len()
            )))
        }
    }

    fn input(&mut self, _message: &str, initial: &str) -> PromptResult<String> {
        Ok(initial.to_string())
    }

    fn confirm(&mut self, _message: &str, _default: bool) -> PromptResult<bool> {
        Ok(true)
    }
}
