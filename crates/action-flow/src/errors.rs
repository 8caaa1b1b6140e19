//! Script construction and execution error types

use action_primitives::ActionError;
use thiserror::Error;

/// Errors raised while building or running an action script
///
/// An unrecognized command is not an error: it ends execution with
/// [`crate::ExecutionOutcome::Aborted`].
#[derive(Debug, Error)]
pub enum FlowError {
    /// Script source could not be evaluated
    #[error("Script evaluation failed at offset {offset}: {message}")]
    Evaluation { offset: usize, message: String },

    /// Structured script (JSON/YAML) could not be decoded
    #[error("Script decoding failed: {0}")]
    Decode(String),

    /// Evaluated value is not a sequence of instructions
    #[error("Invalid script: {0}")]
    InvalidScript(String),

    /// A known command has missing or mistyped arguments
    #[error("Invalid instruction #{index} ({command}): {reason}")]
    InvalidInstruction {
        index: usize,
        command: String,
        reason: String,
    },

    /// `text` was executed without an output accumulator
    #[error("Cannot record text of {locator}: no output accumulator was supplied")]
    MissingSink { locator: String },

    /// `send_keys ... element` was executed outside of a `for` loop
    #[error("Cannot send the current element to {locator}: no element is bound")]
    MissingElement { locator: String },

    /// Browser primitive failed
    #[error("Action primitive error: {0}")]
    Action(#[from] ActionError),
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Decode(err.to_string())
    }
}

impl From<serde_yaml::Error> for FlowError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowError::Decode(err.to_string())
    }
}
