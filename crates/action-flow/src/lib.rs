//! Action script interpreter
//!
//! An action script is a nested list of browser instructions (`get`, `click`,
//! `send_keys`, ...) with two control-flow commands: `exist` runs a sub-script
//! when a locator matches, `for` runs a sub-script once per item of a
//! comma-separated list. Scripts come from configuration, either as structured
//! JSON/YAML or as a literal expression handled by [`evaluator`].

pub mod errors;
pub mod evaluator;
pub mod executor;
pub mod types;

pub use errors::FlowError;
pub use evaluator::{Literal, LiteralEvaluator, ScriptEvaluator};
pub use executor::{execute, ScriptExecutor, FOR_ITERATION_PAUSE};
pub use types::{ActionScript, ExecutionOutcome, Instruction, KeyInput};
