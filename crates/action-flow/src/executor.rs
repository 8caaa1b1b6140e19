//! Action script executor

use crate::errors::FlowError;
use crate::evaluator::{LiteralEvaluator, ScriptEvaluator};
use crate::types::{ActionScript, ExecutionOutcome, Instruction, KeyInput};
use action_primitives::{ActionPrimitives, KeyStroke};
use async_recursion::async_recursion;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Pause after every `for` iteration, throttling the UI actions each item triggers.
pub const FOR_ITERATION_PAUSE: Duration = Duration::from_secs(1);

static MISSING_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"//.*\[contains\(text\(\), "(.+)"\)\]"#).expect("label pattern is valid")
});

/// Runs action scripts against a set of browser primitives.
///
/// The executor never owns the browser: the primitives are borrowed for the
/// duration of one call. The optional output accumulator is borrowed mutably
/// and shared, not copied, with every nested `exist`/`for` sub-script, so
/// appends made anywhere in the run are visible to the caller.
pub struct ScriptExecutor {
    evaluator: Arc<dyn ScriptEvaluator>,
    iteration_pause: Duration,
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptExecutor {
    pub fn new() -> Self {
        Self::with_evaluator(Arc::new(LiteralEvaluator))
    }

    /// Use a different evaluator for scripts supplied as source text
    pub fn with_evaluator(evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self {
            evaluator,
            iteration_pause: FOR_ITERATION_PAUSE,
        }
    }

    pub fn with_iteration_pause(mut self, pause: Duration) -> Self {
        self.iteration_pause = pause;
        self
    }

    /// Execute a script.
    ///
    /// Returns [`ExecutionOutcome::Aborted`] at the first unrecognized command,
    /// wherever it is nested; nothing after it runs. Browser faults, a `text`
    /// without accumulator and `send_keys ... element` outside a `for` are
    /// returned as errors.
    pub async fn execute(
        &self,
        primitives: &dyn ActionPrimitives,
        script: &ActionScript,
        element: Option<&str>,
        text: Option<&mut Vec<String>>,
    ) -> Result<ExecutionOutcome, FlowError> {
        self.run(primitives, script, element, text, 0).await
    }

    /// Evaluate `source` into a script, then execute it.
    pub async fn execute_source(
        &self,
        primitives: &dyn ActionPrimitives,
        source: &str,
        element: Option<&str>,
        text: Option<&mut Vec<String>>,
    ) -> Result<ExecutionOutcome, FlowError> {
        let script = ActionScript::from_source(source, self.evaluator.as_ref())?;
        self.execute(primitives, &script, element, text).await
    }

    #[async_recursion]
    async fn run(
        &self,
        primitives: &dyn ActionPrimitives,
        script: &ActionScript,
        element: Option<&str>,
        mut text: Option<&mut Vec<String>>,
        depth: usize,
    ) -> Result<ExecutionOutcome, FlowError> {
        for (index, instruction) in script.iter().enumerate() {
            debug!(index, depth, command = instruction.command(), "Executing instruction");

            match instruction {
                Instruction::Clear { locator } => primitives.clear(locator).await?,
                Instruction::Click { locator } => primitives.click(locator).await?,
                Instruction::Get { url } => primitives.navigate(url).await?,
                Instruction::Refresh => primitives.refresh().await?,
                Instruction::SendKeys { locator, keys } => {
                    let stroke = match keys {
                        KeyInput::Enter => KeyStroke::Enter,
                        KeyInput::Element => match element {
                            Some(value) => KeyStroke::Text(value.to_string()),
                            None => {
                                return Err(FlowError::MissingElement {
                                    locator: locator.clone(),
                                })
                            }
                        },
                        KeyInput::Literal(value) => KeyStroke::Text(value.clone()),
                    };
                    primitives.send_keys(locator, &stroke).await?;
                }
                Instruction::Sleep { duration } => {
                    tokio::time::sleep(*duration).await;
                }
                Instruction::Text { locator } => {
                    let sink = text.as_deref_mut().ok_or_else(|| FlowError::MissingSink {
                        locator: locator.clone(),
                    })?;
                    let value = primitives.read_text(locator).await?;
                    sink.push(value);
                }
                Instruction::Exist { locator, then } => {
                    let matches = primitives.count(locator).await?;
                    if matches > 0 {
                        debug!(locator = %locator, matches, depth, "Locator present, running branch");
                        let outcome = self
                            .run(primitives, then, element, text.as_deref_mut(), depth + 1)
                            .await?;
                        if !outcome.is_success() {
                            return Ok(outcome);
                        }
                    } else if let Some(sink) = text.as_deref_mut() {
                        if let Some(label) = MISSING_LABEL.captures(locator).and_then(|c| c.get(1)) {
                            debug!(locator = %locator, "Recording missing element");
                            sink.push(format!("{} does not exist.", label.as_str()));
                        }
                    }
                }
                Instruction::For { items, body } => {
                    for (position, item) in items.iter().enumerate() {
                        debug!(position, item = %item, depth, "Running loop iteration");
                        let outcome = self
                            .run(primitives, body, Some(item), text.as_deref_mut(), depth + 1)
                            .await?;
                        if !outcome.is_success() {
                            return Ok(outcome);
                        }
                        tokio::time::sleep(self.iteration_pause).await;
                    }
                }
                Instruction::Unrecognized { command } => {
                    warn!(command = %command, index, depth, "'{}' is not a recognized command", command);
                    return Ok(ExecutionOutcome::Aborted {
                        command: command.clone(),
                    });
                }
            }
        }
        Ok(ExecutionOutcome::Completed)
    }
}

/// Execute `script` with the default executor.
pub async fn execute(
    primitives: &dyn ActionPrimitives,
    script: &ActionScript,
    element: Option<&str>,
    text: Option<&mut Vec<String>>,
) -> Result<ExecutionOutcome, FlowError> {
    ScriptExecutor::new()
        .execute(primitives, script, element, text)
        .await
}
