//! Core types for action scripts

use std::fmt;
use std::time::Duration;

use crate::errors::FlowError;
use crate::evaluator::{Literal, LiteralEvaluator, ScriptEvaluator};

/// Delimiter between the items of a `for` list
pub const FOR_ITEM_DELIMITER: &str = ", ";

/// Keys delivered by `send_keys`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// Enter key press (`"enter"`)
    Enter,

    /// The substitution value bound by the enclosing `for` (`"element"`)
    Element,

    /// Any other modifier, typed as-is
    Literal(String),
}

impl KeyInput {
    pub fn from_modifier(modifier: &str) -> Self {
        match modifier {
            "enter" => KeyInput::Enter,
            "element" => KeyInput::Element,
            other => KeyInput::Literal(other.to_string()),
        }
    }

    fn modifier(&self) -> &str {
        match self {
            KeyInput::Enter => "enter",
            KeyInput::Element => "element",
            KeyInput::Literal(text) => text,
        }
    }
}

/// A single script instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Clear { locator: String },
    Click { locator: String },
    Get { url: String },
    Refresh,
    SendKeys { locator: String, keys: KeyInput },
    Sleep { duration: Duration },
    Text { locator: String },

    /// Run `then` when `locator` matches at least one element
    Exist { locator: String, then: ActionScript },

    /// Run `body` once per item, with the item bound as the substitution value
    For { items: Vec<String>, body: ActionScript },

    /// Command name outside the known set; aborts the run when reached
    Unrecognized { command: String },
}

impl Instruction {
    /// Command name as written in scripts
    pub fn command(&self) -> &str {
        match self {
            Instruction::Clear { .. } => "clear",
            Instruction::Click { .. } => "click",
            Instruction::Get { .. } => "get",
            Instruction::Refresh => "refresh",
            Instruction::SendKeys { .. } => "send_keys",
            Instruction::Sleep { .. } => "sleep",
            Instruction::Text { .. } => "text",
            Instruction::Exist { .. } => "exist",
            Instruction::For { .. } => "for",
            Instruction::Unrecognized { command } => command,
        }
    }

    fn from_raw(
        index: usize,
        raw: Vec<Literal>,
        evaluator: &dyn ScriptEvaluator,
    ) -> Result<Self, FlowError> {
        let mut args = raw.into_iter();
        let command = match args.next() {
            Some(Literal::Str(command)) => command,
            Some(other) => {
                return Err(FlowError::InvalidScript(format!(
                    "instruction #{index}: command name must be a string, found {}",
                    other.kind()
                )))
            }
            None => {
                return Err(FlowError::InvalidScript(format!(
                    "instruction #{index} is empty"
                )))
            }
        };
        // Anything past the second argument is ignored.
        let argument = args.next();
        let additional = args.next();

        let invalid = |reason: String| FlowError::InvalidInstruction {
            index,
            command: command.clone(),
            reason,
        };
        let string_arg = |value: Option<Literal>, name: &str| match value {
            Some(Literal::Str(text)) => Ok(text),
            Some(other) => Err(invalid(format!("{name} must be a string, found {}", other.kind()))),
            None => Err(invalid(format!("missing {name}"))),
        };

        let instruction = match command.as_str() {
            "clear" => Instruction::Clear {
                locator: string_arg(argument, "locator")?,
            },
            "click" => Instruction::Click {
                locator: string_arg(argument, "locator")?,
            },
            "get" => Instruction::Get {
                url: string_arg(argument, "url")?,
            },
            "refresh" => Instruction::Refresh,
            "send_keys" => Instruction::SendKeys {
                locator: string_arg(argument, "locator")?,
                keys: KeyInput::from_modifier(&string_arg(additional, "modifier")?),
            },
            "sleep" => {
                let seconds = match argument {
                    Some(Literal::Number(value)) => value,
                    Some(Literal::Str(raw)) => raw
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| invalid(format!("seconds {raw:?} is not a number")))?,
                    Some(other) => {
                        return Err(invalid(format!(
                            "seconds must be a number, found {}",
                            other.kind()
                        )))
                    }
                    None => return Err(invalid("missing seconds".to_string())),
                };
                let duration = Duration::try_from_secs_f64(seconds)
                    .map_err(|_| invalid(format!("seconds {seconds} is out of range")))?;
                Instruction::Sleep { duration }
            }
            "text" => Instruction::Text {
                locator: string_arg(argument, "locator")?,
            },
            "exist" => {
                let locator = string_arg(argument, "locator")?;
                let then = nested_script(additional, evaluator).map_err(&invalid)?;
                Instruction::Exist { locator, then }
            }
            "for" => {
                let list = string_arg(argument, "item list")?;
                let body = nested_script(additional, evaluator).map_err(&invalid)?;
                Instruction::For {
                    items: list.split(FOR_ITEM_DELIMITER).map(str::to_string).collect(),
                    body,
                }
            }
            _ => Instruction::Unrecognized {
                command: command.clone(),
            },
        };
        Ok(instruction)
    }
}

fn nested_script(
    value: Option<Literal>,
    evaluator: &dyn ScriptEvaluator,
) -> Result<ActionScript, String> {
    match value {
        Some(literal @ (Literal::List(_) | Literal::Str(_))) => {
            ActionScript::from_literal(literal, evaluator).map_err(|err| format!("sub-script: {err}"))
        }
        Some(other) => Err(format!("sub-script must be a sequence, found {}", other.kind())),
        None => Err("missing sub-script".to_string()),
    }
}

/// Ordered sequence of instructions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionScript {
    instructions: Vec<Instruction>,
}

impl ActionScript {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Unknown command names anywhere in the script, nested scripts included.
    pub fn unrecognized_commands(&self) -> Vec<&str> {
        let mut found = Vec::new();
        for instruction in &self.instructions {
            match instruction {
                Instruction::Unrecognized { command } => found.push(command.as_str()),
                Instruction::Exist { then: nested, .. } | Instruction::For { body: nested, .. } => {
                    found.extend(nested.unrecognized_commands())
                }
                _ => {}
            }
        }
        found
    }

    /// Parse a literal expression with the default evaluator.
    pub fn parse(source: &str) -> Result<Self, FlowError> {
        Self::from_source(source, &LiteralEvaluator)
    }

    pub fn from_source(source: &str, evaluator: &dyn ScriptEvaluator) -> Result<Self, FlowError> {
        let literal = evaluator.evaluate(source)?;
        Self::from_literal(literal, evaluator)
    }

    /// Build a script from an evaluated value.
    ///
    /// Strings, at the top level or in sub-script position, are evaluated
    /// again with `evaluator`.
    pub fn from_literal(literal: Literal, evaluator: &dyn ScriptEvaluator) -> Result<Self, FlowError> {
        let items = match literal {
            Literal::List(items) => items,
            Literal::Str(source) => return Self::from_source(&source, evaluator),
            other => {
                return Err(FlowError::InvalidScript(format!(
                    "expected a sequence of instructions, found {}",
                    other.kind()
                )))
            }
        };

        let instructions = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Literal::List(raw) => Instruction::from_raw(index, raw, evaluator),
                other => Err(FlowError::InvalidScript(format!(
                    "instruction #{index} must be a sequence, found {}",
                    other.kind()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { instructions })
    }

    pub fn from_json_str(source: &str) -> Result<Self, FlowError> {
        let literal: Literal = serde_json::from_str(source)?;
        Self::from_literal(literal, &LiteralEvaluator)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, FlowError> {
        let literal: Literal = serde_yaml::from_str(source)?;
        Self::from_literal(literal, &LiteralEvaluator)
    }
}

impl<'a> IntoIterator for &'a ActionScript {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<Vec<Instruction>> for ActionScript {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

/// Writes the script back in literal expression form.
impl fmt::Display for ActionScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (position, instruction) in self.instructions.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{instruction}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        write_quoted(f, self.command())?;
        match self {
            Instruction::Clear { locator }
            | Instruction::Click { locator }
            | Instruction::Text { locator } => {
                f.write_str(", ")?;
                write_quoted(f, locator)?
            }
            Instruction::Get { url } => {
                f.write_str(", ")?;
                write_quoted(f, url)?
            }
            Instruction::Refresh | Instruction::Unrecognized { .. } => f.write_str(",")?,
            Instruction::SendKeys { locator, keys } => {
                f.write_str(", ")?;
                write_quoted(f, locator)?;
                f.write_str(", ")?;
                write_quoted(f, keys.modifier())?
            }
            Instruction::Sleep { duration } => write!(f, ", {}", duration.as_secs_f64())?,
            Instruction::Exist { locator, then } => {
                f.write_str(", ")?;
                write_quoted(f, locator)?;
                write!(f, ", {then}")?
            }
            Instruction::For { items, body } => {
                f.write_str(", ")?;
                write_quoted(f, &items.join(FOR_ITEM_DELIMITER))?;
                write!(f, ", {body}")?
            }
        }
        f.write_str(")")
    }
}

/// Double-quoted string using only the escapes [`LiteralEvaluator`] reads back.
fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\0' => f.write_str("\\0")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("\"")
}

/// Result of running a script to the end or to its first unknown command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    Aborted { command: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed)
    }
}
