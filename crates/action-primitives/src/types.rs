//! Core data types for action primitives

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key name dispatched for [`KeyStroke::Enter`].
pub const ENTER_KEY: &str = "Enter";

/// Input delivered to an element by `send_keys`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStroke {
    /// A single Enter key press
    Enter,

    /// Literal text typed character by character
    Text(String),
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStroke::Enter => write!(f, "<{}>", ENTER_KEY),
            KeyStroke::Text(text) => write!(f, "{:?}", text),
        }
    }
}
