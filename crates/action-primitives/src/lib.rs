//! Browser capability set for the action interpreter
//!
//! The interpreter only ever needs seven operations from a browser:
//! navigate, refresh, count matches, click, clear, send keys and read text.
//! [`ActionPrimitives`] captures that surface so the interpreter can be driven
//! by a real Chromium session ([`DefaultActionPrimitives`]) or by a test double.

pub mod errors;
mod primitives;
pub mod types;

pub use errors::*;
pub use primitives::*;
pub use types::*;
