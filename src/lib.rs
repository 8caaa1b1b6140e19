//! taskdriver library
//!
//! Exposes the configuration model and the CLI entry point for integration testing

pub mod cli;
pub mod config;

pub use config::{Config, GoogleConfig};
