mod app;
mod calendar;
mod commands;
mod context;
mod dispatch;
mod env;
mod mail;
mod run;
mod runtime;

pub use app::run;
pub use context::CliContext;
pub use env::CliArgs;
pub use run::load_script;
pub use runtime::{load_config, LoadedConfig};
