use clap::Subcommand;

use super::calendar::CalendarArgs;
use super::mail::MailArgs;
use super::run::{CheckArgs, RunArgs};

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Execute an action script in a fresh browser session
    Run(RunArgs),

    /// Parse an action script and print it without launching a browser
    Check(CheckArgs),

    /// Create calendars and insert events
    Calendar(CalendarArgs),

    /// Send mail or extract a value from recent messages
    Mail(MailArgs),
}
