use super::calendar::cmd_calendar;
use super::env::CliArgs;
use super::mail::cmd_mail;
use super::run::{cmd_check, cmd_run};
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;
use std::process::ExitCode;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<ExitCode> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::Check(args) => cmd_check(args).await,
        Commands::Calendar(args) => cmd_calendar(args, ctx).await,
        Commands::Mail(args) => cmd_mail(args, ctx).await,
    }
}
