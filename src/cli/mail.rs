use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct MailArgs {
    #[command(subcommand)]
    pub action: MailAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum MailAction {
    /// Send a plain-text email
    Send {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        content: String,
    },
    /// Print the first capture group of REGEX in recent mail from a sender
    Extract {
        #[arg(long)]
        from: String,
        #[arg(long, value_name = "REGEX")]
        regex: String,
    },
}

pub async fn cmd_mail(args: MailArgs, ctx: &CliContext) -> Result<ExitCode> {
    let google = ctx.google().await?;

    match args.action {
        MailAction::Send {
            subject,
            from,
            to,
            content,
        } => {
            google
                .send_email(ctx.token_path(), &subject, &from, &to, &content)
                .await
                .context("Sending email failed")?;
            Ok(ExitCode::SUCCESS)
        }
        MailAction::Extract { from, regex } => {
            let found = google
                .extract_string_from_inbox(ctx.token_path(), &from, &regex)
                .await
                .context("Inbox extraction failed")?;
            match found {
                Some(value) => {
                    println!("{value}");
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    info!(from = %from, "No message matched");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
