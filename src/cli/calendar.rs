use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use google_services::event_headline;
use serde_json::Value;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct CalendarArgs {
    #[command(subcommand)]
    pub action: CalendarAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum CalendarAction {
    /// Create a calendar, or reuse an existing id, and print the id
    Create {
        /// Calendar title
        #[arg(long)]
        summary: String,
        /// IANA time zone, e.g. Europe/Berlin
        #[arg(long)]
        timezone: String,
        /// Existing calendar id; nothing is created when set
        #[arg(long)]
        calendar_id: Option<String>,
    },
    /// Insert an event read from a JSON file
    Insert {
        #[arg(long)]
        calendar_id: String,
        /// Event resource in Calendar API JSON form
        #[arg(long, value_name = "FILE.json")]
        event: PathBuf,
    },
}

pub async fn cmd_calendar(args: CalendarArgs, ctx: &CliContext) -> Result<ExitCode> {
    let google = ctx.google().await?;

    match args.action {
        CalendarAction::Create {
            summary,
            timezone,
            calendar_id,
        } => {
            let (_, id) = google
                .create_or_get_calendar(ctx.token_path(), calendar_id.as_deref(), &summary, &timezone)
                .await
                .context("Calendar request failed")?;
            println!("{id}");
        }
        CalendarAction::Insert { calendar_id, event } => {
            let raw = tokio::fs::read_to_string(&event)
                .await
                .with_context(|| format!("Failed to read event {}", event.display()))?;
            let body: Value = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid event JSON in {}", event.display()))?;

            let (calendar, id) = google
                .create_or_get_calendar(ctx.token_path(), Some(&calendar_id), "", "")
                .await
                .context("Calendar request failed")?;
            let created = google
                .insert_event(&calendar, &id, &body)
                .await
                .context("Event insert failed")?;

            let (start, summary) = event_headline(&created);
            println!("{start} {summary}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
