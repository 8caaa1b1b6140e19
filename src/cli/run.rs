use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use action_flow::{ActionScript, ExecutionOutcome, ScriptExecutor};
use action_primitives::DefaultActionPrimitives;
use anyhow::{Context, Result};
use cdp_adapter::ChromeSession;
use clap::Args;
use tracing::{info, warn};

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Script file to execute (.json, .yaml/.yml, or a literal list)
    pub script: PathBuf,

    /// Value typed by `send_keys <locator> element` outside a for loop
    #[arg(short, long)]
    pub element: Option<String>,

    /// Run without a text accumulator; any `text` instruction then fails
    #[arg(long)]
    pub no_capture: bool,

    /// Override the configured headless mode
    #[arg(long, value_name = "BOOL")]
    pub headless: Option<bool>,
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Script file to parse
    pub script: PathBuf,
}

/// Read a script, choosing the decoder from the file extension.
pub async fn load_script(path: &Path) -> Result<ActionScript> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read script {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let script = match extension.as_deref() {
        Some("json") => ActionScript::from_json_str(&source),
        Some("yaml") | Some("yml") => ActionScript::from_yaml_str(&source),
        _ => ActionScript::parse(&source),
    }
    .with_context(|| format!("Invalid script {}", path.display()))?;

    Ok(script)
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<ExitCode> {
    let script = load_script(&args.script).await?;
    let unknown = script.unrecognized_commands();
    if !unknown.is_empty() {
        warn!(commands = ?unknown, "Script contains unknown commands; execution stops at the first");
    }

    let mut browser = ctx.config().browser.clone();
    if let Some(headless) = args.headless {
        browser.headless = headless;
    }

    info!(
        config = %ctx.config_path().display(),
        headless = browser.headless,
        script = %args.script.display(),
        "Launching browser"
    );
    let session = Arc::new(
        ChromeSession::launch(browser)
            .await
            .context("Failed to launch browser")?,
    );
    let primitives = DefaultActionPrimitives::new(Arc::clone(&session));

    let mut captured = Vec::new();
    let sink = if args.no_capture {
        None
    } else {
        Some(&mut captured)
    };
    let result = ScriptExecutor::new()
        .execute(&primitives, &script, args.element.as_deref(), sink)
        .await;

    drop(primitives);
    match Arc::try_unwrap(session) {
        Ok(session) => {
            if let Err(err) = session.close().await {
                warn!(error = %err, "Failed to close browser");
            }
        }
        Err(_) => warn!("Browser session still referenced; leaving it to drop"),
    }

    for line in &captured {
        println!("{line}");
    }

    match result.context("Script execution failed")? {
        ExecutionOutcome::Completed => {
            info!(captured = captured.len(), "Script completed");
            Ok(ExitCode::SUCCESS)
        }
        ExecutionOutcome::Aborted { command } => {
            eprintln!("Aborted: unknown command {command:?}");
            Ok(ExitCode::FAILURE)
        }
    }
}

pub async fn cmd_check(args: CheckArgs) -> Result<ExitCode> {
    let script = load_script(&args.script).await?;
    println!("{script}");

    let unknown = script.unrecognized_commands();
    if unknown.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        for command in unknown {
            eprintln!("unknown command: {command}");
        }
        Ok(ExitCode::FAILURE)
    }
}
