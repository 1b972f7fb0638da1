use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use taskboard_sync::{
    cli::{self, RootCommand},
    logging::init_logging,
    settings::Settings,
    sync::{HttpTransport, SyncClient},
};

#[derive(Parser, Debug)]
#[command(
    name = "taskboard-sync",
    about = "Command-line client for the task board's optimistic sync protocol",
    version = env!("TASKBOARD_SYNC_BUILD_VERSION"),
    author
)]
struct Cli {
    /// Backend base URL; overrides `server_url` from settings.toml.
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: RootCommand,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Held until main returns so queued log records are flushed on exit.
    let _log_guard = match init_logging() {
        Ok((_, guard)) => Some(guard),
        Err(err) => {
            eprintln!("warning: failed to initialize logging: {err:#}");
            None
        }
    };

    let cli = Cli::parse();
    let settings = Settings::load().with_server_override(cli.server.as_deref());
    let client = build_client(&settings)?;

    let code = cli::run(
        &client,
        &settings.server_url,
        cli.command,
        cli.json,
        cli.quiet,
    )
    .await;
    Ok(exit_code(code))
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn build_client(settings: &Settings) -> Result<SyncClient> {
    let transport = HttpTransport::new(&settings.server_url, settings.request_timeout())
        .with_context(|| format!("failed to set up client for {}", settings.server_url))?;
    Ok(SyncClient::new(transport))
}
