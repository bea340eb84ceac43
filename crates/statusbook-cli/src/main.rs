//! Statusbook CLI - Main entry point

use clap::Parser;
use statusbook_cli::commands::{load, worker};
use statusbook_cli::menu::{InquirePrompter, Menu};
use statusbook_cli::{Cli, Commands, Context};
use statusbook_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use statusbook_ingest::shard::ShardKind;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Handle markdown help generation
    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    // Logs go to stderr so worker reports on stdout stay machine-readable
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("statusbook")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env_overrides().unwrap_or(log_config);

    // Initialize logging (ignore errors as CLI should work without logging)
    let log_guard = init_logging(&log_config).unwrap_or_default();

    let success = match execute_command(cli).await {
        Ok(success) => success,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            false
        }
    };

    // Flush file logs; process::exit skips destructors
    drop(log_guard);
    if !success {
        process::exit(1);
    }
}

/// Execute the CLI command; `Ok(false)` exits with status 1 without an error message
async fn execute_command(cli: Cli) -> statusbook_cli::Result<bool> {
    let ctx = Context::open(cli.database)?;

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => {
            Menu::new(&ctx, InquirePrompter).run().await?;
            Ok(true)
        }

        Commands::LoadUsers(args) => {
            load::run(&ctx, ShardKind::Users, &args).await?;
            Ok(true)
        }

        Commands::LoadStatuses(args) => {
            load::run(&ctx, ShardKind::Statuses, &args).await?;
            Ok(true)
        }

        Commands::ShardWorker { kind, max_workers } => {
            let report = worker::run(&ctx, kind.into(), max_workers).await?;
            Ok(report.is_success())
        }
    }
}
