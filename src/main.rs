//! liftsense - Main Entry Point
//!
//! Runs the weight lifting study, or one of its inspection commands.

use clap::Parser;
use liftsense::cli::{cmd_info, cmd_run, cmd_select, Cli, Commands, SourceArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liftsense=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { source, quiz, output, no_plots }) => {
            cmd_run(&source, quiz.as_deref(), output.as_deref(), no_plots).await?;
        }
        Some(Commands::Select { source }) => {
            cmd_select(&source).await?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data).await?;
        }
        None => {
            cmd_run(&SourceArgs::default(), None, None, false).await?;
        }
    }

    Ok(())
}
