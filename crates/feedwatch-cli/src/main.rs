use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "feedwatch")]
#[command(about = "Poll an article feed and store new articles in Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll forever, one cycle per interval, until interrupted.
    Run,
    /// Run a single cycle and print its summary.
    Once {
        /// Keep extracted articles in memory instead of writing to Postgres.
        #[arg(long)]
        dry_run: bool,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "could not listen for ctrl-c");
                    return;
                }
                info!("interrupt received; stopping after the current cycle");
                signal_token.cancel();
            });

            let report = feedwatch_sync::run_forever_from_env(shutdown).await?;
            println!(
                "stopped: cycles={} failed={}",
                report.cycles_started, report.cycles_failed
            );
        }
        Commands::Once { dry_run, json } => {
            let summary = feedwatch_sync::run_once_from_env(dry_run).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "cycle complete: cycle_id={} feed_ok={} discovered={} inserted={} already_present={} duplicates={} failed={}",
                    summary.cycle_id,
                    summary.feed_ok,
                    summary.discovered,
                    summary.inserted,
                    summary.already_present,
                    summary.duplicates,
                    summary.failed
                );
            }
        }
    }

    Ok(())
}
