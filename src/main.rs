use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use icici_extract::config::Config;
use icici_extract::credentials::Credentials;
use icici_extract::orchestrator::Orchestrator;
use icici_extract::portal::{BrowserSession, CdpPortal};

#[derive(Parser)]
#[command(name = "icici-extract", about = "Download and consolidate brokerage reports")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "icici-extract.toml")]
    config: PathBuf,
}

fn init_logging() -> WorkerGuard {
    let file = tracing_appender::rolling::never(".", "icici_extract.log");
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off",
            )
        }))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _guard = init_logging();

    let config = Config::load_or_default(&cli.config)?;
    let credentials = Credentials::from_env()?;
    let orchestrator = Orchestrator::new(config, credentials);

    let (session, page) = BrowserSession::launch().await?;
    let portal = CdpPortal::new(page);
    let outcome = orchestrator.run(&portal).await;
    session.shutdown().await;

    let consolidated = outcome?;
    if consolidated.is_empty() {
        println!("Run complete; consolidation disabled or no reports produced.");
    } else {
        println!("Consolidated reports:");
        for path in consolidated {
            println!("  {}", path.display());
        }
    }
    Ok(())
}
