use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kwpipe_storage::PgKeywordStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kwpipe-cli")]
#[command(about = "Advertising keyword collection and enrichment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect keywords for one or more ASINs.
    Collect {
        #[arg(required = true)]
        asins: Vec<String>,
        /// Keep keywords in memory instead of writing them to DATABASE_URL.
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = "reports")]
        report_dir: PathBuf,
    },
    Serve,
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kwpipe=info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Collect {
            asins,
            dry_run,
            report_dir,
        } => {
            let pipeline = kwpipe_sync::pipeline_from_env(dry_run).await?;
            let report = pipeline.run(&asins).await?;
            let dir = kwpipe_sync::write_run_report(&report_dir, &report).await?;
            println!(
                "collect complete: run_id={} keywords={} processed={} failed={} reports={}",
                report.run_id,
                report.summary.total_keywords,
                report.summary.asins_processed,
                report.summary.asins_failed,
                dir.display()
            );
        }
        Commands::Serve => kwpipe_web::serve_from_env().await?,
        Commands::Migrate => {
            let Ok(url) = std::env::var("DATABASE_URL") else {
                bail!("DATABASE_URL must be set to run migrations");
            };
            let store = PgKeywordStore::connect(&url)
                .await
                .context("connecting to DATABASE_URL")?;
            store.migrate().await.context("applying migrations")?;
            info!("migrations applied");
        }
    }

    Ok(())
}
