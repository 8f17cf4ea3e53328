use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use claimcompass::client::{FormController, HttpTransport, ImageFile, ViewState};

#[derive(Parser)]
#[command(name = "claimcompass")]
#[command(about = "Submit a vehicle photo for damage assessment")]
#[command(version)]
struct Cli {
    /// Base URL of the ClaimCompass API
    #[arg(long, env = "CLAIMCOMPASS_URL", default_value = "http://localhost:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a local image file or an image URL
    Analyze {
        /// Path to a vehicle photo
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// URL of a vehicle photo
        #[arg(short, long)]
        url: Option<String>,
        /// Directory to write the text report into
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
    /// Check that the API is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = HttpTransport::new(&cli.server).context("failed to build HTTP client")?;

    match cli.command {
        Commands::Health => {
            let health = transport
                .health()
                .await
                .with_context(|| format!("ClaimCompass API is not reachable at {}", cli.server))?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Analyze {
            file,
            url,
            report_dir,
        } => {
            let transport = Arc::new(transport);
            log_health(transport.clone());

            let image = file
                .map(|path| {
                    ImageFile::read(&path)
                        .with_context(|| format!("failed to read {}", path.display()))
                })
                .transpose()?;

            let mut form = FormController::new(transport);
            form.fill(image, url);

            if let Err(e) = form.submit().await {
                bail!("{}", e);
            }
            if let ViewState::Results(result) = form.view() {
                println!("Vehicle:  {}", result.vehicle);
                println!("Color:    {}", result.color);
                println!("Damage:   {}", result.damage_summary);
                println!("Estimate: {}", result.repair_cost_estimate);
            }

            if let Some(dir) = report_dir {
                let report = form.download_report()?;
                let path = report
                    .save_to(&dir)
                    .with_context(|| format!("failed to write report to {}", dir.display()))?;
                println!("Report saved to {}", path.display());
            }
        }
    }

    Ok(())
}

/// Logs API health in the background; analysis never waits on it.
fn log_health(transport: Arc<HttpTransport>) {
    tokio::spawn(async move {
        match transport.health().await {
            Ok(health) => tracing::info!(status = %health.status, service = %health.service, "API health"),
            Err(e) => tracing::warn!(error = %e, "API health check failed"),
        }
    });
}
