mod canonical;
mod decoder;
mod error;
mod input;
mod pipeline;
mod settings;
mod sink;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "wiki_splitter",
    about = "Split a MediaWiki XML dump into one text file per article"
)]
struct Cli {
    /// Input dump (.xml, .xml.bz2, or - for stdin)
    #[arg(short, long = "infile")]
    infile: PathBuf,
    /// Output directory (created if missing)
    #[arg(short, long = "outdir")]
    outdir: PathBuf,
    /// Max concurrent file writes (env: WIKISPLIT_MAX_IN_FLIGHT)
    #[arg(long)]
    max_in_flight: Option<usize>,
    /// Sub-directory of outdir for the files; empty writes into outdir itself
    /// (env: WIKISPLIT_SPLIT_DIR)
    #[arg(long)]
    split_dir: Option<String>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?.with_overrides(cli.max_in_flight, cli.split_dir)?;
    info!(?settings, "Starting dump splitter");

    let reader = input::open_input(&cli.infile)?;

    let target = settings.target_dir(&cli.outdir);
    std::fs::create_dir_all(&target)
        .with_context(|| format!("Error creating out directory: {}", target.display()))?;
    info!("Writing articles to {}", target.display());

    let report = pipeline::split(reader, &target, &settings).await?;
    info!(
        scanned = report.scanned,
        written = report.written,
        failed = report.failures.len(),
        redirects = report.aliases_skipped,
        "Split complete"
    );
    println!("{}", report);

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    if !report.failures.is_empty() {
        anyhow::bail!("{} articles could not be written", report.failures.len());
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
