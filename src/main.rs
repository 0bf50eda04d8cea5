//! # siren
//!
//! Command-line entry point: resolve configuration, build the HTTP handle,
//! run one scraper or all of them, and write their CSV files to disk.
//!
//! ## Usage
//!
//! ```sh
//! siren --list
//! siren epaper.toi --start 01-01-2024 --end 31-01-2024 -o ./exports
//! RUST_LOG=siren=debug siren --max-concurrency 16
//! ```

use std::error::Error;

use chrono::Utc;
use clap::Parser;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use siren::base::ScrapeParams;
use siren::cli::Cli;
use siren::config::FileSettings;
use siren::http::{Http, ReqwestClient};
use siren::outputs::storage::FileSystem;
use siren::utils::ensure_writable_dir;
use siren::{registry, runner};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // .env first so env-backed flags can come from it
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => debug!("No .env file"),
        Err(e) => warn!(error = %e, "Could not read .env; continuing without it"),
    }

    let start_time = std::time::Instant::now();
    info!("siren starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    if args.list {
        for name in registry::names() {
            println!("{name}");
        }
        return Ok(());
    }

    let settings = match &args.config {
        Some(path) => FileSettings::load(path)?,
        None => FileSettings::default(),
    };
    let run = args.resolve(settings, Utc::now())?;
    info!(
        start = %run.window.start(),
        end = %run.window.end(),
        keywords = ?run.keywords,
        max_concurrency = ?run.http.max_concurrency,
        "Resolved run configuration"
    );

    // Early check: ensure the output dir is writable
    if let Err(e) = ensure_writable_dir(&run.out).await {
        error!(
            path = %run.out.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let client = ReqwestClient::new(&run.http)?;
    let http = Http::new(client, run.http.max_concurrency);
    let params = ScrapeParams::new(run.window, run.keywords.clone(), http);
    let storage = FileSystem::new(&run.out);

    match run.scraper.as_deref() {
        Some(name) => {
            let location = runner::run_one(name, params, &storage, &run.folder).await?;
            info!(scraper = name, %location, "Scraper finished");
        }
        None => {
            let report = runner::run_all(params, &storage, &run.folder).await;
            for (name, reason) in &report.failed {
                warn!(scraper = %name, %reason, "No file produced");
            }
            if report.uploaded.is_empty() && !report.failed.is_empty() {
                error!("Every scraper failed");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        "siren finished"
    );
    Ok(())
}
