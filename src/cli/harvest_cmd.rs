//! `fieldwork harvest <action>` — operator actions against the forms API
//! and the local response store.

use crate::cli::output;
use crate::config::Config;
use crate::harvester::client::FormsClient;
use crate::harvester::store::ResponseStore;
use crate::harvester::{ops, HarvestError};
use anyhow::Result;
use std::time::Duration;

fn client_from(config: &Config) -> Result<FormsClient> {
    config.require_harvest()?;
    Ok(FormsClient::new(
        &config.harvest.api_base,
        &config.harvest.form_id,
        &config.harvest.token,
        config.harvest.page_size,
    ))
}

fn store_from(config: &Config) -> Result<ResponseStore> {
    let path = config
        .harvest
        .db_path
        .clone()
        .unwrap_or_else(ResponseStore::default_path);
    Ok(ResponseStore::open(&path)?)
}

/// Verify the token and form id work against the live API.
pub async fn run_test_connection(config_path: Option<&str>) -> Result<()> {
    let config = Config::load(config_path.map(std::path::Path::new))?;
    let client = client_from(&config)?;

    let total = ops::test_connection(&client).await?;
    if output::is_json() {
        output::print_json(&serde_json::json!({ "ok": true, "total_responses": total }));
    } else if !output::is_quiet() {
        println!("Connection OK. Form reports {total} responses.");
    }
    Ok(())
}

/// Fetch all responses and rebuild the local tables.
pub async fn run_fetch(config_path: Option<&str>) -> Result<()> {
    let config = Config::load(config_path.map(std::path::Path::new))?;
    let client = client_from(&config)?;
    let mut store = store_from(&config)?;

    let report = ops::fetch_latest(&client, &mut store).await?;
    if output::is_json() {
        output::print_json(&report);
    } else if !output::is_quiet() {
        println!(
            "Fetched {} responses ({} new in log).",
            report.fetched, report.appended
        );
        print_summary(&report.summary);
    }
    Ok(())
}

/// Recompute the summary from stored data.
pub async fn run_summary(config_path: Option<&str>) -> Result<()> {
    let config = Config::load(config_path.map(std::path::Path::new))?;
    let mut store = store_from(&config)?;

    let summary = ops::update_summary(&mut store)?;
    if output::is_json() {
        output::print_json(&summary);
    } else if !output::is_quiet() {
        print_summary(&summary);
    }
    Ok(())
}

/// Rebuild per-field answer reports from stored data.
pub async fn run_reports(config_path: Option<&str>) -> Result<()> {
    let config = Config::load(config_path.map(std::path::Path::new))?;
    let mut store = store_from(&config)?;

    let reports = ops::generate_reports(&mut store)?;
    if output::is_json() {
        output::print_json(&reports);
    } else if !output::is_quiet() {
        println!("{:<30} {:>9} {:>7}", "field", "answered", "blank");
        for report in &reports {
            println!(
                "{:<30} {:>9} {:>7}",
                report.field_id, report.answered, report.blank
            );
        }
    }
    Ok(())
}

/// Fetch on a fixed interval until interrupted. A failed iteration is
/// reported and the schedule keeps going; transient API trouble should
/// not kill a long-running harvest.
pub async fn run_schedule(every_minutes: u64, config_path: Option<&str>) -> Result<()> {
    if every_minutes == 0 {
        anyhow::bail!("--every must be at least 1 minute");
    }
    let config = Config::load(config_path.map(std::path::Path::new))?;
    let client = client_from(&config)?;
    let mut store = store_from(&config)?;

    if !output::is_quiet() && !output::is_json() {
        println!("Harvesting every {every_minutes} minute(s). Ctrl-C to stop.");
    }

    let mut interval = tokio::time::interval(Duration::from_secs(every_minutes * 60));
    loop {
        interval.tick().await;
        match ops::fetch_latest(&client, &mut store).await {
            Ok(report) => {
                if output::is_json() {
                    output::print_json(&report);
                } else if !output::is_quiet() {
                    println!(
                        "[{}] fetched {} responses ({} new in log)",
                        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                        report.fetched,
                        report.appended
                    );
                }
            }
            Err(HarvestError::Api { status, message }) => {
                tracing::error!(status, %message, "scheduled fetch rejected by API");
                eprintln!("  Error: forms API returned {status}: {message}");
            }
            Err(e) => {
                tracing::error!(error = %e, "scheduled fetch failed");
                eprintln!("  Error: {e}");
            }
        }
    }
}

fn print_summary(summary: &crate::harvester::store::Summary) {
    println!("Total responses: {}", summary.total);
    println!(
        "Completed: {}  Partial: {}",
        summary.completed, summary.partial
    );
    if let (Some(earliest), Some(latest)) = (summary.earliest, summary.latest) {
        println!("Earliest: {}", earliest.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Latest:   {}", latest.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}
