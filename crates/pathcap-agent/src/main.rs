//! pathcap agent
//!
//! Single-pass job, typically run from cron or a container schedule:
//! - Estimates each spoke circuit's capacity from recent path-capacity telemetry
//! - Writes the estimate back as the circuit's download/upload bandwidth
//! - Optionally moves each site between a high-bandwidth and the default
//!   path policy stack

use clap::Parser;

use pathcap_agent::client::ControllerClient;
use pathcap_agent::config::Cli;
use pathcap_agent::{logging, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Configuration ───────────────────────────────────────────
    let config = cli.resolve()?;

    // ── Logging ─────────────────────────────────────────────────
    let _log_guard = logging::init(cli.verbose, config.log_file.as_ref())?;
    if cli.verbose {
        tracing::debug!("log level raised by --verbose");
    }
    if let Some(log_file) = &config.log_file {
        tracing::debug!(
            directory = %log_file.directory.display(),
            file = %log_file.file_name,
            "writing log file"
        );
    }

    tracing::info!(
        hours = config.lookback.num_hours(),
        percentile = config.percentile,
        ceiling_mbps = ?config.ceiling_mbps,
        path_policy = ?config.policy.as_ref().map(|p| p.name.as_str()),
        tag = ?config.site_tag,
        "pathcap-agent starting"
    );

    // ── Run ─────────────────────────────────────────────────────
    let client = ControllerClient::login(&config.api.base_url, &config.api.token).await?;
    let report = run::run(&config, &client, chrono::Utc::now()).await?;

    tracing::info!(
        sites = report.sites,
        circuits_updated = report.circuits_updated,
        circuits_opted_out = report.circuits_opted_out,
        circuits_without_metrics = report.circuits_without_metrics,
        policy_changes = report.policy_changes,
        "pathcap-agent finished"
    );
    Ok(())
}
