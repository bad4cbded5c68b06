//! One pass over the fleet.
//!
//! For every selected spoke site: estimate each circuit's capacity from its
//! telemetry, write the estimate back, collect a high-bandwidth verdict per
//! circuit, and (when a path policy is configured) move the site to the
//! stack its verdicts call for.

use chrono::{DateTime, Utc};

use pathcap_common::classifier;
use pathcap_common::estimator;
use pathcap_common::models::{PolicyDecision, PolicyStack, Site, SitePolicy};

use crate::config::{Config, PolicyConfig};
use crate::error::{LookupError, RunError};
use crate::sources::{CircuitStore, InventorySource, PolicyStore, TelemetrySource, Window};

/// Policy stack ids for the two possible site decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTargets {
    pub high_bandwidth: String,
    pub default: String,
}

impl PolicyTargets {
    pub fn id_for(&self, policy: SitePolicy) -> &str {
        match policy {
            SitePolicy::HighBandwidth => &self.high_bandwidth,
            SitePolicy::Default => &self.default,
        }
    }
}

/// Outcome counters for a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub sites: usize,
    pub circuits_updated: usize,
    pub circuits_opted_out: usize,
    pub circuits_without_metrics: usize,
    pub decisions: Vec<PolicyDecision>,
    pub policy_changes: usize,
}

/// Find the named stack and the tenant default stack.
///
/// The first stack matching each criterion wins.
pub fn resolve_policy_targets(
    stacks: &[PolicyStack],
    name: &str,
) -> Result<PolicyTargets, LookupError> {
    let high_bandwidth = stacks
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| LookupError::PolicyStack(name.to_string()))?;
    let default = stacks
        .iter()
        .find(|s| s.is_default)
        .ok_or(LookupError::DefaultPolicyStack)?;
    Ok(PolicyTargets {
        high_bandwidth: high_bandwidth.id.clone(),
        default: default.id.clone(),
    })
}

/// Spoke sites, narrowed to those carrying `tag` when one is given.
pub fn select_sites(sites: Vec<Site>, tag: Option<&str>) -> Vec<Site> {
    sites
        .into_iter()
        .filter(Site::is_spoke)
        .filter(|s| tag.is_none_or(|t| s.has_tag(t)))
        .collect()
}

/// Run one full evaluation against `backend`, with `now` as the end of the
/// telemetry window.
pub async fn run<B>(config: &Config, backend: &B, now: DateTime<Utc>) -> Result<RunReport, RunError>
where
    B: InventorySource + TelemetrySource + PolicyStore + CircuitStore,
{
    let all_sites = backend.list_sites().await?;
    if let Some(tag) = &config.site_tag {
        tracing::info!(tag = %tag, "filtering spoke sites by tag");
    }
    let sites = select_sites(all_sites, config.site_tag.as_deref());
    tracing::info!(count = sites.len(), "selected spoke sites");

    // Resolve stacks before touching anything so a bad name cannot leave a
    // partial update behind.
    let targets = match &config.policy {
        Some(policy) => {
            let stacks = backend.list_policy_stacks().await?;
            Some(resolve_policy_targets(&stacks, &policy.name)?)
        }
        None => None,
    };

    let window = Window::ending_at(now, config.lookback);
    let mut report = RunReport {
        sites: sites.len(),
        ..Default::default()
    };

    for site in &sites {
        let decision = run_site(config, backend, site, window, &mut report).await?;

        if let (Some(decision), Some(targets)) = (decision, &targets) {
            apply_decision(backend, site, &decision, targets, &mut report).await?;
            report.decisions.push(decision);
        }
    }

    Ok(report)
}

/// Size every circuit at `site`; returns the site decision when a path
/// policy is configured.
async fn run_site<B>(
    config: &Config,
    backend: &B,
    site: &Site,
    window: Window,
    report: &mut RunReport,
) -> Result<Option<PolicyDecision>, RunError>
where
    B: InventorySource + TelemetrySource + CircuitStore,
{
    tracing::info!(site = %site.name, site_id = %site.id, "retrieving WAN interfaces");
    let circuits = backend.list_circuits(&site.id).await?;
    let mut verdicts = Vec::with_capacity(circuits.len());

    for circuit in &circuits {
        if circuit.has_tag(&config.opt_out_tag) {
            tracing::info!(
                site = %site.name,
                circuit = %circuit.name,
                circuit_id = %circuit.id,
                tag = %config.opt_out_tag,
                "circuit opted out, skipping"
            );
            report.circuits_opted_out += 1;
            continue;
        }

        tracing::debug!(site = %site.name, circuit = %circuit.name, "fetching path capacity");
        let series = backend.fetch_series(&site.id, &circuit.id, window).await?;
        let estimate = estimator::estimate(
            &series.download,
            &series.upload,
            config.percentile,
            config.ceiling_mbps,
        );

        tracing::info!(
            site = %site.name,
            circuit = %circuit.name,
            hours = config.lookback.num_hours(),
            percentile = config.percentile,
            download_samples = series.download.len(),
            upload_samples = series.upload.len(),
            ingress_mbps = estimate.ingress_mbps,
            egress_mbps = estimate.egress_mbps,
            "estimated capacity"
        );

        if estimate.is_zero() {
            tracing::info!(site = %site.name, circuit = %circuit.name, "no usable metrics, skipping");
            report.circuits_without_metrics += 1;
            continue;
        }

        tracing::info!(site = %site.name, circuit = %circuit.name, %estimate, "updating bandwidth");
        backend
            .apply_circuit_bandwidth(&site.id, circuit, estimate)
            .await?;
        report.circuits_updated += 1;

        if let Some(PolicyConfig { thresholds, .. }) = &config.policy {
            let verdict = thresholds.verdict(circuit.id.clone(), &estimate);
            if verdict.meets_threshold {
                tracing::info!(
                    site = %site.name,
                    circuit = %circuit.name,
                    "circuit meets high-bandwidth requirements"
                );
            }
            verdicts.push(verdict);
        }
    }

    Ok(config
        .policy
        .as_ref()
        .map(|_| classifier::decide(site.id.clone(), &verdicts)))
}

async fn apply_decision<B: PolicyStore>(
    backend: &B,
    site: &Site,
    decision: &PolicyDecision,
    targets: &PolicyTargets,
    report: &mut RunReport,
) -> Result<(), RunError> {
    let target = targets.id_for(decision.chosen_policy);
    tracing::info!(site = %site.name, policy = %decision.chosen_policy, "site path policy decided");

    if site.network_policysetstack_id.as_deref() == Some(target) {
        tracing::info!(site = %site.name, "current path policy stack is correct");
        return Ok(());
    }

    tracing::info!(
        site = %site.name,
        from = site.network_policysetstack_id.as_deref().unwrap_or("none"),
        to = target,
        "changing path policy stack"
    );
    backend.apply_site_policy(site, target).await?;
    report.policy_changes += 1;
    Ok(())
}
