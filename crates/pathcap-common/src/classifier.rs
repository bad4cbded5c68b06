//! High-bandwidth policy classification.
//!
//! A circuit qualifies when both directions reach their minimums; a site
//! gets the high-bandwidth stack when any of its circuits qualifies.

use crate::models::{CapacityEstimate, CircuitVerdict, PolicyDecision, SitePolicy};

/// Minimum capacity a circuit needs in each direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_down_mbps: f64,
    pub min_up_mbps: f64,
}

impl Thresholds {
    pub fn verdict(&self, circuit_id: impl Into<String>, estimate: &CapacityEstimate) -> CircuitVerdict {
        CircuitVerdict {
            circuit_id: circuit_id.into(),
            meets_threshold: classify_circuit(estimate, self.min_down_mbps, self.min_up_mbps),
        }
    }
}

/// True iff download and upload both meet their minimums (inclusive).
pub fn classify_circuit(estimate: &CapacityEstimate, min_down_mbps: f64, min_up_mbps: f64) -> bool {
    estimate.ingress_mbps >= min_down_mbps && estimate.egress_mbps >= min_up_mbps
}

/// Any qualifying circuit selects the high-bandwidth stack; no verdicts
/// selects the default.
pub fn decide_site_policy(verdicts: impl IntoIterator<Item = bool>) -> SitePolicy {
    if verdicts.into_iter().any(|v| v) {
        SitePolicy::HighBandwidth
    } else {
        SitePolicy::Default
    }
}

/// Site-level decision from the verdicts of that site's circuits.
pub fn decide<'a>(
    site_id: impl Into<String>,
    verdicts: impl IntoIterator<Item = &'a CircuitVerdict>,
) -> PolicyDecision {
    PolicyDecision {
        site_id: site_id.into(),
        chosen_policy: decide_site_policy(verdicts.into_iter().map(|v| v.meets_threshold)),
    }
}
