//! Data models for pathcap.
//!
//! Telemetry and estimate types are produced locally. Inventory types
//! (`Site`, `Circuit`, `PolicyStack`) mirror the controller's JSON objects and
//! keep any fields pathcap does not interpret, so an object read from the
//! controller can be written back without losing data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Telemetry ───────────────────────────────────────────────────────

/// One path-capacity measurement for one direction of one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Chronologically ordered samples for a single direction.
///
/// Samples with a negative or non-finite value are never stored, whether the
/// series is built in code or deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct DirectionSeries {
    samples: Vec<Sample>,
}

impl DirectionSeries {
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        samples.into_iter().collect()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Sample values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl FromIterator<Sample> for DirectionSeries {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter
                .into_iter()
                .filter(|s| s.value.is_finite() && s.value >= 0.0)
                .collect(),
        }
    }
}

impl From<Vec<Sample>> for DirectionSeries {
    fn from(samples: Vec<Sample>) -> Self {
        samples.into_iter().collect()
    }
}

impl From<DirectionSeries> for Vec<Sample> {
    fn from(series: DirectionSeries) -> Self {
        series.samples
    }
}

/// Download and upload series for one circuit over one lookback window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesPair {
    pub download: DirectionSeries,
    pub upload: DirectionSeries,
}

// ── Estimates & decisions ───────────────────────────────────────────

/// Estimated circuit capacity in Mbps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityEstimate {
    pub ingress_mbps: f64,
    pub egress_mbps: f64,
}

impl CapacityEstimate {
    pub const ZERO: CapacityEstimate = CapacityEstimate {
        ingress_mbps: 0.0,
        egress_mbps: 0.0,
    };

    /// True when neither direction produced a usable value.
    pub fn is_zero(&self) -> bool {
        self.ingress_mbps == 0.0 && self.egress_mbps == 0.0
    }

    /// Lower each component to `ceiling_mbps` if it exceeds it.
    pub fn clamped(self, ceiling_mbps: Option<f64>) -> Self {
        match ceiling_mbps {
            Some(c) => Self {
                ingress_mbps: if self.ingress_mbps > c { c } else { self.ingress_mbps },
                egress_mbps: if self.egress_mbps > c { c } else { self.egress_mbps },
            },
            None => self,
        }
    }
}

impl std::fmt::Display for CapacityEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Mbps down / {}Mbps up",
            self.ingress_mbps, self.egress_mbps
        )
    }
}

/// Whether one circuit meets the high-bandwidth thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitVerdict {
    pub circuit_id: String,
    pub meets_threshold: bool,
}

/// Which of the two configured policy stacks a site should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SitePolicy {
    HighBandwidth,
    Default,
}

impl std::fmt::Display for SitePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SitePolicy::HighBandwidth => write!(f, "high_bandwidth"),
            SitePolicy::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub site_id: String,
    pub chosen_policy: SitePolicy,
}

// ── Inventory ───────────────────────────────────────────────────────

/// Role value the controller reports for branch sites.
pub const SPOKE_ROLE: &str = "SPOKE";

/// A site as returned by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_cluster_role: Option<String>,
    /// The controller reports `null` for untagged sites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policysetstack_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Site {
    pub fn is_spoke(&self) -> bool {
        self.element_cluster_role.as_deref() == Some(SPOKE_ROLE)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        contains_tag(self.tags.as_deref(), tag)
    }
}

/// A WAN interface (circuit) attached to a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_bw_down: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_bw_up: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Circuit {
    pub fn has_tag(&self, tag: &str) -> bool {
        contains_tag(self.tags.as_deref(), tag)
    }
}

/// A network path policy stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStack {
    pub id: String,
    pub name: String,
    #[serde(rename = "default_policysetstack", default)]
    pub is_default: bool,
}

/// Case-insensitive tag membership.
fn contains_tag(tags: Option<&[String]>, tag: &str) -> bool {
    let wanted = tag.to_lowercase();
    tags.unwrap_or_default()
        .iter()
        .any(|t| t.to_lowercase() == wanted)
}
