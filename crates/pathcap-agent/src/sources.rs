//! Collaborator interfaces the run loop drives.
//!
//! [`crate::client::ControllerClient`] implements all four against the
//! controller REST API; tests implement them in memory.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use pathcap_common::models::{CapacityEstimate, Circuit, PolicyStack, SeriesPair, Site};

use crate::error::SourceError;

/// Telemetry time range: `[end - lookback, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub end: DateTime<Utc>,
    pub lookback: Duration,
}

impl Window {
    pub fn ending_at(end: DateTime<Utc>, lookback: Duration) -> Self {
        Self { end, lookback }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.end - self.lookback
    }
}

/// Path-capacity telemetry per circuit.
///
/// "No data" is an empty series, never an error.
pub trait TelemetrySource {
    fn fetch_series(
        &self,
        site_id: &str,
        circuit_id: &str,
        window: Window,
    ) -> impl Future<Output = Result<SeriesPair, SourceError>> + Send;
}

pub trait InventorySource {
    fn list_sites(&self) -> impl Future<Output = Result<Vec<Site>, SourceError>> + Send;

    fn list_circuits(
        &self,
        site_id: &str,
    ) -> impl Future<Output = Result<Vec<Circuit>, SourceError>> + Send;
}

pub trait PolicyStore {
    fn list_policy_stacks(
        &self,
    ) -> impl Future<Output = Result<Vec<PolicyStack>, SourceError>> + Send;

    /// Point `site` at the policy stack `policy_id`.
    fn apply_site_policy(
        &self,
        site: &Site,
        policy_id: &str,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;
}

pub trait CircuitStore {
    /// Record `estimate` as the circuit's download/upload bandwidth.
    fn apply_circuit_bandwidth(
        &self,
        site_id: &str,
        circuit: &Circuit,
        estimate: CapacityEstimate,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;
}
