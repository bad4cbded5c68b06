//! Controller REST client.
//!
//! Authenticates with an API token (sent as `x-auth-token` on every
//! request), discovers the tenant from the profile endpoint, then serves the
//! four collaborator traits over tenant-scoped endpoints.

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use pathcap_common::models::{CapacityEstimate, Circuit, PolicyStack, SeriesPair, Site};
use pathcap_common::query::{self, MetricsQuery};

use crate::error::SourceError;
use crate::sources::{CircuitStore, InventorySource, PolicyStore, TelemetrySource, Window};

const AUTH_HEADER: &str = "x-auth-token";
const PROFILE_PATH: &str = "/v2.0/api/profile";

pub struct ControllerClient {
    http: reqwest::Client,
    base_url: String,
    tenant_id: String,
}

impl ControllerClient {
    /// Validate `token` against the controller and bind to its tenant.
    pub async fn login(base_url: &str, token: &str) -> Result<Self, SourceError> {
        let mut auth = HeaderValue::from_str(token)
            .map_err(|_| SourceError::Login("token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("pathcap-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::info!(url = %base_url, "logging in to controller");

        let resp = http.get(format!("{base_url}{PROFILE_PATH}")).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::Login(format!(
                "controller returned {status}; verify the token"
            )));
        }
        let profile: serde_json::Value = check(resp, "GET", PROFILE_PATH).await?.json().await?;
        let tenant_id = tenant_from_profile(&profile).ok_or_else(|| SourceError::Decode {
            path: PROFILE_PATH.into(),
            reason: "profile has no tenant_id".into(),
        })?;

        tracing::info!(tenant_id = %tenant_id, "controller login succeeded");
        Ok(Self {
            http,
            base_url,
            tenant_id,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn tenant_path(&self, version: &str, resource: &str) -> String {
        format!("/{version}/api/tenants/{}/{resource}", self.tenant_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_items<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, SourceError> {
        let resp = self.http.get(self.url(path)).send().await?;
        let body: serde_json::Value = check(resp, "GET", path).await?.json().await?;
        items_from_body(&body).map_err(|reason| SourceError::Decode {
            path: path.to_string(),
            reason,
        })
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, SourceError> {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        Ok(check(resp, "POST", path).await?.json().await?)
    }

    async fn put_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), SourceError> {
        tracing::debug!(path, "PUT");
        let resp = self.http.put(self.url(path)).json(body).send().await?;
        let resp = check(resp, "PUT", path).await?;
        tracing::debug!(path, status = resp.status().as_u16(), "PUT accepted");
        Ok(())
    }
}

/// Turn a non-success response into [`SourceError::Status`].
async fn check(
    resp: reqwest::Response,
    method: &'static str,
    path: &str,
) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SourceError::Status {
        method,
        path: path.to_string(),
        status: status.as_u16(),
        body,
    })
}

fn tenant_from_profile(profile: &serde_json::Value) -> Option<String> {
    profile
        .get("tenant_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Decode a `{"items": [...]}` collection; a missing or null `items` is an
/// empty collection.
fn items_from_body<T: DeserializeOwned>(body: &serde_json::Value) -> Result<Vec<T>, String> {
    match body.get("items") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(items) => serde_json::from_value(items.clone()).map_err(|e| e.to_string()),
    }
}

impl InventorySource for ControllerClient {
    async fn list_sites(&self) -> Result<Vec<Site>, SourceError> {
        let sites: Vec<Site> = self.get_items(&self.tenant_path("v4.7", "sites")).await?;
        tracing::info!(count = sites.len(), "retrieved sites");
        Ok(sites)
    }

    async fn list_circuits(&self, site_id: &str) -> Result<Vec<Circuit>, SourceError> {
        let path = self.tenant_path("v2.7", &format!("sites/{site_id}/waninterfaces"));
        let circuits: Vec<Circuit> = self.get_items(&path).await?;
        tracing::info!(site_id, count = circuits.len(), "retrieved WAN interfaces");
        Ok(circuits)
    }
}

impl TelemetrySource for ControllerClient {
    async fn fetch_series(
        &self,
        site_id: &str,
        circuit_id: &str,
        window: Window,
    ) -> Result<SeriesPair, SourceError> {
        let body = MetricsQuery::path_capacity(site_id, circuit_id, window.end, window.lookback);
        let path = self.tenant_path("v2.3", "monitor/metrics");
        let resp = self.post_json(&path, &body).await?;
        Ok(query::parse_series_pair(&resp))
    }
}

impl PolicyStore for ControllerClient {
    async fn list_policy_stacks(&self) -> Result<Vec<PolicyStack>, SourceError> {
        let stacks: Vec<PolicyStack> = self
            .get_items(&self.tenant_path("v2.0", "networkpolicysetstacks"))
            .await?;
        tracing::info!(count = stacks.len(), "retrieved path policy stacks");
        Ok(stacks)
    }

    async fn apply_site_policy(&self, site: &Site, policy_id: &str) -> Result<(), SourceError> {
        let mut updated = site.clone();
        updated.network_policysetstack_id = Some(policy_id.to_string());
        let path = self.tenant_path("v4.7", &format!("sites/{}", site.id));
        self.put_json(&path, &updated).await
    }
}

impl CircuitStore for ControllerClient {
    async fn apply_circuit_bandwidth(
        &self,
        site_id: &str,
        circuit: &Circuit,
        estimate: CapacityEstimate,
    ) -> Result<(), SourceError> {
        let mut updated = circuit.clone();
        updated.link_bw_down = Some(estimate.ingress_mbps);
        updated.link_bw_up = Some(estimate.egress_mbps);
        let path = self.tenant_path(
            "v2.7",
            &format!("sites/{site_id}/waninterfaces/{}", circuit.id),
        );
        self.put_json(&path, &updated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn items_envelope_decodes() {
        let body = json!({"count": 1, "items": [
            {"id": "p1", "name": "Default", "default_policysetstack": true}
        ]});
        let stacks: Vec<PolicyStack> = items_from_body(&body).unwrap();
        assert_eq!(stacks.len(), 1);
        assert!(stacks[0].is_default);
    }

    #[test]
    fn missing_items_is_empty() {
        let none: Vec<Site> = items_from_body(&json!({})).unwrap();
        assert!(none.is_empty());
        let null: Vec<Site> = items_from_body(&json!({"items": null})).unwrap();
        assert!(null.is_empty());
    }

    #[test]
    fn malformed_items_is_an_error() {
        let err = items_from_body::<Site>(&json!({"items": [{"name": "no id"}]}));
        assert!(err.is_err());
    }

    #[test]
    fn tenant_extracted_from_profile() {
        assert_eq!(
            tenant_from_profile(&json!({"tenant_id": "1234", "email": "a@b"})).as_deref(),
            Some("1234")
        );
        assert!(tenant_from_profile(&json!({"tenant_id": ""})).is_none());
        assert!(tenant_from_profile(&json!({})).is_none());
    }
}
