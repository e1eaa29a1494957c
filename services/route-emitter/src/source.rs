//! Desired/actual state source.
//!
//! The route-emitter reads full listings for periodic syncs and tails the
//! store's event feed between them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cellroute_models::{ActualLrpRoutingInfo, DesiredLrpSchedulingInfo, DomainSet, EventPage};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;

use crate::config::Config;

/// Read access to the desired/actual state store.
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Scheduling info of every desired LRP.
    async fn desired_scheduling_infos(&self) -> Result<Vec<DesiredLrpSchedulingInfo>>;

    /// Every actual LRP, evacuating copies included.
    async fn actual_lrps(&self) -> Result<Vec<ActualLrpRoutingInfo>>;

    /// Domains whose desired state is complete and current.
    async fn domains(&self) -> Result<DomainSet>;

    /// Events after `after_event_id`, at most `limit` of them.
    async fn events(&self, after_event_id: i64, limit: i64) -> Result<EventPage>;
}

/// [`StateSource`] backed by the store's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpStateSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStateSource {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let raw = token.trim();
            let bearer = if raw.starts_with("Bearer ") || raw.starts_with("bearer ") {
                raw.to_string()
            } else {
                format!("Bearer {raw}")
            };

            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&bearer).context("Invalid state store token format")?,
            );
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("cellroute-route-emitter/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.state_url, config.state_token.as_deref())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, i64)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "GET {} failed (status={}): {}",
                path,
                status,
                body
            ));
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("Invalid JSON from {path}"))
    }
}

#[async_trait]
impl StateSource for HttpStateSource {
    async fn desired_scheduling_infos(&self) -> Result<Vec<DesiredLrpSchedulingInfo>> {
        self.get_json("/v1/desired_lrp_scheduling_infos", &[]).await
    }

    async fn actual_lrps(&self) -> Result<Vec<ActualLrpRoutingInfo>> {
        self.get_json("/v1/actual_lrps", &[]).await
    }

    async fn domains(&self) -> Result<DomainSet> {
        self.get_json("/v1/domains", &[]).await
    }

    async fn events(&self, after_event_id: i64, limit: i64) -> Result<EventPage> {
        self.get_json(
            "/v1/events",
            &[("after_event_id", after_event_id), ("limit", limit)],
        )
        .await
    }
}
