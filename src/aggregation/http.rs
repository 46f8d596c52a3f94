//! REST adapter for a remote aggregation backend.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST traces`, `GET traces?<filters>`
//! - `GET stats/traces`, `GET stats/endpoints?limit=`, `GET stats/hourly?hours=`
//! - `GET alerts?resolved=false`, `POST alerts/{id}/resolve`

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::aggregation::port::{AggregationError, AggregationPort};
use crate::aggregation::types::{Alert, EndpointStat, HourlyStat, TraceQuery, TraceStats};
use crate::trace::RequestTrace;

pub struct HttpAggregator {
    client: Client,
    base: Url,
}

impl HttpAggregator {
    /// Ingest calls carry no timeout; a slow backend only delays its own task.
    pub fn new(base_url: &str) -> Result<Self, AggregationError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, AggregationError> {
        Ok(self.base.join(path)?)
    }

    async fn send(request: RequestBuilder) -> Result<Response, AggregationError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AggregationError::Backend {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AggregationError> {
        Ok(Self::send(request).await?.json().await?)
    }
}

#[async_trait]
impl AggregationPort for HttpAggregator {
    async fn ingest(&self, trace: &RequestTrace) -> Result<(), AggregationError> {
        let url = self.endpoint("traces")?;
        Self::send(self.client.post(url).json(trace)).await?;
        Ok(())
    }

    async fn list_unresolved_alerts(&self) -> Result<Vec<Alert>, AggregationError> {
        let url = self.endpoint("alerts")?;
        self.get_json(self.client.get(url).query(&[("resolved", "false")]))
            .await
    }

    async fn resolve_alert(&self, id: i64) -> Result<(), AggregationError> {
        let url = self.endpoint(&format!("alerts/{id}/resolve"))?;
        Self::send(self.client.post(url)).await?;
        Ok(())
    }

    async fn endpoint_stats(&self, limit: u32) -> Result<Vec<EndpointStat>, AggregationError> {
        let url = self.endpoint("stats/endpoints")?;
        self.get_json(self.client.get(url).query(&[("limit", limit)]))
            .await
    }

    async fn hourly_stats(&self, hours: u32) -> Result<Vec<HourlyStat>, AggregationError> {
        let url = self.endpoint("stats/hourly")?;
        self.get_json(self.client.get(url).query(&[("hours", hours)]))
            .await
    }

    async fn trace_stats(&self) -> Result<TraceStats, AggregationError> {
        let url = self.endpoint("stats/traces")?;
        self.get_json(self.client.get(url)).await
    }

    async fn query_traces(&self, query: &TraceQuery) -> Result<Vec<RequestTrace>, AggregationError> {
        let url = self.endpoint("traces")?;
        self.get_json(self.client.get(url).query(query)).await
    }
}
