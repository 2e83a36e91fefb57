use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, NaiveTime};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::AstroCalcConfig, AstroCalcApiError};

/// One person's birth data, fully validated by the caller. The API rejects malformed input, so
/// values here are already coerced to their strict types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSubject {
    pub name: String,
    pub birth_date: NaiveDate,
    /// Local birth time, minute precision.
    pub birth_time: NaiveTime,
    pub birth_place: String,
    pub latitude: f64,
    pub longitude: f64,
    pub utc_offset_hours: f64,
}

/// A computed chart. The interpretation payload is provider-defined; only the summary is lifted
/// out for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub chart: Value,
}

#[derive(Clone)]
pub struct AstroCalcApi {
    config: AstroCalcConfig,
    client: Arc<Client>,
}

impl AstroCalcApi {
    pub fn new(config: AstroCalcConfig) -> Result<Self, AstroCalcApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let mut val = HeaderValue::from_str(config.api_key.reveal().as_str())
            .map_err(|e| AstroCalcApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("X-Api-Key", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AstroCalcApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Computes a natal chart for one subject.
    pub async fn natal_chart(&self, subject: &ChartSubject) -> Result<ChartResult, AstroCalcApiError> {
        debug!("Requesting natal chart for birth place {}", subject.birth_place);
        self.post("/v1/charts/natal", subject).await
    }

    /// Computes a synastry (relationship) chart for two subjects.
    pub async fn synastry_chart(
        &self,
        person_a: &ChartSubject,
        person_b: &ChartSubject,
    ) -> Result<ChartResult, AstroCalcApiError> {
        debug!("Requesting synastry chart");
        let body = serde_json::json!({ "person_a": person_a, "person_b": person_b });
        self.post("/v1/charts/synastry", &body).await
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<ChartResult, AstroCalcApiError> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        trace!("Sending chart request: {url}");
        let response = self.client.post(url).json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                AstroCalcApiError::Timeout
            } else {
                AstroCalcApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("Chart request successful. {}", response.status());
            response.json::<ChartResult>().await.map_err(|e| AstroCalcApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| AstroCalcApiError::RestResponseError(e.to_string()))?;
            Err(AstroCalcApiError::QueryError { status, message })
        }
    }
}
