use std::{fmt, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{RequestBuilder, StatusCode, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    analytics::{HourlyPattern, WeatherImpact},
    config::NetworkConfig,
    error::ClientError,
    history::RawHistoryRecord,
    request::{Document, FeatureVector, PredictionMode, SubmissionPayload},
    traits::{AnalyticsSource, PredictionService, TokenProvider},
};

/// Response from the daily, hourly and upload endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionResult {
    pub prediction: f64,
    #[serde(rename = "type")]
    pub mode: PredictionMode,
    /// Fields the service read from an uploaded document.
    #[serde(default)]
    pub extracted_data: Option<Map<String, Value>>,
}

impl PredictionResult {
    pub fn extracted_date(&self) -> Option<NaiveDate> {
        let raw = self.extracted_data.as_ref()?.get("date")?.as_str()?;
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
    }

    pub fn extracted_hour(&self) -> Option<u8> {
        let hour = self.extracted_data.as_ref()?.get("hr")?.as_u64()?;
        u8::try_from(hour).ok().filter(|h| *h <= 23)
    }
}

/// Per-user counters from `/dashboard/stats`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_predictions: u64,
    #[serde(default)]
    pub daily_predictions: u64,
    #[serde(default)]
    pub hourly_predictions: u64,
    /// Pre-formatted by the service, "--" when there is none
    #[serde(default = "no_last_prediction")]
    pub last_prediction: String,
    #[serde(default)]
    pub last_prediction_value: Option<f64>,
    #[serde(default)]
    pub last_prediction_type: Option<String>,
}

fn no_last_prediction() -> String {
    "--".to_string()
}

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    predictions: Option<Vec<RawHistoryRecord>>,
}

#[derive(Debug, Deserialize)]
struct WeatherImpactEnvelope {
    #[serde(default)]
    weather_impact: Option<Vec<WeatherImpact>>,
}

#[derive(Debug, Deserialize)]
struct HourlyPatternsEnvelope {
    #[serde(default)]
    hourly_patterns: Option<Vec<HourlyPattern>>,
}

#[derive(Debug, Deserialize)]
struct DashboardEnvelope {
    stats: DashboardStats,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// API client for the prediction and analytics service.
#[derive(Clone)]
pub struct BikecastApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Arc<dyn TokenProvider>,
}

impl fmt::Debug for BikecastApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BikecastApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BikecastApiClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(
        base_url: String,
        network_config: &NetworkConfig,
        token: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => {
                tracing::debug!("No session token, sending unauthenticated request");
                request
            }
        }
    }

    /// Send once and decode a success body.
    ///
    /// `fallback` is reported when a failed response carries no `error` field.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        tracing::debug!("{} -> {}", path, status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::UNPROCESSABLE_ENTITY {
            self.token.invalidate();
            return Err(ClientError::Unauthorized(status.as_u16()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| fallback.to_string());
            return Err(ClientError::Service {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Request a daily or hourly prediction for a prepared feature vector.
    pub async fn predict(
        &self,
        mode: PredictionMode,
        vector: &FeatureVector,
    ) -> Result<PredictionResult, ClientError> {
        let path = mode.endpoint();
        tracing::debug!("Request: POST {}", path);
        let request = self.client.post(self.url(path)).json(vector);
        self.send(request, path, "Prediction failed").await
    }

    /// Upload a document for server-side extraction and prediction.
    pub async fn upload_document(
        &self,
        mode: PredictionMode,
        document: &Document,
    ) -> Result<PredictionResult, ClientError> {
        let path = "/predictions/upload-pdf";
        tracing::debug!(
            "Request: POST {} ({}, {:.2} MB)",
            path,
            document.file_name(),
            document.size_mb()
        );

        let file = multipart::Part::bytes(document.bytes().to_vec())
            .file_name(document.file_name().to_string())
            .mime_str(Document::CONTENT_TYPE)?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("type", mode.as_str());

        let request = self.client.post(self.url(path)).multipart(form);
        self.send(request, path, "PDF processing failed").await
    }

    pub async fn fetch_history(&self) -> Result<Vec<RawHistoryRecord>, ClientError> {
        let path = "/predictions/history";
        tracing::debug!("Request: GET {}", path);
        let envelope: HistoryEnvelope = self
            .send(self.client.get(self.url(path)), path, "Failed to load history")
            .await?;
        Ok(envelope.predictions.unwrap_or_default())
    }

    pub async fn fetch_weather_impact(&self) -> Result<Vec<WeatherImpact>, ClientError> {
        let path = "/analytics/weather-impact";
        tracing::debug!("Request: GET {}", path);
        let envelope: WeatherImpactEnvelope = self
            .send(self.client.get(self.url(path)), path, "Failed to load weather impact")
            .await?;
        Ok(envelope.weather_impact.unwrap_or_default())
    }

    pub async fn fetch_hourly_patterns(&self) -> Result<Vec<HourlyPattern>, ClientError> {
        let path = "/analytics/hourly-patterns";
        tracing::debug!("Request: GET {}", path);
        let envelope: HourlyPatternsEnvelope = self
            .send(self.client.get(self.url(path)), path, "Failed to load hourly patterns")
            .await?;
        Ok(envelope.hourly_patterns.unwrap_or_default())
    }

    pub async fn fetch_dashboard_stats(&self) -> Result<DashboardStats, ClientError> {
        let path = "/dashboard/stats";
        tracing::debug!("Request: GET {}", path);
        let envelope: DashboardEnvelope = self
            .send(self.client.get(self.url(path)), path, "Failed to load statistics")
            .await?;
        Ok(envelope.stats)
    }
}

impl PredictionService for BikecastApiClient {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<PredictionResult, ClientError> {
        match payload {
            SubmissionPayload::Features { mode, vector } => self.predict(*mode, vector).await,
            SubmissionPayload::Document { mode, document } => {
                self.upload_document(*mode, document).await
            }
        }
    }
}

impl AnalyticsSource for BikecastApiClient {
    async fn fetch_history(&self) -> Result<Vec<RawHistoryRecord>, ClientError> {
        BikecastApiClient::fetch_history(self).await
    }

    async fn fetch_weather_impact(&self) -> Result<Vec<WeatherImpact>, ClientError> {
        BikecastApiClient::fetch_weather_impact(self).await
    }

    async fn fetch_hourly_patterns(&self) -> Result<Vec<HourlyPattern>, ClientError> {
        BikecastApiClient::fetch_hourly_patterns(self).await
    }
}
