use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sizequote_core::config::DistanceConfig;
use sizequote_core::errors::ApplicationError;
use sizequote_core::pricing::composer::DistanceLookup;
use sizequote_core::session::DebugLog;
use thiserror::Error;
use tracing::debug;

const DISTANCE_POINTER: &str = "/rows/0/elements/0/distance/value";
const METRES_PER_KM: u32 = 1000;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DistanceError {
    #[error("distance api key is not configured")]
    MissingApiKey,
    #[error("distance request failed: {0}")]
    Transport(String),
    #[error("distance endpoint returned HTTP {status}")]
    UnexpectedStatus { status: u16 },
    #[error("distance response is missing `{0}`")]
    MissingField(&'static str),
    #[error("distance response is not valid JSON: {0}")]
    InvalidJson(String),
}

impl From<DistanceError> for ApplicationError {
    fn from(error: DistanceError) -> Self {
        ApplicationError::Integration(error.to_string())
    }
}

/// Google Distance Matrix client.
pub struct GoogleDistanceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl GoogleDistanceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, DistanceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| DistanceError::Transport(error.to_string()))?;

        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), api_key })
    }

    pub fn from_config(config: &DistanceConfig) -> Result<Self, DistanceError> {
        let api_key = config.api_key.clone().ok_or(DistanceError::MissingApiKey)?;
        Self::new(config.base_url.clone(), api_key, config.timeout_secs)
    }

    pub async fn lookup_km(
        &self,
        origin: &str,
        destination: &str,
        log: &mut DebugLog,
    ) -> Result<Decimal, DistanceError> {
        let mut url = Url::parse_with_params(
            &format!("{}/json", self.base_url),
            &[("origins", origin), ("destinations", destination), ("units", "metric")],
        )
        .map_err(|error| DistanceError::Transport(error.to_string()))?;
        log.record(format!("distance request: {url}&key=***"));
        url.query_pairs_mut().append_pair("key", self.api_key.expose_secret());

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| DistanceError::Transport(error.to_string()))?;
        let status = response.status();
        let body =
            response.text().await.map_err(|error| DistanceError::Transport(error.to_string()))?;
        log.record(format!("distance response: {body}"));

        if !status.is_success() {
            return Err(DistanceError::UnexpectedStatus { status: status.as_u16() });
        }

        let km = parse_distance_km(&body)?;
        debug!(
            event_name = "distance.lookup.completed",
            destination,
            km = %km,
            "distance resolved"
        );
        Ok(km)
    }
}

/// Kilometres from a Distance Matrix body.
pub fn parse_distance_km(body: &str) -> Result<Decimal, DistanceError> {
    let value: Value =
        serde_json::from_str(body).map_err(|error| DistanceError::InvalidJson(error.to_string()))?;
    let metres = value.pointer(DISTANCE_POINTER).ok_or(DistanceError::MissingField(
        "rows[0].elements[0].distance.value",
    ))?;

    let metres = metres
        .as_i64()
        .map(Decimal::from)
        .or_else(|| metres.as_f64().and_then(|metres| Decimal::try_from(metres).ok()))
        .ok_or(DistanceError::MissingField("rows[0].elements[0].distance.value"))?;

    Ok(metres / Decimal::from(METRES_PER_KM))
}

#[async_trait]
impl DistanceLookup for GoogleDistanceClient {
    async fn distance_km(
        &self,
        origin: &str,
        destination: &str,
        log: &mut DebugLog,
    ) -> Result<Decimal, ApplicationError> {
        Ok(self.lookup_km(origin, destination, log).await?)
    }
}
