//! HTTP client for the daemon's API.

pub mod types;

use crate::error::Result;
use crate::monitor::AlarmConfig;
use types::{AlarmState, FlowPatchRequest, MeterState, ThresholdState};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7786";

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0{}", self.base_url, path)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(self
            .http
            .get(self.url(path))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn get_meter(&self) -> Result<MeterState> {
        self.get("/meter").await
    }

    pub async fn get_alarms(&self) -> Result<Vec<AlarmState>> {
        self.get("/alarms").await
    }

    pub async fn get_active_alarms(&self) -> Result<Vec<AlarmState>> {
        self.get("/alarms/active").await
    }

    pub async fn get_thresholds(&self) -> Result<Vec<ThresholdState>> {
        self.get("/thresholds").await
    }

    pub async fn get_config(&self) -> Result<AlarmConfig> {
        self.get("/config").await
    }

    pub async fn put_config(&self, config: &AlarmConfig) -> Result<AlarmConfig> {
        Ok(self
            .http
            .put(self.url("/config"))
            .json(config)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn patch_flow(&self, request: &FlowPatchRequest) -> Result<MeterState> {
        Ok(self
            .http
            .patch(self.url("/flow"))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}
