//! Status lookup through the mcsrvstat.us HTTP API

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{FaultPolicy, Probe, ProbeOutcome};
use crate::error::{Result, WatchError};
use crate::models::{RecordKind, Target};

pub const DEFAULT_API_BASE: &str = "https://api.mcsrvstat.us/3";

// The API rejects requests without a descriptive user agent.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ApiStatus {
    online: bool,
}

pub struct ApiProbe {
    base_url: String,
    client: reqwest::Client,
}

impl ApiProbe {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WatchError::Http(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn url_for(&self, target: &Target) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), target)
    }

    async fn fetch(&self, url: &str) -> std::result::Result<bool, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("GET {} failed: {}", url, e))?;

        let status = response.status();
        debug!("GET {} -> {}", url, status);
        if !status.is_success() {
            return Err(format!("GET {} returned {}", url, status));
        }

        let body: ApiStatus = response
            .json()
            .await
            .map_err(|e| format!("unexpected response from {}: {}", url, e))?;
        Ok(body.online)
    }
}

#[async_trait]
impl Probe for ApiProbe {
    fn name(&self) -> &str {
        "api"
    }

    fn record_kind(&self) -> RecordKind {
        RecordKind::Simple
    }

    fn fault_policy(&self) -> FaultPolicy {
        FaultPolicy::Propagate
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let url = self.url_for(target);
        match self.fetch(&url).await {
            Ok(true) => ProbeOutcome::Online,
            Ok(false) => ProbeOutcome::Offline,
            Err(detail) => ProbeOutcome::Error(detail),
        }
    }
}
