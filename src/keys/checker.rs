// src/keys/checker.rs

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

use crate::error::{GovernanceError, Result};

/// Outcome of one live quota check
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCheck {
    pub available: bool,
    pub credits: Option<f64>,
    pub rate_limit_remaining: Option<u64>,
    pub error: Option<String>,
}

impl KeyCheck {
    pub fn available(credits: Option<f64>, rate_limit_remaining: Option<u64>) -> Self {
        Self {
            available: true,
            credits,
            rate_limit_remaining,
            error: None,
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            credits: None,
            rate_limit_remaining: None,
            error: Some(error.into()),
        }
    }
}

/// Asks the provider whether a credential is usable.
///
/// Implementations never fail: transport errors and non-success responses
/// come back as an unavailable [`KeyCheck`] carrying the reason.
#[async_trait]
pub trait KeyHealthCheck: Send + Sync + Debug {
    async fn check(&self, secret: &SecretString) -> KeyCheck;
}

#[derive(Debug, Deserialize)]
struct KeyInfoResponse {
    data: KeyInfo,
}

#[derive(Debug, Deserialize)]
struct KeyInfo {
    #[serde(default)]
    usage: Option<f64>,
    #[serde(default)]
    limit_remaining: Option<f64>,
    #[serde(default)]
    rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Deserialize)]
struct RateLimitInfo {
    requests: u64,
}

/// Quota check against `GET {base_url}/auth/key`
#[derive(Debug, Clone)]
pub struct HttpKeyChecker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpKeyChecker {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/auth/key", base_url.trim_end_matches('/')),
        })
    }

    async fn fetch(&self, secret: &SecretString) -> Result<KeyCheck> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(secret.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(GovernanceError::from_status(status.as_u16(), body, None));
        }

        let info: KeyInfoResponse = response.json().await?;
        debug!(
            usage = info.data.usage,
            limit_remaining = info.data.limit_remaining,
            "Key info received"
        );

        Ok(KeyCheck::available(
            info.data.limit_remaining,
            info.data.rate_limit.map(|r| r.requests),
        ))
    }
}

#[async_trait]
impl KeyHealthCheck for HttpKeyChecker {
    async fn check(&self, secret: &SecretString) -> KeyCheck {
        match self.fetch(secret).await {
            Ok(check) => check,
            Err(err) => KeyCheck::unavailable(err.to_string()),
        }
    }
}
