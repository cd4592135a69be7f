//! Readiness probe for the extraction service.
//!
//! The service takes a while to load its models after the container starts,
//! so the batch waits until both `/api/version` and `/api/isalive` answer
//! correctly in the same attempt. Failures of either call (including network
//! errors) only fail the attempt; exhaustion is reported as `false`, never as
//! a panic or an error.

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::pipeline::submit::Endpoint;
use crate::retry::{poll_until, RetryPolicy};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// What one successful probe learned about the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub version: String,
}

/// Why a probe attempt failed. Both checks run every attempt, so there may
/// be two problems.
#[derive(Debug, Clone, Error)]
#[error("{}", .problems.join("; "))]
pub struct ProbeFailure {
    pub problems: Vec<String>,
}

/// Result of a single probe attempt.
pub type ProbeOutcome = Result<ServiceInfo, ProbeFailure>;

/// Polls the version and liveness endpoints with a bounded retry budget.
#[derive(Debug, Clone)]
pub struct HealthProber {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    expected_version: Option<String>,
}

impl HealthProber {
    pub fn new(
        base_url: impl Into<String>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| HarvestError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            policy,
            expected_version: None,
        })
    }

    pub fn from_config(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let mut prober = Self::new(
            config.base_url(),
            config.probe_policy(),
            Duration::from_secs(config.probe_timeout_secs),
        )?;
        prober.expected_version = config.expected_version.clone();
        Ok(prober)
    }

    /// Require `/api/version` to report exactly this version.
    pub fn with_expected_version(mut self, version: impl Into<String>) -> Self {
        self.expected_version = Some(version.into());
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Poll until ready or the retry budget is exhausted.
    pub async fn wait_until_ready(&self) -> bool {
        self.wait().await.is_some()
    }

    /// Like [`HealthProber::wait_until_ready`] but returns what the last
    /// successful probe saw.
    pub async fn wait(&self) -> Option<ServiceInfo> {
        info!(
            "Waiting for extraction service at {} (up to {} attempts)",
            self.base_url, self.policy.max_attempts
        );
        match poll_until(&self.policy, |attempt| async move {
            info!("Probe attempt {}/{}", attempt, self.policy.max_attempts.max(1));
            self.probe_once().await
        })
        .await
        {
            Ok(ready) => {
                info!(
                    "Extraction service ready (version {}) after {} attempt(s)",
                    ready.value.version, ready.attempts
                );
                Some(ready.value)
            }
            Err(exhausted) => {
                warn!(
                    "Extraction service not ready after {} attempts: {}",
                    exhausted.attempts, exhausted.last_error
                );
                None
            }
        }
    }

    /// One attempt: both checks, both must pass.
    pub async fn probe_once(&self) -> ProbeOutcome {
        let version = self.check_version().await;
        let alive = self.check_alive().await;
        match (version, alive) {
            (Ok(version), Ok(())) => Ok(ServiceInfo { version }),
            (version, alive) => {
                let problems = [version.err(), alive.err()].into_iter().flatten().collect();
                Err(ProbeFailure { problems })
            }
        }
    }

    async fn get_text(&self, endpoint: Endpoint) -> Result<String, String> {
        let response = self
            .client
            .get(endpoint.url(&self.base_url))
            .send()
            .await
            .map_err(|e| format!("{endpoint} unreachable: {e}"))?;
        let status = response.status();
        if status.as_u16() != 200 {
            return Err(format!("{endpoint} returned HTTP {}", status.as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| format!("{endpoint} body unreadable: {e}"))?;
        Ok(body.trim().to_string())
    }

    async fn check_version(&self) -> Result<String, String> {
        let version = self.get_text(Endpoint::Version).await?;
        info!("Service version: {}", version);
        match &self.expected_version {
            Some(expected) if expected.trim() != version => Err(format!(
                "expected service version '{}', got '{}'",
                expected.trim(),
                version
            )),
            _ => Ok(version),
        }
    }

    async fn check_alive(&self) -> Result<(), String> {
        let body = self.get_text(Endpoint::IsAlive).await?;
        if body.eq_ignore_ascii_case("true") {
            Ok(())
        } else {
            Err(format!("{} answered '{}'", Endpoint::IsAlive, body))
        }
    }
}
