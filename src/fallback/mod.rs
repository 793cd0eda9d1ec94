//! Sequential retrieval fallback chain.
//!
//! Some upstreams sit behind bot protection that rejects plain server-side
//! fetches. For those, retrieval walks an ordered list of
//! [`RetrievalStrategy`] values until one yields a payload the caller
//! accepts. The chain is strictly sequential: trying strategy N+1 only
//! makes sense once strategy N has conclusively failed, and every relay
//! attempt consumes visible quota on the relay side.
//!
//! The generic [`first_success`] driver is shared with the HTML-extraction
//! chain in [`crate::extract`]; both are the same "ordered strategies,
//! first success wins, trace the failures" pattern.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::SourceError;
use crate::models::{HeaderProfile, ProviderAttempt};

/// Failure of a single strategy attempt, before it is recorded as a
/// [`ProviderAttempt`] row.
#[derive(Debug)]
pub struct AttemptFailure {
    pub http_status: Option<u16>,
    pub message: String,
}

impl AttemptFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            http_status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            http_status: Some(status),
            message: message.into(),
        }
    }
}

/// Generic first-success driver over an ordered strategy list.
///
/// `attempt(i)` runs strategy `i`; the first `Ok` short-circuits. All
/// failures are collected as [`ProviderAttempt`] rows and returned inside
/// [`SourceError::AllStrategiesFailed`] when the list exhausts.
pub async fn first_success<T, F, Fut>(
    target: &str,
    names: &[String],
    mut attempt: F,
) -> Result<T, SourceError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let mut attempts = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        match attempt(index).await {
            Ok(value) => {
                debug!(strategy = %name, target, "strategy succeeded");
                return Ok(value);
            }
            Err(failure) => {
                warn!(
                    strategy = %name,
                    target,
                    status = ?failure.http_status,
                    error = %failure.message,
                    "strategy failed"
                );
                attempts.push(ProviderAttempt {
                    strategy: name.clone(),
                    target_url: target.to_string(),
                    http_status: failure.http_status,
                    error: Some(failure.message),
                    at: Utc::now(),
                });
            }
        }
    }
    Err(SourceError::AllStrategiesFailed {
        target: target.to_string(),
        attempts,
    })
}

/// Hook for a delegated fetch (e.g. a headless browser sidecar) supplied by
/// the caller. The chain itself never spawns a browser.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, profile: &HeaderProfile) -> Result<String, SourceError>;
}

/// How a relay wraps the upstream body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnvelope {
    /// Body is passed through untouched.
    Raw,
    /// Body is a JSON object with the real payload under `contents`.
    JsonContents,
}

impl RelayEnvelope {
    pub fn parse(value: &str) -> Self {
        match value {
            "json-contents" => RelayEnvelope::JsonContents,
            _ => RelayEnvelope::Raw,
        }
    }
}

/// One way of getting a body out of a hostile origin.
#[derive(Clone)]
pub enum RetrievalStrategy {
    /// Plain fetch with spoofed browser headers.
    Direct { profile: HeaderProfile },
    /// Third-party CORS relay with its own URL shape and envelope.
    Relay {
        name: String,
        endpoint: String,
        envelope: RelayEnvelope,
        profile: HeaderProfile,
    },
    /// Caller-supplied fetcher (headless browser or similar).
    Delegate { fetcher: Arc<dyn PageFetcher> },
}

impl RetrievalStrategy {
    pub fn label(&self) -> String {
        match self {
            RetrievalStrategy::Direct { .. } => "direct".to_string(),
            RetrievalStrategy::Relay { name, .. } => format!("relay:{name}"),
            RetrievalStrategy::Delegate { .. } => "delegate".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RelayContents {
    contents: Option<String>,
}

/// Drives [`RetrievalStrategy`] lists against live targets.
pub struct FallbackChain {
    client: reqwest::Client,
    attempt_timeout: Duration,
}

impl FallbackChain {
    pub fn new(client: reqwest::Client, attempt_timeout: Duration) -> Self {
        Self {
            client,
            attempt_timeout,
        }
    }

    /// Resolve `target` through `strategies`, stopping at the first 2xx
    /// response whose body passes `validate`.
    pub async fn resolve(
        &self,
        target: &str,
        strategies: &[RetrievalStrategy],
        validate: &(dyn Fn(&str) -> bool + Sync),
    ) -> Result<String, SourceError> {
        let names: Vec<String> = strategies.iter().map(|s| s.label()).collect();
        first_success(target, &names, |index| {
            self.attempt(&strategies[index], target, validate)
        })
        .await
    }

    async fn attempt(
        &self,
        strategy: &RetrievalStrategy,
        target: &str,
        validate: &(dyn Fn(&str) -> bool + Sync),
    ) -> Result<String, AttemptFailure> {
        let body = match strategy {
            RetrievalStrategy::Direct { profile } => {
                self.fetch_text(target, profile, RelayEnvelope::Raw).await?
            }
            RetrievalStrategy::Relay {
                endpoint,
                envelope,
                profile,
                ..
            } => {
                let wrapped = endpoint.replace("{url}", &urlencoding::encode(target));
                self.fetch_text(&wrapped, profile, *envelope).await?
            }
            RetrievalStrategy::Delegate { fetcher } => fetcher
                .fetch(target, &HeaderProfile::default())
                .await
                .map_err(|e| AttemptFailure::new(e.to_string()))?,
        };

        if validate(&body) {
            Ok(body)
        } else {
            Err(AttemptFailure::new("body failed validation"))
        }
    }

    async fn fetch_text(
        &self,
        url: &str,
        profile: &HeaderProfile,
        envelope: RelayEnvelope,
    ) -> Result<String, AttemptFailure> {
        let request = self.client.get(url).headers(profile.to_header_map());
        let response = tokio::time::timeout(self.attempt_timeout, request.send())
            .await
            .map_err(|_| {
                AttemptFailure::new(format!(
                    "timeout after {}s",
                    self.attempt_timeout.as_secs()
                ))
            })?
            .map_err(|e| AttemptFailure::new(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::http(status.as_u16(), "non-success status"));
        }

        let text = tokio::time::timeout(self.attempt_timeout, response.text())
            .await
            .map_err(|_| AttemptFailure::new("timeout reading body"))?
            .map_err(|e| AttemptFailure::new(e.to_string()))?;

        match envelope {
            RelayEnvelope::Raw => Ok(text),
            RelayEnvelope::JsonContents => serde_json::from_str::<RelayContents>(&text)
                .ok()
                .and_then(|wrapper| wrapper.contents)
                .ok_or_else(|| AttemptFailure::new("relay envelope missing contents")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn driver_stops_at_first_success() {
        let calls = AtomicUsize::new(0);
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();

        let result = first_success("https://target", &names, |index| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if index >= 2 {
                Ok(format!("payload-{index}"))
            } else {
                Err(AttemptFailure::http(500, "boom"))
            })
        })
        .await;

        assert_eq!(result.unwrap(), "payload-2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn driver_reports_full_trace_on_exhaustion() {
        let names: Vec<String> = ["direct", "relay:allorigins"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result: Result<String, _> = first_success("https://target", &names, |index| {
            std::future::ready(Err(AttemptFailure::http(403 + index as u16, "blocked")))
        })
        .await;

        match result {
            Err(SourceError::AllStrategiesFailed { target, attempts }) => {
                assert_eq!(target, "https://target");
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].strategy, "direct");
                assert_eq!(attempts[0].http_status, Some(403));
                assert_eq!(attempts[1].strategy, "relay:allorigins");
                assert_eq!(attempts[1].http_status, Some(404));
            }
            other => panic!("expected AllStrategiesFailed, got {other:?}"),
        }
    }

    #[test]
    fn strategy_labels() {
        let direct = RetrievalStrategy::Direct {
            profile: HeaderProfile::default(),
        };
        assert_eq!(direct.label(), "direct");

        let relay = RetrievalStrategy::Relay {
            name: "corsproxy".to_string(),
            endpoint: "https://corsproxy.io/?{url}".to_string(),
            envelope: RelayEnvelope::Raw,
            profile: HeaderProfile::default(),
        };
        assert_eq!(relay.label(), "relay:corsproxy");
    }

    #[test]
    fn envelope_parses_from_config_value() {
        assert_eq!(
            RelayEnvelope::parse("json-contents"),
            RelayEnvelope::JsonContents
        );
        assert_eq!(RelayEnvelope::parse("raw"), RelayEnvelope::Raw);
        assert_eq!(RelayEnvelope::parse("anything"), RelayEnvelope::Raw);
    }
}
