//! AfterDark provider.
//!
//! The origin blocks data-center IPs outright, so retrieval runs through
//! the fallback chain: configured relays first, then a direct fetch with
//! browser headers. When the whole chain exhausts, the adapter emits a
//! single synthetic `debug` source carrying the attempt trace so operators
//! can see what was tried straight from the source list.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AfterdarkConfig;
use crate::errors::SourceError;
use crate::fallback::{FallbackChain, RelayEnvelope, RetrievalStrategy};
use crate::models::{HeaderProfile, MediaKind, MediaQuery, RawCandidate};

use super::ProviderAdapter;

pub struct AfterdarkAdapter {
    chain: FallbackChain,
    config: AfterdarkConfig,
    strategies: Vec<RetrievalStrategy>,
}

#[derive(Deserialize)]
struct SourcesResponse {
    #[serde(default)]
    sources: Vec<UpstreamSource>,
}

#[derive(Deserialize)]
struct UpstreamSource {
    url: String,
    quality: Option<String>,
    language: Option<String>,
    kind: Option<String>,
    proxied: Option<bool>,
}

impl AfterdarkAdapter {
    pub fn new(chain: FallbackChain, config: AfterdarkConfig, browser_user_agent: String) -> Self {
        let mut strategies: Vec<RetrievalStrategy> = config
            .relays
            .iter()
            .map(|relay| RetrievalStrategy::Relay {
                name: relay.name.clone(),
                endpoint: relay.endpoint.clone(),
                envelope: RelayEnvelope::parse(&relay.envelope),
                profile: HeaderProfile {
                    user_agent: Some(browser_user_agent.clone()),
                    ..Default::default()
                },
            })
            .collect();
        // Last resort: a direct fetch occasionally gets through from
        // residential egress.
        strategies.push(RetrievalStrategy::Direct {
            profile: HeaderProfile {
                referer: Some("https://afterdark.mom/".to_string()),
                origin: Some("https://afterdark.mom".to_string()),
                user_agent: Some(browser_user_agent),
                extra: Vec::new(),
            },
        });

        Self {
            chain,
            config,
            strategies,
        }
    }

    fn endpoint(&self, query: &MediaQuery) -> String {
        let mut url = match query.kind {
            MediaKind::Movie => format!("{}/movies?tmdbId={}", self.config.base_url, query.tmdb_id),
            MediaKind::Tv => format!("{}/shows?tmdbId={}", self.config.base_url, query.tmdb_id),
        };
        if let Some(title) = &query.title {
            url.push_str(&format!("&title={}", urlencoding::encode(title)));
        }
        match query.kind {
            MediaKind::Movie => {
                if let Some(year) = query.year {
                    url.push_str(&format!("&year={year}"));
                }
                if let Some(original) = &query.original_title {
                    url.push_str(&format!("&originalTitle={}", urlencoding::encode(original)));
                }
            }
            MediaKind::Tv => {
                if let Some(season) = query.season {
                    url.push_str(&format!("&season={season}"));
                }
                if let Some(episode) = query.episode {
                    url.push_str(&format!("&episode={episode}"));
                }
            }
        }
        url
    }

    fn looks_like_sources_payload(body: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(body)
            .map(|value| value.get("sources").map(|s| s.is_array()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Synthetic placeholder emitted when every strategy failed, carrying
    /// the flattened trace where the UI shows the quality label.
    fn debug_candidate(trace: String) -> RawCandidate {
        RawCandidate {
            url: "debug://afterdark".to_string(),
            quality: Some(trace),
            provider: Some("debug".to_string()),
            kind: Some("embed".to_string()),
            ..Default::default()
        }
    }

    fn map_sources(&self, body: &str) -> Result<Vec<RawCandidate>, SourceError> {
        let parsed: SourcesResponse = serde_json::from_str(body)
            .map_err(|e| SourceError::parse_failure(self.name(), e.to_string()))?;

        let headers = self.config.profile.to_plain_map();
        let candidates = parsed
            .sources
            .into_iter()
            // Pre-proxied entries point at the origin's own relay, which
            // rejects anyone else; only direct hls sources are playable.
            .filter(|source| source.proxied == Some(false))
            .filter(|source| source.kind.as_deref() == Some("hls"))
            .map(|source| RawCandidate {
                url: source.url,
                quality: source.quality,
                language: source.language,
                provider: Some("afterdark".to_string()),
                kind: Some("hls".to_string()),
                headers: Some(headers.clone()),
                ..Default::default()
            })
            .collect();
        Ok(candidates)
    }
}

#[async_trait]
impl ProviderAdapter for AfterdarkAdapter {
    fn name(&self) -> &str {
        "afterdark"
    }

    async fn fetch_sources(&self, query: &MediaQuery) -> Result<Vec<RawCandidate>, SourceError> {
        let endpoint = self.endpoint(query);
        debug!(url = %endpoint, "fetching afterdark sources via fallback chain");

        match self
            .chain
            .resolve(&endpoint, &self.strategies, &Self::looks_like_sources_payload)
            .await
        {
            Ok(body) => self.map_sources(&body),
            Err(err @ SourceError::AllStrategiesFailed { .. }) => {
                let trace = err.trace_summary().unwrap_or_default();
                warn!(target_url = %endpoint, %trace, "afterdark chain exhausted");
                Ok(vec![Self::debug_candidate(trace)])
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn adapter() -> AfterdarkAdapter {
        let config = Config::default();
        AfterdarkAdapter::new(
            FallbackChain::new(reqwest::Client::new(), Duration::from_secs(5)),
            config.providers.afterdark,
            config.proxy.user_agent,
        )
    }

    #[test]
    fn strategies_are_relays_then_direct() {
        let adapter = adapter();
        let labels: Vec<String> = adapter.strategies.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["relay:allorigins", "relay:corsproxy", "direct"]);
    }

    #[test]
    fn endpoint_carries_hints_per_kind() {
        let adapter = adapter();
        let mut movie = MediaQuery::movie(550);
        movie.title = Some("Fight Club".to_string());
        movie.year = Some(1999);
        assert_eq!(
            adapter.endpoint(&movie),
            "https://afterdark.mom/api/sources/movies?tmdbId=550&title=Fight%20Club&year=1999"
        );

        let episode = MediaQuery::episode(1399, 1, 3);
        assert_eq!(
            adapter.endpoint(&episode),
            "https://afterdark.mom/api/sources/shows?tmdbId=1399&season=1&episode=3"
        );
    }

    #[test]
    fn only_unproxied_hls_sources_survive() {
        let adapter = adapter();
        let body = r#"{
            "sources": [
                {"url": "https://cdn.afterdark.mom/a.m3u8", "quality": "1080p", "language": "English", "kind": "hls", "proxied": false},
                {"url": "https://proxy.afterdark.click/b.m3u8", "quality": "720p", "language": "English", "kind": "hls", "proxied": true},
                {"url": "https://cdn.afterdark.mom/c.mp4", "quality": "720p", "language": "French", "kind": "file", "proxied": false}
            ]
        }"#;
        let candidates = adapter.map_sources(body).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://cdn.afterdark.mom/a.m3u8");
        assert!(candidates[0].headers.as_ref().unwrap().contains_key("Referer"));
    }

    #[test]
    fn payload_validation_requires_sources_array() {
        assert!(AfterdarkAdapter::looks_like_sources_payload(
            r#"{"sources": []}"#
        ));
        assert!(!AfterdarkAdapter::looks_like_sources_payload(
            "<html>blocked</html>"
        ));
        assert!(!AfterdarkAdapter::looks_like_sources_payload(
            r#"{"sources": "nope"}"#
        ));
    }

    #[test]
    fn debug_candidate_carries_the_trace() {
        let candidate = AfterdarkAdapter::debug_candidate("direct: HTTP 403".to_string());
        assert_eq!(candidate.provider.as_deref(), Some("debug"));
        assert_eq!(candidate.quality.as_deref(), Some("direct: HTTP 403"));
        assert_eq!(candidate.url, "debug://afterdark");
    }
}
