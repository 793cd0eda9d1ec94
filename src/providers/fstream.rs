//! FStream-family provider.
//!
//! Movies come back as a `players` map keyed by raw language label; TV
//! responses carry the whole season under `episodes.{n}.languages`. Since
//! one season payload covers every episode, it is kept in the injected
//! cache so an episode-prefetch call does not refetch the season.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::SourceCache;
use crate::errors::SourceError;
use crate::models::{MediaKind, MediaQuery, RawCandidate};

use super::ProviderAdapter;

pub struct FstreamAdapter {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<dyn SourceCache>,
}

#[derive(Deserialize)]
struct FstreamPlayer {
    url: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    quality: Option<String>,
    player: Option<String>,
}

impl FstreamAdapter {
    pub fn new(client: reqwest::Client, base_url: String, cache: Arc<dyn SourceCache>) -> Self {
        Self {
            client,
            base_url,
            cache,
        }
    }

    async fn fetch_json(&self, endpoint: &str) -> Result<Value, SourceError> {
        debug!(url = %endpoint, "fetching fstream listing");
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| SourceError::unavailable(self.name(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url: endpoint.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::parse_failure(self.name(), e.to_string()))
    }

    /// Season listings are fetched once and reused for every episode.
    async fn season_listing(&self, tmdb_id: u64, season: u32) -> Result<Value, SourceError> {
        let key = format!("fstream:{tmdb_id}:s{season}");
        if let Some(cached) = self.cache.get(&key).await {
            debug!(%key, "season listing served from cache");
            return Ok(cached);
        }
        let endpoint = format!("{}/fstream/tv/{}/season/{}", self.base_url, tmdb_id, season);
        let listing = self.fetch_json(&endpoint).await?;
        self.cache.set(&key, listing.clone()).await;
        Ok(listing)
    }

    fn candidates_from_players(language: &str, players: &Value) -> Vec<RawCandidate> {
        let Some(entries) = players.as_array() else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| serde_json::from_value::<FstreamPlayer>(entry.clone()).ok())
            .filter(|player| player.url.starts_with("http"))
            .map(|player| RawCandidate {
                url: player.url,
                quality: player.quality,
                language: Some(language.to_string()),
                provider: player.player,
                kind: player.kind,
                ..Default::default()
            })
            .collect()
    }
}

#[async_trait]
impl ProviderAdapter for FstreamAdapter {
    fn name(&self) -> &str {
        "fstream"
    }

    async fn fetch_sources(&self, query: &MediaQuery) -> Result<Vec<RawCandidate>, SourceError> {
        match query.kind {
            MediaKind::Movie => {
                let endpoint = format!("{}/fstream/movie/{}", self.base_url, query.tmdb_id);
                let body = self.fetch_json(&endpoint).await?;
                let mut candidates = Vec::new();
                if let Some(players) = body.get("players").and_then(|p| p.as_object()) {
                    for (language, entries) in players {
                        candidates.extend(Self::candidates_from_players(language, entries));
                    }
                }
                Ok(candidates)
            }
            MediaKind::Tv => {
                let season = query
                    .season
                    .ok_or_else(|| SourceError::invalid_input("season required for tv"))?;
                let episode = query
                    .episode
                    .ok_or_else(|| SourceError::invalid_input("episode required for tv"))?;

                let listing = self.season_listing(query.tmdb_id, season).await?;
                let mut candidates = Vec::new();
                if let Some(languages) = listing
                    .get("episodes")
                    .and_then(|eps| eps.get(episode.to_string()))
                    .and_then(|ep| ep.get("languages"))
                    .and_then(|l| l.as_object())
                {
                    for (language, entries) in languages {
                        candidates.extend(Self::candidates_from_players(language, entries));
                    }
                }
                Ok(candidates)
            }
        }
    }
}
