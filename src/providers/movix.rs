//! TMDB-linked provider.
//!
//! The upstream exposes pre-scraped player links keyed directly by TMDB id,
//! so no title matching is needed. Each link's `quality` label doubles as
//! the hoster tag (e.g. "VIDMOLY HD"), which the normalizer uses for
//! provider classification.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::errors::SourceError;
use crate::models::{MediaKind, MediaQuery, RawCandidate};

use super::ProviderAdapter;

pub struct MovixAdapter {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct TmdbLinksResponse {
    #[serde(default)]
    player_links: Vec<PlayerLink>,
}

#[derive(Deserialize)]
struct PlayerLink {
    decoded_url: String,
    quality: Option<String>,
    language: Option<String>,
}

impl MovixAdapter {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, query: &MediaQuery) -> String {
        match query.kind {
            MediaKind::Movie => format!("{}/tmdb/movie/{}", self.base_url, query.tmdb_id),
            MediaKind::Tv => format!(
                "{}/tmdb/tv/{}?season={}&episode={}",
                self.base_url,
                query.tmdb_id,
                query.season.unwrap_or(1),
                query.episode.unwrap_or(1)
            ),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MovixAdapter {
    fn name(&self) -> &str {
        "movix"
    }

    async fn fetch_sources(&self, query: &MediaQuery) -> Result<Vec<RawCandidate>, SourceError> {
        let endpoint = self.endpoint(query);
        debug!(url = %endpoint, "fetching tmdb player links");

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| SourceError::unavailable(self.name(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url: endpoint,
            });
        }

        let parsed: TmdbLinksResponse = response
            .json()
            .await
            .map_err(|e| SourceError::parse_failure(self.name(), e.to_string()))?;

        let candidates = parsed
            .player_links
            .into_iter()
            .filter(|link| link.decoded_url.starts_with("http"))
            .map(|link| RawCandidate {
                url: link.decoded_url,
                quality: link.quality,
                language: link.language,
                ..Default::default()
            })
            .collect();

        Ok(candidates)
    }
}
