//! MovieBox provider.
//!
//! This upstream has no TMDB mapping, so resolution is a three-step flow:
//! title search, subject detail (for the player-page path that seeds the
//! Referer), then the download listing. The CDN rejects requests without
//! the mobile-app user agent and the player-page Referer/Origin, so those
//! headers are attached to every returned candidate for the relay to use.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::MovieboxConfig;
use crate::errors::SourceError;
use crate::models::{MediaKind, MediaQuery, RawCandidate};

use super::ProviderAdapter;

pub struct MovieboxAdapter {
    client: reqwest::Client,
    config: MovieboxConfig,
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(rename = "subjectId")]
    subject_id: String,
    title: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
    #[serde(rename = "subjectType")]
    subject_type: Option<u8>,
}

#[derive(Deserialize)]
struct DetailData {
    subject: Option<DetailSubject>,
}

#[derive(Deserialize)]
struct DetailSubject {
    #[serde(rename = "detailPath")]
    detail_path: Option<String>,
}

#[derive(Deserialize)]
struct DownloadData {
    #[serde(default)]
    downloads: Vec<DownloadEntry>,
}

#[derive(Deserialize)]
struct DownloadEntry {
    url: String,
    resolution: Option<u32>,
}

const SUBJECT_TYPE_MOVIE: u8 = 1;
const SUBJECT_TYPE_TV: u8 = 2;

impl MovieboxAdapter {
    pub fn new(client: reqwest::Client, config: MovieboxConfig) -> Self {
        Self { client, config }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        referer: Option<&str>,
    ) -> Result<T, SourceError> {
        debug!(url = %endpoint, "moviebox api request");
        let mut request = self
            .client
            .get(endpoint)
            .headers(self.config.profile.to_header_map());
        if let Some(referer) = referer {
            request = request.header(reqwest::header::REFERER, referer);
        }

        let response = request
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

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| SourceError::parse_failure(self.name(), e.to_string()))?;
        envelope
            .data
            .ok_or_else(|| SourceError::parse_failure(self.name(), "empty data envelope"))
    }

    /// Find the subject id by title, preferring a release-year match.
    async fn search_subject(&self, query: &MediaQuery) -> Result<String, SourceError> {
        let title = query
            .title
            .as_deref()
            .or(query.original_title.as_deref())
            .ok_or_else(|| SourceError::invalid_input("moviebox requires a title hint"))?;

        let wanted_type = match query.kind {
            MediaKind::Movie => SUBJECT_TYPE_MOVIE,
            MediaKind::Tv => SUBJECT_TYPE_TV,
        };

        let endpoint = format!(
            "{}/wefeed-h5-bff/web/subject/search?keyword={}",
            self.config.base_url,
            urlencoding::encode(title)
        );
        let data: SearchData = self.get_json(&endpoint, None).await?;

        let mut matches = data
            .items
            .into_iter()
            .filter(|item| item.subject_type.unwrap_or(SUBJECT_TYPE_MOVIE) == wanted_type);

        let picked = match query.year {
            Some(year) => {
                let year = year.to_string();
                let mut collected: Vec<SearchItem> = matches.collect();
                let index = collected
                    .iter()
                    .position(|item| {
                        item.release_date
                            .as_deref()
                            .map(|d| d.starts_with(&year))
                            .unwrap_or(false)
                    })
                    .unwrap_or(0);
                if collected.is_empty() {
                    None
                } else {
                    Some(collected.swap_remove(index))
                }
            }
            None => matches.next(),
        };

        picked
            .map(|item| {
                debug!(title = ?item.title, id = %item.subject_id, "moviebox subject matched");
                item.subject_id
            })
            .ok_or_else(|| {
                SourceError::parse_failure(self.name(), format!("no subject matched '{title}'"))
            })
    }

    /// The download endpoint only answers when the Referer points at the
    /// subject's own player page.
    async fn player_page_referer(&self, subject_id: &str) -> Result<String, SourceError> {
        let endpoint = format!(
            "{}/wefeed-h5-bff/web/subject/detail?subjectId={}",
            self.config.base_url, subject_id
        );
        let data: DetailData = self.get_json(&endpoint, None).await?;
        let detail_path = data
            .subject
            .and_then(|s| s.detail_path)
            .ok_or_else(|| SourceError::parse_failure(self.name(), "subject has no detail path"))?;

        let base = self
            .config
            .profile
            .referer
            .clone()
            .unwrap_or_else(|| "https://fmoviesunblocked.net/".to_string());
        Ok(format!(
            "{}spa/videoPlayPage/movies/{}?id={}&type=/movie/detail",
            base, detail_path, subject_id
        ))
    }
}

#[async_trait]
impl ProviderAdapter for MovieboxAdapter {
    fn name(&self) -> &str {
        "moviebox"
    }

    async fn fetch_sources(&self, query: &MediaQuery) -> Result<Vec<RawCandidate>, SourceError> {
        let subject_id = self.search_subject(query).await?;
        let referer = self.player_page_referer(&subject_id).await?;

        let endpoint = format!(
            "{}/wefeed-h5-bff/web/subject/download?subjectId={}&se={}&ep={}",
            self.config.base_url,
            subject_id,
            query.season.unwrap_or(0),
            query.episode.unwrap_or(0)
        );
        let data: DownloadData = self.get_json(&endpoint, Some(&referer)).await?;

        let headers = self.config.profile.to_plain_map();
        let candidates = data
            .downloads
            .into_iter()
            .filter(|entry| entry.url.starts_with("http"))
            .map(|entry| RawCandidate {
                url: entry.url,
                quality: entry.resolution.map(|r| format!("{r}p")),
                // The upstream serves original-audio files and carries no
                // language field.
                language: Some("VO".to_string()),
                provider: Some("moviebox".to_string()),
                headers: Some(headers.clone()),
                ..Default::default()
            })
            .collect();

        Ok(candidates)
    }
}
