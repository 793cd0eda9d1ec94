//! Core data model for resolved streaming sources.
//!
//! A [`StreamingSource`] is the canonical, immutable record every provider
//! adapter's output is normalized into. Corrections never mutate an existing
//! record; they produce a new one (and therefore a new id).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audio/subtitle language bucket. Raw upstream labels are never exposed;
/// classification always lands in exactly one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    #[serde(rename = "VF")]
    Vf,
    #[serde(rename = "VOSTFR")]
    Vostfr,
    #[serde(rename = "VO")]
    Vo,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Vf => write!(f, "VF"),
            Language::Vostfr => write!(f, "VOSTFR"),
            Language::Vo => write!(f, "VO"),
        }
    }
}

/// Stream container kind, inferred from the URL when upstream omits it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Hls,
    Mp4,
    Embed,
}

/// One caption track attached to a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleTrack {
    pub url: String,
    pub label: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
}

/// A resolved, playable candidate stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSource {
    /// Deterministic id derived from `(provider, quality, language, url)`.
    pub id: String,
    /// Absolute manifest/file URL, pre-proxy.
    pub url: String,
    pub quality: String,
    pub language: Language,
    /// Canonical lowercase provider identifier.
    pub provider: String,
    #[serde(rename = "type")]
    pub kind: SourceType,
    /// Which adapter produced this source.
    pub origin: String,
    /// Request headers the relay must send to this origin (Referer/Origin/UA).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtitles: Vec<SubtitleTrack>,
}

/// Movie or episode lookup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Tv),
            other => Err(format!("unsupported media type: {other}")),
        }
    }
}

/// What the caller wants resolved. Title/year hints are carried for
/// upstreams that only support fuzzy title matching.
#[derive(Debug, Clone)]
pub struct MediaQuery {
    pub tmdb_id: u64,
    pub kind: MediaKind,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub year: Option<i32>,
}

impl MediaQuery {
    pub fn movie(tmdb_id: u64) -> Self {
        Self {
            tmdb_id,
            kind: MediaKind::Movie,
            season: None,
            episode: None,
            title: None,
            original_title: None,
            year: None,
        }
    }

    pub fn episode(tmdb_id: u64, season: u32, episode: u32) -> Self {
        Self {
            tmdb_id,
            kind: MediaKind::Tv,
            season: Some(season),
            episode: Some(episode),
            title: None,
            original_title: None,
            year: None,
        }
    }
}

/// Raw candidate as an adapter hands it over, before normalization.
/// Every field except the URL is optional; the normalizer fills the gaps.
#[derive(Debug, Clone, Default)]
pub struct RawCandidate {
    pub url: String,
    pub quality: Option<String>,
    pub language: Option<String>,
    pub provider: Option<String>,
    pub kind: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub subtitles: Vec<SubtitleTrack>,
}

impl RawCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// One row of the fallback-chain trace: a single strategy try against a
/// single target. Only kept long enough to build the failure trace.
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    pub strategy: String,
    pub target_url: String,
    pub http_status: Option<u16>,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.http_status, &self.error) {
            (Some(status), Some(error)) => {
                write!(f, "{}: HTTP {} ({})", self.strategy, status, error)
            }
            (Some(status), None) => write!(f, "{}: HTTP {}", self.strategy, status),
            (None, Some(error)) => write!(f, "{}: {}", self.strategy, error),
            (None, None) => write!(f, "{}: failed", self.strategy),
        }
    }
}

/// Request headers an origin requires before it will serve media.
/// Attached to adapters/origins in configuration and injected at call time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HeaderProfile {
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

impl HeaderProfile {
    pub fn with_referer(referer: impl Into<String>) -> Self {
        let referer = referer.into();
        let origin = url::Url::parse(&referer)
            .ok()
            .and_then(|u| u.host_str().map(|h| format!("{}://{}", u.scheme(), h)));
        Self {
            referer: Some(referer),
            origin,
            user_agent: None,
            extra: Vec::new(),
        }
    }

    /// Convert to a reqwest header map, skipping anything that is not a
    /// valid header value.
    pub fn to_header_map(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::{HeaderName, HeaderValue, ORIGIN, REFERER, USER_AGENT};

        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(referer) = &self.referer {
            if let Ok(v) = HeaderValue::from_str(referer) {
                headers.insert(REFERER, v);
            }
        }
        if let Some(origin) = &self.origin {
            if let Ok(v) = HeaderValue::from_str(origin) {
                headers.insert(ORIGIN, v);
            }
        }
        if let Some(user_agent) = &self.user_agent {
            if let Ok(v) = HeaderValue::from_str(user_agent) {
                headers.insert(USER_AGENT, v);
            }
        }
        for (name, value) in &self.extra {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        headers
    }

    /// Same headers as a plain map, for attaching to a [`StreamingSource`].
    pub fn to_plain_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(referer) = &self.referer {
            map.insert("Referer".to_string(), referer.clone());
        }
        if let Some(origin) = &self.origin {
            map.insert("Origin".to_string(), origin.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            map.insert("User-Agent".to_string(), user_agent.clone());
        }
        for (name, value) in &self.extra {
            map.insert(name.clone(), value.clone());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_serializes_to_bucket_labels() {
        assert_eq!(serde_json::to_string(&Language::Vf).unwrap(), "\"VF\"");
        assert_eq!(
            serde_json::to_string(&Language::Vostfr).unwrap(),
            "\"VOSTFR\""
        );
        assert_eq!(serde_json::to_string(&Language::Vo).unwrap(), "\"VO\"");
    }

    #[test]
    fn source_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SourceType::Hls).unwrap(), "\"hls\"");
        assert_eq!(serde_json::to_string(&SourceType::Mp4).unwrap(), "\"mp4\"");
    }

    #[test]
    fn media_kind_parses_from_query_values() {
        assert_eq!("movie".parse::<MediaKind>().unwrap(), MediaKind::Movie);
        assert_eq!("tv".parse::<MediaKind>().unwrap(), MediaKind::Tv);
        assert!("series".parse::<MediaKind>().is_err());
    }

    #[test]
    fn header_profile_derives_origin_from_referer() {
        let profile = HeaderProfile::with_referer("https://vidmoly.net/");
        assert_eq!(profile.origin.as_deref(), Some("https://vidmoly.net"));

        let map = profile.to_plain_map();
        assert_eq!(map.get("Referer").unwrap(), "https://vidmoly.net/");
    }

    #[test]
    fn provider_attempt_renders_trace_row() {
        let attempt = ProviderAttempt {
            strategy: "relay:corsproxy".to_string(),
            target_url: "https://example.com".to_string(),
            http_status: Some(403),
            error: Some("forbidden".to_string()),
            at: Utc::now(),
        };
        assert_eq!(attempt.to_string(), "relay:corsproxy: HTTP 403 (forbidden)");
    }
}
