//! HTTP request handlers.
//!
//! Thin layer: validate query parameters at the boundary, delegate to the
//! aggregator or the proxy services, map errors through the shared
//! taxonomy.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::errors::{AppError, WebError};
use crate::models::{MediaKind, MediaQuery};
use crate::web::responses::SourcesResponse;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct SourcesParams {
    #[serde(rename = "mediaId")]
    pub media_id: Option<u64>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub title: Option<String>,
    #[serde(rename = "originalTitle")]
    pub original_title: Option<String>,
    pub year: Option<i32>,
}

impl SourcesParams {
    /// Validate and convert into a [`MediaQuery`]. Missing or malformed
    /// parameters are client errors, never retried upstream.
    fn into_media_query(self) -> Result<MediaQuery, AppError> {
        let tmdb_id = self
            .media_id
            .ok_or_else(|| AppError::Web(WebError::missing_parameter("mediaId")))?;
        let kind: MediaKind = self
            .media_type
            .as_deref()
            .ok_or_else(|| AppError::Web(WebError::missing_parameter("type")))?
            .parse()
            .map_err(|e: String| AppError::Web(WebError::invalid_request("type", e)))?;

        if kind == MediaKind::Tv && (self.season.is_none() || self.episode.is_none()) {
            return Err(AppError::Web(WebError::invalid_request(
                "season/episode",
                "season and episode are required for tv",
            )));
        }

        Ok(MediaQuery {
            tmdb_id,
            kind,
            season: self.season,
            episode: self.episode,
            title: self.title,
            original_title: self.original_title,
            year: self.year,
        })
    }
}

/// `GET /sources` - resolve across all providers.
pub async fn get_sources(
    State(state): State<AppState>,
    Query(params): Query<SourcesParams>,
) -> Result<Json<SourcesResponse>, AppError> {
    let query = params.into_media_query()?;
    let sources = state.aggregator.resolve_media(&query).await;
    Ok(Json(SourcesResponse {
        success: true,
        sources,
    }))
}

/// `GET /sources/{provider}` - resolve through exactly one provider,
/// used for episode prefetch where latency beats coverage.
pub async fn get_targeted_sources(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<SourcesParams>,
) -> Result<Json<SourcesResponse>, AppError> {
    let query = params.into_media_query()?;
    let sources = state.aggregator.resolve_targeted(&provider, &query).await?;
    Ok(Json(SourcesResponse {
        success: true,
        sources,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub url: Option<String>,
    pub referer: Option<String>,
}

/// `GET /proxy` - rewritten manifest or relayed segment, decided by the
/// target's shape. Playlist-looking and embed-page targets go through the
/// rewriter; everything else streams through the relay.
pub async fn proxy(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let target = params
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Web(WebError::missing_parameter("url")))?;

    let mut profile = match &params.referer {
        Some(referer) => crate::models::HeaderProfile::with_referer(referer.clone()),
        None => Default::default(),
    };
    if profile.user_agent.is_none() {
        profile.user_agent = Some(state.config.proxy.user_agent.clone());
    }

    let lower = target.to_lowercase();
    let is_manifest_target = lower.contains(".m3u8")
        || lower.contains(".mpd")
        || lower.contains(".urlset")
        || lower.contains("embed");

    if is_manifest_target {
        let rewritten = state.rewriter.rewrite(&target, &profile).await?;
        debug!(url = %target, format = ?rewritten.format, "serving rewritten manifest");
        let headers = [
            (header::CONTENT_TYPE, rewritten.format.content_type()),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ];
        Ok((headers, rewritten.body).into_response())
    } else {
        let range = headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok());
        let response = state.relay.relay(&target, range, &profile).await?;
        Ok(response)
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
