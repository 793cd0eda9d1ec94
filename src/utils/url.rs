//! URL utilities for consistent URL handling
//!
//! This module provides utilities for URL manipulation and inspection used
//! by the rewriter, the extraction chain, and the provider adapters.

use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Resolve a possibly-relative reference against a base URL.
    ///
    /// Falls back to the raw input when it cannot be resolved, matching the
    /// behavior players expect from lenient playlist handling.
    pub fn to_absolute(base: &Url, maybe_relative: &str) -> String {
        if maybe_relative.starts_with("http://") || maybe_relative.starts_with("https://") {
            return maybe_relative.to_string();
        }
        match base.join(maybe_relative) {
            Ok(joined) => joined.to_string(),
            Err(_) => maybe_relative.to_string(),
        }
    }

    /// Extract the host from a URL string.
    pub fn extract_host(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }

    /// Check if a URL string is a valid absolute URL.
    pub fn is_valid(url: &str) -> bool {
        Url::parse(url).is_ok()
    }

    /// Pull the embed id out of an embed-page URL.
    ///
    /// Supported shapes: `/embed-{id}.html`, `/embed/{id}`, `/e/{id}`.
    pub fn embed_id(page_url: &Url) -> Option<String> {
        let path = page_url.path();

        if let Some(rest) = path.strip_prefix("/embed-") {
            let id = rest.strip_suffix(".html").unwrap_or(rest);
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }

        let mut segments = page_url.path_segments()?;
        match (segments.next(), segments.next()) {
            (Some("embed"), Some(id)) | (Some("e"), Some(id)) if !id.is_empty() => {
                Some(id.trim_end_matches(".html").to_string())
            }
            _ => None,
        }
    }
}
