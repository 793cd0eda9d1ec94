//! HLS/DASH manifest rewriting.
//!
//! Fetches a playlist from its origin and rewrites every media/sub-playlist
//! reference to point back through the proxy, so the player stays on one
//! origin with consistent headers. Per request: FETCH (gated by the SSRF
//! allow-list) -> VALIDATE -> PARSE -> REWRITE -> EMIT.

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::errors::SourceError;
use crate::extract::{extract_manifest_url, DEFAULT_STRATEGIES};
use crate::models::HeaderProfile;
use crate::proxy::HostAllowlist;
use crate::utils::UrlUtils;

/// Per-request rewriting state.
#[derive(Debug, Clone)]
pub struct ManifestRewriteContext {
    /// The manifest's own final URL after redirects; relative references
    /// resolve against this, not the URL the client asked for.
    pub origin_base: Url,
    /// Path the proxy is mounted on, e.g. `/proxy`.
    pub proxy_base: String,
    /// Public host of this service, used to recognize already-proxied
    /// absolute URIs.
    pub public_host: Option<String>,
}

impl ManifestRewriteContext {
    /// Wrap an absolute upstream URI in a proxy reference.
    pub fn proxy_uri(&self, absolute: &str) -> String {
        format!("{}?url={}", self.proxy_base, urlencoding::encode(absolute))
    }

    /// A reference is already proxied when it targets our own mount path
    /// or our own public host. Rewriting those again would loop.
    pub fn is_already_proxied(&self, reference: &str) -> bool {
        if reference.starts_with(&self.proxy_base) {
            return true;
        }
        match (&self.public_host, UrlUtils::extract_host(reference)) {
            (Some(public), Some(host)) => public.eq_ignore_ascii_case(&host),
            _ => false,
        }
    }

    fn rewrite_reference(&self, reference: &str) -> String {
        if self.is_already_proxied(reference) {
            return reference.to_string();
        }
        let absolute = UrlUtils::to_absolute(&self.origin_base, reference);
        if self.is_already_proxied(&absolute) {
            absolute
        } else {
            self.proxy_uri(&absolute)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Hls,
    Dash,
}

impl ManifestFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ManifestFormat::Hls => "application/vnd.apple.mpegurl",
            ManifestFormat::Dash => "application/dash+xml",
        }
    }
}

/// A rewritten manifest ready to serve.
#[derive(Debug)]
pub struct RewrittenManifest {
    pub body: String,
    pub format: ManifestFormat,
}

pub struct ManifestRewriter {
    client: reqwest::Client,
    allowlist: HostAllowlist,
    proxy_base: String,
    public_host: Option<String>,
}

impl ManifestRewriter {
    pub fn new(
        client: reqwest::Client,
        allowlist: HostAllowlist,
        proxy_base: String,
        public_host: Option<String>,
    ) -> Self {
        Self {
            client,
            allowlist,
            proxy_base,
            public_host,
        }
    }

    /// Fetch and rewrite the manifest at `manifest_url`.
    ///
    /// Origins that wrap the real manifest URL in an HTML embed page get
    /// one extraction hop: the page is scanned for the manifest URL, which
    /// is then fetched and rewritten like any direct target.
    pub async fn rewrite(
        &self,
        manifest_url: &str,
        profile: &HeaderProfile,
    ) -> Result<RewrittenManifest, SourceError> {
        let mut target = manifest_url.to_string();

        for hop in 0..2 {
            let url = self.allowlist.check(&target)?;
            debug!(url = %url, hop, "fetching manifest");

            let response = self
                .client
                .get(url.clone())
                .headers(profile.to_header_map())
                .send()
                .await
                .map_err(|e| SourceError::unavailable(target.clone(), e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::Http {
                    status: status.as_u16(),
                    url: target,
                });
            }

            let final_url = response.url().clone();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_lowercase();
            if content_type.starts_with("video/")
                || content_type.starts_with("audio/")
                || content_type.starts_with("image/")
                || content_type == "application/octet-stream"
            {
                return Err(SourceError::parse_failure(
                    target,
                    format!("binary body ({content_type}) is not a playlist"),
                ));
            }

            let body = response
                .text()
                .await
                .map_err(|e| SourceError::parse_failure(target.clone(), e.to_string()))?;

            let ctx = ManifestRewriteContext {
                origin_base: final_url,
                proxy_base: self.proxy_base.clone(),
                public_host: self.public_host.clone(),
            };

            if body.trim_start().starts_with("#EXTM3U") {
                self.log_playlist_shape(&body);
                return Ok(RewrittenManifest {
                    body: rewrite_hls(&body, &ctx),
                    format: ManifestFormat::Hls,
                });
            }
            if body.contains("<MPD") {
                return Ok(RewrittenManifest {
                    body: rewrite_dash(&body, &ctx)?,
                    format: ManifestFormat::Dash,
                });
            }

            let looks_like_html =
                content_type.contains("text/html") || body.trim_start().starts_with('<');
            if hop == 0 && looks_like_html {
                let extracted =
                    extract_manifest_url(&body, &ctx.origin_base, DEFAULT_STRATEGIES).await?;
                debug!(from = %target, to = %extracted, "embed page resolved to manifest URL");
                target = extracted;
                continue;
            }

            return Err(SourceError::parse_failure(
                target,
                "body is neither an HLS playlist nor a DASH manifest",
            ));
        }

        Err(SourceError::parse_failure(
            manifest_url.to_string(),
            "extraction hop did not yield a playlist",
        ))
    }

    /// Log master/media shape when the playlist parses strictly; lenient
    /// playlists are still rewritten line-based.
    fn log_playlist_shape(&self, body: &str) {
        match m3u8_rs::parse_playlist_res(body.as_bytes()) {
            Ok(m3u8_rs::Playlist::MasterPlaylist(master)) => {
                debug!(variants = master.variants.len(), "master playlist");
            }
            Ok(m3u8_rs::Playlist::MediaPlaylist(media)) => {
                debug!(
                    segments = media.segments.len(),
                    target_duration = %media.target_duration,
                    "media playlist"
                );
            }
            Err(e) => {
                warn!(error = %e, "playlist did not parse strictly; rewriting line-based");
            }
        }
    }
}

/// Rewrite an HLS playlist line by line.
///
/// Directive lines pass through unchanged except their `URI="..."`
/// attributes (keys, sub-playlists in `#EXT-X-MEDIA`, init segments).
/// Every other non-blank line is a reference: resolved to absolute and
/// pointed back at the proxy unless it already is.
pub fn rewrite_hls(body: &str, ctx: &ManifestRewriteContext) -> String {
    let mut out = String::with_capacity(body.len() + 256);
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            out.push_str(line);
        } else if let Some(directive) = trimmed.strip_prefix('#') {
            if directive.contains("URI=\"") {
                out.push_str(&rewrite_uri_attributes(line, ctx));
            } else {
                out.push_str(line);
            }
        } else {
            out.push_str(&ctx.rewrite_reference(trimmed));
        }
        out.push('\n');
    }
    out
}

fn rewrite_uri_attributes(line: &str, ctx: &ManifestRewriteContext) -> String {
    match Regex::new(r#"URI="([^"]+)""#) {
        Ok(re) => re
            .replace_all(line, |caps: &regex::Captures<'_>| {
                format!("URI=\"{}\"", ctx.rewrite_reference(&caps[1]))
            })
            .into_owned(),
        Err(_) => line.to_string(),
    }
}

/// Rewrite `<BaseURL>` elements of a DASH manifest. Markup-aware rather
/// than line-based: DASH manifests are free-form XML.
pub fn rewrite_dash(body: &str, ctx: &ManifestRewriteContext) -> Result<String, SourceError> {
    use quick_xml::events::{BytesText, Event};
    use quick_xml::{Reader, Writer};

    let parse_err =
        |e: String| SourceError::parse_failure(ctx.origin_base.to_string(), e);

    let mut reader = Reader::from_str(body);
    let mut writer = Writer::new(Vec::new());
    let mut in_base_url = false;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                if start.name().as_ref() == b"BaseURL" {
                    in_base_url = true;
                }
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| parse_err(e.to_string()))?;
            }
            Ok(Event::End(end)) => {
                if end.name().as_ref() == b"BaseURL" {
                    in_base_url = false;
                }
                writer
                    .write_event(Event::End(end))
                    .map_err(|e| parse_err(e.to_string()))?;
            }
            Ok(Event::Text(text)) if in_base_url => {
                let raw = text.unescape().map_err(|e| parse_err(e.to_string()))?;
                let rewritten = ctx.rewrite_reference(raw.trim());
                writer
                    .write_event(Event::Text(BytesText::new(&rewritten)))
                    .map_err(|e| parse_err(e.to_string()))?;
            }
            Ok(event) => {
                writer
                    .write_event(event)
                    .map_err(|e| parse_err(e.to_string()))?;
            }
            Err(e) => return Err(parse_err(e.to_string())),
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| parse_err(e.to_string()))
}
