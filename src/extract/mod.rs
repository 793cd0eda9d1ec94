//! Embedded-manifest extraction.
//!
//! Several origins serve the real manifest URL buried inside an HTML embed
//! page rather than directly. Extraction walks an ordered strategy list:
//! a strict match on the player-setup source assignment, a loose scan for
//! any playlist-looking URL, and finally a URL constructed from the page's
//! own embed id. Driven by the same first-success driver as the network
//! fallback chain.

use regex::Regex;
use url::Url;

use crate::errors::SourceError;
use crate::fallback::{first_success, AttemptFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// `player.setup({ sources: [{ file: "..." }] })` and friends.
    StrictPattern,
    /// Any `https://....m3u8` / `.urlset` URL in the page.
    LoosePattern,
    /// Construct `/hls/{embed_id}/master.m3u8` on the page's own host.
    DerivedFromId,
}

impl ExtractionStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionStrategy::StrictPattern => "strict-pattern",
            ExtractionStrategy::LoosePattern => "loose-pattern",
            ExtractionStrategy::DerivedFromId => "derived-from-id",
        }
    }
}

/// Default order: strict first, construction last.
pub const DEFAULT_STRATEGIES: &[ExtractionStrategy] = &[
    ExtractionStrategy::StrictPattern,
    ExtractionStrategy::LoosePattern,
    ExtractionStrategy::DerivedFromId,
];

/// Extract the manifest URL hidden in an embed page.
///
/// `page_url` is the embed page the HTML came from; it anchors relative
/// URLs and supplies the embed id for the constructed fallback.
pub async fn extract_manifest_url(
    html: &str,
    page_url: &Url,
    strategies: &[ExtractionStrategy],
) -> Result<String, SourceError> {
    // Ad-block interstitials replace the player entirely; no pattern will
    // ever match, so fail fast with a useful message.
    if html.contains("Disable ADBlock") || html.to_lowercase().contains("disable adblock") {
        return Err(SourceError::parse_failure(
            page_url.as_str(),
            "origin served an ad-block interstitial instead of the player",
        ));
    }

    let names: Vec<String> = strategies.iter().map(|s| s.label().to_string()).collect();
    first_success(page_url.as_str(), &names, |index| {
        std::future::ready(apply_strategy(strategies[index], html, page_url))
    })
    .await
}

fn apply_strategy(
    strategy: ExtractionStrategy,
    html: &str,
    page_url: &Url,
) -> Result<String, AttemptFailure> {
    let found = match strategy {
        ExtractionStrategy::StrictPattern => strict_patterns()
            .iter()
            .find_map(|re| re.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())),
        ExtractionStrategy::LoosePattern => loose_patterns()
            .iter()
            .find_map(|re| re.find(html).map(|m| m.as_str().to_string())),
        ExtractionStrategy::DerivedFromId => {
            crate::utils::UrlUtils::embed_id(page_url).map(|id| {
                format!(
                    "{}://{}/hls/{}/master.m3u8",
                    page_url.scheme(),
                    page_url.host_str().unwrap_or_default(),
                    id
                )
            })
        }
    };

    let candidate = found.ok_or_else(|| AttemptFailure::new("no match"))?;
    let cleaned = clean_manifest_url(&candidate);
    if cleaned.contains(".m3u8") || cleaned.contains(".urlset") {
        Ok(cleaned)
    } else {
        Err(AttemptFailure::new(format!(
            "matched value does not look like a playlist URL: {cleaned}"
        )))
    }
}

/// Strict source-assignment shapes, most specific first.
fn strict_patterns() -> Vec<Regex> {
    [
        r#"player\.setup\s*\(\s*\{[^}]*sources:\s*\[\s*\{\s*file:\s*["']([^"']+)["']"#,
        r#"sources:\s*\[\s*\{\s*file:\s*["']([^"']+)["']"#,
        r#""file"\s*:\s*["']([^"']*\.m3u8[^"']*)["']"#,
        r#"var\s+\w+\s*=\s*["']([^"']*\.m3u8[^"']*)["']"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

/// Broad URL scan, used when the page obfuscates the assignment shape.
fn loose_patterns() -> Vec<Regex> {
    [
        r#"https?://[^"'\s]+\.m3u8[^"'\s]*"#,
        r#"https?://[^"'\s]+\.urlset/[^"'\s]*"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

/// Some CDNs emit `,.urlset/` URLs whose commas must be stripped before the
/// URL is fetchable.
fn clean_manifest_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains(".urlset") {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://vidmoly.net/embed-w9zkq7.html").unwrap()
    }

    #[tokio::test]
    async fn strict_pattern_wins_over_loose_scan() {
        let html = r#"
            <script>
            player.setup({ sources: [{ file: "https://vmeas.cloud/hls/abc/master.m3u8" }] });
            var decoy = "https://ads.example.com/pixel.m3u8";
            </script>
        "#;
        let url = extract_manifest_url(html, &page(), DEFAULT_STRATEGIES)
            .await
            .unwrap();
        assert_eq!(url, "https://vmeas.cloud/hls/abc/master.m3u8");
    }

    #[tokio::test]
    async fn loose_scan_picks_up_bare_urls() {
        let html = r#"<body>stream at https://vmwesa.online/s/xyz,.urlset/master.m3u8 tonight</body>"#;
        let url = extract_manifest_url(html, &page(), DEFAULT_STRATEGIES)
            .await
            .unwrap();
        // urlset commas are stripped
        assert_eq!(url, "https://vmwesa.online/s/xyz.urlset/master.m3u8");
    }

    #[tokio::test]
    async fn constructed_url_fires_when_patterns_find_nothing() {
        let html = "<html><body>nothing to see</body></html>";
        let url = extract_manifest_url(html, &page(), DEFAULT_STRATEGIES)
            .await
            .unwrap();
        assert_eq!(url, "https://vidmoly.net/hls/w9zkq7/master.m3u8");
    }

    #[tokio::test]
    async fn adblock_interstitial_fails_fast() {
        let html = "<html>Please Disable ADBlock to continue</html>";
        let err = extract_manifest_url(html, &page(), DEFAULT_STRATEGIES)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::ParseFailure { .. }));
    }

    #[tokio::test]
    async fn exhaustion_carries_per_strategy_trace() {
        // A page URL without an embed id defeats the constructed fallback.
        let plain = Url::parse("https://example.com/watch").unwrap();
        let err = extract_manifest_url("<html></html>", &plain, DEFAULT_STRATEGIES)
            .await
            .unwrap_err();
        match err {
            SourceError::AllStrategiesFailed { attempts, .. } => {
                assert_eq!(attempts.len(), 3);
                assert_eq!(attempts[0].strategy, "strict-pattern");
                assert_eq!(attempts[2].strategy, "derived-from-id");
            }
            other => panic!("expected AllStrategiesFailed, got {other:?}"),
        }
    }
}
