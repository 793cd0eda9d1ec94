//! Source normalization.
//!
//! Converts a [`RawCandidate`] from any adapter into the canonical
//! [`StreamingSource`] record. Pure functions, no I/O; classification is
//! driven by ordered rule tables so new providers and language labels are
//! additions to the tables, not new branches.

use crate::models::{Language, RawCandidate, SourceType, StreamingSource};

/// Per-adapter context handed to the normalizer.
pub struct AdapterContext<'a> {
    /// Adapter name, recorded as the source's `origin`.
    pub adapter: &'a str,
}

/// Quality label used when upstream omits one.
const DEFAULT_QUALITY: &str = "HD";

type LanguageRule = (fn(&str) -> bool, Language);

/// Ordered language rules; first match wins. The `vostfr` rule must come
/// before the `vo` rules because every `vostfr` label contains `vo`.
const LANGUAGE_RULES: &[LanguageRule] = &[
    (
        |s| s.contains("vostfr") || s.contains("subtitle"),
        Language::Vostfr,
    ),
    (
        |s| {
            matches!(
                s,
                "fr" | "français" | "francais" | "french" | "vf" | "vfq" | "multi" | "default"
            )
        },
        Language::Vf,
    ),
    (
        |s| matches!(s, "en" | "eng" | "english") || s.contains("vo"),
        Language::Vo,
    ),
];

/// Known provider tokens, matched against quality, then URL, then the raw
/// provider field.
const PROVIDER_TOKENS: &[&str] = &[
    "vidmoly",
    "vidzy",
    "darki",
    "moviebox",
    "afterdark",
    "topstream",
    "fstream",
    "wiflix",
    "uqload",
    "voe",
];

/// Classify a raw language label into exactly one bucket.
///
/// Unmatched labels fall back to VF. That default mirrors the audience of
/// the upstream catalogs, where an unlabeled track is almost always dubbed;
/// it is a policy choice, not an inference.
pub fn classify_language(raw: Option<&str>) -> Language {
    let value = match raw {
        Some(v) if !v.trim().is_empty() => v.trim().to_lowercase(),
        _ => return Language::Vf,
    };
    for (matches, language) in LANGUAGE_RULES {
        if matches(&value) {
            return *language;
        }
    }
    Language::Vf
}

/// Derive the canonical provider identifier.
///
/// Checks, in precedence order, the quality label, the URL, and the raw
/// provider field for a known token. When nothing matches, the lower-cased
/// raw provider is kept so unknown-but-labeled upstreams stay identifiable;
/// an empty raw field yields `unknown`.
pub fn classify_provider(quality: Option<&str>, url: &str, raw_provider: Option<&str>) -> String {
    let haystacks = [
        quality.map(|q| q.to_lowercase()),
        Some(url.to_lowercase()),
        raw_provider.map(|p| p.to_lowercase()),
    ];
    for haystack in haystacks.iter().flatten() {
        for token in PROVIDER_TOKENS {
            if haystack.contains(token) {
                return (*token).to_string();
            }
        }
    }
    match raw_provider {
        Some(p) if !p.trim().is_empty() => p.trim().to_lowercase(),
        _ => "unknown".to_string(),
    }
}

/// Infer the stream kind. An explicit raw type wins; otherwise the URL
/// extension decides, defaulting to mp4.
pub fn infer_type(raw_kind: Option<&str>, url: &str) -> SourceType {
    if let Some(kind) = raw_kind {
        match kind.to_lowercase().as_str() {
            "hls" | "m3u8" => return SourceType::Hls,
            "mp4" => return SourceType::Mp4,
            "embed" | "iframe" => return SourceType::Embed,
            _ => {}
        }
    }
    let lower = url.to_lowercase();
    if lower.contains(".m3u8") || lower.contains(".urlset") {
        SourceType::Hls
    } else if lower.contains("/embed") || lower.contains("embed-") {
        SourceType::Embed
    } else {
        SourceType::Mp4
    }
}

/// Deterministic source id over the four identity fields. Stable across
/// calls, distinct as soon as any field changes; uniqueness is only needed
/// within one response set.
pub fn source_id(provider: &str, quality: &str, language: Language, url: &str) -> String {
    let digest = md5::compute(format!("{provider}|{quality}|{language}|{url}"));
    format!("{digest:x}")
}

/// Normalize one raw candidate into the canonical record.
pub fn normalize(raw: RawCandidate, ctx: &AdapterContext<'_>) -> StreamingSource {
    let quality = raw
        .quality
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_QUALITY.to_string());
    let language = classify_language(raw.language.as_deref());
    let provider = classify_provider(Some(&quality), &raw.url, raw.provider.as_deref());
    let kind = infer_type(raw.kind.as_deref(), &raw.url);
    let id = source_id(&provider, &quality, language, &raw.url);

    StreamingSource {
        id,
        url: raw.url,
        quality,
        language,
        provider,
        kind,
        origin: ctx.adapter.to_string(),
        headers: raw.headers,
        subtitles: raw.subtitles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_labels_map_to_their_bucket() {
        for label in ["fr", "français", "vf", "VFQ", "default", "multi", "French"] {
            assert_eq!(classify_language(Some(label)), Language::Vf, "{label}");
        }
        for label in ["en", "ENG", "english", "vo", "VO (English)"] {
            assert_eq!(classify_language(Some(label)), Language::Vo, "{label}");
        }
        for label in ["VOSTFR", "vostfr 1080p", "with subtitles"] {
            assert_eq!(classify_language(Some(label)), Language::Vostfr, "{label}");
        }
    }

    #[test]
    fn unknown_language_defaults_to_vf() {
        assert_eq!(classify_language(Some("deutsch")), Language::Vf);
        assert_eq!(classify_language(Some("")), Language::Vf);
        assert_eq!(classify_language(None), Language::Vf);
    }

    #[test]
    fn vostfr_is_not_swallowed_by_the_vo_rule() {
        assert_eq!(classify_language(Some("vostfr")), Language::Vostfr);
    }

    #[test]
    fn provider_precedence_is_quality_then_url_then_raw() {
        // quality wins over URL
        assert_eq!(
            classify_provider(
                Some("VIDMOLY HD"),
                "https://vidzy.org/embed-abc.html",
                Some("player7")
            ),
            "vidmoly"
        );
        // URL wins over raw field
        assert_eq!(
            classify_provider(Some("1080p"), "https://darkibox.com/x.mp4", Some("player7")),
            "darki"
        );
        // raw field as last token source
        assert_eq!(
            classify_provider(Some("1080p"), "https://cdn.example.com/x.mp4", Some("MovieBox")),
            "moviebox"
        );
    }

    #[test]
    fn unmatched_provider_falls_back_to_lowercased_raw() {
        assert_eq!(
            classify_provider(Some("HD"), "https://cdn.example.com/a.mp4", Some("Player7")),
            "player7"
        );
        assert_eq!(
            classify_provider(Some("HD"), "https://cdn.example.com/a.mp4", None),
            "unknown"
        );
    }

    #[test]
    fn type_inference_prefers_explicit_kind() {
        assert_eq!(infer_type(Some("m3u8"), "https://x.com/file.mp4"), SourceType::Hls);
        assert_eq!(infer_type(None, "https://x.com/play.m3u8?tk=1"), SourceType::Hls);
        assert_eq!(
            infer_type(None, "https://x.com/hls/abc,.urlset/master"),
            SourceType::Hls
        );
        assert_eq!(
            infer_type(None, "https://vidmoly.net/embed-abc.html"),
            SourceType::Embed
        );
        assert_eq!(infer_type(None, "https://x.com/file.mp4"), SourceType::Mp4);
    }

    #[test]
    fn id_is_deterministic_and_field_sensitive() {
        let base = source_id("vidmoly", "HD", Language::Vf, "https://a/x.m3u8");
        assert_eq!(
            base,
            source_id("vidmoly", "HD", Language::Vf, "https://a/x.m3u8")
        );
        assert_ne!(
            base,
            source_id("vidzy", "HD", Language::Vf, "https://a/x.m3u8")
        );
        assert_ne!(
            base,
            source_id("vidmoly", "SD", Language::Vf, "https://a/x.m3u8")
        );
        assert_ne!(
            base,
            source_id("vidmoly", "HD", Language::Vo, "https://a/x.m3u8")
        );
        assert_ne!(
            base,
            source_id("vidmoly", "HD", Language::Vf, "https://a/y.m3u8")
        );
    }

    #[test]
    fn normalize_fills_defaults_and_origin() {
        let ctx = AdapterContext { adapter: "movix" };
        let source = normalize(
            RawCandidate {
                url: "https://vmeas.cloud/hls/abc.m3u8".to_string(),
                quality: None,
                language: Some("Français".to_string()),
                provider: Some("vidmoly".to_string()),
                ..Default::default()
            },
            &ctx,
        );
        assert_eq!(source.quality, "HD");
        assert_eq!(source.language, Language::Vf);
        assert_eq!(source.provider, "vidmoly");
        assert_eq!(source.kind, SourceType::Hls);
        assert_eq!(source.origin, "movix");
        assert!(!source.id.is_empty());
    }
}
