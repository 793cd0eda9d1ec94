//! Aggregator behavior against stub adapters: partial-success merging,
//! timeout isolation, priority ordering, and allow-list filtering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use source_proxy::aggregator::Aggregator;
use source_proxy::config::AggregatorConfig;
use source_proxy::errors::SourceError;
use source_proxy::models::{Language, MediaQuery, RawCandidate};
use source_proxy::providers::ProviderAdapter;

/// Stub adapter that answers from a canned script.
enum Script {
    Ok(Vec<RawCandidate>),
    Fail,
    Hang,
}

struct StubAdapter {
    name: &'static str,
    script: Script,
}

impl StubAdapter {
    fn ok(name: &'static str, candidates: Vec<RawCandidate>) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self {
            name,
            script: Script::Ok(candidates),
        })
    }

    fn failing(name: &'static str) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self {
            name,
            script: Script::Fail,
        })
    }

    fn hanging(name: &'static str) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self {
            name,
            script: Script::Hang,
        })
    }
}

#[async_trait]
impl ProviderAdapter for StubAdapter {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch_sources(&self, _query: &MediaQuery) -> Result<Vec<RawCandidate>, SourceError> {
        match &self.script {
            Script::Ok(candidates) => Ok(candidates.clone()),
            Script::Fail => Err(SourceError::unavailable(self.name, "connection refused")),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }
    }
}

fn config() -> AggregatorConfig {
    AggregatorConfig {
        overall_deadline_secs: 3,
        adapter_timeout_secs: 1,
        provider_allowlist: vec![
            "vidmoly".to_string(),
            "vidzy".to_string(),
            "moviebox".to_string(),
        ],
        provider_priority: vec!["movix".to_string(), "moviebox".to_string()],
    }
}

fn vidmoly_candidate() -> RawCandidate {
    RawCandidate {
        url: "https://vidmoly.net/embed-abc.html".to_string(),
        quality: Some("VIDMOLY HD".to_string()),
        language: Some("Français".to_string()),
        ..Default::default()
    }
}

fn moviebox_candidate() -> RawCandidate {
    RawCandidate {
        url: "https://valiw.hakunaymatata.com/resource/film.mp4".to_string(),
        quality: Some("1080p".to_string()),
        language: Some("VO".to_string()),
        provider: Some("moviebox".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn partial_success_merges_ok_results_within_deadline() {
    let aggregator = Aggregator::new(
        vec![
            StubAdapter::ok("movix", vec![vidmoly_candidate()]),
            StubAdapter::failing("afterdark"),
            StubAdapter::hanging("fstream"),
            StubAdapter::ok("moviebox", vec![moviebox_candidate()]),
        ],
        config(),
    );

    let started = Instant::now();
    let sources = aggregator.resolve_media(&MediaQuery::movie(550)).await;
    let elapsed = started.elapsed();

    // The hanging adapter is cut off at its own deadline; the call never
    // waits for it beyond that.
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
    assert_eq!(sources.len(), 2);
    assert!(sources.iter().any(|s| s.provider == "vidmoly"));
    assert!(sources.iter().any(|s| s.provider == "moviebox"));
}

#[tokio::test]
async fn merge_order_follows_configured_priority_not_completion_order() {
    // moviebox registered first; priority still puts movix's sources first.
    let aggregator = Aggregator::new(
        vec![
            StubAdapter::ok("moviebox", vec![moviebox_candidate()]),
            StubAdapter::ok("movix", vec![vidmoly_candidate()]),
        ],
        config(),
    );

    let sources = aggregator.resolve_media(&MediaQuery::movie(550)).await;
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].provider, "vidmoly");
    assert_eq!(sources[1].provider, "moviebox");
}

#[tokio::test]
async fn end_to_end_example_resolves_two_distinct_normalized_sources() {
    let aggregator = Aggregator::new(
        vec![
            StubAdapter::ok("movix", vec![vidmoly_candidate()]),
            StubAdapter::ok("moviebox", vec![moviebox_candidate()]),
        ],
        config(),
    );

    let sources = aggregator.resolve_media(&MediaQuery::movie(550)).await;

    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].provider, "vidmoly");
    assert_eq!(sources[0].language, Language::Vf);
    assert_eq!(sources[1].provider, "moviebox");
    assert_eq!(sources[1].language, Language::Vo);
    assert!(!sources[0].id.is_empty());
    assert!(!sources[1].id.is_empty());
    assert_ne!(sources[0].id, sources[1].id);
}

#[tokio::test]
async fn sources_outside_the_allowlist_are_dropped() {
    let unknown = RawCandidate {
        url: "https://sketchy.example.com/embed/1".to_string(),
        quality: Some("HD".to_string()),
        provider: Some("sketchy".to_string()),
        ..Default::default()
    };
    let aggregator = Aggregator::new(
        vec![StubAdapter::ok("movix", vec![unknown, vidmoly_candidate()])],
        config(),
    );

    let sources = aggregator.resolve_media(&MediaQuery::movie(550)).await;
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].provider, "vidmoly");
}

#[tokio::test]
async fn all_adapters_failing_yields_empty_not_error() {
    let aggregator = Aggregator::new(
        vec![
            StubAdapter::failing("movix"),
            StubAdapter::failing("moviebox"),
        ],
        config(),
    );

    let sources = aggregator.resolve_media(&MediaQuery::movie(550)).await;
    assert!(sources.is_empty());
}

#[tokio::test]
async fn targeted_resolution_calls_exactly_one_adapter() {
    let aggregator = Aggregator::new(
        vec![
            StubAdapter::hanging("movix"),
            StubAdapter::ok("moviebox", vec![moviebox_candidate()]),
        ],
        config(),
    );

    // The hanging adapter is never touched on the targeted path.
    let started = Instant::now();
    let sources = aggregator
        .resolve_targeted("moviebox", &MediaQuery::episode(1399, 1, 2))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].provider, "moviebox");
}

#[tokio::test]
async fn targeted_resolution_rejects_unknown_provider() {
    let aggregator = Aggregator::new(vec![], config());
    let err = aggregator
        .resolve_targeted("nope", &MediaQuery::movie(550))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::InvalidInput { .. }));
}
