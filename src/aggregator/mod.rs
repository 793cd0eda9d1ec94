//! Source aggregation.
//!
//! Fans a media query out to every adapter concurrently, merges whatever
//! came back in configured priority order, and filters the result against
//! the provider allow-list. A failing or hanging adapter never fails the
//! call; it just contributes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::AggregatorConfig;
use crate::errors::SourceError;
use crate::models::{MediaQuery, StreamingSource};
use crate::normalize::{normalize, AdapterContext};
use crate::providers::ProviderAdapter;

pub struct Aggregator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, config: AggregatorConfig) -> Self {
        Self { adapters, config }
    }

    /// Resolve sources for a media item across all adapters.
    ///
    /// Each adapter runs under its own deadline (clamped to the overall
    /// call budget); dropping a timed-out future cancels the in-flight
    /// request and releases the connection.
    pub async fn resolve_media(&self, query: &MediaQuery) -> Vec<StreamingSource> {
        let deadline = self.config.adapter_deadline();

        let tasks = self.adapters.iter().map(|adapter| {
            let adapter = adapter.clone();
            async move {
                let name = adapter.name().to_string();
                match tokio::time::timeout(deadline, adapter.fetch_sources(query)).await {
                    Ok(Ok(candidates)) => {
                        debug!(adapter = %name, count = candidates.len(), "adapter completed");
                        (name, candidates)
                    }
                    Ok(Err(err)) => {
                        warn!(adapter = %name, error = %err, "adapter failed; contributing nothing");
                        (name, Vec::new())
                    }
                    Err(_) => {
                        warn!(
                            adapter = %name,
                            seconds = deadline.as_secs(),
                            "adapter timed out; contributing nothing"
                        );
                        (name, Vec::new())
                    }
                }
            }
        });

        let mut by_adapter: HashMap<String, Vec<StreamingSource>> = join_all(tasks)
            .await
            .into_iter()
            .map(|(name, candidates)| {
                let ctx = AdapterContext { adapter: &name };
                let sources = candidates
                    .into_iter()
                    .map(|raw| normalize(raw, &ctx))
                    .collect();
                (name, sources)
            })
            .collect();

        let merged = self.merge_in_priority_order(&mut by_adapter);
        let filtered = self.filter_allowed(merged);
        info!(
            tmdb_id = query.tmdb_id,
            count = filtered.len(),
            "media resolution complete"
        );
        filtered
    }

    /// Resolve through exactly one adapter, skipping the fan-out. Used for
    /// episode prefetch where latency matters more than coverage.
    pub async fn resolve_targeted(
        &self,
        provider_name: &str,
        query: &MediaQuery,
    ) -> Result<Vec<StreamingSource>, SourceError> {
        let adapter = self
            .adapters
            .iter()
            .find(|adapter| adapter.name() == provider_name)
            .ok_or_else(|| {
                SourceError::invalid_input(format!("unknown provider: {provider_name}"))
            })?;

        let deadline = self.config.adapter_deadline();
        let candidates = tokio::time::timeout(deadline, adapter.fetch_sources(query))
            .await
            .map_err(|_| SourceError::timeout(provider_name.to_string(), deadline.as_secs()))??;

        let ctx = AdapterContext {
            adapter: adapter.name(),
        };
        let sources = candidates
            .into_iter()
            .map(|raw| normalize(raw, &ctx))
            .collect();
        Ok(self.filter_allowed(sources))
    }

    /// Concatenate per-adapter results following the configured precedence
    /// list; adapters missing from the list keep registration order after
    /// the prioritized ones. Downstream UIs treat list order as the
    /// default-selection signal.
    fn merge_in_priority_order(
        &self,
        by_adapter: &mut HashMap<String, Vec<StreamingSource>>,
    ) -> Vec<StreamingSource> {
        let mut merged = Vec::new();
        for name in &self.config.provider_priority {
            if let Some(sources) = by_adapter.remove(name) {
                merged.extend(sources);
            }
        }
        for adapter in &self.adapters {
            if let Some(sources) = by_adapter.remove(adapter.name()) {
                merged.extend(sources);
            }
        }
        merged
    }

    fn filter_allowed(&self, sources: Vec<StreamingSource>) -> Vec<StreamingSource> {
        sources
            .into_iter()
            .filter(|source| {
                let allowed = self
                    .config
                    .provider_allowlist
                    .iter()
                    .any(|provider| provider == &source.provider);
                if !allowed {
                    debug!(provider = %source.provider, "dropping source outside allow-list");
                }
                allowed
            })
            .collect()
    }
}
