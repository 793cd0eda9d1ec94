//! Provider adapters.
//!
//! One adapter per upstream source. Each adapter owns its upstream's query
//! shape, response shape, and header requirements; none of them may leak a
//! failure into another adapter's results. The aggregator treats every
//! adapter error as an empty contribution.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::SourceCache;
use crate::config::Config;
use crate::errors::SourceError;
use crate::fallback::FallbackChain;
use crate::models::{MediaQuery, RawCandidate};

pub mod afterdark;
pub mod fstream;
pub mod moviebox;
pub mod movix;

pub use afterdark::AfterdarkAdapter;
pub use fstream::FstreamAdapter;
pub use moviebox::MovieboxAdapter;
pub use movix::MovixAdapter;

/// One upstream streaming source.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Canonical adapter name; also used for targeted resolution and as the
    /// priority key during merging.
    fn name(&self) -> &str;

    /// Query the upstream for raw candidates.
    ///
    /// Implementations must not panic; any failure is returned as a
    /// [`SourceError`] and isolated by the aggregator.
    async fn fetch_sources(&self, query: &MediaQuery) -> Result<Vec<RawCandidate>, SourceError>;
}

/// Build the full adapter set from configuration.
///
/// The shared client carries the connect/request timeouts and the default
/// browser user agent; adapters layer their own header profiles on top per
/// request.
pub fn build_adapters(
    config: &Config,
    client: reqwest::Client,
    cache: Arc<dyn SourceCache>,
) -> Vec<Arc<dyn ProviderAdapter>> {
    let chain = FallbackChain::new(client.clone(), config.proxy.request_timeout());
    vec![
        Arc::new(MovixAdapter::new(
            client.clone(),
            config.providers.movix.base_url.clone(),
        )),
        Arc::new(MovieboxAdapter::new(
            client.clone(),
            config.providers.moviebox.clone(),
        )),
        Arc::new(AfterdarkAdapter::new(
            chain,
            config.providers.afterdark.clone(),
            config.proxy.user_agent.clone(),
        )),
        Arc::new(FstreamAdapter::new(
            client,
            config.providers.fstream.base_url.clone(),
            cache,
        )),
    ]
}

/// Build the shared upstream HTTP client.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.proxy.user_agent.clone())
        .connect_timeout(config.proxy.connect_timeout())
        .timeout(config.proxy.request_timeout())
        .build()
}
