//! Web layer module
//!
//! HTTP interface for the source-proxy application: thin handlers that
//! delegate to the aggregator and the proxy services, permissive CORS for
//! browser-based players, and consistent JSON error bodies.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::aggregator::Aggregator;
use crate::cache::MemoryCache;
use crate::config::Config;
use crate::providers::{build_adapters, build_http_client};
use crate::proxy::{HostAllowlist, ManifestRewriter, SegmentRelay};
use crate::utils::UrlUtils;

pub mod handlers;
pub mod responses;

pub use responses::SourcesResponse;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub aggregator: Arc<Aggregator>,
    pub rewriter: Arc<ManifestRewriter>,
    pub relay: Arc<SegmentRelay>,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: Config) -> Result<Self> {
        let client = build_http_client(&config)?;
        let cache = Arc::new(MemoryCache::new());
        let adapters = build_adapters(&config, client.clone(), cache);
        let aggregator = Arc::new(Aggregator::new(adapters, config.aggregator.clone()));

        let allowlist = HostAllowlist::new(config.proxy.allowed_hosts.clone());
        let public_host = UrlUtils::extract_host(&config.web.base_url);
        let rewriter = Arc::new(ManifestRewriter::new(
            client.clone(),
            allowlist.clone(),
            config.proxy.base_path.clone(),
            public_host,
        ));
        let relay = Arc::new(SegmentRelay::new(client, allowlist));

        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        let state = AppState {
            config: Arc::new(config),
            aggregator,
            rewriter,
            relay,
        };

        Ok(Self {
            app: Self::create_router(state),
            addr,
        })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/sources", get(handlers::get_sources))
            .route("/sources/:provider", get(handlers::get_targeted_sources))
            .route("/proxy", get(handlers::proxy))
            // Players are browser-based; preflight and cross-origin reads
            // must always succeed.
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}
