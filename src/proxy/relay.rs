//! Media segment relay.
//!
//! Streams one segment (or direct file) from its origin to the client,
//! forwarding `Range` upstream and a small header set back. Bodies are
//! streamed chunk by chunk; a segment is never buffered whole.

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use tracing::{debug, info};

use crate::errors::SourceError;
use crate::models::HeaderProfile;
use crate::proxy::HostAllowlist;

/// Response headers propagated from the origin. `content-encoding` and
/// `transfer-encoding` are deliberately absent: the relay re-frames the
/// body, and forwarding them would make clients double-decode.
const FORWARDED_HEADERS: [header::HeaderName; 5] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
    header::CACHE_CONTROL,
];

pub struct SegmentRelay {
    client: reqwest::Client,
    allowlist: HostAllowlist,
}

impl SegmentRelay {
    pub fn new(client: reqwest::Client, allowlist: HostAllowlist) -> Self {
        Self { client, allowlist }
    }

    /// Stream `target` back to the client.
    ///
    /// The allow-list check runs before any outbound request. Origin error
    /// statuses are surfaced as [`SourceError::Http`] so the web layer can
    /// relay the origin's own status code.
    pub async fn relay(
        &self,
        target: &str,
        range: Option<&str>,
        profile: &HeaderProfile,
    ) -> Result<Response<Body>, SourceError> {
        let url = self.allowlist.check(target)?;
        debug!(url = %url, range = ?range, "relaying segment");

        let mut request = self.client.get(url).headers(profile.to_header_map());
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::unavailable(target.to_string(), e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url: target.to_string(),
            });
        }

        let mut builder = Response::builder()
            // 200 or 206, as the origin answered.
            .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK))
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .header(
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                "Content-Length, Content-Range, Accept-Ranges",
            );

        for name in FORWARDED_HEADERS {
            if let Some(value) = response.headers().get(&name) {
                builder = builder.header(name.clone(), value.clone());
            }
        }

        let body = Body::from_stream(response.bytes_stream());
        let relayed = builder.body(body).map_err(|e| {
            SourceError::unavailable(target.to_string(), format!("response build failed: {e}"))
        })?;

        info!(url = %target, status = status.as_u16(), "segment relay established");
        Ok(relayed)
    }
}
