//! Manifest rewriting and segment relay.
//!
//! Everything a player fetches for a chosen source flows through here so it
//! never talks to third-party origins directly: playlists are rewritten to
//! point back at the proxy, segments are streamed through with the headers
//! the origin demands.

pub mod allowlist;
pub mod relay;
pub mod rewriter;

pub use allowlist::HostAllowlist;
pub use relay::SegmentRelay;
pub use rewriter::{ManifestRewriteContext, ManifestRewriter, RewrittenManifest};
