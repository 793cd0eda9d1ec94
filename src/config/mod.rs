use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::HeaderProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub proxy: ProxyConfig,
    pub aggregator: AggregatorConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL of this service, used to recognize already-proxied
    /// URIs during manifest rewriting.
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// SSRF allow-list: hostnames (or parent domains) the proxy may fetch.
    pub allowed_hosts: Vec<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Path under which the manifest/segment proxy is mounted.
    pub base_path: String,
}

impl ProxyConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Wall-clock budget for one resolve call.
    pub overall_deadline_secs: u64,
    /// Budget for a single adapter within that call.
    pub adapter_timeout_secs: u64,
    /// Only sources whose provider is listed here are returned.
    pub provider_allowlist: Vec<String>,
    /// Merge order; adapters earlier in this list come first in responses.
    pub provider_priority: Vec<String>,
}

impl AggregatorConfig {
    /// Per-adapter deadline, clamped so no adapter can outlive the call.
    pub fn adapter_deadline(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs.min(self.overall_deadline_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub movix: MovixConfig,
    pub fstream: FstreamConfig,
    pub moviebox: MovieboxConfig,
    pub afterdark: AfterdarkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovixConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FstreamConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieboxConfig {
    pub base_url: String,
    /// Playback headers the CDN requires (mobile UA + embed-page referer).
    pub profile: HeaderProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfterdarkConfig {
    pub base_url: String,
    /// Relay endpoints tried, in order, before a direct fetch.
    pub relays: Vec<RelayEndpointConfig>,
    /// Playback headers attached to returned sources.
    pub profile: HeaderProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEndpointConfig {
    pub name: String,
    /// Endpoint template; `{url}` is replaced with the urlencoded target.
    pub endpoint: String,
    /// `raw` passes the relay body through; `json-contents` unwraps the
    /// allorigins-style `{"contents": "..."}` envelope.
    pub envelope: String,
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            proxy: ProxyConfig {
                allowed_hosts: vec![
                    "vidmoly.net".to_string(),
                    "vidmoly.to".to_string(),
                    "vmeas.cloud".to_string(),
                    "vmwesa.online".to_string(),
                    "vidzy.org".to_string(),
                    "darkibox.com".to_string(),
                    "hakunaymatata.com".to_string(),
                    "afterdark.mom".to_string(),
                    "proxy.afterdark.click".to_string(),
                    "akamaized.net".to_string(),
                ],
                connect_timeout_secs: 15,
                request_timeout_secs: 30,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                base_path: "/proxy".to_string(),
            },
            aggregator: AggregatorConfig {
                overall_deadline_secs: 20,
                adapter_timeout_secs: 10,
                provider_allowlist: vec![
                    "vidmoly".to_string(),
                    "vidzy".to_string(),
                    "darki".to_string(),
                    "moviebox".to_string(),
                    "afterdark".to_string(),
                    "debug".to_string(),
                ],
                provider_priority: vec![
                    "movix".to_string(),
                    "moviebox".to_string(),
                    "afterdark".to_string(),
                    "fstream".to_string(),
                ],
            },
            providers: ProvidersConfig {
                movix: MovixConfig {
                    base_url: "https://api.movix.site/api".to_string(),
                },
                fstream: FstreamConfig {
                    base_url: "https://api.movix.site/api".to_string(),
                },
                moviebox: MovieboxConfig {
                    base_url: "https://h5.aoneroom.com".to_string(),
                    profile: HeaderProfile {
                        referer: Some("https://fmoviesunblocked.net/".to_string()),
                        origin: Some("https://fmoviesunblocked.net".to_string()),
                        user_agent: Some("okhttp/4.12.0".to_string()),
                        extra: Vec::new(),
                    },
                },
                afterdark: AfterdarkConfig {
                    base_url: "https://afterdark.mom/api/sources".to_string(),
                    relays: vec![
                        RelayEndpointConfig {
                            name: "allorigins".to_string(),
                            endpoint: "https://api.allorigins.win/get?url={url}".to_string(),
                            envelope: "json-contents".to_string(),
                        },
                        RelayEndpointConfig {
                            name: "corsproxy".to_string(),
                            endpoint: "https://corsproxy.io/?{url}".to_string(),
                            envelope: "raw".to_string(),
                        },
                    ],
                    profile: HeaderProfile {
                        referer: Some("https://proxy.afterdark.click/".to_string()),
                        origin: Some("https://proxy.afterdark.click".to_string()),
                        user_agent: Some(DEFAULT_USER_AGENT.to_string()),
                        extra: Vec::new(),
                    },
                },
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.web.port, config.web.port);
        assert_eq!(reparsed.proxy.allowed_hosts, config.proxy.allowed_hosts);
        assert_eq!(
            reparsed.aggregator.provider_priority,
            config.aggregator.provider_priority
        );
    }

    #[test]
    fn adapter_deadline_is_clamped_to_overall() {
        let mut config = Config::default();
        config.aggregator.adapter_timeout_secs = 60;
        config.aggregator.overall_deadline_secs = 20;
        assert_eq!(
            config.aggregator.adapter_deadline(),
            Duration::from_secs(20)
        );
    }
}
