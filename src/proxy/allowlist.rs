//! SSRF host allow-list.
//!
//! The proxy only ever fetches from hosts on this list. The check runs
//! before any outbound request is made, so a rejected target never touches
//! the network layer.

use url::Url;

use crate::errors::SourceError;

#[derive(Debug, Clone)]
pub struct HostAllowlist {
    hosts: Vec<String>,
}

impl HostAllowlist {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts: hosts.into_iter().map(|h| h.to_lowercase()).collect(),
        }
    }

    /// A host is allowed when it equals an entry or is a subdomain of one.
    pub fn is_allowed_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.hosts
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
    }

    /// Parse and vet a target URL. Only http(s) targets with an allowed
    /// host pass.
    pub fn check(&self, target: &str) -> Result<Url, SourceError> {
        let url = Url::parse(target).map_err(|_| SourceError::SsrfRejected {
            host: target.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SourceError::SsrfRejected {
                host: target.to_string(),
            });
        }
        match url.host_str() {
            Some(host) if self.is_allowed_host(host) => Ok(url),
            Some(host) => Err(SourceError::SsrfRejected {
                host: host.to_string(),
            }),
            None => Err(SourceError::SsrfRejected {
                host: target.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist() -> HostAllowlist {
        HostAllowlist::new(vec![
            "vidmoly.net".to_string(),
            "hakunaymatata.com".to_string(),
        ])
    }

    #[test]
    fn exact_and_subdomain_hosts_are_allowed() {
        let list = allowlist();
        assert!(list.is_allowed_host("vidmoly.net"));
        assert!(list.is_allowed_host("VIDMOLY.NET"));
        assert!(list.is_allowed_host("valiw.hakunaymatata.com"));
    }

    #[test]
    fn lookalike_hosts_are_rejected() {
        let list = allowlist();
        assert!(!list.is_allowed_host("evilvidmoly.net"));
        assert!(!list.is_allowed_host("vidmoly.net.attacker.io"));
        assert!(!list.is_allowed_host("internal-service"));
    }

    #[test]
    fn check_rejects_non_http_schemes_and_bad_urls() {
        let list = allowlist();
        assert!(matches!(
            list.check("file:///etc/passwd"),
            Err(SourceError::SsrfRejected { .. })
        ));
        assert!(matches!(
            list.check("not a url"),
            Err(SourceError::SsrfRejected { .. })
        ));
        assert!(list.check("https://vidmoly.net/embed-a.html").is_ok());
    }
}
