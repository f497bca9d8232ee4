use std::net::IpAddr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::Uri;
use http::header::HeaderValue;
use tracing::warn;
use url::Url;

use crate::config::CheckConfig;
use crate::error::Error;
use crate::util::{join_host_port, split_host_port};

#[derive(Clone, Debug)]
pub(crate) struct ProxyConfig {
    pub(crate) uri: Uri,
    pub(crate) authorization: Option<HeaderValue>,
    pub(crate) no_proxy_rules: Vec<NoProxyRule>,
    pub(crate) bypass_loopback: bool,
}

impl ProxyConfig {
    pub(crate) fn should_bypass(&self, uri: &Uri) -> bool {
        let Some(host) = uri.host() else {
            return false;
        };
        let host = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();
        if self.bypass_loopback && is_loopback(&host) {
            return true;
        }
        let port = uri.port_u16();
        self.no_proxy_rules
            .iter()
            .any(|rule| rule.matches(&host, port))
    }
}

fn is_loopback(host: &str) -> bool {
    host == "localhost"
        || host
            .parse::<IpAddr>()
            .is_ok_and(|address| address.is_loopback())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum NoProxyRule {
    Any,
    Domain { host: String, port: Option<u16> },
}

impl NoProxyRule {
    pub(crate) fn parse(text: &str) -> Option<Self> {
        let candidate = text.trim();
        if candidate.is_empty() {
            return None;
        }
        if candidate == "*" {
            return Some(Self::Any);
        }
        let candidate = candidate.trim_start_matches("*.").trim_start_matches('.');
        let (host, port) = match split_host_port(candidate) {
            Some((host, port)) => (host, Some(port.parse::<u16>().ok()?)),
            None => (
                candidate.trim_start_matches('[').trim_end_matches(']'),
                None,
            ),
        };
        if host.is_empty() {
            return None;
        }
        Some(Self::Domain {
            host: host.to_ascii_lowercase(),
            port,
        })
    }

    pub(crate) fn matches(&self, host: &str, port: Option<u16>) -> bool {
        match self {
            Self::Any => true,
            Self::Domain {
                host: domain,
                port: rule_port,
            } => {
                let host_matches = host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'));
                host_matches && rule_port.is_none_or(|rule_port| port == Some(rule_port))
            }
        }
    }
}

pub(crate) fn parse_no_proxy_rules(text: &str) -> Vec<NoProxyRule> {
    text.split(',').filter_map(NoProxyRule::parse).collect()
}

pub(crate) fn parse_proxy_url(text: &str) -> Result<ProxyConfig, Error> {
    let invalid = |message: String| Error::InvalidProxyUrl {
        proxy: text.to_owned(),
        message,
    };

    let url = Url::parse(text).map_err(|source| invalid(source.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(format!(
            "unsupported proxy scheme {}",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| invalid("missing proxy host".to_owned()))?;
    let port = url.port_or_known_default().unwrap_or(80);
    let uri = format!("http://{}", join_host_port(host, port))
        .parse::<Uri>()
        .map_err(|source| invalid(source.to_string()))?;

    let authorization = if url.username().is_empty() {
        None
    } else {
        let credentials = format!("{}:{}", url.username(), url.password().unwrap_or_default());
        let mut value = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(credentials)))
            .map_err(|source| invalid(source.to_string()))?;
        value.set_sensitive(true);
        Some(value)
    };

    Ok(ProxyConfig {
        uri,
        authorization,
        no_proxy_rules: Vec::new(),
        bypass_loopback: false,
    })
}

/// Reads `HTTPS_PROXY`/`HTTP_PROXY` (either case) and `NO_PROXY`. A malformed
/// environment proxy is ignored rather than failing the check.
pub(crate) fn proxy_from_env<F>(tls: bool, lookup: F) -> Option<ProxyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let names: &[&str] = if tls {
        &["HTTPS_PROXY", "https_proxy"]
    } else {
        &["HTTP_PROXY", "http_proxy"]
    };
    let raw = names
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())?;
    let raw = if raw.contains("://") {
        raw
    } else {
        format!("http://{raw}")
    };

    let mut proxy = match parse_proxy_url(&raw) {
        Ok(proxy) => proxy,
        Err(error) => {
            warn!(%error, "ignoring proxy from environment");
            return None;
        }
    };
    proxy.no_proxy_rules = ["NO_PROXY", "no_proxy"]
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty())
        .map(|value| parse_no_proxy_rules(&value))
        .unwrap_or_default();
    proxy.bypass_loopback = true;
    Some(proxy)
}

/// An explicit proxy URL wins over the environment.
pub(crate) fn select_proxy(config: &CheckConfig) -> Result<Option<ProxyConfig>, Error> {
    match config.proxy() {
        Some(explicit) => parse_proxy_url(explicit).map(Some),
        None => Ok(proxy_from_env(config.tls(), |name| std::env::var(name).ok())),
    }
}
