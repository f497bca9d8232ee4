use std::net::IpAddr;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Error;
use crate::util::{default_port, split_host_port};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BUFFER_SIZE: u64 = 1_000_000;
const DEFAULT_CONSECUTIVE: u32 = 1;
const DEFAULT_INTERIM: Duration = Duration::from_secs(1);
const DEFAULT_WAIT_FOR_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_METHOD: &str = "GET";
const DEFAULT_URI: &str = "/";
const DEFAULT_USER_AGENT: &str = "check_http";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AddressFamily {
    #[default]
    Any,
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn admits(self, ip: IpAddr) -> bool {
        match self {
            Self::Any => true,
            Self::Ipv4 => ip.is_ipv4(),
            Self::Ipv6 => ip.is_ipv6(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "tcp",
            Self::Ipv4 => "tcp4",
            Self::Ipv6 => "tcp6",
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsVersion {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tls10 => "1.0",
            Self::Tls11 => "1.1",
            Self::Tls12 => "1.2",
            Self::Tls13 => "1.3",
        }
    }
}

impl std::str::FromStr for TlsVersion {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "1.0" => Ok(Self::Tls10),
            "1.1" => Ok(Self::Tls11),
            "1.2" => Ok(Self::Tls12),
            "1.3" => Ok(Self::Tls13),
            other => Err(format!("unsupported tls version: {other}")),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl BasicCredentials {
    /// Splits `user:pass` at the first colon; the password may contain colons.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let (username, password) = text.split_once(':').ok_or(Error::InvalidAuthorization)?;
        Ok(Self {
            username: username.to_owned(),
            password: password.to_owned(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub(crate) fn header_value(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {encoded}")
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated, immutable settings for one run.
///
/// `hostname` is the Host header value (it may carry a port) and
/// `ip_address` is where connections are actually opened.
#[derive(Clone, Debug)]
pub struct CheckConfig {
    hostname: String,
    ip_address: String,
    port: u16,
    tls: bool,
    method: String,
    uri: String,
    timeout: Duration,
    max_buffer_size: u64,
    no_discard: bool,
    expect: Option<String>,
    expected_content: Option<Vec<u8>>,
    user_agent: String,
    credentials: Option<BasicCredentials>,
    sni: bool,
    tls_max: Option<TlsVersion>,
    address_family: AddressFamily,
    proxy: Option<String>,
    consecutive: u32,
    interim: Duration,
    wait_for: bool,
    wait_for_interval: Duration,
    wait_for_max: Option<Duration>,
    verbose: bool,
}

impl CheckConfig {
    pub fn builder() -> CheckConfigBuilder {
        CheckConfigBuilder::new()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls { "https" } else { "http" }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }

    pub fn no_discard(&self) -> bool {
        self.no_discard
    }

    pub fn expect(&self) -> Option<&str> {
        self.expect.as_deref()
    }

    pub fn expected_content(&self) -> Option<&[u8]> {
        self.expected_content.as_deref()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn credentials(&self) -> Option<&BasicCredentials> {
        self.credentials.as_ref()
    }

    pub fn sni(&self) -> bool {
        self.sni
    }

    pub fn tls_max(&self) -> Option<TlsVersion> {
        self.tls_max
    }

    pub fn address_family(&self) -> AddressFamily {
        self.address_family
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn interim(&self) -> Duration {
        self.interim
    }

    pub fn wait_for(&self) -> bool {
        self.wait_for
    }

    pub fn wait_for_interval(&self) -> Duration {
        self.wait_for_interval
    }

    pub fn wait_for_max(&self) -> Option<Duration> {
        self.wait_for_max
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Clone, Debug)]
pub struct CheckConfigBuilder {
    hostname: Option<String>,
    ip_address: Option<String>,
    port: Option<u16>,
    tls: bool,
    method: String,
    uri: String,
    timeout: Duration,
    max_buffer_size: u64,
    no_discard: bool,
    expect: Option<String>,
    expected_string: Option<String>,
    expected_base64: Option<String>,
    user_agent: String,
    authorization: Option<String>,
    sni: bool,
    tls_max: Option<TlsVersion>,
    ipv4_only: bool,
    ipv6_only: bool,
    proxy: Option<String>,
    consecutive: u32,
    interim: Duration,
    wait_for: bool,
    wait_for_interval: Duration,
    wait_for_max: Option<Duration>,
    verbose: bool,
}

impl Default for CheckConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckConfigBuilder {
    pub fn new() -> Self {
        Self {
            hostname: None,
            ip_address: None,
            port: None,
            tls: false,
            method: DEFAULT_METHOD.to_owned(),
            uri: DEFAULT_URI.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            no_discard: false,
            expect: None,
            expected_string: None,
            expected_base64: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            authorization: None,
            sni: false,
            tls_max: None,
            ipv4_only: false,
            ipv6_only: false,
            proxy: None,
            consecutive: DEFAULT_CONSECUTIVE,
            interim: DEFAULT_INTERIM,
            wait_for: false,
            wait_for_interval: DEFAULT_WAIT_FOR_INTERVAL,
            wait_for_max: None,
            verbose: false,
        }
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_buffer_size(mut self, max_buffer_size: u64) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    pub fn no_discard(mut self, no_discard: bool) -> Self {
        self.no_discard = no_discard;
        self
    }

    pub fn expect(mut self, expect: impl Into<String>) -> Self {
        self.expect = Some(expect.into());
        self
    }

    pub fn expected_string(mut self, expected: impl Into<String>) -> Self {
        self.expected_string = Some(expected.into());
        self
    }

    pub fn expected_base64(mut self, encoded: impl Into<String>) -> Self {
        self.expected_base64 = Some(encoded.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }

    pub fn sni(mut self, sni: bool) -> Self {
        self.sni = sni;
        self
    }

    pub fn tls_max(mut self, tls_max: TlsVersion) -> Self {
        self.tls_max = Some(tls_max);
        self
    }

    pub fn ipv4_only(mut self, ipv4_only: bool) -> Self {
        self.ipv4_only = ipv4_only;
        self
    }

    pub fn ipv6_only(mut self, ipv6_only: bool) -> Self {
        self.ipv6_only = ipv6_only;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn consecutive(mut self, consecutive: u32) -> Self {
        self.consecutive = consecutive;
        self
    }

    pub fn interim(mut self, interim: Duration) -> Self {
        self.interim = interim;
        self
    }

    pub fn wait_for(mut self, wait_for: bool) -> Self {
        self.wait_for = wait_for;
        self
    }

    pub fn wait_for_interval(mut self, wait_for_interval: Duration) -> Self {
        self.wait_for_interval = wait_for_interval;
        self
    }

    pub fn wait_for_max(mut self, wait_for_max: Duration) -> Self {
        self.wait_for_max = Some(wait_for_max);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn try_build(self) -> Result<CheckConfig, Error> {
        let wait_for_max = self.wait_for_max.filter(|max| !max.is_zero());
        if self.wait_for && wait_for_max.is_none() {
            return Err(Error::WaitForMaxRequired);
        }

        let expected_content = match (
            non_empty(self.expected_string),
            non_empty(self.expected_base64),
        ) {
            (Some(_), Some(_)) => return Err(Error::ConflictingExpectedContent),
            (Some(text), None) => Some(text.into_bytes()),
            (None, Some(encoded)) => Some(
                STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|source| Error::InvalidBase64Content { source })?,
            ),
            (None, None) => None,
        }
        .filter(|content| !content.is_empty());

        let address_family = match (self.ipv4_only, self.ipv6_only) {
            (true, true) => return Err(Error::ConflictingAddressFamilies),
            (true, false) => AddressFamily::Ipv4,
            (false, true) => AddressFamily::Ipv6,
            (false, false) => AddressFamily::Any,
        };

        let hostname = non_empty(self.hostname);
        if self.sni && hostname.is_none() {
            return Err(Error::SniRequiresHostname);
        }

        let (hostname, ip_address) = match (hostname, non_empty(self.ip_address)) {
            (None, None) => return Err(Error::MissingTarget),
            (Some(hostname), Some(ip_address)) => (hostname, ip_address),
            (None, Some(ip_address)) => (ip_address.clone(), ip_address),
            (Some(hostname), None) => {
                let ip_address = split_host_port(&hostname)
                    .map_or_else(|| hostname.clone(), |(host, _)| host.to_owned());
                (hostname, ip_address)
            }
        };

        let port = self
            .port
            .filter(|port| *port != 0)
            .or_else(|| {
                split_host_port(&hostname)
                    .and_then(|(_, port)| port.parse::<u16>().ok())
                    .filter(|port| *port != 0)
            })
            .unwrap_or(default_port(self.tls));

        let credentials = non_empty(self.authorization)
            .map(|text| BasicCredentials::parse(&text))
            .transpose()?;

        let uri = if self.uri.is_empty() {
            DEFAULT_URI.to_owned()
        } else {
            self.uri
        };

        Ok(CheckConfig {
            hostname,
            ip_address,
            port,
            tls: self.tls,
            method: self.method,
            uri,
            timeout: self.timeout,
            max_buffer_size: self.max_buffer_size,
            no_discard: self.no_discard,
            expect: non_empty(self.expect),
            expected_content,
            user_agent: self.user_agent,
            credentials,
            sni: self.sni,
            tls_max: self.tls_max,
            address_family,
            proxy: non_empty(self.proxy),
            consecutive: self.consecutive,
            interim: self.interim,
            wait_for: self.wait_for,
            wait_for_interval: self.wait_for_interval,
            wait_for_max,
            verbose: self.verbose,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}
