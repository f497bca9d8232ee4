use thiserror::Error;

use crate::verdict::Verdict;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Proxy,
    Read,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Proxy => "proxy",
            Self::Read => "read",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimeoutPhase {
    Transport,
    ResponseBody,
}

impl std::fmt::Display for TimeoutPhase {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Transport => "transport",
            Self::ResponseBody => "response_body",
        };
        formatter.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    WaitForMaxRequired,
    ConflictingExpectedContent,
    InvalidBase64Content,
    ConflictingAddressFamilies,
    SniRequiresHostname,
    MissingTarget,
    InvalidBufferSize,
    InvalidAuthorization,
    InvalidProxyUrl,
    UnsupportedTlsVersion,
    TlsConfig,
    InvalidUri,
    InvalidMethod,
    InvalidHeaderValue,
    RequestBuild,
    Transport,
    Timeout,
    DeadlineExceeded,
    ReadBody,
    BodyBufferFull,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WaitForMaxRequired => "wait_for_max_required",
            Self::ConflictingExpectedContent => "conflicting_expected_content",
            Self::InvalidBase64Content => "invalid_base64_content",
            Self::ConflictingAddressFamilies => "conflicting_address_families",
            Self::SniRequiresHostname => "sni_requires_hostname",
            Self::MissingTarget => "missing_target",
            Self::InvalidBufferSize => "invalid_buffer_size",
            Self::InvalidAuthorization => "invalid_authorization",
            Self::InvalidProxyUrl => "invalid_proxy_url",
            Self::UnsupportedTlsVersion => "unsupported_tls_version",
            Self::TlsConfig => "tls_config",
            Self::InvalidUri => "invalid_uri",
            Self::InvalidMethod => "invalid_method",
            Self::InvalidHeaderValue => "invalid_header_value",
            Self::RequestBuild => "request_build",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::ReadBody => "read_body",
            Self::BodyBufferFull => "body_buffer_full",
        }
    }

    /// Configuration-class codes are detected before any network activity.
    pub const fn is_configuration(self) -> bool {
        matches!(
            self,
            Self::WaitForMaxRequired
                | Self::ConflictingExpectedContent
                | Self::InvalidBase64Content
                | Self::ConflictingAddressFamilies
                | Self::SniRequiresHostname
                | Self::MissingTarget
                | Self::InvalidBufferSize
                | Self::InvalidAuthorization
                | Self::InvalidProxyUrl
                | Self::UnsupportedTlsVersion
                | Self::TlsConfig
                | Self::InvalidUri
                | Self::InvalidMethod
                | Self::InvalidHeaderValue
                | Self::RequestBuild
        )
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("wait-for-max is required when wait-for is enabled")]
    WaitForMaxRequired,
    #[error("Both string and base64-string are specified")]
    ConflictingExpectedContent,
    #[error("Failed decode base64-string: {source}")]
    InvalidBase64Content {
        #[source]
        source: base64::DecodeError,
    },
    #[error("Both tcp4 and tcp6 are specified")]
    ConflictingAddressFamilies,
    #[error("hostname is required when use sni")]
    SniRequiresHostname,
    #[error("Specify either hostname or ipaddress")]
    MissingTarget,
    #[error("Could not parse max-buffer-size: {message}")]
    InvalidBufferSize { value: String, message: String },
    #[error("invalid authorization args")]
    InvalidAuthorization,
    #[error("Error while parsing Proxy URL. Error was: {message}")]
    InvalidProxyUrl { proxy: String, message: String },
    #[error("tls version {version} is not supported by the {backend} backend")]
    UnsupportedTlsVersion {
        version: &'static str,
        backend: &'static str,
    },
    #[error("invalid {backend} tls configuration: {message}")]
    TlsConfig {
        backend: &'static str,
        message: String,
    },
    #[error("invalid request uri: {uri}")]
    InvalidUri { uri: String },
    #[error("invalid http method: {method}")]
    InvalidMethod { method: String },
    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: &'static str,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("failed to build http request: {source}")]
    RequestBuild {
        #[source]
        source: http::Error,
    },
    #[error("{method} {uri}: {kind} error: {detail}")]
    Transport {
        kind: TransportErrorKind,
        method: http::Method,
        uri: String,
        detail: String,
        #[source]
        source: BoxError,
    },
    #[error("{method} {uri}: timed out in {phase} after {timeout_ms}ms")]
    Timeout {
        phase: TimeoutPhase,
        timeout_ms: u128,
        method: http::Method,
        uri: String,
    },
    #[error("check deadline exceeded after {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u128 },
    #[error("{detail}")]
    ReadBody {
        detail: String,
        #[source]
        source: BoxError,
    },
    #[error("could not write body buffer. buffer is full ({limit_bytes} bytes)")]
    BodyBufferFull { limit_bytes: u64 },
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::WaitForMaxRequired => ErrorCode::WaitForMaxRequired,
            Self::ConflictingExpectedContent => ErrorCode::ConflictingExpectedContent,
            Self::InvalidBase64Content { .. } => ErrorCode::InvalidBase64Content,
            Self::ConflictingAddressFamilies => ErrorCode::ConflictingAddressFamilies,
            Self::SniRequiresHostname => ErrorCode::SniRequiresHostname,
            Self::MissingTarget => ErrorCode::MissingTarget,
            Self::InvalidBufferSize { .. } => ErrorCode::InvalidBufferSize,
            Self::InvalidAuthorization => ErrorCode::InvalidAuthorization,
            Self::InvalidProxyUrl { .. } => ErrorCode::InvalidProxyUrl,
            Self::UnsupportedTlsVersion { .. } => ErrorCode::UnsupportedTlsVersion,
            Self::TlsConfig { .. } => ErrorCode::TlsConfig,
            Self::InvalidUri { .. } => ErrorCode::InvalidUri,
            Self::InvalidMethod { .. } => ErrorCode::InvalidMethod,
            Self::InvalidHeaderValue { .. } => ErrorCode::InvalidHeaderValue,
            Self::RequestBuild { .. } => ErrorCode::RequestBuild,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            Self::ReadBody { .. } => ErrorCode::ReadBody,
            Self::BodyBufferFull { .. } => ErrorCode::BodyBufferFull,
        }
    }

    pub const fn verdict(&self) -> Verdict {
        if self.code().is_configuration() {
            Verdict::Unknown
        } else {
            Verdict::Critical
        }
    }
}
