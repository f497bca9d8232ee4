//! Command-line flags of the `check_http` binary.

use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind;

use crate::config::{CheckConfig, TlsVersion};
use crate::error::Error;
use crate::verdict::{CheckReport, Verdict};

#[derive(Debug, Clone, Parser)]
#[command(name = "check_http", version, about = "Monitoring-plugin style HTTP(S) check")]
pub struct CheckHttpArgs {
    /// Timeout to wait for connection
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Max buffer size to read response body
    #[arg(long, default_value = "1MB")]
    pub max_buffer_size: String,

    /// Raise error when the response body is larger then max-buffer-size
    #[arg(long)]
    pub no_discard: bool,

    /// Number of consecutive successful requests required
    #[arg(long, default_value_t = 1)]
    pub consecutive: u32,

    /// Interval time after successful request for consecutive mode
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub interim: Duration,

    /// Retry until successful when enabled
    #[arg(long)]
    pub wait_for: bool,

    /// Retry interval
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    pub wait_for_interval: Duration,

    /// Time to wait for success
    #[arg(long, value_parser = humantime::parse_duration)]
    pub wait_for_max: Option<Duration>,

    /// Host name using Host headers
    #[arg(short = 'H', long)]
    pub hostname: Option<String>,

    /// IP address or Host name
    #[arg(short = 'I', long = "IP-address")]
    pub ip_address: Option<String>,

    /// Port number
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Set HTTP Method
    #[arg(short = 'j', long, default_value = "GET")]
    pub method: String,

    /// URI to request
    #[arg(short, long, default_value = "/")]
    pub uri: String,

    /// Comma-delimited list of expected HTTP response status
    #[arg(short, long)]
    pub expect: Option<String>,

    /// String to expect in the content
    #[arg(short = 's', long = "string")]
    pub expect_content: Option<String>,

    /// Base64 Encoded string to expect the content
    #[arg(long = "base64-string")]
    pub base64_expect_content: Option<String>,

    /// UserAgent to be sent
    #[arg(short = 'A', long = "useragent", default_value = "check_http")]
    pub user_agent: String,

    /// username:password on sites with basic authentication
    #[arg(short, long)]
    pub authorization: Option<String>,

    /// Use https
    #[arg(short = 'S', long)]
    pub ssl: bool,

    /// Enable SNI
    #[arg(long)]
    pub sni: bool,

    /// TLS version to pin: 1.0, 1.1, 1.2 or 1.3
    #[arg(long = "tls-max", value_parser = parse_tls_version)]
    pub tls_max: Option<TlsVersion>,

    /// Use tcp4 only
    #[arg(short = '4')]
    pub tcp4: bool,

    /// Use tcp6 only
    #[arg(short = '6')]
    pub tcp6: bool,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Proxy that should be used
    #[arg(long)]
    pub proxy: Option<String>,
}

impl CheckHttpArgs {
    pub fn into_config(self) -> Result<CheckConfig, Error> {
        let max_buffer_size =
            parse_byte_size(&self.max_buffer_size).map_err(|message| Error::InvalidBufferSize {
                value: self.max_buffer_size.clone(),
                message,
            })?;

        let mut builder = CheckConfig::builder()
            .timeout(self.timeout)
            .max_buffer_size(max_buffer_size)
            .no_discard(self.no_discard)
            .consecutive(self.consecutive)
            .interim(self.interim)
            .wait_for(self.wait_for)
            .wait_for_interval(self.wait_for_interval)
            .method(self.method)
            .uri(self.uri)
            .user_agent(self.user_agent)
            .tls(self.ssl)
            .sni(self.sni)
            .ipv4_only(self.tcp4)
            .ipv6_only(self.tcp6)
            .verbose(self.verbose);

        if let Some(wait_for_max) = self.wait_for_max {
            builder = builder.wait_for_max(wait_for_max);
        }
        if let Some(hostname) = self.hostname {
            builder = builder.hostname(hostname);
        }
        if let Some(ip_address) = self.ip_address {
            builder = builder.ip_address(ip_address);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(expect) = self.expect {
            builder = builder.expect(expect);
        }
        if let Some(expected) = self.expect_content {
            builder = builder.expected_string(expected);
        }
        if let Some(encoded) = self.base64_expect_content {
            builder = builder.expected_base64(encoded);
        }
        if let Some(authorization) = self.authorization {
            builder = builder.authorization(authorization);
        }
        if let Some(tls_max) = self.tls_max {
            builder = builder.tls_max(tls_max);
        }
        if let Some(proxy) = self.proxy {
            builder = builder.proxy(proxy);
        }

        builder.try_build()
    }
}

/// Report for a command line that did not parse. Only `--version` counts as
/// success; help output exits UNKNOWN like any other usage error.
pub fn parse_failure_report(error: &clap::Error) -> CheckReport {
    let verdict = match error.kind() {
        ErrorKind::DisplayVersion => Verdict::Ok,
        _ => Verdict::Unknown,
    };
    CheckReport::new(verdict, error.to_string().trim_end())
}

fn parse_tls_version(text: &str) -> Result<TlsVersion, String> {
    text.parse()
}

/// Parses humanized byte sizes: `1MB` is 1 000 000 bytes, `1MiB` is
/// 1 048 576, a bare number is bytes. Units are case-insensitive and may be
/// separated from the number by spaces.
pub fn parse_byte_size(text: &str) -> Result<u64, String> {
    let trimmed = text.trim();
    let split_at = trimmed
        .find(|character: char| !(character.is_ascii_digit() || character == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split_at);
    if number.is_empty() {
        return Err(format!("invalid size {trimmed:?}: missing number"));
    }
    let value = number
        .parse::<f64>()
        .map_err(|error| format!("invalid size {trimmed:?}: {error}"))?;

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "ki" | "kib" => 1 << 10,
        "m" | "mb" => 1_000_000,
        "mi" | "mib" => 1 << 20,
        "g" | "gb" => 1_000_000_000,
        "gi" | "gib" => 1 << 30,
        "t" | "tb" => 1_000_000_000_000,
        "ti" | "tib" => 1 << 40,
        "p" | "pb" => 1_000_000_000_000_000,
        "pi" | "pib" => 1 << 50,
        "e" | "eb" => 1_000_000_000_000_000_000,
        "ei" | "eib" => 1 << 60,
        other => return Err(format!("unhandled size name: {other}")),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(format!("too large: {trimmed}"));
    }
    Ok(bytes as u64)
}
