use std::error::Error as StdError;
use std::fmt::Write as _;
use std::net::IpAddr;

use crate::error::TransportErrorKind;

/// Splits `host:port` the way socket addresses are written, with IPv6 hosts in
/// brackets. Returns `None` when there is no port component.
pub(crate) fn split_host_port(text: &str) -> Option<(&str, &str)> {
    if let Some(stripped) = text.strip_prefix('[') {
        let end = stripped.find(']')?;
        let host = &stripped[..end];
        let port = stripped[end + 1..].strip_prefix(':')?;
        if port.contains(':') {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = text.rsplit_once(':')?;
    if host.contains(':') || port.contains(']') {
        return None;
    }
    Some((host, port))
}

/// Inverse of [`split_host_port`]; IPv6 literals are bracketed.
pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.parse::<IpAddr>().is_ok_and(|ip| ip.is_ipv6()) {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

pub(crate) const fn default_port(tls: bool) -> u16 {
    if tls { 443 } else { 80 }
}

/// Double-quoted, escaped rendering of arbitrary bytes for result messages.
pub(crate) fn quote_bytes(bytes: &[u8]) -> String {
    let mut quoted = String::with_capacity(bytes.len() + 2);
    quoted.push('"');
    for chunk in bytes.utf8_chunks() {
        for character in chunk.valid().chars() {
            match character {
                '"' => quoted.push_str("\\\""),
                '\\' => quoted.push_str("\\\\"),
                '\n' => quoted.push_str("\\n"),
                '\r' => quoted.push_str("\\r"),
                '\t' => quoted.push_str("\\t"),
                '\u{7}' => quoted.push_str("\\a"),
                '\u{8}' => quoted.push_str("\\b"),
                '\u{c}' => quoted.push_str("\\f"),
                '\u{b}' => quoted.push_str("\\v"),
                control if (control as u32) < 0x20 || control == '\u{7f}' => {
                    let _ = write!(quoted, "\\x{:02x}", control as u32);
                }
                control if control.is_control() => {
                    let _ = write!(quoted, "\\u{:04x}", control as u32);
                }
                printable => quoted.push(printable),
            }
        }
        for byte in chunk.invalid() {
            let _ = write!(quoted, "\\x{byte:02x}");
        }
    }
    quoted.push('"');
    quoted
}

/// `content-type` -> `Content-Type`.
pub(crate) fn canonical_header_name(name: &str) -> String {
    let mut canonical = String::with_capacity(name.len());
    let mut upper_next = true;
    for character in name.chars() {
        if upper_next {
            canonical.push(character.to_ascii_uppercase());
        } else {
            canonical.push(character.to_ascii_lowercase());
        }
        upper_next = character == '-';
    }
    canonical
}

/// Joins an error and its sources with `": "`, skipping repeated text.
pub(crate) fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

pub(crate) fn classify_transport_error(
    error: &hyper_util::client::legacy::Error,
) -> TransportErrorKind {
    let text = error_chain(error).to_ascii_lowercase();
    if error.is_connect() {
        if text.contains("dns")
            || text.contains("name or service not known")
            || text.contains("failed to lookup address")
            || text.contains("no ipv4 address")
            || text.contains("no ipv6 address")
        {
            return TransportErrorKind::Dns;
        }
        if text.contains("proxy") || text.contains("tunnel") {
            return TransportErrorKind::Proxy;
        }
        if text.contains("tls") || text.contains("certificate") || text.contains("handshake") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }

    if text.contains("read")
        || text.contains("connection reset")
        || text.contains("broken pipe")
        || text.contains("unexpected eof")
    {
        return TransportErrorKind::Read;
    }

    TransportErrorKind::Other
}

pub(crate) fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}
