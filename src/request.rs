use http::header::{AUTHORIZATION, HOST, HeaderValue, USER_AGENT};
use http::uri::Authority;
use http::{Method, Request, Uri};

use crate::body::{ReqBody, empty_req_body};
use crate::config::CheckConfig;
use crate::error::Error;
use crate::util::canonical_header_name;

pub(crate) fn target_uri(config: &CheckConfig) -> String {
    format!("{}://{}{}", config.scheme(), config.hostname(), config.uri())
}

/// Builds the single probe request. The URI authority is the configured
/// hostname so the Host header follows it; where the connection goes is
/// decided by the connector.
pub fn build_request(config: &CheckConfig) -> Result<Request<ReqBody>, Error> {
    let uri_text = target_uri(config);
    let uri = uri_text
        .parse::<Uri>()
        .map_err(|_| Error::InvalidUri { uri: uri_text })?;
    let method =
        Method::from_bytes(config.method().as_bytes()).map_err(|_| Error::InvalidMethod {
            method: config.method().to_owned(),
        })?;

    let mut request_builder = Request::builder().method(method).uri(uri);

    if let Some(credentials) = config.credentials() {
        let mut value = HeaderValue::from_str(&credentials.header_value()).map_err(|source| {
            Error::InvalidHeaderValue {
                name: "authorization",
                source,
            }
        })?;
        value.set_sensitive(true);
        request_builder = request_builder.header(AUTHORIZATION, value);
    }

    let user_agent =
        HeaderValue::from_str(config.user_agent()).map_err(|source| Error::InvalidHeaderValue {
            name: "user-agent",
            source,
        })?;
    request_builder = request_builder.header(USER_AGENT, user_agent);

    request_builder
        .body(empty_req_body())
        .map_err(|source| Error::RequestBuild { source })
}

/// Points the request URI at `authority` while the Host header keeps the
/// authority the request was built with.
pub(crate) fn retarget_authority<B>(
    request: Request<B>,
    authority: &Authority,
) -> Result<Request<B>, Error> {
    let (mut parts, body) = request.into_parts();
    if !parts.headers.contains_key(HOST) {
        if let Some(host) = parts.uri.authority() {
            let value = HeaderValue::from_str(host.as_str()).map_err(|source| {
                Error::InvalidHeaderValue {
                    name: "host",
                    source,
                }
            })?;
            parts.headers.insert(HOST, value);
        }
    }
    let mut uri_parts = std::mem::take(&mut parts.uri).into_parts();
    uri_parts.authority = Some(authority.clone());
    parts.uri = Uri::from_parts(uri_parts).map_err(|_| Error::InvalidUri {
        uri: authority.to_string(),
    })?;
    Ok(Request::from_parts(parts, body))
}

pub(crate) fn dump_request<B>(request: &Request<B>) -> String {
    let path = request
        .uri()
        .path_and_query()
        .map_or("/", |path_and_query| path_and_query.as_str());
    let mut dump = format!("{} {} {:?}\r\n", request.method(), path, request.version());
    if let Some(authority) = request.uri().authority() {
        dump.push_str("Host: ");
        dump.push_str(authority.as_str());
        dump.push_str("\r\n");
    }
    for (name, value) in request.headers() {
        let value = if value.is_sensitive() {
            "<redacted>".into()
        } else {
            String::from_utf8_lossy(value.as_bytes())
        };
        dump.push_str(&canonical_header_name(name.as_str()));
        dump.push_str(": ");
        dump.push_str(&value);
        dump.push_str("\r\n");
    }
    dump.push_str("\r\n");
    dump
}
