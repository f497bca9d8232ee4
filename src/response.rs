use http::header::TRANSFER_ENCODING;
use http::{HeaderMap, StatusCode, Version};

use crate::util::canonical_header_name;

/// Status line and headers of a received response, detached from its body.
#[derive(Clone, Debug)]
pub struct ResponseHead {
    version: Version,
    status: StatusCode,
    reason: String,
    headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(version: Version, status: StatusCode, headers: HeaderMap) -> Self {
        let reason = status.canonical_reason().unwrap_or_default().to_owned();
        Self {
            version,
            status,
            reason,
            headers,
        }
    }

    /// Keeps a non-canonical reason phrase sent by the server.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub(crate) fn from_response<B>(response: &http::Response<B>) -> Self {
        let head = Self::new(
            response.version(),
            response.status(),
            response.headers().clone(),
        );
        match response.extensions().get::<hyper::ext::ReasonPhrase>() {
            Some(reason) => head.with_reason(String::from_utf8_lossy(reason.as_bytes())),
            None => head,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// `200 OK`
    pub fn status_text(&self) -> String {
        if self.reason.is_empty() {
            self.status.as_str().to_owned()
        } else {
            format!("{} {}", self.status.as_str(), self.reason)
        }
    }

    /// `HTTP/1.1 200 OK`
    pub fn status_line(&self) -> String {
        format!("{:?} {}", self.version, self.status_text())
    }

    /// `Name: value\r\n` per header value, names canonicalised and sorted.
    /// Transfer-Encoding is framing, not a header of the message, and is left
    /// out.
    pub fn header_lines(&self) -> String {
        let mut lines = self
            .headers
            .iter()
            .filter(|(name, _)| **name != TRANSFER_ENCODING)
            .map(|(name, value)| {
                (
                    canonical_header_name(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect::<Vec<_>>();
        lines.sort_by(|left, right| left.0.cmp(&right.0));

        let mut text = String::new();
        for (name, value) in lines {
            text.push_str(&name);
            text.push_str(": ");
            text.push_str(&value);
            text.push_str("\r\n");
        }
        text
    }

    pub(crate) fn dump(&self) -> String {
        format!("{}\r\n{}\r\n", self.status_line(), self.header_lines())
    }
}
