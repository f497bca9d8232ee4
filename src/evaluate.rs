use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{debug, info};

use crate::body::{CappedSink, read_body_capped};
use crate::config::CheckConfig;
use crate::error::{Error, TimeoutPhase};
use crate::request::{build_request, dump_request};
use crate::response::ResponseHead;
use crate::transport::Transport;
use crate::util::{contains_subslice, quote_bytes};
use crate::verdict::Verdict;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptSuccess {
    message: String,
    size: u64,
    elapsed: Duration,
}

impl AttemptSuccess {
    pub fn new(message: impl Into<String>, size: u64, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            size,
            elapsed,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptFailure {
    verdict: Verdict,
    message: String,
}

impl AttemptFailure {
    pub fn new(verdict: Verdict, message: impl Into<String>) -> Self {
        Self {
            verdict,
            message: message.into(),
        }
    }

    pub(crate) fn build(error: &Error) -> Self {
        Self::new(
            Verdict::Unknown,
            format!("Error in building request: {error}"),
        )
    }

    pub(crate) fn request(error: &Error) -> Self {
        Self::new(
            Verdict::Critical,
            format!("HTTP CRITICAL - Error in request: {error}"),
        )
    }

    pub(crate) fn read(error: &Error) -> Self {
        Self::new(
            Verdict::Critical,
            format!("HTTP CRITICAL - Error in read response: {error}"),
        )
    }

    fn invalid_response(verdict: Verdict, port: u16, status_line: &str) -> Self {
        Self::new(
            verdict,
            format!(
                "HTTP {verdict} - Invalid HTTP response received from host on port {port}: {status_line}"
            ),
        )
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type AttemptResult = Result<AttemptSuccess, AttemptFailure>;

/// First comma-delimited token contained in `status_text`.
pub fn match_expected_status<'a>(expect: &'a str, status_text: &str) -> Option<&'a str> {
    expect.split(',').find(|token| status_text.contains(token))
}

/// Classifies a fully read response. On success the status line and headers
/// are appended to `sink`, so the reported size includes them.
pub fn classify(
    config: &CheckConfig,
    head: &ResponseHead,
    sink: &mut CappedSink,
    elapsed: Duration,
) -> AttemptResult {
    let status_line = head.status_line();
    let mut matched = Vec::new();

    match config.expect() {
        Some(expect) => match match_expected_status(expect, &head.status_text()) {
            Some(token) => {
                debug!(token, "expected status matched");
                matched.push(format!(
                    "Status line output \"{status_line}\" matched \"{expect}\""
                ));
            }
            None => {
                return Err(AttemptFailure::invalid_response(
                    Verdict::Critical,
                    config.port(),
                    &status_line,
                ));
            }
        },
        None => match head.status().as_u16() {
            200..=399 => matched.push(status_line.clone()),
            400..=499 => {
                return Err(AttemptFailure::invalid_response(
                    Verdict::Warning,
                    config.port(),
                    &status_line,
                ));
            }
            _ => {
                return Err(AttemptFailure::invalid_response(
                    Verdict::Critical,
                    config.port(),
                    &status_line,
                ));
            }
        },
    }

    if let Some(expected) = config.expected_content() {
        if !contains_subslice(sink.bytes(), expected) {
            return Err(AttemptFailure::new(
                Verdict::Critical,
                format!(
                    "HTTP CRITICAL - HTTP response body Not matched {} from host on port {}",
                    quote_bytes(expected),
                    config.port()
                ),
            ));
        }
        matched.push(format!("Response body matched {}", quote_bytes(expected)));
    }

    sink.absorb(format!("{status_line}\r\n\r\n").as_bytes());
    sink.absorb(head.header_lines().as_bytes());

    let seconds = elapsed.as_secs_f64();
    let size = sink.size();
    Ok(AttemptSuccess::new(
        format!(
            "HTTP OK - {} - {size} bytes in {seconds:.3} second response time | time={seconds:.6}s;;;0.000000 size={size}B;;;0",
            matched.join(", ")
        ),
        size,
        elapsed,
    ))
}

/// One request/response/classify cycle.
pub async fn evaluate(config: &CheckConfig, transport: &Transport) -> AttemptResult {
    let request = build_request(config).map_err(|error| AttemptFailure::build(&error))?;
    if config.verbose() {
        info!("request:\n{}", dump_request(&request));
    }
    let method = request.method().clone();
    let uri = request.uri().to_string();

    let started_at = Instant::now();
    let response = transport
        .send(request)
        .await
        .map_err(|error| AttemptFailure::request(&error))?;

    let head = ResponseHead::from_response(&response);
    if config.verbose() {
        info!("response:\n{}", head.dump());
    }

    let mut sink = CappedSink::new(config.max_buffer_size(), config.no_discard());
    let body_timeout = transport.timeout().saturating_sub(started_at.elapsed());
    match timeout(body_timeout, read_body_capped(response.into_body(), &mut sink)).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => return Err(AttemptFailure::read(&error)),
        Err(_) => {
            let error = Error::Timeout {
                phase: TimeoutPhase::ResponseBody,
                timeout_ms: transport.timeout().as_millis(),
                method,
                uri,
            };
            return Err(AttemptFailure::read(&error));
        }
    }
    let elapsed = started_at.elapsed();
    debug!(
        status = head.status().as_u16(),
        body_bytes = sink.size(),
        retained_bytes = sink.bytes().len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "response received"
    );
    if config.verbose() && !sink.bytes().is_empty() {
        info!("response body:\n{}", String::from_utf8_lossy(sink.bytes()));
    }

    classify(config, &head, &mut sink, elapsed)
}
