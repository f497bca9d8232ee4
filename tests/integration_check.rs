use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use check_http::prelude::{CheckConfig, Verdict, check};
use check_http::{Transport, evaluate};

#[derive(Clone)]
struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    delay: Duration,
}

impl MockResponse {
    fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct CapturedRequest {
    method: String,
    path: String,
    headers: BTreeMap<String, String>,
}

struct MockServer {
    port: u16,
    served: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    join: Option<JoinHandle<()>>,
}

impl MockServer {
    fn start(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("read local address").port();
        listener
            .set_nonblocking(true)
            .expect("set listener nonblocking");

        let served = Arc::new(AtomicUsize::new(0));
        let captured = Arc::new(Mutex::new(Vec::new()));
        let served_clone = Arc::clone(&served);
        let captured_clone = Arc::clone(&captured);

        let join = thread::spawn(move || {
            let deadline = std::time::Instant::now() + Duration::from_secs(3);
            let mut response_index = 0;

            while response_index < responses.len() && std::time::Instant::now() < deadline {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = stream.set_nonblocking(false);
                        if let Ok(request) = read_request(&mut stream) {
                            captured_clone
                                .lock()
                                .expect("lock captured requests")
                                .push(request);
                        }

                        served_clone.fetch_add(1, Ordering::SeqCst);
                        let response = &responses[response_index];
                        response_index += 1;

                        if !response.delay.is_zero() {
                            thread::sleep(response.delay);
                        }

                        let _ = write_response(&mut stream, response);
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            port,
            served,
            captured,
            join: Some(join),
        }
    }

    fn requests(&self) -> Vec<CapturedRequest> {
        self.captured
            .lock()
            .expect("lock captured requests")
            .clone()
    }

    fn served_count(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn read_request(stream: &mut TcpStream) -> std::io::Result<CapturedRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(1)))?;

    let mut raw = Vec::new();
    loop {
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        if find_header_end(&raw).is_some() {
            break;
        }
    }

    let header_end = find_header_end(&raw).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "malformed request without header terminator",
        )
    })?;

    let header_text = String::from_utf8_lossy(&raw[..header_end]);
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "missing request line")
    })?;
    let mut request_line_parts = request_line.split_whitespace();
    let method = request_line_parts.next().unwrap_or_default().to_owned();
    let path = request_line_parts.next().unwrap_or_default().to_owned();

    let mut headers = BTreeMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }

    Ok(CapturedRequest {
        method,
        path,
        headers,
    })
}

fn write_response(stream: &mut TcpStream, response: &MockResponse) -> std::io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        status_text(response.status),
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|window| window == b"\r\n\r\n")
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn local_config(server: &MockServer) -> check_http::CheckConfigBuilder {
    CheckConfig::builder()
        .ip_address("127.0.0.1")
        .port(server.port)
        .timeout(Duration::from_secs(2))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn healthy_endpoint_reports_ok_with_perfdata() {
    let server = MockServer::start(vec![MockResponse::new(200, "ok")]);
    let config = local_config(&server)
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Ok, "{}", report.message());
    // 2 body bytes, the status line block and two 19-byte header lines.
    assert!(
        report
            .message()
            .starts_with("HTTP OK - HTTP/1.1 200 OK - 59 bytes in "),
        "{}",
        report.message()
    );
    assert!(report.message().contains(" second response time | time="));
    assert!(report.message().ends_with("s;;;0.000000 size=59B;;;0"));
    assert_eq!(server.served_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_error_is_warning_and_server_error_is_critical() {
    let not_found = MockServer::start(vec![MockResponse::new(404, "missing")]);
    let config = local_config(&not_found)
        .try_build()
        .expect("config should build");
    let report = check(&config).await;
    assert_eq!(report.verdict(), Verdict::Warning);
    assert_eq!(
        report.message(),
        format!(
            "HTTP WARNING - Invalid HTTP response received from host on port {}: HTTP/1.1 404 Not Found",
            not_found.port
        )
    );

    let failing = MockServer::start(vec![MockResponse::new(500, "boom")]);
    let config = local_config(&failing)
        .try_build()
        .expect("config should build");
    let report = check(&config).await;
    assert_eq!(report.verdict(), Verdict::Critical);
    assert!(report.message().ends_with("HTTP/1.1 500 Internal Server Error"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn redirect_is_reported_not_followed() {
    let server = MockServer::start(vec![
        MockResponse::new(301, "").with_header("Location", "http://127.0.0.1:1/elsewhere"),
    ]);
    let config = local_config(&server)
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Ok, "{}", report.message());
    assert!(
        report
            .message()
            .starts_with("HTTP OK - HTTP/1.1 301 Moved Permanently - ")
    );
    assert_eq!(server.served_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expect_list_accepts_listed_status_and_rejects_others() {
    let listed = MockServer::start(vec![MockResponse::new(503, "maintenance")]);
    let config = local_config(&listed)
        .expect("200,503")
        .try_build()
        .expect("config should build");
    let report = check(&config).await;
    assert_eq!(report.verdict(), Verdict::Ok, "{}", report.message());
    assert!(report.message().starts_with(
        "HTTP OK - Status line output \"HTTP/1.1 503 Service Unavailable\" matched \"200,503\" - "
    ));

    let unlisted = MockServer::start(vec![MockResponse::new(200, "fine")]);
    let config = local_config(&unlisted)
        .expect("204")
        .try_build()
        .expect("config should build");
    let report = check(&config).await;
    assert_eq!(report.verdict(), Verdict::Critical);
    assert!(
        report
            .message()
            .starts_with("HTTP CRITICAL - Invalid HTTP response received from host on port ")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn body_content_is_matched_against_expected_string() {
    let server = MockServer::start(vec![
        MockResponse::new(200, "service healthy"),
        MockResponse::new(200, "service degraded"),
    ]);
    let config = local_config(&server)
        .expected_string("healthy")
        .try_build()
        .expect("config should build");

    let matched = check(&config).await;
    assert_eq!(matched.verdict(), Verdict::Ok, "{}", matched.message());
    assert!(
        matched
            .message()
            .contains("HTTP/1.1 200 OK, Response body matched \"healthy\" - ")
    );

    let missed = check(&config).await;
    assert_eq!(missed.verdict(), Verdict::Critical);
    assert_eq!(
        missed.message(),
        format!(
            "HTTP CRITICAL - HTTP response body Not matched \"healthy\" from host on port {}",
            server.port
        )
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_body_is_critical_only_without_discard() {
    let body = vec![b'x'; 64];
    let server = MockServer::start(vec![
        MockResponse::new(200, body.clone()),
        MockResponse::new(200, body),
    ]);

    let strict = local_config(&server)
        .max_buffer_size(16)
        .no_discard(true)
        .try_build()
        .expect("config should build");
    let report = check(&strict).await;
    assert_eq!(report.verdict(), Verdict::Critical);
    assert_eq!(
        report.message(),
        "HTTP CRITICAL - Error in read response: could not write body buffer. buffer is full (16 bytes)"
    );

    let lenient = local_config(&server)
        .max_buffer_size(16)
        .try_build()
        .expect("config should build");
    let transport = Transport::new(&lenient).expect("transport should build");
    let success = evaluate(&lenient, &transport)
        .await
        .expect("discarding mode should pass");
    // Size keeps counting bytes that were not retained.
    assert_eq!(success.size(), 64 + 19 + 19 + 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connection_goes_to_ip_while_host_header_names_hostname() {
    let server = MockServer::start(vec![MockResponse::new(200, "ok")]);
    let config = CheckConfig::builder()
        .hostname("status.example.test")
        .ip_address("127.0.0.1")
        .port(server.port)
        .uri("/health?deep=1")
        .authorization("monitor:s3cr:et")
        .user_agent("check_http/test")
        .timeout(Duration::from_secs(2))
        .try_build()
        .expect("config should build");

    let report = check(&config).await;
    assert_eq!(report.verdict(), Verdict::Ok, "{}", report.message());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/health?deep=1");
    assert_eq!(
        request.headers.get("host").map(String::as_str),
        Some("status.example.test")
    );
    assert_eq!(
        request.headers.get("user-agent").map(String::as_str),
        Some("check_http/test")
    );
    // base64("monitor:s3cr:et")
    assert_eq!(
        request.headers.get("authorization").map(String::as_str),
        Some("Basic bW9uaXRvcjpzM2NyOmV0")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plain_http_through_proxy_names_dial_target_and_keeps_host() {
    let proxy = MockServer::start(vec![MockResponse::new(200, "ok")]);
    let config = CheckConfig::builder()
        .hostname("vhost.example.test")
        .ip_address("127.0.0.1")
        .port(9)
        .proxy(format!("http://monitor:pw@127.0.0.1:{}", proxy.port))
        .timeout(Duration::from_secs(2))
        .try_build()
        .expect("config should build");

    let report = check(&config).await;
    assert_eq!(report.verdict(), Verdict::Ok, "{}", report.message());

    let requests = proxy.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "http://127.0.0.1:9/");
    assert_eq!(
        request.headers.get("host").map(String::as_str),
        Some("vhost.example.test")
    );
    // base64("monitor:pw")
    assert_eq!(
        request.headers.get("proxy-authorization").map(String::as_str),
        Some("Basic bW9uaXRvcjpwdw==")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn custom_method_is_sent() {
    let server = MockServer::start(vec![MockResponse::new(200, "")]);
    let config = local_config(&server)
        .method("OPTIONS")
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Ok, "{}", report.message());
    assert_eq!(server.requests()[0].method, "OPTIONS");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_connection_is_critical() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe port");
        listener.local_addr().expect("read local address").port()
    };
    let config = CheckConfig::builder()
        .ip_address("127.0.0.1")
        .port(port)
        .timeout(Duration::from_secs(2))
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Critical);
    assert!(
        report
            .message()
            .starts_with("HTTP CRITICAL - Error in request: GET http://127.0.0.1/: connect error: "),
        "{}",
        report.message()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ipv6_only_rejects_ipv4_dial_target() {
    let server = MockServer::start(vec![]);
    let config = local_config(&server)
        .ipv6_only(true)
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Critical);
    assert!(
        report
            .message()
            .contains("dial tcp6 127.0.0.1: no suitable address found"),
        "{}",
        report.message()
    );
    assert_eq!(server.served_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_response_times_out_as_critical() {
    let server = MockServer::start(vec![
        MockResponse::new(200, "late").with_delay(Duration::from_millis(600)),
    ]);
    let config = local_config(&server)
        .timeout(Duration::from_millis(200))
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Critical);
    assert!(
        report.message().starts_with("HTTP CRITICAL - Error in request: ")
            && report.message().contains("timed out in transport after 200ms"),
        "{}",
        report.message()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn consecutive_mode_requires_every_attempt_to_pass() {
    let server = MockServer::start(vec![
        MockResponse::new(200, "one"),
        MockResponse::new(200, "two"),
        MockResponse::new(200, "three"),
    ]);
    let config = local_config(&server)
        .consecutive(3)
        .interim(Duration::from_millis(20))
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Ok, "{}", report.message());
    assert_eq!(server.served_count(), 3);

    let flaky = MockServer::start(vec![
        MockResponse::new(200, "one"),
        MockResponse::new(503, "down"),
    ]);
    let config = local_config(&flaky)
        .consecutive(3)
        .interim(Duration::from_millis(20))
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Critical);
    assert!(report.message().ends_with("HTTP/1.1 503 Service Unavailable"));
    assert_eq!(flaky.served_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wait_for_mode_retries_until_endpoint_recovers() {
    let server = MockServer::start(vec![
        MockResponse::new(503, "starting"),
        MockResponse::new(503, "starting"),
        MockResponse::new(200, "ready"),
    ]);
    let config = local_config(&server)
        .wait_for(true)
        .wait_for_interval(Duration::from_millis(50))
        .wait_for_max(Duration::from_secs(5))
        .try_build()
        .expect("config should build");

    let report = check(&config).await;

    assert_eq!(report.verdict(), Verdict::Ok, "{}", report.message());
    assert_eq!(server.served_count(), 3);
}
