use std::time::Duration;

use http::header::{HeaderValue, PROXY_AUTHORIZATION};
use http::uri::Authority;
use http::{Request, Response, Uri};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::Connect;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::time::timeout;
use tracing::debug;

use crate::body::ReqBody;
use crate::config::CheckConfig;
use crate::connect::DialConnector;
use crate::error::{Error, TimeoutPhase};
use crate::request::{retarget_authority, target_uri};
use crate::tls::{TlsBackend, build_tls_config, select_backend};
use crate::util::{classify_transport_error, error_chain, join_host_port};

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

type RustlsHyperClient = Client<hyper_rustls::HttpsConnector<DialConnector>, ReqBody>;
#[cfg(feature = "tls-native")]
type NativeHyperClient = Client<hyper_tls::HttpsConnector<DialConnector>, ReqBody>;

#[derive(Clone)]
enum TransportClient {
    Rustls(RustlsHyperClient),
    #[cfg(feature = "tls-native")]
    Native(NativeHyperClient),
}

impl TransportClient {
    async fn request(
        &self,
        request: Request<ReqBody>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        match self {
            Self::Rustls(client) => client.request(request).await,
            #[cfg(feature = "tls-native")]
            Self::Native(client) => client.request(request).await,
        }
    }
}

fn pooled_client<C>(connector: C) -> Client<C, ReqBody>
where
    C: Connect + Clone,
{
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_timer(TokioTimer::new())
        .build(connector)
}

fn build_rustls_transport(
    config: &CheckConfig,
    connector: DialConnector,
) -> Result<TransportClient, Error> {
    let https = HttpsConnectorBuilder::new()
        .with_tls_config(build_tls_config(config)?)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(connector);
    Ok(TransportClient::Rustls(pooled_client(https)))
}

#[cfg(feature = "tls-native")]
fn build_native_tls_transport(
    config: &CheckConfig,
    connector: DialConnector,
) -> Result<TransportClient, Error> {
    let tls_connector = crate::tls::build_native_tls_connector(config)?;
    let https = hyper_tls::HttpsConnector::from((connector, tls_connector.into()));
    Ok(TransportClient::Native(pooled_client(https)))
}

#[cfg(not(feature = "tls-native"))]
fn build_native_tls_transport(
    config: &CheckConfig,
    _connector: DialConnector,
) -> Result<TransportClient, Error> {
    Err(Error::UnsupportedTlsVersion {
        version: config.tls_max().map_or("default", |version| version.as_str()),
        backend: TlsBackend::Rustls.as_str(),
    })
}

/// Plaintext requests sent to a proxy in absolute form.
#[derive(Clone)]
struct ProxiedHttp {
    authority: Authority,
    authorization: Option<HeaderValue>,
}

/// Connection policy shared by every attempt of a run. Redirects are never
/// followed: the legacy hyper client hands back the first response as is.
#[derive(Clone)]
pub struct Transport {
    client: TransportClient,
    timeout: Duration,
    backend: TlsBackend,
    proxied_http: Option<ProxiedHttp>,
}

impl Transport {
    pub fn new(config: &CheckConfig) -> Result<Self, Error> {
        let target_text = target_uri(config);
        let target = target_text
            .parse::<Uri>()
            .map_err(|_| Error::InvalidUri { uri: target_text })?;
        let proxy = crate::proxy::select_proxy(config)?.filter(|proxy| !proxy.should_bypass(&target));

        // An absolute-form request through a proxy names the dial target;
        // the Host header keeps the configured hostname.
        let proxied_http = match &proxy {
            Some(proxy) if !config.tls() => {
                let authority_text = join_host_port(config.ip_address(), config.port());
                let authority = authority_text
                    .parse::<Authority>()
                    .map_err(|_| Error::InvalidUri {
                        uri: authority_text,
                    })?;
                Some(ProxiedHttp {
                    authority,
                    authorization: proxy.authorization.clone(),
                })
            }
            _ => None,
        };

        let proxied = proxy.is_some();
        let connector = DialConnector::new(
            config.ip_address(),
            config.port(),
            config.address_family(),
            proxy,
            config.timeout(),
        )?;
        let backend = select_backend(config.tls_max());
        debug!(
            dial = %connector.dial_uri(),
            family = %config.address_family(),
            proxied,
            sni = config.sni(),
            tls_backend = backend.as_str(),
            tls_max = config.tls_max().map(|version| version.as_str()),
            "configured transport"
        );

        let client = match backend {
            TlsBackend::Rustls => build_rustls_transport(config, connector)?,
            TlsBackend::NativeTls => build_native_tls_transport(config, connector)?,
        };

        Ok(Self {
            client,
            timeout: config.timeout(),
            backend,
            proxied_http,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn tls_backend(&self) -> TlsBackend {
        self.backend
    }

    /// Sends the request and waits for the response head. Connect, TLS
    /// handshake and header wait share one timeout budget.
    pub(crate) async fn send(&self, request: Request<ReqBody>) -> Result<Response<Incoming>, Error> {
        let method = request.method().clone();
        let uri = request.uri().to_string();
        let request = match &self.proxied_http {
            Some(proxied) => {
                let mut request = retarget_authority(request, &proxied.authority)?;
                if let Some(authorization) = &proxied.authorization {
                    request
                        .headers_mut()
                        .insert(PROXY_AUTHORIZATION, authorization.clone());
                }
                request
            }
            None => request,
        };
        match timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(source)) => Err(Error::Transport {
                kind: classify_transport_error(&source),
                method,
                uri,
                detail: error_chain(&source),
                source: Box::new(source),
            }),
            Err(_) => Err(Error::Timeout {
                phase: TimeoutPhase::Transport,
                timeout_ms: self.timeout.as_millis(),
                method,
                uri,
            }),
        }
    }
}
