use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use http::Uri;
use hyper::rt::{Read as HyperRead, ReadBufCursor, Write as HyperWrite};
use hyper_util::client::legacy::connect::dns::{GaiResolver, Name};
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use tower_service::Service;
use tracing::trace;

use crate::config::AddressFamily;
use crate::error::Error;
use crate::proxy::ProxyConfig;
use crate::util::join_host_port;

pub(crate) type BoxConnectError = Box<dyn StdError + Send + Sync>;

const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// System resolver restricted to one address family.
#[derive(Clone)]
pub(crate) struct FamilyResolver {
    inner: GaiResolver,
    family: AddressFamily,
}

impl FamilyResolver {
    pub(crate) fn new(family: AddressFamily) -> Self {
        Self {
            inner: GaiResolver::new(),
            family,
        }
    }
}

pub(crate) fn filter_family(
    addresses: impl Iterator<Item = SocketAddr>,
    family: AddressFamily,
    name: &str,
) -> io::Result<Vec<SocketAddr>> {
    let admitted = addresses
        .filter(|address| family.admits(address.ip()))
        .collect::<Vec<_>>();
    if admitted.is_empty() {
        let wanted = match family {
            AddressFamily::Ipv4 => "ipv4 ",
            AddressFamily::Ipv6 => "ipv6 ",
            AddressFamily::Any => "",
        };
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {wanted}address found for {name}"),
        ));
    }
    Ok(admitted)
}

impl Service<Name> for FamilyResolver {
    type Response = std::vec::IntoIter<SocketAddr>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, name: Name) -> Self::Future {
        let family = self.family;
        let host = name.as_str().to_owned();
        let resolving = self.inner.call(name);
        Box::pin(async move {
            let addresses = resolving.await?;
            let admitted = filter_family(addresses, family, &host)?;
            trace!(host = %host, count = admitted.len(), "resolved dial target");
            Ok(admitted.into_iter())
        })
    }
}

type DirectConnector = HttpConnector<FamilyResolver>;

#[derive(Debug)]
pub(crate) struct DialConnection<T> {
    inner: T,
    proxied: bool,
}

impl<T> DialConnection<T> {
    fn new(inner: T, proxied: bool) -> Self {
        Self { inner, proxied }
    }
}

impl<T> HyperRead for DialConnection<T>
where
    T: HyperRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T> HyperWrite for DialConnection<T>
where
    T: HyperWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<Result<usize, io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }
}

impl<T> Connection for DialConnection<T>
where
    T: Connection,
{
    fn connected(&self) -> Connected {
        self.inner.connected().proxy(self.proxied)
    }
}

#[derive(Clone)]
struct ProxyRuntime {
    tunnel: Tunnel<DirectConnector>,
    proxy_uri: Uri,
}

/// Opens every connection against the configured IP and port, whatever host
/// the request URI names. Through a proxy, TLS targets are tunnelled to that
/// IP and port with CONNECT; plaintext requests are handed to the proxy,
/// which the transport addresses to the same IP and port.
#[derive(Clone)]
pub(crate) struct DialConnector {
    direct: DirectConnector,
    dial_uri: Uri,
    dial_ip: Option<IpAddr>,
    family: AddressFamily,
    proxy: Option<ProxyRuntime>,
}

impl DialConnector {
    pub(crate) fn new(
        ip_address: &str,
        port: u16,
        family: AddressFamily,
        proxy_config: Option<ProxyConfig>,
        connect_timeout: Duration,
    ) -> Result<Self, Error> {
        let mut direct = HttpConnector::new_with_resolver(FamilyResolver::new(family));
        direct.enforce_http(false);
        direct.set_connect_timeout(Some(connect_timeout));
        direct.set_keepalive(Some(TCP_KEEPALIVE));
        direct.set_nodelay(true);

        let dial_text = format!("http://{}", join_host_port(ip_address, port));
        let dial_uri = dial_text
            .parse::<Uri>()
            .map_err(|_| Error::InvalidUri { uri: dial_text })?;
        let dial_ip = ip_address
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .ok();

        let proxy = proxy_config.map(|config| {
            let mut tunnel = Tunnel::new(config.uri.clone(), direct.clone());
            if let Some(authorization) = config.authorization {
                tunnel = tunnel.with_auth(authorization);
            }
            ProxyRuntime {
                tunnel,
                proxy_uri: config.uri,
            }
        });

        Ok(Self {
            direct,
            dial_uri,
            dial_ip,
            family,
            proxy,
        })
    }

    pub(crate) fn dial_uri(&self) -> &Uri {
        &self.dial_uri
    }
}

impl Service<Uri> for DialConnector {
    type Response = DialConnection<<DirectConnector as Service<Uri>>::Response>;
    type Error = BoxConnectError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let direct_ready = match self.direct.poll_ready(cx) {
            Poll::Ready(Ok(())) => true,
            Poll::Ready(Err(error)) => return Poll::Ready(Err(Box::new(error))),
            Poll::Pending => false,
        };
        let tunnel_ready = match &mut self.proxy {
            Some(proxy) => match proxy.tunnel.poll_ready(cx) {
                Poll::Ready(Ok(())) => true,
                Poll::Ready(Err(error)) => return Poll::Ready(Err(Box::new(error))),
                Poll::Pending => false,
            },
            None => true,
        };
        if direct_ready && tunnel_ready {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        if let Some(proxy) = &mut self.proxy {
            if dst
                .scheme_str()
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https"))
            {
                trace!(target_uri = %self.dial_uri, "tunnelling through proxy");
                let connecting = proxy.tunnel.call(self.dial_uri.clone());
                return Box::pin(async move {
                    connecting
                        .await
                        .map(|connection| DialConnection::new(connection, false))
                        .map_err(BoxConnectError::from)
                });
            }
            let connecting = self.direct.call(proxy.proxy_uri.clone());
            return Box::pin(async move {
                connecting
                    .await
                    .map(|connection| DialConnection::new(connection, true))
                    .map_err(BoxConnectError::from)
            });
        }

        if let Some(ip) = self.dial_ip
            && !self.family.admits(ip)
        {
            let error: BoxConnectError = Box::new(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("dial {} {ip}: no suitable address found", self.family),
            ));
            return Box::pin(async move { Err(error) });
        }

        let connecting = self.direct.call(self.dial_uri.clone());
        Box::pin(async move {
            connecting
                .await
                .map(|connection| DialConnection::new(connection, false))
                .map_err(BoxConnectError::from)
        })
    }
}
