use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme, SupportedProtocolVersion};

use crate::config::{CheckConfig, TlsVersion};
use crate::error::Error;

/// Accepts any server certificate. Handshake signatures are still checked so
/// the session itself is sound; only chain trust and hostname are skipped.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsBackend {
    Rustls,
    NativeTls,
}

impl TlsBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rustls => "rustls",
            Self::NativeTls => "native-tls",
        }
    }
}

/// rustls only speaks TLS 1.2 and 1.3; older pins go through the platform
/// TLS library.
pub(crate) const fn select_backend(tls_max: Option<TlsVersion>) -> TlsBackend {
    match tls_max {
        Some(TlsVersion::Tls10 | TlsVersion::Tls11) => TlsBackend::NativeTls,
        None | Some(TlsVersion::Tls12 | TlsVersion::Tls13) => TlsBackend::Rustls,
    }
}

/// Versions rustls may negotiate. A `--tls-max` value pins exactly that
/// version.
pub(crate) fn protocol_versions(
    tls_max: Option<TlsVersion>,
) -> Result<&'static [&'static SupportedProtocolVersion], Error> {
    static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];
    static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];
    match tls_max {
        None => Ok(rustls::DEFAULT_VERSIONS),
        Some(TlsVersion::Tls12) => Ok(TLS12_ONLY),
        Some(TlsVersion::Tls13) => Ok(TLS13_ONLY),
        Some(version @ (TlsVersion::Tls10 | TlsVersion::Tls11)) => {
            Err(Error::UnsupportedTlsVersion {
                version: version.as_str(),
                backend: TlsBackend::Rustls.as_str(),
            })
        }
    }
}

pub(crate) fn build_tls_config(config: &CheckConfig) -> Result<rustls::ClientConfig, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let versions = protocol_versions(config.tls_max())?;

    let mut tls_config = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(versions)
        .map_err(|source| Error::TlsConfig {
            backend: TlsBackend::Rustls.as_str(),
            message: source.to_string(),
        })?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
        .with_no_client_auth();
    // The server name is taken from the request authority, i.e. the hostname
    // portion of the Host header.
    tls_config.enable_sni = config.sni();
    Ok(tls_config)
}

#[cfg(feature = "tls-native")]
pub(crate) fn build_native_tls_connector(
    config: &CheckConfig,
) -> Result<hyper_tls::native_tls::TlsConnector, Error> {
    use hyper_tls::native_tls::{Protocol, TlsConnector};

    let protocol = match config.tls_max() {
        Some(TlsVersion::Tls10) => Some(Protocol::Tlsv10),
        Some(TlsVersion::Tls11) => Some(Protocol::Tlsv11),
        Some(TlsVersion::Tls12) => Some(Protocol::Tlsv12),
        Some(TlsVersion::Tls13) | None => None,
    };

    let mut connector_builder = TlsConnector::builder();
    connector_builder
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .use_sni(config.sni())
        .min_protocol_version(protocol)
        .max_protocol_version(protocol);
    connector_builder
        .build()
        .map_err(|source| Error::TlsConfig {
            backend: TlsBackend::NativeTls.as_str(),
            message: source.to_string(),
        })
}
