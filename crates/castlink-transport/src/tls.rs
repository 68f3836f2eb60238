use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// A connected, encrypted stream to a device.
pub type CastStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Default TCP port devices listen on.
pub const DEFAULT_PORT: u16 = 8009;

/// Configuration for establishing the secure transport.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Upper bound for TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm on the socket.
    pub nodelay: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            nodelay: true,
        }
    }
}

impl TlsConfig {
    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Open a TCP connection and run the TLS handshake.
///
/// Devices present self-signed certificates, so the certificate chain is
/// not verified: the trust boundary is the local network. Handshake
/// signatures are still checked against the presented certificate.
pub async fn connect(address: IpAddr, port: u16, config: &TlsConfig) -> Result<CastStream> {
    let addr = SocketAddr::new(address, port);
    let connector = build_connector()?;

    let handshake = async {
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect { addr, source })?;
        if config.nodelay {
            tcp.set_nodelay(true)?;
        }
        debug!(%addr, "tcp connected, starting TLS handshake");

        connector
            .connect(ServerName::from(address), tcp)
            .await
            .map_err(|source| TransportError::Handshake { addr, source })
    };

    let stream = tokio::time::timeout(config.connect_timeout, handshake)
        .await
        .map_err(|_| TransportError::Timeout {
            addr,
            timeout: config.connect_timeout,
        })??;

    info!(%addr, "secure transport established");
    Ok(stream)
}

/// Build a TLS connector that accepts any device certificate.
pub fn build_connector() -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = Arc::new(SelfSignedPeer {
        provider: Arc::clone(&provider),
    });

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Certificate verifier for self-signed device certificates.
#[derive(Debug)]
struct SelfSignedPeer {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for SelfSignedPeer {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
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
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
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
