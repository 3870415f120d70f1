//! # TLS Handshake Seam
//!
//! The harness measures a TLS client; it does not implement one. Everything
//! protocol-specific sits behind the `Handshaker` trait, which takes an
//! already-connected (and instrumented) byte stream and drives a client
//! handshake over it.
//!
//! `RustlsHandshaker` is the production implementation. Tests substitute
//! lightweight fakes so runner behaviour can be exercised without a TLS
//! server.

use crate::config::{BenchConfig, ProtocolVersion};
use crate::conn::BoxedIoStream;
use crate::error::ConfigError;
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::io;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Drives a client handshake over a connected stream
#[async_trait]
pub trait Handshaker: Send + Sync {
    /// Complete the handshake and return the established session.
    ///
    /// `host` is the host part of the dialed target address.
    async fn handshake(&self, host: &str, stream: BoxedIoStream) -> io::Result<BoxedIoStream>;
}

/// Host part of a `host:port` or `[v6]:port` target address.
///
/// An address without a port is returned unchanged.
pub fn target_host(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host;
        }
    }
    match address.rsplit_once(':') {
        Some((host, _)) if !host.contains(':') => host,
        _ => address,
    }
}

/// TLS parameters derived from the configuration document
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub version: ProtocolVersion,
    pub allow_downgrade: bool,
    /// Empty means each target's own host is used
    pub server_name: String,
    pub insecure_skip_verify: bool,
}

impl From<&BenchConfig> for TlsSettings {
    fn from(config: &BenchConfig) -> Self {
        Self {
            version: config.version,
            allow_downgrade: config.allow_downgrade,
            server_name: config.sni.clone(),
            insecure_skip_verify: config.insecure_skip_verify,
        }
    }
}

impl TlsSettings {
    /// Protocol versions offered in the ClientHello.
    ///
    /// The configured version is the maximum. Without downgrade it is also
    /// the minimum; with downgrade every older version rustls supports is
    /// offered as well.
    pub fn enabled_versions(&self) -> Vec<&'static rustls::SupportedProtocolVersion> {
        let max = self.version.rustls_version();
        if !self.allow_downgrade {
            return vec![max];
        }
        rustls::ALL_VERSIONS
            .iter()
            .copied()
            .filter(|v| {
                ProtocolVersion::from_rustls(v.version).map_or(false, |p| p <= self.version)
            })
            .collect()
    }
}

/// `Handshaker` backed by rustls with the ring crypto provider.
///
/// Without a configured server name, the name is taken from each target's
/// host. An IP address host sends no SNI extension.
pub struct RustlsHandshaker {
    connector: TlsConnector,
    server_name: Option<ServerName<'static>>,
}

impl RustlsHandshaker {
    pub fn new(settings: &TlsSettings) -> Result<Self, ConfigError> {
        let server_name = if settings.server_name.is_empty() {
            None
        } else {
            let name = ServerName::try_from(settings.server_name.clone())
                .map_err(|_| ConfigError::ServerName(settings.server_name.clone()))?;
            Some(name)
        };

        let provider = Arc::new(ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&settings.enabled_versions())
            .map_err(|e| ConfigError::Invalid(format!("TLS configuration: {}", e)))?;

        let config = if settings.insecure_skip_verify {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
                .with_no_client_auth()
        } else {
            let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        };

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
        })
    }
}

#[async_trait]
impl Handshaker for RustlsHandshaker {
    async fn handshake(&self, host: &str, stream: BoxedIoStream) -> io::Result<BoxedIoStream> {
        let server_name = match &self.server_name {
            Some(name) => name.clone(),
            None => ServerName::try_from(host.to_string()).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid server name {:?}: {}", host, e),
                )
            })?,
        };
        let session = self.connector.connect(server_name, stream).await?;
        Ok(BoxedIoStream::new(session))
    }
}

/// Accepts any certificate chain. Handshake signatures are still checked so
/// the exchange itself stays well-formed.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
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
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    /// Drive `handshaker` against a peer that reads the ClientHello record
    /// and hangs up. Returns whether the handshake failed and the record body.
    async fn client_hello(handshaker: &RustlsHandshaker, host: &str) -> (bool, Vec<u8>) {
        let (client, mut server) = duplex(16 * 1024);
        let peer = tokio::spawn(async move {
            let mut header = [0u8; 5];
            server.read_exact(&mut header).await?;
            let mut body = vec![0u8; u16::from_be_bytes([header[3], header[4]]) as usize];
            server.read_exact(&mut body).await?;
            Ok::<_, io::Error>(body)
        });
        let failed = handshaker.handshake(host, BoxedIoStream::new(client)).await.is_err();
        (failed, peer.await.unwrap().unwrap())
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn settings(version: ProtocolVersion, allow_downgrade: bool) -> TlsSettings {
        TlsSettings {
            version,
            allow_downgrade,
            server_name: "example.com".to_string(),
            insecure_skip_verify: false,
        }
    }

    #[test]
    fn test_enabled_versions_without_downgrade() {
        let versions = settings(ProtocolVersion::Tls13, false).enabled_versions();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, rustls::ProtocolVersion::TLSv1_3);

        let versions = settings(ProtocolVersion::Tls12, false).enabled_versions();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, rustls::ProtocolVersion::TLSv1_2);
    }

    #[test]
    fn test_enabled_versions_with_downgrade() {
        let versions = settings(ProtocolVersion::Tls13, true).enabled_versions();
        let names: Vec<_> = versions.iter().map(|v| v.version).collect();
        assert!(names.contains(&rustls::ProtocolVersion::TLSv1_3));
        assert!(names.contains(&rustls::ProtocolVersion::TLSv1_2));

        // Nothing older than 1.2 exists to downgrade to.
        let versions = settings(ProtocolVersion::Tls12, true).enabled_versions();
        assert_eq!(versions.len(), 1);
    }

    #[test]
    fn test_handshaker_builds_for_both_verification_modes() {
        let mut s = settings(ProtocolVersion::Tls13, false);
        assert!(RustlsHandshaker::new(&s).is_ok());
        s.insecure_skip_verify = true;
        assert!(RustlsHandshaker::new(&s).is_ok());
    }

    #[test]
    fn test_handshaker_accepts_ip_server_name() {
        let mut s = settings(ProtocolVersion::Tls12, false);
        s.server_name = "127.0.0.1".to_string();
        assert!(RustlsHandshaker::new(&s).is_ok());
    }

    #[test]
    fn test_target_host() {
        assert_eq!(target_host("example.com:443"), "example.com");
        assert_eq!(target_host("127.0.0.1:8443"), "127.0.0.1");
        assert_eq!(target_host("[::1]:443"), "::1");
        assert_eq!(target_host("::1"), "::1");
        assert_eq!(target_host("example.com"), "example.com");
    }

    #[test]
    fn test_handshaker_builds_without_server_name() {
        let mut s = settings(ProtocolVersion::Tls13, false);
        s.server_name = String::new();
        assert!(RustlsHandshaker::new(&s).unwrap().server_name.is_none());
        s.insecure_skip_verify = true;
        assert!(RustlsHandshaker::new(&s).is_ok());
    }

    #[tokio::test]
    async fn test_configured_server_name_is_sent() {
        let handshaker = RustlsHandshaker::new(&settings(ProtocolVersion::Tls13, false)).unwrap();
        let (failed, hello) = client_hello(&handshaker, "other.test").await;
        assert!(failed);
        assert!(contains(&hello, b"example.com"));
        assert!(!contains(&hello, b"other.test"));
    }

    #[tokio::test]
    async fn test_empty_server_name_uses_target_host() {
        let mut s = settings(ProtocolVersion::Tls13, false);
        s.server_name = String::new();
        s.insecure_skip_verify = true;
        let handshaker = RustlsHandshaker::new(&s).unwrap();

        let (failed, hello) = client_hello(&handshaker, "edge.example").await;
        assert!(failed);
        assert!(contains(&hello, b"edge.example"));

        let (failed, hello) = client_hello(&handshaker, "127.0.0.1").await;
        assert!(failed);
        assert!(!contains(&hello, b"127.0.0.1"));
    }

    #[tokio::test]
    async fn test_empty_server_name_rejects_invalid_host() {
        let mut s = settings(ProtocolVersion::Tls13, false);
        s.server_name = String::new();
        let handshaker = RustlsHandshaker::new(&s).unwrap();
        let (client, _server) = duplex(1024);
        let err = match handshaker.handshake("not a host!", BoxedIoStream::new(client)).await {
            Ok(_) => panic!("handshake with an invalid host succeeded"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_handshaker_rejects_invalid_server_name() {
        let mut s = settings(ProtocolVersion::Tls13, false);
        s.server_name = "not a hostname!".to_string();
        assert!(matches!(
            RustlsHandshaker::new(&s),
            Err(ConfigError::ServerName(_))
        ));
    }
}
