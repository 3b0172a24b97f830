//! rustls configuration for self-signed Ed25519 peers.
//!
//! Certificates are not chained to any root. A certificate is acceptable when
//! it parses and carries a 32-byte Ed25519 key; the handshake signature then
//! proves possession of that key. Binding the key to an expected node id is
//! the dialler's job, after the handshake.

use std::sync::{Arc, LazyLock};

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CertificateError, DigitallySignedStruct, DistinguishedName, SignatureScheme};

use super::config::TransportConfig;
use super::error::TransportError;
use super::identity::{public_key_from_certificate, NodeIdentity};

/// ALPN identifier; connections speaking anything else are refused.
pub const ALPN: &[u8] = b"overlay/1";

/// SNI sent on every dial. Identity is checked against the certificate key,
/// never against the name.
pub const SERVER_NAME: &str = "overlay";

static CRYPTO_PROVIDER: LazyLock<Arc<CryptoProvider>> =
    LazyLock::new(|| Arc::new(rustls::crypto::ring::default_provider()));

/// quinn server configuration requiring a client certificate.
pub(crate) fn server_config(
    identity: &NodeIdentity,
    config: &TransportConfig,
) -> Result<quinn::ServerConfig, TransportError> {
    let mut server_crypto = rustls::ServerConfig::builder_with_provider(CRYPTO_PROVIDER.clone())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| TransportError::Tls(e.to_string()))?
        .with_client_cert_verifier(Arc::new(Ed25519ClientVerifier))
        .with_single_cert(vec![identity.certificate()], identity.private_key())
        .map_err(|e| TransportError::Tls(format!("server certificate rejected: {}", e)))?;
    server_crypto.alpn_protocols = vec![ALPN.to_vec()];

    let quic_crypto = QuicServerConfig::try_from(server_crypto)
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_crypto));
    server_config.transport_config(Arc::new(transport_config(config)?));
    Ok(server_config)
}

/// quinn client configuration presenting our certificate.
pub(crate) fn client_config(
    identity: &NodeIdentity,
    config: &TransportConfig,
) -> Result<quinn::ClientConfig, TransportError> {
    let mut client_crypto = rustls::ClientConfig::builder_with_provider(CRYPTO_PROVIDER.clone())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| TransportError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(Ed25519ServerVerifier))
        .with_client_auth_cert(vec![identity.certificate()], identity.private_key())
        .map_err(|e| TransportError::Tls(format!("client certificate rejected: {}", e)))?;
    client_crypto.alpn_protocols = vec![ALPN.to_vec()];

    let quic_crypto = QuicClientConfig::try_from(client_crypto)
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    let mut client_config = quinn::ClientConfig::new(Arc::new(quic_crypto));
    client_config.transport_config(Arc::new(transport_config(config)?));
    Ok(client_config)
}

fn transport_config(config: &TransportConfig) -> Result<quinn::TransportConfig, TransportError> {
    let idle = quinn::IdleTimeout::try_from(config.idle_timeout)
        .map_err(|e| TransportError::Tls(format!("idle timeout out of range: {}", e)))?;
    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(idle));
    transport.max_concurrent_bidi_streams(config.max_streams.into());
    transport.max_concurrent_uni_streams(0u32.into());
    Ok(transport)
}

fn check_certificate(end_entity: &CertificateDer<'_>) -> Result<(), rustls::Error> {
    public_key_from_certificate(end_entity.as_ref())
        .map(|_| ())
        .map_err(|_| rustls::Error::InvalidCertificate(CertificateError::BadEncoding))
}

fn verify_tls13(
    message: &[u8],
    cert: &CertificateDer<'_>,
    dss: &DigitallySignedStruct,
) -> Result<HandshakeSignatureValid, rustls::Error> {
    rustls::crypto::verify_tls13_signature(
        message,
        cert,
        dss,
        &CRYPTO_PROVIDER.signature_verification_algorithms,
    )
}

#[derive(Debug)]
struct Ed25519ClientVerifier;

impl ClientCertVerifier for Ed25519ClientVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        check_certificate(end_entity)?;
        Ok(ClientCertVerified::assertion())
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
            &CRYPTO_PROVIDER.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![SignatureScheme::ED25519]
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct Ed25519ServerVerifier;

impl ServerCertVerifier for Ed25519ServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        check_certificate(end_entity)?;
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
            &CRYPTO_PROVIDER.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![SignatureScheme::ED25519]
    }
}
