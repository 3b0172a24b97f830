use std::fmt;
use std::path::Path;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::domain::NodeId;

use super::error::TransportError;

/// Raw Ed25519 public keys are 32 bytes.
const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// A node's long-term identity: Ed25519 key pair, self-signed certificate and
/// the derived [`NodeId`].
///
/// The certificate's common name is the hex node id, purely informational;
/// peers always recompute the id from the certificate's public key.
pub struct NodeIdentity {
    node_id: NodeId,
    pkcs8: Vec<u8>,
    certificate: CertificateDer<'static>,
}

impl NodeIdentity {
    /// Fresh random identity.
    pub fn generate() -> Result<Self, TransportError> {
        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519)
            .map_err(|e| TransportError::Certificate(format!("key generation failed: {}", e)))?;
        Self::from_pkcs8(key_pair.serialize_der())
    }

    /// Rebuild an identity from a PKCS#8 DER encoded Ed25519 private key.
    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Self, TransportError> {
        let key_der = PrivatePkcs8KeyDer::from(pkcs8.clone());
        let key_pair = rcgen::KeyPair::try_from(&key_der)
            .map_err(|e| TransportError::Certificate(format!("invalid private key: {}", e)))?;
        if !key_pair.is_compatible(&rcgen::PKCS_ED25519) {
            return Err(TransportError::Certificate(
                "identity key must be Ed25519".into(),
            ));
        }

        // Certify with a placeholder name first: the id comes from the
        // certificate's public key, then goes into the real common name.
        let provisional = self_signed(&key_pair, "overlay")?;
        let node_id = node_id_from_certificate(provisional.as_ref())?;
        let certificate = self_signed(&key_pair, &node_id.to_hex())?;

        Ok(Self {
            node_id,
            pkcs8,
            certificate,
        })
    }

    /// Read a PKCS#8 DER key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let pkcs8 = std::fs::read(path)
            .map_err(|e| TransportError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_pkcs8(pkcs8)
    }

    /// Write the private key as PKCS#8 DER, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TransportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TransportError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, &self.pkcs8)
            .map_err(|e| TransportError::Io(format!("{}: {}", path.display(), e)))
    }

    /// Load the key at `path`, or generate one and save it there.
    pub fn load_or_generate(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        let identity = Self::generate()?;
        identity.save(path)?;
        Ok(identity)
    }

    /// Id derived from the public key.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Self-signed certificate presented during handshakes.
    pub fn certificate(&self) -> CertificateDer<'static> {
        self.certificate.clone()
    }

    /// Private key in the form rustls expects.
    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.pkcs8.clone()))
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

fn self_signed(
    key_pair: &rcgen::KeyPair,
    common_name: &str,
) -> Result<CertificateDer<'static>, TransportError> {
    let mut params = rcgen::CertificateParams::new(vec!["overlay".to_string()])
        .map_err(|e| TransportError::Certificate(e.to_string()))?;
    params.distinguished_name.push(
        rcgen::DnType::CommonName,
        rcgen::DnValue::Utf8String(common_name.to_string()),
    );
    let cert = params
        .self_signed(key_pair)
        .map_err(|e| TransportError::Certificate(format!("self-signing failed: {}", e)))?;
    Ok(CertificateDer::from(cert.der().to_vec()))
}

/// Raw Ed25519 public key carried in a DER certificate.
pub(crate) fn public_key_from_certificate(
    der: &[u8],
) -> Result<[u8; ED25519_PUBLIC_KEY_LEN], TransportError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| TransportError::Certificate(format!("unparseable certificate: {}", e)))?;
    let key_bytes = &cert.public_key().subject_public_key.data;
    if key_bytes.len() != ED25519_PUBLIC_KEY_LEN {
        return Err(TransportError::Certificate(format!(
            "expected a {}-byte Ed25519 key, found {} bytes",
            ED25519_PUBLIC_KEY_LEN,
            key_bytes.len()
        )));
    }
    let mut key = [0u8; ED25519_PUBLIC_KEY_LEN];
    key.copy_from_slice(key_bytes);
    Ok(key)
}

/// Node id bound to a DER certificate: SHA-256 of its Ed25519 public key.
pub fn node_id_from_certificate(der: &[u8]) -> Result<NodeId, TransportError> {
    public_key_from_certificate(der).map(|key| NodeId::from_public_key(&key))
}
