//! Credential file loading.

use super::CredentialInputs;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use x509_parser::certificate::X509Certificate;
use x509_parser::der_parser::ber::BerObjectContent;
use x509_parser::der_parser::parse_der;
use x509_parser::oid_registry::OID_KEY_TYPE_EC_PUBLIC_KEY;
use x509_parser::prelude::FromDer;
use x509_parser::x509::SubjectPublicKeyInfo;

/// Credential sources as configured in the `[security]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialFiles {
    #[serde(default)]
    pub psk_identity: Option<String>,
    /// Hex encoded
    #[serde(default)]
    pub psk_key: Option<String>,
    /// DER SubjectPublicKeyInfo (EC)
    #[serde(default)]
    pub client_public_key: Option<PathBuf>,
    /// DER PKCS#8
    #[serde(default)]
    pub client_private_key: Option<PathBuf>,
    #[serde(default)]
    pub server_public_key: Option<PathBuf>,
    /// DER X.509v3
    #[serde(default)]
    pub client_certificate: Option<PathBuf>,
    #[serde(default)]
    pub server_certificate: Option<PathBuf>,
}

/// Shape of DER material a credential file must hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKind {
    PublicKey,
    PrivateKey,
    Certificate,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::PublicKey => write!(f, "SubjectPublicKeyInfo public key"),
            CredentialKind::PrivateKey => write!(f, "PKCS#8 private key"),
            CredentialKind::Certificate => write!(f, "X.509 certificate"),
        }
    }
}

#[derive(Debug)]
pub enum CredentialLoadError {
    Read { path: PathBuf, source: std::io::Error },
    Empty { path: PathBuf },
    InvalidHex { field: &'static str, source: hex::FromHexError },
    /// File content does not parse as the expected DER structure
    Malformed {
        path: PathBuf,
        kind: CredentialKind,
        reason: String,
    },
    /// Well-formed public key with a non-EC algorithm
    UnsupportedPublicKey { path: PathBuf, algorithm: String },
}

impl fmt::Display for CredentialLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialLoadError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            CredentialLoadError::Empty { path } => write!(f, "{} is empty", path.display()),
            CredentialLoadError::InvalidHex { field, source } => {
                write!(f, "{} is not valid hex: {}", field, source)
            }
            CredentialLoadError::Malformed { path, kind, reason } => write!(
                f,
                "{} is not a DER {}: {}",
                path.display(),
                kind,
                reason
            ),
            CredentialLoadError::UnsupportedPublicKey { path, algorithm } => write!(
                f,
                "{} is not an EC public key (algorithm {})",
                path.display(),
                algorithm
            ),
        }
    }
}

impl std::error::Error for CredentialLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CredentialLoadError::Read { source, .. } => Some(source),
            CredentialLoadError::InvalidHex { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl CredentialFiles {
    /// Read every configured file into resolver inputs.
    ///
    /// Presence is preserved as-is; deciding whether the combination is valid
    /// is left to [`super::resolve`].
    pub fn load(
        &self,
        server_address: Option<String>,
        bootstrap: bool,
    ) -> Result<CredentialInputs, CredentialLoadError> {
        let psk_key = self
            .psk_key
            .as_deref()
            .map(|key| {
                hex::decode(key.trim())
                    .map_err(|source| CredentialLoadError::InvalidHex { field: "psk_key", source })
            })
            .transpose()?;

        Ok(CredentialInputs {
            server_address,
            bootstrap,
            psk_identity: self.psk_identity.clone(),
            psk_key,
            client_public_key: load_credential(
                self.client_public_key.as_deref(),
                CredentialKind::PublicKey,
            )?,
            client_private_key: load_credential(
                self.client_private_key.as_deref(),
                CredentialKind::PrivateKey,
            )?,
            server_public_key: load_credential(
                self.server_public_key.as_deref(),
                CredentialKind::PublicKey,
            )?,
            client_certificate: load_credential(
                self.client_certificate.as_deref(),
                CredentialKind::Certificate,
            )?,
            server_certificate: load_credential(
                self.server_certificate.as_deref(),
                CredentialKind::Certificate,
            )?,
        })
    }
}

/// Read a credential file and check it parses as `kind`.
fn load_credential(
    path: Option<&Path>,
    kind: CredentialKind,
) -> Result<Option<Vec<u8>>, CredentialLoadError> {
    let path = match path {
        Some(p) => p,
        None => return Ok(None),
    };

    let der = std::fs::read(path).map_err(|source| CredentialLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if der.is_empty() {
        return Err(CredentialLoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    let malformed = |reason: String| CredentialLoadError::Malformed {
        path: path.to_path_buf(),
        kind,
        reason,
    };
    match kind {
        CredentialKind::PublicKey => {
            let algorithm = public_key_algorithm(&der).map_err(malformed)?;
            if algorithm != OID_KEY_TYPE_EC_PUBLIC_KEY.to_id_string() {
                return Err(CredentialLoadError::UnsupportedPublicKey {
                    path: path.to_path_buf(),
                    algorithm,
                });
            }
        }
        CredentialKind::PrivateKey => check_private_key(&der).map_err(malformed)?,
        CredentialKind::Certificate => {
            complete(X509Certificate::from_der(&der)).map_err(malformed)?;
        }
    }

    debug!(path = %path.display(), kind = %kind, len = der.len(), "Loaded credential file");
    Ok(Some(der))
}

/// Dotted algorithm OID of a DER SubjectPublicKeyInfo.
pub(crate) fn public_key_algorithm(der: &[u8]) -> Result<String, String> {
    let spki = complete(SubjectPublicKeyInfo::from_der(der))?;
    Ok(spki.algorithm.algorithm.to_id_string())
}

/// PKCS#8 PrivateKeyInfo: SEQUENCE { INTEGER, AlgorithmIdentifier, OCTET STRING, ... }
fn check_private_key(der: &[u8]) -> Result<(), String> {
    let key_info = complete(parse_der(der))?;
    let fields = match &key_info.content {
        BerObjectContent::Sequence(fields) => fields,
        _ => return Err("expected a SEQUENCE".to_string()),
    };

    match fields.as_slice() {
        [version, algorithm, key, ..]
            if matches!(version.content, BerObjectContent::Integer(_))
                && matches!(algorithm.content, BerObjectContent::Sequence(_))
                && matches!(key.content, BerObjectContent::OctetString(_)) =>
        {
            Ok(())
        }
        _ => Err("expected version, algorithm and key fields".to_string()),
    }
}

/// Accept a parse only when it consumed the whole input.
fn complete<T, E: fmt::Display>(parsed: Result<(&[u8], T), E>) -> Result<T, String> {
    match parsed {
        Ok((rest, value)) if rest.is_empty() => Ok(value),
        Ok((rest, _)) => Err(format!("{} trailing bytes", rest.len())),
        Err(e) => Err(e.to_string()),
    }
}
