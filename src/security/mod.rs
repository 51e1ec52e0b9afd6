//! Security mode resolution.
//!
//! Turns optional credential inputs into exactly one security mode and the
//! server provisioning that goes with it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialFiles ([security])       │
//! │  - DER key/cert paths, hex PSK           │
//! └─────────────────────────────────────────┘
//!          ↓ load() (file I/O, DER parse, EC check)
//! ┌─────────────────────────────────────────┐
//! │       CredentialInputs                   │
//! │  - Parsed material, all optional         │
//! └─────────────────────────────────────────┘
//!          ↓ resolve() (pure)
//! ┌─────────────────────────────────────────┐
//! │       ResolvedSecurity                   │
//! │  - Scheme + server URI                   │
//! │  - SecurityCredentialBundle              │
//! │  - Security entry + server provisioning  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Rules
//!
//! - PSK {identity, key}, RPK {client public key, private key, server public
//!   key} and X.509 {client cert, private key, server cert} are all-or-nothing
//! - At most one group may be populated
//! - The private key alone belongs to no group and is rejected
//! - `bootstrap` changes the provisioning shape, never the mode

use std::fmt;
use std::time::Duration;
use tracing::info;

mod credentials;

pub use credentials::{CredentialFiles, CredentialKind, CredentialLoadError};

#[cfg(test)]
mod tests;

pub const DEFAULT_COAP_PORT: u16 = 5683;
pub const DEFAULT_COAPS_PORT: u16 = 5684;
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// Short server id and server object instance id of the management server.
pub const SERVER_SHORT_ID: u16 = 123;
pub const SERVER_LIFETIME: Duration = Duration::from_secs(30);

/// Parsed credential material, as handed over by the credential loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialInputs {
    /// "host[:port]", optionally with a scheme prefix that is ignored
    pub server_address: Option<String>,
    pub bootstrap: bool,
    pub psk_identity: Option<String>,
    pub psk_key: Option<Vec<u8>>,
    /// DER SubjectPublicKeyInfo
    pub client_public_key: Option<Vec<u8>>,
    /// DER PKCS#8
    pub client_private_key: Option<Vec<u8>>,
    pub server_public_key: Option<Vec<u8>>,
    /// DER X.509v3
    pub client_certificate: Option<Vec<u8>>,
    pub server_certificate: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityMode {
    NoSec,
    PreSharedKey,
    RawPublicKey,
    Certificate,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityMode::NoSec => write!(f, "NoSec"),
            SecurityMode::PreSharedKey => write!(f, "PSK"),
            SecurityMode::RawPublicKey => write!(f, "RPK"),
            SecurityMode::Certificate => write!(f, "X509"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Coap,
    Coaps,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Coap => "coap",
            Scheme::Coaps => "coaps",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Coap => DEFAULT_COAP_PORT,
            Scheme::Coaps => DEFAULT_COAPS_PORT,
        }
    }

    pub fn is_secure(self) -> bool {
        self == Scheme::Coaps
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exactly one active credential shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecurityCredentialBundle {
    NoSecurity {
        server_uri: String,
    },
    PreSharedKey {
        server_uri: String,
        identity: String,
        key: Vec<u8>,
    },
    RawPublicKey {
        server_uri: String,
        client_public_key: Vec<u8>,
        client_private_key: Vec<u8>,
        server_public_key: Vec<u8>,
    },
    Certificate {
        server_uri: String,
        client_certificate: Vec<u8>,
        client_private_key: Vec<u8>,
        server_certificate: Vec<u8>,
    },
}

impl SecurityCredentialBundle {
    pub fn mode(&self) -> SecurityMode {
        match self {
            SecurityCredentialBundle::NoSecurity { .. } => SecurityMode::NoSec,
            SecurityCredentialBundle::PreSharedKey { .. } => SecurityMode::PreSharedKey,
            SecurityCredentialBundle::RawPublicKey { .. } => SecurityMode::RawPublicKey,
            SecurityCredentialBundle::Certificate { .. } => SecurityMode::Certificate,
        }
    }

    pub fn server_uri(&self) -> &str {
        match self {
            SecurityCredentialBundle::NoSecurity { server_uri }
            | SecurityCredentialBundle::PreSharedKey { server_uri, .. }
            | SecurityCredentialBundle::RawPublicKey { server_uri, .. }
            | SecurityCredentialBundle::Certificate { server_uri, .. } => server_uri,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingMode {
    /// UDP
    U,
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingMode::U => write!(f, "U"),
        }
    }
}

/// Pre-provisioned management server object instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerEntry {
    pub instance_id: u16,
    pub short_server_id: u16,
    pub lifetime: Duration,
    pub binding: BindingMode,
    pub queue_mode: bool,
}

impl Default for ServerEntry {
    fn default() -> Self {
        Self {
            instance_id: SERVER_SHORT_ID,
            short_server_id: SERVER_SHORT_ID,
            lifetime: SERVER_LIFETIME,
            binding: BindingMode::U,
            queue_mode: false,
        }
    }
}

/// How the server object is set up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerProvisioning {
    /// Object class registered without instances; the bootstrap server fills it
    ClassOnly,
    Instance(ServerEntry),
}

/// Security object instance for the target server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecurityEntry {
    pub bootstrap: bool,
    /// None for bootstrap servers
    pub short_server_id: Option<u16>,
}

/// Outcome of a successful resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSecurity {
    pub scheme: Scheme,
    pub credentials: SecurityCredentialBundle,
    pub security_entry: SecurityEntry,
    pub server: ServerProvisioning,
}

impl ResolvedSecurity {
    pub fn mode(&self) -> SecurityMode {
        self.credentials.mode()
    }

    pub fn server_uri(&self) -> &str {
        self.credentials.server_uri()
    }

    /// Log the selected mode; public material is printed as hex.
    pub fn log_summary(&self) {
        info!(
            mode = %self.mode(),
            server_uri = %self.server_uri(),
            bootstrap = self.security_entry.bootstrap,
            "Security mode resolved"
        );
        match &self.credentials {
            SecurityCredentialBundle::NoSecurity { .. } => {}
            SecurityCredentialBundle::PreSharedKey { identity, .. } => {
                info!(identity = %identity, "Using pre-shared key");
            }
            SecurityCredentialBundle::RawPublicKey {
                client_public_key,
                server_public_key,
                ..
            } => {
                info!(
                    client_public_key = %hex::encode(client_public_key),
                    server_public_key = %hex::encode(server_public_key),
                    "Using raw public keys"
                );
            }
            SecurityCredentialBundle::Certificate {
                client_certificate, ..
            } => {
                info!(
                    client_certificate = %hex::encode(client_certificate),
                    "Using X.509 certificate"
                );
            }
        }
    }
}

/// Validation failures, each naming the rule that was broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// More than one credential group has inputs
    ConflictingGroups(Vec<SecurityMode>),
    /// PSK identity and key must be given together
    IncompletePsk { missing: &'static str },
    IncompleteRpk { missing: Vec<&'static str> },
    IncompleteX509 { missing: Vec<&'static str> },
    /// Private key given without any RPK or X.509 companion
    OrphanPrivateKey,
    InvalidServerAddress(String),
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityError::ConflictingGroups(modes) => {
                let names: Vec<String> = modes.iter().map(|m| m.to_string()).collect();
                write!(
                    f,
                    "credentials for more than one security mode given: {}",
                    names.join(", ")
                )
            }
            SecurityError::IncompletePsk { missing } => {
                write!(f, "PSK requires identity and key, missing {}", missing)
            }
            SecurityError::IncompleteRpk { missing } => write!(
                f,
                "RPK requires client public key, client private key and server public key, missing {}",
                missing.join(", ")
            ),
            SecurityError::IncompleteX509 { missing } => write!(
                f,
                "X.509 requires client certificate, client private key and server certificate, missing {}",
                missing.join(", ")
            ),
            SecurityError::OrphanPrivateKey => write!(
                f,
                "client private key given without RPK public keys or X.509 certificates"
            ),
            SecurityError::InvalidServerAddress(addr) => {
                write!(f, "invalid server address '{}'", addr)
            }
        }
    }
}

impl std::error::Error for SecurityError {}

/// Resolve the security mode. Performs no I/O.
pub fn resolve(inputs: &CredentialInputs) -> Result<ResolvedSecurity, SecurityError> {
    let mode = select_mode(inputs)?;
    let scheme = derive_scheme(inputs);
    let server_uri = server_uri(scheme, inputs.server_address.as_deref())?;
    let credentials = build_bundle(mode, server_uri, inputs)?;

    let (security_entry, server) = if inputs.bootstrap {
        (
            SecurityEntry {
                bootstrap: true,
                short_server_id: None,
            },
            ServerProvisioning::ClassOnly,
        )
    } else {
        (
            SecurityEntry {
                bootstrap: false,
                short_server_id: Some(SERVER_SHORT_ID),
            },
            ServerProvisioning::Instance(ServerEntry::default()),
        )
    };

    Ok(ResolvedSecurity {
        scheme,
        credentials,
        security_entry,
        server,
    })
}

/// Secure scheme when any group's leading credential is present.
pub fn derive_scheme(inputs: &CredentialInputs) -> Scheme {
    if inputs.psk_identity.is_some()
        || inputs.client_public_key.is_some()
        || inputs.client_certificate.is_some()
    {
        Scheme::Coaps
    } else {
        Scheme::Coap
    }
}

fn select_mode(inputs: &CredentialInputs) -> Result<SecurityMode, SecurityError> {
    let psk = inputs.psk_identity.is_some() || inputs.psk_key.is_some();
    let rpk = inputs.client_public_key.is_some() || inputs.server_public_key.is_some();
    let x509 = inputs.client_certificate.is_some() || inputs.server_certificate.is_some();

    let touched: Vec<SecurityMode> = [
        (psk, SecurityMode::PreSharedKey),
        (rpk, SecurityMode::RawPublicKey),
        (x509, SecurityMode::Certificate),
    ]
    .into_iter()
    .filter_map(|(present, mode)| present.then_some(mode))
    .collect();

    match touched.as_slice() {
        [] if inputs.client_private_key.is_some() => Err(SecurityError::OrphanPrivateKey),
        [] => Ok(SecurityMode::NoSec),
        [mode] => Ok(*mode),
        _ => Err(SecurityError::ConflictingGroups(touched)),
    }
}

fn build_bundle(
    mode: SecurityMode,
    server_uri: String,
    inputs: &CredentialInputs,
) -> Result<SecurityCredentialBundle, SecurityError> {
    match mode {
        SecurityMode::NoSec => Ok(SecurityCredentialBundle::NoSecurity { server_uri }),
        SecurityMode::PreSharedKey => match (&inputs.psk_identity, &inputs.psk_key) {
            (Some(identity), Some(key)) => Ok(SecurityCredentialBundle::PreSharedKey {
                server_uri,
                identity: identity.clone(),
                key: key.clone(),
            }),
            (Some(_), None) => Err(SecurityError::IncompletePsk { missing: "key" }),
            _ => Err(SecurityError::IncompletePsk {
                missing: "identity",
            }),
        },
        SecurityMode::RawPublicKey => {
            match (
                &inputs.client_public_key,
                &inputs.client_private_key,
                &inputs.server_public_key,
            ) {
                (Some(cpub), Some(cpriv), Some(spub)) => {
                    Ok(SecurityCredentialBundle::RawPublicKey {
                        server_uri,
                        client_public_key: cpub.clone(),
                        client_private_key: cpriv.clone(),
                        server_public_key: spub.clone(),
                    })
                }
                (cpub, cpriv, spub) => Err(SecurityError::IncompleteRpk {
                    missing: missing_fields(&[
                        (cpub.is_none(), "client public key"),
                        (cpriv.is_none(), "client private key"),
                        (spub.is_none(), "server public key"),
                    ]),
                }),
            }
        }
        SecurityMode::Certificate => {
            match (
                &inputs.client_certificate,
                &inputs.client_private_key,
                &inputs.server_certificate,
            ) {
                (Some(ccert), Some(cpriv), Some(scert)) => {
                    Ok(SecurityCredentialBundle::Certificate {
                        server_uri,
                        client_certificate: ccert.clone(),
                        client_private_key: cpriv.clone(),
                        server_certificate: scert.clone(),
                    })
                }
                (ccert, cpriv, scert) => Err(SecurityError::IncompleteX509 {
                    missing: missing_fields(&[
                        (ccert.is_none(), "client certificate"),
                        (cpriv.is_none(), "client private key"),
                        (scert.is_none(), "server certificate"),
                    ]),
                }),
            }
        }
    }
}

fn missing_fields(fields: &[(bool, &'static str)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(missing, _)| *missing)
        .map(|(_, name)| *name)
        .collect()
}

/// Build the server URI. Any scheme on `address` is replaced by `scheme`;
/// the scheme's default port is used when none is given.
pub fn server_uri(scheme: Scheme, address: Option<&str>) -> Result<String, SecurityError> {
    let address = match address.map(str::trim) {
        None => {
            return Ok(format!(
                "{}://{}:{}",
                scheme,
                DEFAULT_SERVER_HOST,
                scheme.default_port()
            ))
        }
        Some(a) => a,
    };

    let host_port = match address.split_once("://") {
        Some((_, rest)) => rest,
        None => address,
    }
    .trim_end_matches('/');

    if host_port.is_empty() || host_port.contains('/') || host_port.contains(char::is_whitespace) {
        return Err(SecurityError::InvalidServerAddress(address.to_string()));
    }

    if has_port(host_port) {
        Ok(format!("{}://{}", scheme, host_port))
    } else {
        Ok(format!("{}://{}:{}", scheme, host_port, scheme.default_port()))
    }
}

/// Whether "host:port" / "[v6]:port" carries a port.
fn has_port(host_port: &str) -> bool {
    if host_port.starts_with('[') {
        host_port.contains("]:")
    } else {
        host_port.contains(':')
    }
}
