// Integration tests: [security] config section through to the resolved mode

use sensorsim::config::SimConfig;
use sensorsim::security::{
    resolve, CredentialLoadError, Scheme, SecurityCredentialBundle, SecurityError, SecurityMode,
    ServerProvisioning,
};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn parse(toml: &str) -> SimConfig {
    toml::from_str(toml).unwrap()
}

fn resolve_config(
    config: &SimConfig,
) -> Result<sensorsim::security::ResolvedSecurity, Box<dyn std::error::Error>> {
    let inputs = config
        .security
        .load(config.server.address.clone(), config.server.bootstrap)?;
    Ok(resolve(&inputs)?)
}

/// Empty config resolves to NoSec on the default insecure port.
#[test]
fn test_default_config_is_nosec() {
    let resolved = resolve_config(&SimConfig::default()).unwrap();

    assert_eq!(resolved.mode(), SecurityMode::NoSec);
    assert_eq!(resolved.server_uri(), "coap://localhost:5683");
    assert!(matches!(resolved.server, ServerProvisioning::Instance(_)));
}

/// PSK from config, bootstrap mode.
#[test]
fn test_psk_bootstrap_from_config() {
    let config = parse(
        r#"
        [server]
        address = "bootstrap.example.com"
        bootstrap = true

        [security]
        psk_identity = "sim-01"
        psk_key = "000102030405"
        "#,
    );

    let resolved = resolve_config(&config).unwrap();
    assert_eq!(resolved.scheme, Scheme::Coaps);
    assert_eq!(resolved.server, ServerProvisioning::ClassOnly);
    assert_eq!(
        resolved.credentials,
        SecurityCredentialBundle::PreSharedKey {
            server_uri: "coaps://bootstrap.example.com:5684".to_string(),
            identity: "sim-01".to_string(),
            key: vec![0, 1, 2, 3, 4, 5],
        }
    );
}

/// RPK files plus a client certificate are two groups.
#[test]
fn test_rpk_with_certificate_conflicts() {
    let config = parse(&format!(
        r#"
        [security]
        client_public_key = "{}"
        client_private_key = "{}"
        server_public_key = "{}"
        client_certificate = "{}"
        "#,
        fixture("client_public.der"),
        fixture("client_private.der"),
        fixture("server_public.der"),
        fixture("client_cert.der"),
    ));

    let err = resolve_config(&config).unwrap_err();
    let err = err.downcast_ref::<SecurityError>().unwrap();
    assert!(matches!(err, SecurityError::ConflictingGroups(_)));
}

/// X.509 files from config resolve to certificate mode over coaps.
#[test]
fn test_x509_from_config() {
    let config = parse(&format!(
        r#"
        [server]
        address = "lwm2m.example.com"

        [security]
        client_certificate = "{}"
        client_private_key = "{}"
        server_certificate = "{}"
        "#,
        fixture("client_cert.der"),
        fixture("client_private.der"),
        fixture("server_cert.der"),
    ));

    let resolved = resolve_config(&config).unwrap();
    assert_eq!(resolved.mode(), SecurityMode::Certificate);
    assert_eq!(resolved.server_uri(), "coaps://lwm2m.example.com:5684");
}

/// A file that is not DER is rejected by the loader, not the resolver.
#[test]
fn test_junk_credential_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.der");
    std::fs::write(&path, b"-----BEGIN CERTIFICATE-----").unwrap();

    let config = parse(&format!(
        r#"
        [security]
        server_certificate = "{}"
        "#,
        path.display()
    ));

    let err = resolve_config(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CredentialLoadError>(),
        Some(CredentialLoadError::Malformed { .. })
    ));
}

/// A missing credential file fails before resolution.
#[test]
fn test_missing_credential_file() {
    let config = parse(
        r#"
        [security]
        client_certificate = "/nonexistent/client.der"
        "#,
    );

    let err = resolve_config(&config).unwrap_err();
    assert!(err.downcast_ref::<CredentialLoadError>().is_some());
}
