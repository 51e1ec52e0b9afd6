use super::credentials::public_key_algorithm;
use super::*;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn bytes(b: u8) -> Option<Vec<u8>> {
    Some(vec![b; 8])
}

fn psk() -> CredentialInputs {
    CredentialInputs {
        psk_identity: Some("sim-01".to_string()),
        psk_key: Some(b"secretPSK".to_vec()),
        ..Default::default()
    }
}

fn rpk() -> CredentialInputs {
    CredentialInputs {
        client_public_key: bytes(1),
        client_private_key: bytes(2),
        server_public_key: bytes(3),
        ..Default::default()
    }
}

fn x509() -> CredentialInputs {
    CredentialInputs {
        client_certificate: bytes(4),
        client_private_key: bytes(2),
        server_certificate: bytes(5),
        ..Default::default()
    }
}

// --- mode selection ---

#[test]
fn test_no_inputs_is_nosec_on_default_port() {
    let resolved = resolve(&CredentialInputs::default()).unwrap();

    assert_eq!(resolved.mode(), SecurityMode::NoSec);
    assert_eq!(resolved.scheme, Scheme::Coap);
    assert!(!resolved.scheme.is_secure());
    assert_eq!(resolved.server_uri(), "coap://localhost:5683");
    assert!(resolved.server_uri().ends_with(&format!(":{}", DEFAULT_COAP_PORT)));
}

#[test]
fn test_psk_identity_without_key_fails() {
    let inputs = CredentialInputs {
        psk_identity: Some("sim-01".to_string()),
        ..Default::default()
    };

    assert_eq!(
        resolve(&inputs).unwrap_err(),
        SecurityError::IncompletePsk { missing: "key" }
    );
}

#[test]
fn test_psk_key_without_identity_fails() {
    let inputs = CredentialInputs {
        psk_key: Some(vec![1, 2, 3]),
        ..Default::default()
    };

    assert_eq!(
        resolve(&inputs).unwrap_err(),
        SecurityError::IncompletePsk {
            missing: "identity"
        }
    );
}

#[test]
fn test_psk_complete_is_secure() {
    let resolved = resolve(&psk()).unwrap();

    assert_eq!(resolved.scheme, Scheme::Coaps);
    assert_eq!(
        resolved.credentials,
        SecurityCredentialBundle::PreSharedKey {
            server_uri: "coaps://localhost:5684".to_string(),
            identity: "sim-01".to_string(),
            key: b"secretPSK".to_vec(),
        }
    );
}

#[test]
fn test_rpk_complete() {
    let resolved = resolve(&rpk()).unwrap();

    assert_eq!(resolved.mode(), SecurityMode::RawPublicKey);
    assert_eq!(resolved.scheme, Scheme::Coaps);
}

#[test]
fn test_x509_complete() {
    let resolved = resolve(&x509()).unwrap();

    assert_eq!(resolved.mode(), SecurityMode::Certificate);
    assert_eq!(resolved.scheme, Scheme::Coaps);
    match resolved.credentials {
        SecurityCredentialBundle::Certificate {
            client_certificate,
            server_certificate,
            ..
        } => {
            assert_eq!(client_certificate, vec![4; 8]);
            assert_eq!(server_certificate, vec![5; 8]);
        }
        other => panic!("Expected Certificate, got {:?}", other),
    }
}

#[test]
fn test_rpk_plus_x509_cert_conflicts() {
    let mut inputs = rpk();
    inputs.client_certificate = bytes(4);

    assert_eq!(
        resolve(&inputs).unwrap_err(),
        SecurityError::ConflictingGroups(vec![
            SecurityMode::RawPublicKey,
            SecurityMode::Certificate
        ])
    );
}

#[test]
fn test_psk_plus_rpk_conflicts() {
    let mut inputs = psk();
    inputs.server_public_key = bytes(3);

    assert!(matches!(
        resolve(&inputs),
        Err(SecurityError::ConflictingGroups(_))
    ));
}

#[test]
fn test_incomplete_rpk_names_missing_fields() {
    let inputs = CredentialInputs {
        client_public_key: bytes(1),
        ..Default::default()
    };

    assert_eq!(
        resolve(&inputs).unwrap_err(),
        SecurityError::IncompleteRpk {
            missing: vec!["client private key", "server public key"]
        }
    );
}

#[test]
fn test_incomplete_x509() {
    let mut inputs = x509();
    inputs.server_certificate = None;

    assert_eq!(
        resolve(&inputs).unwrap_err(),
        SecurityError::IncompleteX509 {
            missing: vec!["server certificate"]
        }
    );
}

#[test]
fn test_private_key_alone_is_rejected() {
    let inputs = CredentialInputs {
        client_private_key: bytes(2),
        ..Default::default()
    };

    assert_eq!(resolve(&inputs).unwrap_err(), SecurityError::OrphanPrivateKey);
}

#[test]
fn test_error_messages_name_the_rule() {
    let err = SecurityError::ConflictingGroups(vec![
        SecurityMode::PreSharedKey,
        SecurityMode::Certificate,
    ]);
    assert_eq!(
        err.to_string(),
        "credentials for more than one security mode given: PSK, X509"
    );
    assert!(SecurityError::OrphanPrivateKey
        .to_string()
        .contains("private key"));
}

// --- provisioning shape ---

#[test]
fn test_management_server_entry() {
    let resolved = resolve(&psk()).unwrap();

    assert_eq!(
        resolved.security_entry,
        SecurityEntry {
            bootstrap: false,
            short_server_id: Some(123),
        }
    );
    assert_eq!(
        resolved.server,
        ServerProvisioning::Instance(ServerEntry {
            instance_id: 123,
            short_server_id: 123,
            lifetime: Duration::from_secs(30),
            binding: BindingMode::U,
            queue_mode: false,
        })
    );
}

#[test]
fn test_bootstrap_keeps_mode_and_changes_shape() {
    for inputs in [CredentialInputs::default(), psk(), rpk(), x509()] {
        let direct = resolve(&inputs).unwrap();
        let bootstrap = resolve(&CredentialInputs {
            bootstrap: true,
            ..inputs
        })
        .unwrap();

        assert_eq!(bootstrap.mode(), direct.mode());
        assert_eq!(bootstrap.scheme, direct.scheme);
        assert_eq!(bootstrap.credentials, direct.credentials);
        assert!(bootstrap.security_entry.bootstrap);
        assert_eq!(bootstrap.security_entry.short_server_id, None);
        assert_eq!(bootstrap.server, ServerProvisioning::ClassOnly);
    }
}

#[test]
fn test_resolution_is_deterministic() {
    let inputs = x509();
    assert_eq!(resolve(&inputs).unwrap(), resolve(&inputs).unwrap());
}

// --- server URI ---

#[test]
fn test_explicit_address_keeps_derived_scheme() {
    let inputs = CredentialInputs {
        server_address: Some("coaps://leshan.example.com:5999".to_string()),
        ..Default::default()
    };
    let resolved = resolve(&inputs).unwrap();

    // No credentials, so the scheme in the address is ignored
    assert_eq!(resolved.server_uri(), "coap://leshan.example.com:5999");

    let inputs = CredentialInputs {
        server_address: Some("leshan.example.com".to_string()),
        ..psk()
    };
    assert_eq!(
        resolve(&inputs).unwrap().server_uri(),
        "coaps://leshan.example.com:5684"
    );
}

#[test]
fn test_server_uri_forms() {
    assert_eq!(
        server_uri(Scheme::Coap, Some("10.0.0.1:7000")).unwrap(),
        "coap://10.0.0.1:7000"
    );
    assert_eq!(
        server_uri(Scheme::Coaps, Some("[::1]")).unwrap(),
        "coaps://[::1]:5684"
    );
    assert_eq!(
        server_uri(Scheme::Coap, Some("[::1]:6000")).unwrap(),
        "coap://[::1]:6000"
    );
    assert_eq!(
        server_uri(Scheme::Coap, Some("host/")).unwrap(),
        "coap://host:5683"
    );
    assert!(matches!(
        server_uri(Scheme::Coap, Some("")),
        Err(SecurityError::InvalidServerAddress(_))
    ));
    assert!(matches!(
        server_uri(Scheme::Coap, Some("coap://host/rd")),
        Err(SecurityError::InvalidServerAddress(_))
    ));
}

#[test]
fn test_derive_scheme_uses_leading_credentials() {
    assert_eq!(derive_scheme(&psk()), Scheme::Coaps);
    assert_eq!(derive_scheme(&rpk()), Scheme::Coaps);
    assert_eq!(derive_scheme(&x509()), Scheme::Coaps);

    let key_only = CredentialInputs {
        psk_key: Some(vec![1]),
        ..Default::default()
    };
    assert_eq!(derive_scheme(&key_only), Scheme::Coap);
}

// --- credential loading ---

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_public_key_algorithm() {
    let ec = std::fs::read(fixture("client_public.der")).unwrap();
    assert_eq!(public_key_algorithm(&ec).unwrap(), "1.2.840.10045.2.1");

    let rsa = std::fs::read(fixture("rsa_public.der")).unwrap();
    assert_eq!(public_key_algorithm(&rsa).unwrap(), "1.2.840.113549.1.1.1");

    assert!(public_key_algorithm(&[]).is_err());
}

#[test]
fn test_load_psk_hex() {
    let files = CredentialFiles {
        psk_identity: Some("sim-01".to_string()),
        psk_key: Some("73656372657450534b".to_string()),
        ..Default::default()
    };

    let inputs = files.load(Some("host:5684".to_string()), true).unwrap();
    assert_eq!(inputs.psk_key.as_deref(), Some(&b"secretPSK"[..]));
    assert_eq!(inputs.server_address.as_deref(), Some("host:5684"));
    assert!(inputs.bootstrap);
    assert_eq!(resolve(&inputs).unwrap().mode(), SecurityMode::PreSharedKey);
}

#[test]
fn test_load_invalid_hex() {
    let files = CredentialFiles {
        psk_identity: Some("sim-01".to_string()),
        psk_key: Some("not-hex".to_string()),
        ..Default::default()
    };

    assert!(matches!(
        files.load(None, false),
        Err(CredentialLoadError::InvalidHex { field: "psk_key", .. })
    ));
}

#[test]
fn test_load_rpk_files() {
    let files = CredentialFiles {
        client_public_key: Some(fixture("client_public.der")),
        client_private_key: Some(fixture("client_private.der")),
        server_public_key: Some(fixture("server_public.der")),
        ..Default::default()
    };

    let inputs = files.load(None, false).unwrap();
    let expected = std::fs::read(fixture("client_public.der")).unwrap();
    assert_eq!(inputs.client_public_key, Some(expected));

    let resolved = resolve(&inputs).unwrap();
    assert_eq!(resolved.mode(), SecurityMode::RawPublicKey);
    resolved.log_summary();
}

#[test]
fn test_load_x509_files() {
    let files = CredentialFiles {
        client_certificate: Some(fixture("client_cert.der")),
        client_private_key: Some(fixture("client_private.der")),
        server_certificate: Some(fixture("server_cert.der")),
        ..Default::default()
    };

    let inputs = files.load(Some("coaps://host".to_string()), false).unwrap();
    assert_eq!(resolve(&inputs).unwrap().mode(), SecurityMode::Certificate);
}

#[test]
fn test_load_rejects_non_ec_public_key() {
    let files = CredentialFiles {
        client_public_key: Some(fixture("rsa_public.der")),
        ..Default::default()
    };

    let err = files.load(None, false).unwrap_err();
    match &err {
        CredentialLoadError::UnsupportedPublicKey { algorithm, .. } => {
            assert_eq!(algorithm, "1.2.840.113549.1.1.1");
        }
        other => panic!("expected UnsupportedPublicKey, got {:?}", other),
    }
    assert!(err.to_string().contains("rsa_public.der"));
}

#[test]
fn test_load_rejects_junk_public_key() {
    let dir = tempfile::tempdir().unwrap();
    // Text around the id-ecPublicKey OID bytes
    let mut junk = b"hello world ".to_vec();
    junk.extend_from_slice(&[0x06, 0x07, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x02, 0x01]);
    let files = CredentialFiles {
        client_public_key: Some(write_file(&dir, "junk.der", &junk)),
        ..Default::default()
    };

    let err = files.load(None, false).unwrap_err();
    assert!(matches!(
        err,
        CredentialLoadError::Malformed {
            kind: CredentialKind::PublicKey,
            ..
        }
    ));
    assert!(err.to_string().contains("junk.der"));
}

#[test]
fn test_load_rejects_trailing_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let mut padded = std::fs::read(fixture("server_public.der")).unwrap();
    padded.extend_from_slice(&[0, 0]);
    let files = CredentialFiles {
        server_public_key: Some(write_file(&dir, "padded.der", &padded)),
        ..Default::default()
    };

    match files.load(None, false) {
        Err(CredentialLoadError::Malformed { reason, .. }) => {
            assert_eq!(reason, "2 trailing bytes");
        }
        other => panic!("expected Malformed, got {:?}", other),
    }
}

#[test]
fn test_load_rejects_junk_private_key() {
    let dir = tempfile::tempdir().unwrap();
    let junk = CredentialFiles {
        client_private_key: Some(write_file(&dir, "key.der", b"this is not a key")),
        ..Default::default()
    };
    assert!(matches!(
        junk.load(None, false),
        Err(CredentialLoadError::Malformed {
            kind: CredentialKind::PrivateKey,
            ..
        })
    ));

    // Well-formed DER of the wrong shape
    let certificate = CredentialFiles {
        client_private_key: Some(fixture("client_cert.der")),
        ..Default::default()
    };
    assert!(matches!(
        certificate.load(None, false),
        Err(CredentialLoadError::Malformed {
            kind: CredentialKind::PrivateKey,
            ..
        })
    ));
}

#[test]
fn test_load_rejects_junk_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let junk = CredentialFiles {
        client_certificate: Some(write_file(&dir, "cert.der", b"this is not a certificate")),
        ..Default::default()
    };
    assert!(matches!(
        junk.load(None, false),
        Err(CredentialLoadError::Malformed {
            kind: CredentialKind::Certificate,
            ..
        })
    ));

    let public_key = CredentialFiles {
        server_certificate: Some(fixture("server_public.der")),
        ..Default::default()
    };
    let err = public_key.load(None, false).unwrap_err();
    assert!(matches!(
        err,
        CredentialLoadError::Malformed {
            kind: CredentialKind::Certificate,
            ..
        }
    ));
    assert!(err.to_string().contains("X.509 certificate"));
}

#[test]
fn test_load_missing_and_empty_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = CredentialFiles {
        client_certificate: Some(dir.path().join("absent.der")),
        ..Default::default()
    };
    assert!(matches!(
        missing.load(None, false),
        Err(CredentialLoadError::Read { .. })
    ));

    let empty = CredentialFiles {
        server_certificate: Some(write_file(&dir, "empty.der", b"")),
        ..Default::default()
    };
    assert!(matches!(
        empty.load(None, false),
        Err(CredentialLoadError::Empty { .. })
    ));
}

#[test]
fn test_load_nothing_configured() {
    let inputs = CredentialFiles::default().load(None, false).unwrap();
    assert_eq!(inputs, CredentialInputs::default());
}
