//! TLS identity loading tests against the PEM fixtures
//!
//! The fixtures hold two CA certificates, a client certificate, and the same
//! RSA key encoded as PKCS#8, PKCS#1, and PKCS#1 under a PKCS#8 label.

use rumqttc::tokio_rustls::rustls;
use rustls::pki_types::PrivateKeyDer;
use rustls::SignatureScheme;
use sensor_hub_client::config::TlsSection;
use sensor_hub_client::tls::{
    build_secure_transport, parse_private_key, IdentityError, TlsMaterial, TlsMaterialSource,
};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture(name)).unwrap()
}

#[test]
fn test_trusted_root_count_matches_bundle() {
    let single = build_secure_transport(&read_fixture("ca1.pem"), None, None).unwrap();
    assert_eq!(single.trusted_roots(), 1);

    let bundle = build_secure_transport(&read_fixture("ca_bundle.pem"), None, None).unwrap();
    assert_eq!(bundle.trusted_roots(), 2);
}

#[test]
fn test_concatenated_files_equal_bundle() {
    let mut concatenated = read_fixture("ca1.pem");
    concatenated.extend(read_fixture("ca2.pem"));

    let transport = build_secure_transport(&concatenated, None, None).unwrap();
    assert_eq!(transport.trusted_roots(), 2);
}

#[test]
fn test_bundle_without_certificates_is_invalid_ca() {
    let key_only = read_fixture("client_pkcs8.key");
    let result = build_secure_transport(&key_only, None, None);
    assert!(matches!(result, Err(IdentityError::InvalidCa(_))));
}

#[test]
fn test_invalid_ca_fails_even_with_valid_identity() {
    let result = build_secure_transport(
        b"not a bundle",
        Some(&read_fixture("client.crt")),
        Some(&read_fixture("client_pkcs8.key")),
    );
    assert!(matches!(result, Err(IdentityError::InvalidCa(_))));
}

#[test]
fn test_every_key_encoding_yields_the_same_pkcs8() {
    let pkcs8 = parse_private_key(&read_fixture("client_pkcs8.key")).unwrap();

    for name in ["client_pkcs1.key", "client_pkcs1_mislabeled.key"] {
        let parsed = parse_private_key(&read_fixture(name)).unwrap();
        assert_eq!(
            parsed.secret_pkcs8_der(),
            pkcs8.secret_pkcs8_der(),
            "{name} should convert to the PKCS#8 encoding"
        );
    }
}

fn rsa_public_key_der(pkcs8_der: &[u8]) -> Vec<u8> {
    use pkcs1::der::Encode;

    let info = pkcs8::PrivateKeyInfo::try_from(pkcs8_der).unwrap();
    let rsa = pkcs1::RsaPrivateKey::try_from(info.private_key).unwrap();
    rsa.public_key().to_der().unwrap()
}

#[test]
fn test_converted_keys_sign_and_verify() {
    let provider = rustls::crypto::ring::default_provider();
    let (_, verifiers) = provider
        .signature_verification_algorithms
        .mapping
        .iter()
        .find(|(scheme, _)| *scheme == SignatureScheme::RSA_PKCS1_SHA256)
        .unwrap();
    let message = b"arm pico_w_1";

    for name in [
        "client_pkcs8.key",
        "client_pkcs1.key",
        "client_pkcs1_mislabeled.key",
    ] {
        let parsed = parse_private_key(&read_fixture(name)).unwrap();
        let public_key = rsa_public_key_der(parsed.secret_pkcs8_der());

        let signing_key =
            rustls::crypto::ring::sign::any_supported_type(&PrivateKeyDer::Pkcs8(parsed))
                .unwrap_or_else(|e| panic!("{name}: {e}"));
        let signer = signing_key
            .choose_scheme(&[SignatureScheme::RSA_PKCS1_SHA256])
            .unwrap();
        let signature = signer.sign(message).unwrap();

        assert!(
            verifiers[0]
                .verify_signature(&public_key, message, &signature)
                .is_ok(),
            "{name} signature should verify"
        );
        assert!(verifiers[0]
            .verify_signature(&public_key, b"disarm pico_w_1", &signature)
            .is_err());
    }
}

#[test]
fn test_converted_key_is_accepted_for_client_auth() {
    // rustls loads the signing key while building the client config
    for name in [
        "client_pkcs8.key",
        "client_pkcs1.key",
        "client_pkcs1_mislabeled.key",
    ] {
        let transport = build_secure_transport(
            &read_fixture("ca_bundle.pem"),
            Some(&read_fixture("client.crt")),
            Some(&read_fixture(name)),
        )
        .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(transport.has_client_identity());
    }
}

#[test]
fn test_material_source_from_files() {
    let source = TlsMaterialSource::Files(TlsSection {
        ca_bundle: fixture("ca_bundle.pem"),
        client_cert: Some(fixture("client.crt")),
        client_key: Some(fixture("client_pkcs1.key")),
    });

    let transport = source.build().unwrap();
    assert_eq!(transport.trusted_roots(), 2);
    assert!(transport.has_client_identity());
}

#[test]
fn test_material_source_rereads_replaced_files() {
    let dir = tempfile::tempdir().unwrap();
    let ca_path = dir.path().join("ca.pem");
    std::fs::write(&ca_path, read_fixture("ca1.pem")).unwrap();

    let source = TlsMaterialSource::Files(TlsSection {
        ca_bundle: ca_path.clone(),
        client_cert: None,
        client_key: None,
    });
    assert_eq!(source.build().unwrap().trusted_roots(), 1);

    std::fs::write(&ca_path, read_fixture("ca_bundle.pem")).unwrap();
    assert_eq!(source.build().unwrap().trusted_roots(), 2);
}

#[test]
fn test_missing_file_reports_path() {
    let source = TlsMaterialSource::Files(TlsSection {
        ca_bundle: PathBuf::from("/nonexistent/ca.pem"),
        client_cert: None,
        client_key: None,
    });

    match source.build() {
        Err(IdentityError::Io { path, .. }) => {
            assert_eq!(path, PathBuf::from("/nonexistent/ca.pem"))
        }
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn test_in_memory_material_debug_hides_key() {
    let material = TlsMaterial::new(read_fixture("ca1.pem"))
        .with_client_identity(read_fixture("client.crt"), read_fixture("client_pkcs8.key"));

    let debug = format!("{material:?}");
    assert!(!debug.contains("PRIVATE KEY"));
    assert!(TlsMaterialSource::InMemory(material).build().is_ok());
}
