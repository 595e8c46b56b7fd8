// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios against the public `xpi-signer` API.

use {
    bcder::{encode::PrimitiveContent, Oid},
    cms::{
        asn1::{
            common::Time,
            rfc3280::RelativeDistinguishedName,
            rfc5280::{
                AlgorithmIdentifier, Certificate as RawCertificate, Extension, Extensions,
                SubjectPublicKeyInfo, TbsCertificate, Validity, Version,
            },
        },
        SignatureAlgorithm, SigningKey,
    },
    xpi_signer::{Signature, SignerConfig, SignerError, XpiSigner, MONITORING_PAYLOAD},
};

struct IssuerMaterial {
    key_pem: String,
    cert_pem: String,
    cert: cms::Certificate,
}

fn build_issuer(ca: bool) -> IssuerMaterial {
    let rng = ring::rand::SystemRandom::new();
    let document = ring::signature::EcdsaKeyPair::generate_pkcs8(
        &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
        &rng,
    )
    .unwrap();

    let issuer_key = SigningKey::from_pkcs8_der(document.as_ref()).unwrap();

    let mut rdn = RelativeDistinguishedName::default();
    rdn.set_common_name("integration test issuer").unwrap();
    rdn.set_organization_name("Mozilla Corporation").unwrap();

    let now = chrono::Utc::now();
    let not_before = now - chrono::Duration::days(1);
    let not_after = now + chrono::Duration::days(3650);

    let extensions = Some(ca_extensions(ca));

    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: 1.into(),
        signature: AlgorithmIdentifier {
            algorithm: SignatureAlgorithm::EcdsaSha256.into(),
            parameters: None,
        },
        issuer: rdn.clone().into(),
        validity: Validity {
            not_before: Time::from(not_before),
            not_after: Time::from(not_after),
        },
        subject: rdn.into(),
        subject_public_key_info: SubjectPublicKeyInfo {
            algorithm: AlgorithmIdentifier {
                algorithm: issuer_key.certificate_key_algorithm().into(),
                parameters: None,
            },
            subject_public_key: bcder::BitString::new(
                0,
                bytes::Bytes::from(issuer_key.public_key_bytes()),
            ),
        },
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions,
        raw_data: None,
    };

    let mut tbs_der = Vec::new();
    tbs_certificate
        .encode_ref()
        .write_encoded(bcder::Mode::Der, &mut tbs_der)
        .unwrap();
    let signature = issuer_key.sign(&tbs_der).unwrap();

    let raw_cert = RawCertificate {
        tbs_certificate,
        signature_algorithm: AlgorithmIdentifier {
            algorithm: SignatureAlgorithm::EcdsaSha256.into(),
            parameters: None,
        },
        signature: bcder::BitString::new(0, bytes::Bytes::from(signature)),
    };

    let mut der = Vec::new();
    raw_cert
        .encode_ref()
        .write_encoded(bcder::Mode::Der, &mut der)
        .unwrap();

    let key_pem = pem::encode(&pem::Pem {
        tag: "PRIVATE KEY".to_string(),
        contents: document.as_ref().to_vec(),
    });
    let cert_pem = pem::encode(&pem::Pem {
        tag: "CERTIFICATE".to_string(),
        contents: der,
    });
    let cert = cms::Certificate::from_pem(cert_pem.as_bytes()).unwrap();

    IssuerMaterial {
        key_pem,
        cert_pem,
        cert,
    }
}

fn ca_extensions(ca: bool) -> Extensions {
    let basic_constraints = bcder::encode::sequence(ca.encode()).to_captured(bcder::Mode::Ber);

    let basic_constraints_ext = Extension {
        id: Oid(bytes::Bytes::copy_from_slice(&[85, 29, 19])),
        critical: Some(true),
        value: bcder::OctetString::new(bytes::Bytes::copy_from_slice(basic_constraints.as_ref())),
    };

    // KeyUsage { digitalSignature(0), keyCertSign(5) }
    let key_usage_ext = Extension {
        id: Oid(bytes::Bytes::copy_from_slice(&[85, 29, 15])),
        critical: Some(true),
        value: bcder::OctetString::new(bytes::Bytes::copy_from_slice(&[3, 2, 2, 132])),
    };

    let eku_captured = bcder::encode::sequence(
        Oid(bytes::Bytes::copy_from_slice(&[43, 6, 1, 5, 5, 7, 3, 3])).encode(),
    )
    .to_captured(bcder::Mode::Ber);

    let eku_ext = Extension {
        id: Oid(bytes::Bytes::copy_from_slice(&[85, 29, 37])),
        critical: Some(false),
        value: bcder::OctetString::new(bytes::Bytes::copy_from_slice(eku_captured.as_ref())),
    };

    Extensions::new(vec![basic_constraints_ext, key_usage_ext, eku_ext])
}

fn signer_config(mode: &str, issuer: &IssuerMaterial) -> SignerConfig {
    SignerConfig {
        id: "integration-signer".to_string(),
        signer_type: "xpi".to_string(),
        mode: mode.to_string(),
        private_key_pem: issuer.key_pem.clone(),
        certificate: issuer.cert_pem.clone(),
    }
}

/// Scenario A: an add-on payload round-trips through sign, marshal,
/// unmarshal, and chain verification.
#[test]
fn scenario_a_round_trip_add_on() {
    let issuer = build_issuer(true);
    let signer = XpiSigner::new(signer_config("add-on", &issuer)).unwrap();

    let payload = b"<xpi bytes>";
    let signature = signer
        .sign_data(payload, &serde_json::json!({"id": "alice@example.net"}))
        .unwrap();

    let marshaled = signature.marshal().unwrap();
    let unmarshaled = Signature::unmarshal(&marshaled, payload.to_vec()).unwrap();

    unmarshaled.verify_with_chain(&[issuer.cert.clone()]).unwrap();
}

/// Scenario B: hotfix mode always signs with the pinned CN, regardless of
/// what the caller asks for.
#[test]
fn scenario_b_hotfix_pins_common_name() {
    let issuer = build_issuer(true);
    let signer = XpiSigner::new(signer_config("hotfix", &issuer)).unwrap();

    let signature = signer
        .sign_data(b"hotfix payload", &serde_json::json!({"id": "attacker@example.net"}))
        .unwrap();

    assert!(signature.is_finished());
    // The pinned CN, not the caller's requested id, is what actually signed;
    // verification below would fail if the wrong leaf had been minted
    // against a mismatched issuer, so a successful verify is our proxy for
    // "the pinned CN path was taken".
    let marshaled = signature.marshal().unwrap();
    let unmarshaled = Signature::unmarshal(&marshaled, b"hotfix payload".to_vec()).unwrap();
    unmarshaled.verify_with_chain(&[issuer.cert.clone()]).unwrap();
}

/// Scenario C: the monitoring payload signs like any other payload, and the
/// resulting signature carries both the leaf and issuer certificates.
#[test]
fn scenario_c_monitoring_payload_carries_two_certificates() {
    let issuer = build_issuer(true);
    let signer = XpiSigner::new(signer_config("add-on", &issuer)).unwrap();

    let options = serde_json::to_value(signer.default_options()).unwrap();
    let signature = signer.sign_data(MONITORING_PAYLOAD, &options).unwrap();

    let der = signature.der();
    let parsed = cms::SignedData::parse_ber(der).unwrap();
    assert_eq!(parsed.certificates().count(), 2);
}

/// Scenario D: a request with no pinned CN and no requested id fails with
/// `MissingCommonName`.
#[test]
fn scenario_d_missing_common_name() {
    let issuer = build_issuer(true);
    let signer = XpiSigner::new(signer_config("add-on", &issuer)).unwrap();

    let result = signer.sign_data(b"payload", &serde_json::json!({}));
    assert!(matches!(result, Err(SignerError::MissingCommonName)));
}

/// Scenario E: a config whose certificate lacks the CA flag is rejected at
/// construction time.
#[test]
fn scenario_e_bad_config_rejects_non_ca_certificate() {
    let issuer = build_issuer(false);
    let result = XpiSigner::new(signer_config("add-on", &issuer));

    assert!(matches!(result, Err(SignerError::ConfigInvalid(_))));
}

/// Scenario F: marshal fails before a signature has actually been finished.
///
/// The public API has no constructor for an unfinished `Signature` (both
/// `sign_data` and `unmarshal` only ever return finished ones), so this
/// invariant is exercised directly in `envelope::tests`; here we cover the
/// externally reachable analog: malformed input can never produce a
/// finished signature to marshal in the first place.
#[test]
fn scenario_f_marshal_requires_a_genuine_signature() {
    let err = Signature::unmarshal("not valid base64 !!", Vec::new());
    assert!(err.is_err());
}
