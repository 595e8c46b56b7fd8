// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! End-Entity Minter: turns a requested common name into a short-lived leaf
certificate, chained to a [`ResolvedSigner`]'s issuer key and certificate.
*/

use {
    crate::{config::ResolvedSigner, error::SignerError},
    bcder::{ConstOid, Oid},
    cms::{Certificate, CertificateBuilder, CertificateKeyAlgorithm, LeafKeyAlgorithm, SigningKey},
};

/// 2.5.4.10 (organizationName)
const OID_ORGANIZATION_NAME: ConstOid = Oid(&[85, 4, 10]);

/// 2.5.4.6 (countryName)
const OID_COUNTRY_NAME: ConstOid = Oid(&[85, 4, 6]);

/// A minted leaf's validity period, bounded to stay well inside the
/// issuer's own window and usable immediately.
const LEAF_VALIDITY_DAYS: i64 = 30;

/// Mint a leaf certificate bearing `common_name`, signed by `signer`'s
/// issuer key.
///
/// `common_name` must be non-empty; the caller (the top-level `signData`
/// orchestration) is responsible for resolving it from the pinned or
/// requested CN before calling this.
pub fn mint_leaf(
    signer: &ResolvedSigner,
    common_name: &str,
) -> Result<(Certificate, SigningKey), SignerError> {
    if common_name.is_empty() {
        return Err(SignerError::CertBuildFailure(
            "common name must not be empty".to_string(),
        ));
    }

    let leaf_key_algorithm = match signer.issuer_key().certificate_key_algorithm() {
        CertificateKeyAlgorithm::Ec => LeafKeyAlgorithm::EcdsaP256,
        CertificateKeyAlgorithm::Ed25519 => LeafKeyAlgorithm::Ed25519,
        CertificateKeyAlgorithm::Rsa => {
            return Err(SignerError::CertBuildFailure(
                "issuer key algorithm is RSA; ring cannot generate fresh RSA leaf keys"
                    .to_string(),
            ))
        }
    };

    let issuer_validity = signer.issuer_certificate().validity();
    let issuer_not_before: chrono::DateTime<chrono::Utc> = *issuer_validity.not_before.as_ref();
    let issuer_not_after: chrono::DateTime<chrono::Utc> = *issuer_validity.not_after.as_ref();

    let now = chrono::Utc::now();
    let not_before = now.max(issuer_not_before);
    let not_after = (now + chrono::Duration::days(LEAF_VALIDITY_DAYS)).min(issuer_not_after);

    if not_before >= not_after {
        return Err(SignerError::CertBuildFailure(format!(
            "issuer's remaining validity window ({not_before} to {not_after}) cannot accommodate a new leaf"
        )));
    }

    let mut builder = CertificateBuilder::new(signer.issuer_key(), signer.issuer_certificate())
        .leaf_key_algorithm(leaf_key_algorithm)
        .validity(not_before, not_after)
        .common_name(common_name)
        .map_err(|e| SignerError::CertBuildFailure(format!("invalid common name: {e}")))?
        .organizational_unit_name(signer.ou())
        .map_err(|e| SignerError::CertBuildFailure(format!("invalid organizational unit: {e}")))?;

    for attribute in mirrored_issuer_attributes(signer.issuer_certificate()) {
        builder = builder.additional_subject_attribute(attribute);
    }

    builder.mint().map_err(|e| match e {
        cms::CertificateBuilderError::KeyGeneration(e) => SignerError::KeyGenFailure(e),
        cms::CertificateBuilderError::Cms(e) => {
            SignerError::CertBuildFailure(format!("issuer failed to sign minted leaf: {e}"))
        }
    })
}

/// Attributes to copy verbatim from the issuer's subject onto the leaf
/// being minted, so the leaf reads as belonging to the same organization as
/// its issuer.
fn mirrored_issuer_attributes(
    issuer_certificate: &Certificate,
) -> Vec<cms::asn1::rfc3280::AttributeTypeAndValue> {
    let cms::asn1::rfc3280::Name::RdnSequence(rdn_sequence) = issuer_certificate.subject();

    rdn_sequence
        .iter()
        .flat_map(|rdn| rdn.iter())
        .filter(|atv| atv.typ == OID_ORGANIZATION_NAME || atv.typ == OID_COUNTRY_NAME)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            config::{ResolvedSigner, SignerConfig},
            mode::Mode,
        },
        cms::asn1::{
            common::Time,
            rfc3280::{Name, RelativeDistinguishedName},
            rfc5280::{
                AlgorithmIdentifier, Certificate as RawCertificate, SubjectPublicKeyInfo,
                TbsCertificate, Validity, Version,
            },
        },
        cms::SignatureAlgorithm,
    };

    /// Build a self-signed issuer certificate with CA/KeyUsage/EKU
    /// extensions satisfying [`ResolvedSigner::construct`]'s invariants,
    /// PEM-encode both halves, and resolve a signer from them.
    fn resolved_signer(mode: &str) -> ResolvedSigner {
        let rng = ring::rand::SystemRandom::new();
        let document = ring::signature::EcdsaKeyPair::generate_pkcs8(
            &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            &rng,
        )
        .unwrap();

        let issuer_key = SigningKey::from_pkcs8_der(document.as_ref()).unwrap();

        let mut rdn = RelativeDistinguishedName::default();
        rdn.set_common_name("xpi test issuer").unwrap();
        rdn.set_organization_name("Mozilla Corporation").unwrap();

        let now = chrono::Utc::now();
        let not_before = now - chrono::Duration::days(1);
        let not_after = now + chrono::Duration::days(3650);

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: 1.into(),
            signature: AlgorithmIdentifier {
                algorithm: SignatureAlgorithm::EcdsaSha256.into(),
                parameters: None,
            },
            issuer: Name::from(rdn.clone()),
            validity: Validity {
                not_before: Time::from(not_before),
                not_after: Time::from(not_after),
            },
            subject: Name::from(rdn),
            subject_public_key_info: SubjectPublicKeyInfo {
                algorithm: AlgorithmIdentifier {
                    algorithm: CertificateKeyAlgorithm::Ec.into(),
                    parameters: None,
                },
                subject_public_key: bcder::BitString::new(
                    0,
                    bytes::Bytes::from(issuer_key.public_key_bytes()),
                ),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(issuer_extensions()),
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

        ResolvedSigner::construct(SignerConfig {
            id: "test-signer".to_string(),
            signer_type: "xpi".to_string(),
            mode: mode.to_string(),
            private_key_pem: key_pem,
            certificate: cert_pem,
        })
        .unwrap()
    }

    fn issuer_extensions() -> cms::asn1::rfc5280::Extensions {
        use cms::asn1::rfc5280::Extension;

        let basic_constraints = bcder::encode::sequence(true.encode()).to_captured(bcder::Mode::Ber);

        let basic_constraints_ext = Extension {
            id: Oid(bytes::Bytes::copy_from_slice(&[85, 29, 19])),
            critical: Some(true),
            value: bcder::OctetString::new(bytes::Bytes::copy_from_slice(
                basic_constraints.as_ref(),
            )),
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

        cms::asn1::rfc5280::Extensions::new(vec![
            basic_constraints_ext,
            key_usage_ext,
            eku_ext,
        ])
    }

    #[test]
    fn mints_leaf_with_resolved_ou_and_mirrored_organization() {
        let signer = resolved_signer("add-on");

        let (leaf, _leaf_key) = mint_leaf(&signer, "carol@example.net").unwrap();

        assert_eq!(leaf.issuer(), signer.issuer_certificate().subject());
        leaf.verify_signature(signer.issuer_certificate()).unwrap();

        let cms::asn1::rfc3280::Name::RdnSequence(rdn_sequence) = leaf.subject();
        let attrs: Vec<_> = rdn_sequence.iter().flat_map(|rdn| rdn.iter()).collect();

        assert!(attrs
            .iter()
            .any(|atv| atv.typ == OID_ORGANIZATION_NAME));
    }

    #[test]
    fn rejects_empty_common_name() {
        let signer = resolved_signer("hotfix");
        assert!(mint_leaf(&signer, "").is_err());
        assert_eq!(Mode::Hotfix, signer.mode());
    }
}
