// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! PKCS#7 Assembler: wraps the detached-`SignedData` primitive to produce
the XPI wire format (leaf + issuer certificates, payload digested but not
embedded).
*/

use {
    crate::error::SignerError,
    cms::{Certificate, SignedDataBuilder, SignerBuilder, SigningKey},
};

/// Assemble a detached PKCS#7 `SignedData` over `payload`, signed by
/// `leaf_key`/`leaf_certificate`, carrying both `leaf_certificate` and
/// `issuer_certificate` in its certificate set.
///
/// The returned bytes never contain `payload`; callers must supply it again
/// at verification time.
pub fn assemble(
    payload: &[u8],
    leaf_certificate: Certificate,
    leaf_key: &SigningKey,
    issuer_certificate: Certificate,
) -> Result<Vec<u8>, SignerError> {
    let signer = SignerBuilder::new(leaf_key, leaf_certificate.clone())
        .message_id_content(payload.to_vec());

    let builder = SignedDataBuilder::default()
        .signer(signer)
        .certificate(leaf_certificate)
        .map_err(|e| stage_error("chain", e))?
        .certificate(issuer_certificate)
        .map_err(|e| stage_error("chain", e))?;

    builder.build_ber().map_err(|e| stage_error("finish", e))
}

fn stage_error(stage: &'static str, source: cms::CmsError) -> SignerError {
    SignerError::SignFailure {
        stage,
        reason: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_leaf_and_issuer() -> (Certificate, SigningKey, Certificate) {
        use cms::{
            asn1::{
                common::Time,
                rfc3280::RelativeDistinguishedName,
                rfc5280::{
                    AlgorithmIdentifier, Certificate as RawCertificate, SubjectPublicKeyInfo,
                    TbsCertificate, Validity, Version,
                },
            },
            CertificateBuilder, LeafKeyAlgorithm, SignatureAlgorithm,
        };

        let rng = ring::rand::SystemRandom::new();
        let document = ring::signature::EcdsaKeyPair::generate_pkcs8(
            &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            &rng,
        )
        .unwrap();

        let issuer_key = SigningKey::from_pkcs8_der(document.as_ref()).unwrap();

        let mut rdn = RelativeDistinguishedName::default();
        rdn.set_common_name("pkcs7 test issuer").unwrap();

        let now = chrono::Utc::now();

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: 1.into(),
            signature: AlgorithmIdentifier {
                algorithm: SignatureAlgorithm::EcdsaSha256.into(),
                parameters: None,
            },
            issuer: rdn.clone().into(),
            validity: Validity {
                not_before: Time::from(now),
                not_after: Time::from(now + chrono::Duration::days(3650)),
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
            extensions: None,
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
        let issuer_cert = Certificate::from_der(&der).unwrap();

        let (leaf, leaf_key) = CertificateBuilder::new(&issuer_key, &issuer_cert)
            .leaf_key_algorithm(LeafKeyAlgorithm::EcdsaP256)
            .common_name("payload.example.net")
            .unwrap()
            .serial_number(2)
            .mint()
            .unwrap();

        (leaf, leaf_key, issuer_cert)
    }

    #[test]
    fn assembles_detached_signed_data_with_both_certificates() {
        let (leaf, leaf_key, issuer_cert) = signed_leaf_and_issuer();
        let payload = b"install.rdf contents go here";

        let der = assemble(payload, leaf.clone(), &leaf_key, issuer_cert.clone()).unwrap();
        assert!(!der.is_empty());

        let parsed = cms::SignedData::parse_ber(&der).unwrap();
        assert_eq!(parsed.certificates().count(), 2);
        assert!(parsed.signed_content().is_none());
    }
}
