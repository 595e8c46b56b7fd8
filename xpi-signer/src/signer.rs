// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Top-level orchestration: the external interface every XPI signer
exposes to its dispatcher (`config`, `defaultOptions`, `signData`).
*/

use {
    crate::{
        config::{ResolvedSigner, SignerConfig},
        envelope::Signature,
        error::SignerError,
        mint, options::Options,
        pkcs7,
    },
    serde_json::Value,
};

/// A constructed XPI signer, ready to accept signing requests.
pub struct XpiSigner {
    resolved: ResolvedSigner,
}

impl XpiSigner {
    /// Validate `config` and construct a signer from it.
    pub fn new(config: SignerConfig) -> Result<Self, SignerError> {
        Ok(Self {
            resolved: ResolvedSigner::construct(config)?,
        })
    }

    /// Echo this signer's configuration, as exposed to operators and
    /// monitoring.
    pub fn config(&self) -> &SignerConfig {
        self.resolved.config()
    }

    /// The options used for the monitoring heartbeat payload.
    pub fn default_options(&self) -> Options {
        Options::default_options()
    }

    /// Sign `payload` given an opaque, caller-supplied options value.
    ///
    /// Steps: decode options, resolve the common name (pinned mode CN wins
    /// over the caller's requested id), mint a leaf for that name, and
    /// assemble a detached PKCS#7 signature carrying the leaf and issuer.
    pub fn sign_data(&self, payload: &[u8], opaque_options: &Value) -> Result<Signature, SignerError> {
        let options = Options::decode(opaque_options)?;

        let common_name = self
            .resolved
            .pinned_cn()
            .map(str::to_string)
            .filter(|cn| !cn.is_empty())
            .or_else(|| Some(options.id).filter(|id| !id.is_empty()))
            .ok_or(SignerError::MissingCommonName)?;

        let (leaf_certificate, leaf_key) = mint::mint_leaf(&self.resolved, &common_name)?;

        let der = pkcs7::assemble(
            payload,
            leaf_certificate,
            &leaf_key,
            self.resolved.issuer_certificate().clone(),
        )?;

        Ok(Signature::from_der(der))
    }
}

/// The exact monitoring payload every XPI signer must accept like any other
/// request.
pub const MONITORING_PAYLOAD: &[u8] = b"AUTOGRAPH MONITORING";

#[cfg(test)]
mod tests {
    use super::*;
    use cms::{
        asn1::{
            common::Time,
            rfc3280::RelativeDistinguishedName,
            rfc5280::{
                AlgorithmIdentifier, Certificate as RawCertificate, Extension, Extensions,
                SubjectPublicKeyInfo, TbsCertificate, Validity, Version,
            },
        },
        SignatureAlgorithm, SigningKey,
    };

    fn config_with_mode(mode: &str) -> SignerConfig {
        let rng = ring::rand::SystemRandom::new();
        let document = ring::signature::EcdsaKeyPair::generate_pkcs8(
            &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            &rng,
        )
        .unwrap();

        let issuer_key = SigningKey::from_pkcs8_der(document.as_ref()).unwrap();

        let mut rdn = RelativeDistinguishedName::default();
        rdn.set_common_name("signer test issuer").unwrap();

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
            extensions: Some(ca_extensions()),
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

        SignerConfig {
            id: "xpi-signer-test".to_string(),
            signer_type: "xpi".to_string(),
            mode: mode.to_string(),
            private_key_pem: key_pem,
            certificate: cert_pem,
        }
    }

    fn ca_extensions() -> Extensions {
        use bcder::{encode::PrimitiveContent, Oid};

        let basic_constraints =
            bcder::encode::sequence(true.encode()).to_captured(bcder::Mode::Ber);

        let basic_constraints_ext = Extension {
            id: Oid(bytes::Bytes::copy_from_slice(&[85, 29, 19])),
            critical: Some(true),
            value: bcder::OctetString::new(bytes::Bytes::copy_from_slice(
                basic_constraints.as_ref(),
            )),
        };

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

    #[test]
    fn round_trips_an_add_on_signature() {
        let signer = XpiSigner::new(config_with_mode("add-on")).unwrap();

        let signature = signer
            .sign_data(b"fake xpi bytes", &serde_json::json!({"id": "carol@example.net"}))
            .unwrap();

        let marshaled = signature.marshal().unwrap();
        assert!(!marshaled.is_empty());

        let unmarshaled = Signature::unmarshal(&marshaled, b"fake xpi bytes".to_vec()).unwrap();
        unmarshaled
            .verify_with_chain(&[signer.resolved.issuer_certificate().clone()])
            .unwrap();
    }

    #[test]
    fn hotfix_mode_ignores_requested_id() {
        let signer = XpiSigner::new(config_with_mode("hotfix")).unwrap();

        let signature = signer
            .sign_data(b"hotfix payload", &serde_json::json!({"id": "someone-else@example.net"}))
            .unwrap();

        assert!(signature.is_finished());
    }

    #[test]
    fn monitoring_payload_signs_with_two_certificates() {
        let signer = XpiSigner::new(config_with_mode("add-on")).unwrap();
        let options = serde_json::to_value(signer.default_options()).unwrap();

        let signature = signer.sign_data(MONITORING_PAYLOAD, &options).unwrap();
        let marshaled = signature.marshal().unwrap();

        let unmarshaled =
            Signature::unmarshal(&marshaled, MONITORING_PAYLOAD.to_vec()).unwrap();
        unmarshaled
            .verify_with_chain(&[signer.resolved.issuer_certificate().clone()])
            .unwrap();
    }

    #[test]
    fn missing_common_name_is_an_error() {
        let signer = XpiSigner::new(config_with_mode("add-on")).unwrap();
        let result = signer.sign_data(b"payload", &serde_json::json!({"id": ""}));
        assert!(matches!(result, Err(SignerError::MissingCommonName)));
    }

}
