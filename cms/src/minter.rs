// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Minting short-lived end-entity certificates chained to an issuer key.

This is the dynamic half of X.509 issuance: unlike [crate::certificate],
which only parses and verifies certificates that already exist, this module
generates a fresh key pair, builds a `TBSCertificate` naming the issuer as
its signer, and produces a signature over it using the issuer's
[crate::SigningKey]. The issuer certificate itself is never modified or
re-signed; it is only read for its subject `Name` and serial number.
*/

use {
    crate::{
        asn1::{
            common::Time,
            rfc3280::{Name, RelativeDistinguishedName},
            rfc5280::{
                AlgorithmIdentifier, Certificate as RawCertificate, Extension, Extensions,
                SubjectPublicKeyInfo, TbsCertificate, Validity, Version,
            },
        },
        certificate::Certificate,
        CertificateKeyAlgorithm, CmsError, SignatureAlgorithm, SigningKey,
    },
    bcder::{BitString, ConstOid, Integer, Mode, Oid, OctetString},
    bytes::Bytes,
    chrono::{DateTime, Utc},
    std::fmt::{Display, Formatter},
};

/// 2.5.29.15
const OID_KEY_USAGE: ConstOid = Oid(&[85, 29, 15]);

/// 2.5.29.37
const OID_EXTENDED_KEY_USAGE: ConstOid = Oid(&[85, 29, 37]);

/// 1.3.6.1.5.5.7.3.3 (id-kp-codeSigning)
const OID_EXTENDED_KEY_USAGE_CODE_SIGNING: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 3, 3]);

/// Errors specific to minting a new end-entity certificate.
#[derive(Debug)]
pub enum CertificateBuilderError {
    /// `ring` failed to generate a fresh key pair.
    KeyGeneration(ring::error::Unspecified),

    /// The generated key pair could not be re-parsed as PKCS#8.
    Cms(CmsError),
}

impl std::error::Error for CertificateBuilderError {}

impl Display for CertificateBuilderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyGeneration(e) => f.write_fmt(format_args!("key pair generation failed: {}", e)),
            Self::Cms(e) => e.fmt(f),
        }
    }
}

impl From<ring::error::Unspecified> for CertificateBuilderError {
    fn from(e: ring::error::Unspecified) -> Self {
        Self::KeyGeneration(e)
    }
}

impl From<CmsError> for CertificateBuilderError {
    fn from(e: CmsError) -> Self {
        Self::Cms(e)
    }
}

/// The key algorithm to generate for a minted leaf.
///
/// RSA is deliberately absent: `ring` does not support RSA key pair
/// generation, only loading existing PKCS#8 RSA keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LeafKeyAlgorithm {
    EcdsaP256,
    Ed25519,
}

/// Builds a short-lived end-entity certificate signed by an issuer key.
///
/// The generated leaf always carries a `KeyUsage` extension limited to
/// `digitalSignature` (never `keyCertSign`, since the leaf must not be able
/// to mint further certificates) and an `ExtendedKeyUsage` extension
/// limited to `id-kp-codeSigning`.
pub struct CertificateBuilder<'a> {
    issuer_key: &'a SigningKey,
    issuer_certificate: &'a Certificate,
    leaf_key_algorithm: LeafKeyAlgorithm,
    serial_number: Integer,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    subject: RelativeDistinguishedName,
}

impl<'a> CertificateBuilder<'a> {
    /// Start building a leaf certificate chained to `issuer_certificate`,
    /// signed with `issuer_key`.
    pub fn new(issuer_key: &'a SigningKey, issuer_certificate: &'a Certificate) -> Self {
        let now = Utc::now();

        Self {
            issuer_key,
            issuer_certificate,
            leaf_key_algorithm: LeafKeyAlgorithm::EcdsaP256,
            serial_number: 1.into(),
            not_before: now,
            not_after: now + chrono::Duration::days(30),
            subject: RelativeDistinguishedName::default(),
        }
    }

    /// Set the key algorithm the leaf's freshly generated key pair will use.
    pub fn leaf_key_algorithm(mut self, algorithm: LeafKeyAlgorithm) -> Self {
        self.leaf_key_algorithm = algorithm;
        self
    }

    /// Set the certificate serial number. Callers are responsible for
    /// uniqueness; this type does not track previously issued serials.
    pub fn serial_number(mut self, serial_number: impl Into<Integer>) -> Self {
        self.serial_number = serial_number.into();
        self
    }

    /// Set the validity window.
    pub fn validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// Set the subject common name.
    pub fn common_name(mut self, value: &str) -> Result<Self, bcder::string::CharSetError> {
        self.subject.set_common_name(value)?;
        Ok(self)
    }

    /// Set the subject organizational unit.
    pub fn organizational_unit_name(
        mut self,
        value: &str,
    ) -> Result<Self, bcder::string::CharSetError> {
        self.subject.set_organizational_unit_name(value)?;
        Ok(self)
    }

    /// Append an already-built attribute to the subject, e.g. one copied
    /// verbatim from another certificate's name.
    pub fn additional_subject_attribute(
        mut self,
        attribute: crate::asn1::rfc3280::AttributeTypeAndValue,
    ) -> Self {
        self.subject.push(attribute);
        self
    }

    /// Generate a fresh key pair, mint the leaf certificate, and sign it
    /// with the issuer key.
    ///
    /// Returns the minted certificate alongside the private key that was
    /// generated for it; the caller owns disposing of the key once signing
    /// is complete.
    pub fn mint(self) -> Result<(Certificate, SigningKey), CertificateBuilderError> {
        let rng = ring::rand::SystemRandom::new();

        let (leaf_key, spki_algorithm, public_key_bits) = match self.leaf_key_algorithm {
            LeafKeyAlgorithm::EcdsaP256 => {
                let document = ring::signature::EcdsaKeyPair::generate_pkcs8(
                    &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
                    &rng,
                )?;
                let leaf_key = SigningKey::from_pkcs8_der(document.as_ref())?;
                let public_key = leaf_key.public_key_bytes();
                let algorithm = spki_algorithm_identifier(CertificateKeyAlgorithm::Ec);
                (leaf_key, algorithm, public_key)
            }
            LeafKeyAlgorithm::Ed25519 => {
                let document = ring::signature::Ed25519KeyPair::generate_pkcs8(&rng)?;
                let leaf_key = SigningKey::from_pkcs8_der(document.as_ref())?;
                let public_key = leaf_key.public_key_bytes();
                let algorithm = spki_algorithm_identifier(CertificateKeyAlgorithm::Ed25519);
                (leaf_key, algorithm, public_key)
            }
        };

        let signature_algorithm = SignatureAlgorithm::from(self.issuer_key);

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: self.serial_number,
            signature: AlgorithmIdentifier {
                algorithm: signature_algorithm.into(),
                parameters: None,
            },
            issuer: self.issuer_certificate.subject().clone(),
            validity: Validity {
                not_before: Time::from(self.not_before),
                not_after: Time::from(self.not_after),
            },
            subject: Name::from(self.subject),
            subject_public_key_info: SubjectPublicKeyInfo {
                algorithm: spki_algorithm,
                subject_public_key: BitString::new(0, Bytes::from(public_key_bits)),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(leaf_extensions()),
            raw_data: None,
        };

        let mut tbs_der = Vec::new();
        tbs_certificate
            .encode_ref()
            .write_encoded(Mode::Der, &mut tbs_der)
            .map_err(CmsError::from)?;

        let signature = self.issuer_key.sign(&tbs_der).map_err(CmsError::from)?;

        let raw_cert = RawCertificate {
            tbs_certificate,
            signature_algorithm: AlgorithmIdentifier {
                algorithm: signature_algorithm.into(),
                parameters: None,
            },
            signature: BitString::new(0, Bytes::from(signature)),
        };

        // Re-decode so `raw_data` is populated from the bytes that were
        // actually signed, the same as any certificate parsed off the wire.
        let mut der = Vec::new();
        raw_cert
            .encode_ref()
            .write_encoded(Mode::Der, &mut der)
            .map_err(CmsError::from)?;

        let cert = Certificate::from_der(&der)?;

        Ok((cert, leaf_key))
    }
}

fn spki_algorithm_identifier(algorithm: CertificateKeyAlgorithm) -> AlgorithmIdentifier {
    AlgorithmIdentifier {
        algorithm: algorithm.into(),
        parameters: None,
    }
}

/// `KeyUsage` (digitalSignature only) and `ExtendedKeyUsage`
/// (id-kp-codeSigning only) extensions for a minted leaf.
fn leaf_extensions() -> Extensions {
    // KeyUsage ::= BIT STRING { digitalSignature(0) }
    //
    // Only bit 0 is set, so the DER encoding is a single content byte with
    // 7 unused trailing bits: tag, length, unused-bit-count, content.
    let key_usage = Extension {
        id: Oid(Bytes::copy_from_slice(OID_KEY_USAGE.as_ref())),
        critical: Some(true),
        value: OctetString::new(Bytes::copy_from_slice(&[3, 2, 7, 128])),
    };

    // ExtendedKeyUsage ::= SEQUENCE OF OBJECT IDENTIFIER { id-kp-codeSigning }
    let eku_captured = bcder::encode::sequence(
        Oid(Bytes::copy_from_slice(OID_EXTENDED_KEY_USAGE_CODE_SIGNING.as_ref())).encode(),
    )
    .to_captured(Mode::Ber);

    let extended_key_usage = Extension {
        id: Oid(Bytes::copy_from_slice(OID_EXTENDED_KEY_USAGE.as_ref())),
        critical: Some(false),
        value: OctetString::new(Bytes::copy_from_slice(eku_captured.as_ref())),
    };

    Extensions::new(vec![key_usage, extended_key_usage])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> (Certificate, SigningKey) {
        let rng = ring::rand::SystemRandom::new();
        let document = ring::signature::EcdsaKeyPair::generate_pkcs8(
            &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            &rng,
        )
        .unwrap();

        let issuer_key = SigningKey::from_pkcs8_der(document.as_ref()).unwrap();

        let mut rdn = RelativeDistinguishedName::default();
        rdn.set_common_name("test-issuer").unwrap();

        let now = Utc::now();

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: 1.into(),
            signature: AlgorithmIdentifier {
                algorithm: SignatureAlgorithm::EcdsaSha256.into(),
                parameters: None,
            },
            issuer: Name::from(rdn.clone()),
            validity: Validity {
                not_before: Time::from(now),
                not_after: Time::from(now + chrono::Duration::days(3650)),
            },
            subject: Name::from(rdn),
            subject_public_key_info: SubjectPublicKeyInfo {
                algorithm: spki_algorithm_identifier(issuer_key.certificate_key_algorithm()),
                subject_public_key: BitString::new(0, Bytes::from(issuer_key.public_key_bytes())),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
            raw_data: None,
        };

        let mut tbs_der = Vec::new();
        tbs_certificate
            .encode_ref()
            .write_encoded(Mode::Der, &mut tbs_der)
            .unwrap();

        let signature = issuer_key.sign(&tbs_der).unwrap();

        let raw_cert = RawCertificate {
            tbs_certificate,
            signature_algorithm: AlgorithmIdentifier {
                algorithm: SignatureAlgorithm::EcdsaSha256.into(),
                parameters: None,
            },
            signature: BitString::new(0, Bytes::from(signature)),
        };

        let mut der = Vec::new();
        raw_cert.encode_ref().write_encoded(Mode::Der, &mut der).unwrap();

        (Certificate::from_der(&der).unwrap(), issuer_key)
    }

    #[test]
    fn mints_leaf_chained_to_issuer() {
        let (issuer_cert, issuer_key) = issuer();

        let (leaf, _leaf_key) = CertificateBuilder::new(&issuer_key, &issuer_cert)
            .common_name("signer.example.net")
            .unwrap()
            .serial_number(7)
            .mint()
            .unwrap();

        assert_eq!(leaf.issuer(), issuer_cert.subject());
        assert!(!leaf.is_self_signed());

        leaf.verify_signature(&issuer_cert).unwrap();

        let extensions = leaf.raw_certificate().tbs_certificate.extensions.as_ref().unwrap();
        assert_eq!(extensions.len(), 2);
    }
}
