// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Signature Envelope: the wire-facing wrapper around an assembled
detached PKCS#7 `SignedData` (marshal/unmarshal/verify/PEM).
*/

use {crate::error::SignerError, cms::Certificate};

/// A detached PKCS#7 signature, along with enough state to verify or
/// re-marshal it.
pub struct Signature {
    der: Vec<u8>,
    finished: bool,
    content: Option<Vec<u8>>,
    parsed: Option<cms::SignedData>,
}

impl Signature {
    /// Wrap freshly assembled DER bytes, e.g. the output of
    /// [`crate::pkcs7::assemble`].
    pub(crate) fn from_der(der: Vec<u8>) -> Self {
        Self {
            der,
            finished: true,
            content: None,
            parsed: None,
        }
    }

    /// Base64-encode the DER bytes, standard alphabet with padding.
    ///
    /// Fails if this signature was never finished or carries no bytes.
    pub fn marshal(&self) -> Result<String, SignerError> {
        if !self.finished || self.der.is_empty() {
            return Err(SignerError::MarshalFailure);
        }

        Ok(base64::encode(&self.der))
    }

    /// Decode a base64-encoded detached `SignedData` and attach `content`
    /// as the externally-supplied payload for subsequent verification.
    pub fn unmarshal(data: &str, content: impl Into<Vec<u8>>) -> Result<Self, SignerError> {
        let der = base64::decode(data).map_err(|_| SignerError::MarshalFailure)?;
        let parsed = cms::SignedData::parse_ber(&der)?;

        Ok(Self {
            der,
            finished: true,
            content: Some(content.into()),
            parsed: Some(parsed),
        })
    }

    /// Check every signer in this signature chains to a certificate present
    /// in `trust_store`, and that the signature itself verifies over the
    /// content attached by [`Self::unmarshal`].
    pub fn verify_with_chain(&self, trust_store: &[Certificate]) -> Result<(), SignerError> {
        if !self.finished {
            return Err(SignerError::MarshalFailure);
        }

        let parsed = self
            .parsed
            .as_ref()
            .ok_or(SignerError::MarshalFailure)?;

        let certificates: Vec<&Certificate> = parsed.certificates().collect();

        for signer in parsed.signers() {
            let verifier = signer
                .signature_verifier(certificates.iter().copied())
                .map_err(SignerError::Cms)?;

            let signed_content = signer.signed_content(self.content.as_deref());

            verifier
                .verify(&signed_content, signer.signature())
                .map_err(|_| SignerError::Cms(cms::CmsError::SignatureVerificationError))?;

            let (issuer_name, issuer_serial) = signer
                .certificate_issuer_and_serial()
                .ok_or_else(|| SignerError::Cms(cms::CmsError::CertificateNotFound))?;

            let leaf = certificates
                .iter()
                .find(|cert| cert.issuer() == issuer_name && cert.serial_number() == issuer_serial)
                .ok_or_else(|| SignerError::Cms(cms::CmsError::CertificateNotFound))?;

            let issuer_cert = certificates
                .iter()
                .find(|cert| cert.subject() == leaf.issuer())
                .ok_or_else(|| SignerError::Cms(cms::CmsError::CertificateNotFound))?;

            leaf.verify_signature(*issuer_cert)
                .map_err(SignerError::Cms)?;

            let issuer_der = issuer_cert
                .as_der()
                .map_err(SignerError::Cms)?;

            let trusted = trust_store.iter().any(|trusted| {
                trusted
                    .as_der()
                    .map(|der| der == issuer_der)
                    .unwrap_or(false)
            });

            if !trusted {
                return Err(SignerError::Cms(cms::CmsError::CertificateNotFound));
            }
        }

        Ok(())
    }

    /// PEM-encode the DER bytes under the `PKCS7` label.
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem {
            tag: "PKCS7".to_string(),
            contents: self.der.clone(),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfinished_signature_cannot_marshal() {
        let sig = Signature {
            der: Vec::new(),
            finished: false,
            content: None,
            parsed: None,
        };

        assert!(sig.marshal().is_err());
    }

    #[test]
    fn finished_but_empty_der_cannot_marshal() {
        let sig = Signature {
            der: Vec::new(),
            finished: true,
            content: None,
            parsed: None,
        };

        assert!(sig.marshal().is_err());
    }

    #[test]
    fn finished_signature_marshals_to_base64() {
        let sig = Signature::from_der(vec![1, 2, 3, 4]);
        let marshaled = sig.marshal().unwrap();
        assert_eq!(base64::decode(&marshaled).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn to_pem_wraps_der_with_pkcs7_label() {
        let sig = Signature::from_der(vec![5, 6, 7, 8]);
        let pem_text = sig.to_pem();
        assert!(pem_text.contains("BEGIN PKCS7"));
        assert!(pem_text.contains("END PKCS7"));
    }
}
