// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Config Loader: validates signer configuration and resolves it into a
read-only, process-lifetime signer.
*/

use {
    crate::{error::SignerError, mode::Mode},
    bcder::{decode::Constructed, ConstOid, Mode as BerMode, Oid},
    cms::{Certificate, SigningKey},
    serde::Deserialize,
};

/// 2.5.29.19 (basicConstraints)
const OID_BASIC_CONSTRAINTS: ConstOid = Oid(&[85, 29, 19]);

/// 2.5.29.15 (keyUsage)
const OID_KEY_USAGE: ConstOid = Oid(&[85, 29, 15]);

/// 2.5.29.37 (extKeyUsage)
const OID_EXTENDED_KEY_USAGE: ConstOid = Oid(&[85, 29, 37]);

/// 1.3.6.1.5.5.7.3.3 (id-kp-codeSigning)
const OID_CODE_SIGNING: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 3, 3]);

/// Bit index of `keyCertSign` within the `KeyUsage` BIT STRING.
const KEY_USAGE_CERT_SIGN_BIT: u32 = 5;

/// Configuration for a single XPI signer entry, as loaded from the host's
/// configuration file.
///
/// Unknown fields are tolerated: `serde`'s default behavior (no
/// `deny_unknown_fields`) ignores anything this struct doesn't name, so the
/// surrounding config schema can carry fields meant for other signer kinds.
#[derive(Clone, Debug, Deserialize)]
pub struct SignerConfig {
    pub id: String,

    #[serde(rename = "type")]
    pub signer_type: String,

    pub mode: String,

    #[serde(rename = "privateKey")]
    pub private_key_pem: String,

    pub certificate: String,
}

/// A validated, immutable signer, ready to mint leaves and sign payloads.
///
/// Constructed once at service start; read-only for the rest of the process.
pub struct ResolvedSigner {
    pub(crate) id: String,
    pub(crate) mode: Mode,
    pub(crate) issuer_key: SigningKey,
    pub(crate) issuer_certificate: Certificate,
    pub(crate) ou: String,
    pub(crate) pinned_cn: Option<String>,
    config_snapshot: SignerConfig,
}

impl ResolvedSigner {
    /// Validate `config` and resolve it into a signer.
    pub fn construct(config: SignerConfig) -> Result<Self, SignerError> {
        if config.signer_type != "xpi" {
            return Err(SignerError::ConfigInvalid(format!(
                "signer type must be \"xpi\", got {:?}",
                config.signer_type
            )));
        }

        if config.id.is_empty() {
            return Err(SignerError::ConfigInvalid(
                "signer id must not be empty".to_string(),
            ));
        }

        if config.private_key_pem.is_empty() {
            return Err(SignerError::ConfigInvalid(
                "privateKey must not be empty".to_string(),
            ));
        }

        let issuer_key = SigningKey::from_pkcs8_pem(config.private_key_pem.as_bytes())
            .map_err(|e| SignerError::ConfigInvalid(format!("invalid private key: {e}")))?;

        let issuer_certificate = Certificate::from_pem(config.certificate.as_bytes())
            .map_err(|e| SignerError::ConfigInvalid(format!("invalid certificate: {e}")))?;

        verify_ca_invariants(&issuer_certificate)?;

        let mode = Mode::parse(&config.mode)?;

        Ok(Self {
            id: config.id.clone(),
            mode,
            ou: mode.organizational_unit().to_string(),
            pinned_cn: mode.pinned_common_name().map(str::to_string),
            issuer_key,
            issuer_certificate,
            config_snapshot: config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn issuer_key(&self) -> &SigningKey {
        &self.issuer_key
    }

    pub fn issuer_certificate(&self) -> &Certificate {
        &self.issuer_certificate
    }

    pub fn ou(&self) -> &str {
        &self.ou
    }

    pub fn pinned_cn(&self) -> Option<&str> {
        self.pinned_cn.as_deref()
    }

    /// Diagnostic snapshot of the configuration this signer was built from.
    pub fn config(&self) -> &SignerConfig {
        &self.config_snapshot
    }
}

/// Enforce invariant 1: the issuer certificate must be a CA, within its
/// validity window right now, and carry `certSign` KU plus `codeSigning`
/// EKU.
fn verify_ca_invariants(cert: &Certificate) -> Result<(), SignerError> {
    let now = chrono::Utc::now();
    let not_before: &chrono::DateTime<chrono::Utc> = cert.validity().not_before.as_ref();
    let not_after: &chrono::DateTime<chrono::Utc> = cert.validity().not_after.as_ref();
    if now < *not_before || now > *not_after {
        return Err(SignerError::ConfigInvalid(format!(
            "issuer certificate is not valid now: validity window is {} to {}",
            not_before, not_after
        )));
    }

    let extensions = cert.raw_certificate().tbs_certificate.extensions.as_ref().ok_or_else(|| {
        SignerError::ConfigInvalid("issuer certificate carries no extensions".to_string())
    })?;

    let basic_constraints = extensions
        .iter()
        .find(|ext| ext.id == OID_BASIC_CONSTRAINTS)
        .ok_or_else(|| {
            SignerError::ConfigInvalid("issuer certificate has no basicConstraints".to_string())
        })?;

    let is_ca = decode_basic_constraints_ca(basic_constraints.value.to_bytes())?;
    if !is_ca {
        return Err(SignerError::ConfigInvalid(
            "issuer certificate does not satisfy the CA constraint".to_string(),
        ));
    }

    let key_usage = extensions
        .iter()
        .find(|ext| ext.id == OID_KEY_USAGE)
        .ok_or_else(|| {
            SignerError::ConfigInvalid("issuer certificate has no keyUsage".to_string())
        })?;

    if !decode_key_usage_has_cert_sign(key_usage.value.to_bytes())? {
        return Err(SignerError::ConfigInvalid(
            "issuer certificate's keyUsage lacks certSign".to_string(),
        ));
    }

    let extended_key_usage = extensions
        .iter()
        .find(|ext| ext.id == OID_EXTENDED_KEY_USAGE)
        .ok_or_else(|| {
            SignerError::ConfigInvalid("issuer certificate has no extKeyUsage".to_string())
        })?;

    if !decode_eku_has_code_signing(extended_key_usage.value.to_bytes())? {
        return Err(SignerError::ConfigInvalid(
            "issuer certificate's extKeyUsage lacks codeSigning".to_string(),
        ));
    }

    Ok(())
}

fn decode_basic_constraints_ca(der: bytes::Bytes) -> Result<bool, SignerError> {
    Constructed::decode(der.as_ref(), BerMode::Ber, |cons| {
        cons.take_sequence(|cons| Ok(cons.take_opt_bool()?.unwrap_or(false)))
    })
    .map_err(|e: bcder::decode::Error| {
        SignerError::ConfigInvalid(format!("malformed basicConstraints: {e}"))
    })
}

fn decode_key_usage_has_cert_sign(der: bytes::Bytes) -> Result<bool, SignerError> {
    let bits = Constructed::decode(der.as_ref(), BerMode::Ber, |cons| {
        bcder::BitString::take_from(cons)
    })
    .map_err(|e: bcder::decode::Error| {
        SignerError::ConfigInvalid(format!("malformed keyUsage: {e}"))
    })?;

    Ok(bit_is_set(bits.octet_bytes().as_ref(), KEY_USAGE_CERT_SIGN_BIT))
}

fn decode_eku_has_code_signing(der: bytes::Bytes) -> Result<bool, SignerError> {
    let oids = Constructed::decode(der.as_ref(), BerMode::Ber, |cons| {
        cons.take_sequence(|cons| {
            let mut oids = Vec::new();
            while let Some(oid) = Oid::take_opt_from(cons)? {
                oids.push(oid);
            }
            Ok(oids)
        })
    })
    .map_err(|e: bcder::decode::Error| {
        SignerError::ConfigInvalid(format!("malformed extKeyUsage: {e}"))
    })?;

    Ok(oids
        .iter()
        .any(|oid| oid == &Oid(bytes::Bytes::copy_from_slice(OID_CODE_SIGNING.as_ref()))))
}

/// Check whether `bit_index` (0 = the most significant bit of the first
/// octet, per X.690 BIT STRING numbering) is set.
fn bit_is_set(octets: &[u8], bit_index: u32) -> bool {
    let byte_index = (bit_index / 8) as usize;
    let mask = 0x80u8 >> (bit_index % 8);

    octets
        .get(byte_index)
        .map(|byte| byte & mask != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_is_set_matches_key_usage_layout() {
        // digitalSignature(0) and keyCertSign(5) set, rest clear.
        let octets = [0b1000_0100];
        assert!(bit_is_set(&octets, 0));
        assert!(!bit_is_set(&octets, 1));
        assert!(bit_is_set(&octets, 5));
        assert!(!bit_is_set(&octets, 6));
    }
}
