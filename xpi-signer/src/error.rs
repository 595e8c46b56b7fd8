// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Unified error type for the XPI signer.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("options invalid: {0}")]
    OptionsInvalid(String),

    #[error("missing common name: no pinned CN and no requested id")]
    MissingCommonName,

    #[error("key generation failed: {0}")]
    KeyGenFailure(ring::error::Unspecified),

    #[error("certificate build failure: {0}")]
    CertBuildFailure(String),

    #[error("PKCS#7 assembly failed at stage {stage}: {reason}")]
    SignFailure { stage: &'static str, reason: String },

    #[error("cannot marshal: signature is not finished or is empty")]
    MarshalFailure,

    #[error("CMS error: {0}")]
    Cms(#[from] cms::CmsError),

    #[error("PEM error: {0}")]
    Pem(#[from] pem::PemError),

    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
