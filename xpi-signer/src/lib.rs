// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! XPI add-on code signing.

This crate mints short-lived end-entity certificates chained to a
long-lived issuer CA and uses them to produce detached PKCS#7 `SignedData`
signatures over add-on payloads. It does not perform timestamping, operate
a CRL/OCSP responder, persist issued leaves, rate-limit or cache
signatures, or negotiate algorithms beyond what the issuer key dictates.
*/

pub mod config;
pub mod envelope;
pub mod error;
pub mod mint;
pub mod mode;
pub mod options;
pub mod pkcs7;
pub mod signer;

pub use {
    config::{ResolvedSigner, SignerConfig},
    envelope::Signature,
    error::SignerError,
    mode::Mode,
    options::Options,
    signer::{XpiSigner, MONITORING_PAYLOAD},
};
