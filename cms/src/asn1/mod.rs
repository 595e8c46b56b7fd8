// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw ASN.1 type definitions used to build and parse CMS/X.509 structures.

pub mod common;
pub mod rfc3280;
pub mod rfc4519;
pub mod rfc5280;
pub mod rfc5652;
pub mod rfc5958;
