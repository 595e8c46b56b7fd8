// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Mode Policy: the total function from operational mode to (OU, pinned CN). */

use {crate::error::SignerError, serde::Deserialize};

/// Operational mode of an XPI signer, set per config entry.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    AddOn,
    Extension,
    #[serde(rename = "system add-on")]
    SystemAddOn,
    Hotfix,
}

impl Mode {
    pub fn parse(value: &str) -> Result<Self, SignerError> {
        match value {
            "add-on" => Ok(Self::AddOn),
            "extension" => Ok(Self::Extension),
            "system add-on" => Ok(Self::SystemAddOn),
            "hotfix" => Ok(Self::Hotfix),
            other => Err(SignerError::ConfigInvalid(format!(
                "unknown signer mode: {other}"
            ))),
        }
    }

    /// The organizational unit attribute minted leaves carry under this mode.
    pub fn organizational_unit(&self) -> &'static str {
        match self {
            Self::AddOn => "Production",
            Self::Extension => "Mozilla Extensions",
            Self::SystemAddOn => "Mozilla Components",
            Self::Hotfix => "Production",
        }
    }

    /// The pinned end-entity CN under this mode, if any.
    ///
    /// Only `hotfix` mode pins a CN. This pins the *subject name*; it does
    /// not pin the signing key itself, which the source this was derived
    /// from flags as a known gap. We do not invent a key-pinning scheme to
    /// fill it.
    pub fn pinned_common_name(&self) -> Option<&'static str> {
        match self {
            Self::Hotfix => Some("firefox-hotfix@mozilla.org"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organizational_units_match_policy_table() {
        assert_eq!(Mode::AddOn.organizational_unit(), "Production");
        assert_eq!(Mode::Extension.organizational_unit(), "Mozilla Extensions");
        assert_eq!(Mode::SystemAddOn.organizational_unit(), "Mozilla Components");
        assert_eq!(Mode::Hotfix.organizational_unit(), "Production");
    }

    #[test]
    fn only_hotfix_pins_a_common_name() {
        assert_eq!(Mode::AddOn.pinned_common_name(), None);
        assert_eq!(Mode::Extension.pinned_common_name(), None);
        assert_eq!(Mode::SystemAddOn.pinned_common_name(), None);
        assert_eq!(
            Mode::Hotfix.pinned_common_name(),
            Some("firefox-hotfix@mozilla.org")
        );
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        assert!(Mode::parse("bogus").is_err());
    }
}
