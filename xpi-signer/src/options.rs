// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Options Decoder: per-request parameters carried across the signer's
opaque, polymorphic options boundary.

The outer dispatcher is polymorphic over several signer kinds, each with its
own option schema; it hands every signer an untyped JSON tree and lets the
signer decode its own shape. XPI's shape has exactly one field.
*/

use {
    crate::error::SignerError,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Per-request options for an XPI signing call.
///
/// Unknown fields in the source value are ignored rather than rejected, so
/// the config schema this is nested inside can evolve independently.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Options {
    #[serde(default)]
    pub id: String,
}

impl Options {
    /// Decode an opaque, caller-supplied value into `Options`.
    ///
    /// Absent or empty `id` yields `Options { id: "" }`, not an error.
    pub fn decode(opaque: &Value) -> Result<Self, SignerError> {
        match opaque {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other.clone())
                .map_err(|e| SignerError::OptionsInvalid(e.to_string())),
        }
    }

    /// The options used exclusively by the monitoring path.
    pub fn default_options() -> Self {
        Self {
            id: "test@example.net".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_id_field() {
        let opts = Options::decode(&serde_json::json!({"id": "a@b"})).unwrap();
        assert_eq!(opts.id, "a@b");
    }

    #[test]
    fn ignores_unknown_fields() {
        let opts = Options::decode(&serde_json::json!({"id": "a@b", "extra": 1})).unwrap();
        assert_eq!(opts.id, "a@b");
    }

    #[test]
    fn absent_id_is_empty_not_an_error() {
        let opts = Options::decode(&serde_json::json!({})).unwrap();
        assert_eq!(opts.id, "");
    }

    #[test]
    fn null_is_empty_not_an_error() {
        let opts = Options::decode(&Value::Null).unwrap();
        assert_eq!(opts.id, "");
    }

    #[test]
    fn monitoring_default_options() {
        assert_eq!(Options::default_options().id, "test@example.net");
    }
}
