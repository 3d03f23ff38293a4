//! Encryption envelope model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Everything needed to recover a document's plaintext given the password.
///
/// Each field is independently base64 encoded. The fields only exist together:
/// a document either carries a whole envelope or none at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// AEAD output with the trailing tag removed
    pub cipher_text: String,
    /// Key derivation salt
    pub salt: String,
    /// AEAD nonce
    pub nonce: String,
    /// 16-byte authentication tag split off the AEAD output
    pub auth_tag: String,
}

impl Envelope {
    /// Assemble an envelope from individually stored columns or wire fields.
    ///
    /// Returns `Ok(None)` when every part is absent and a validation error when
    /// only some of them are present.
    pub fn from_parts(
        cipher_text: Option<String>,
        salt: Option<String>,
        nonce: Option<String>,
        auth_tag: Option<String>,
    ) -> Result<Option<Self>> {
        match (cipher_text, salt, nonce, auth_tag) {
            (None, None, None, None) => Ok(None),
            (Some(cipher_text), Some(salt), Some(nonce), Some(auth_tag)) => {
                let envelope = Self {
                    cipher_text,
                    salt,
                    nonce,
                    auth_tag,
                };
                envelope.validate()?;
                Ok(Some(envelope))
            }
            _ => Err(Error::Validation(
                "encryption envelope must be set as a whole".to_string(),
            )),
        }
    }

    /// Split into `(cipher_text, salt, nonce, auth_tag)` for storage.
    pub fn into_parts(self) -> (String, String, String, String) {
        (self.cipher_text, self.salt, self.nonce, self.auth_tag)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.salt.is_empty() || self.nonce.is_empty() || self.auth_tag.is_empty() {
            return Err(Error::Validation(
                "encryption envelope fields must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn all_parts_absent_means_no_envelope() {
        assert!(Envelope::from_parts(None, None, None, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn all_parts_present_builds_envelope() {
        let envelope = Envelope::from_parts(part("Y3Q="), part("c2FsdA=="), part("bm9uY2U="), part("dGFn"))
            .unwrap()
            .unwrap();
        assert_eq!(envelope.salt, "c2FsdA==");
    }

    #[test]
    fn partial_envelope_is_rejected() {
        let error = Envelope::from_parts(part("Y3Q="), None, part("bm9uY2U="), part("dGFn"))
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));

        let error = Envelope::from_parts(None, None, None, part("dGFn")).unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
    }
}
