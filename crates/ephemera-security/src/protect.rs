// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Passphrase protection — age (scrypt recipient) envelopes around arbitrary
// payloads. Backs the `protect` transformation.

use std::io::{Read, Write};

use age::secrecy::SecretString;
use ephemera_core::error::{EphemeraError, Result};
use ephemera_core::ops::Password;
use tracing::{debug, instrument};

/// Every binary age file starts with this line.
const AGE_MAGIC: &[u8] = b"age-encryption.org/v1\n";

/// Whether `bytes` look like a binary age file.
pub fn is_age_envelope(bytes: &[u8]) -> bool {
    bytes.starts_with(AGE_MAGIC)
}

/// Stateless passphrase cipher.
///
/// The passphrase lives in a `SecretString` for as long as the cipher does,
/// so callers should drop it once the transformation is done.
pub struct PassphraseCipher {
    passphrase: SecretString,
}

impl PassphraseCipher {
    /// Empty passphrases are rejected with `Validation`.
    pub fn new(password: &Password) -> Result<Self> {
        if password.is_empty() {
            return Err(EphemeraError::Validation("password must not be empty".into()));
        }
        Ok(Self {
            passphrase: SecretString::from(password.expose().to_owned()),
        })
    }

    /// Encrypt `plaintext` into a complete age file.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let encryptor = age::Encryptor::with_user_passphrase(self.passphrase.clone());
        let mut ciphertext = Vec::with_capacity(plaintext.len() + 256);

        let mut writer = encryptor
            .wrap_output(&mut ciphertext)
            .map_err(|e| EphemeraError::Encryption(e.to_string()))?;
        writer
            .write_all(plaintext)
            .map_err(|e| EphemeraError::Encryption(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| EphemeraError::Encryption(e.to_string()))?;

        debug!(ciphertext_len = ciphertext.len(), "encryption complete");
        Ok(ciphertext)
    }

    /// Decrypt a complete age file.
    ///
    /// Input that is not an age file at all is `UnsupportedFormat`; a wrong
    /// passphrase or a damaged envelope is `Decryption`.
    #[instrument(skip_all, fields(ciphertext_len = ciphertext.len()))]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if !is_age_envelope(ciphertext) {
            return Err(EphemeraError::UnsupportedFormat(
                "input is not a passphrase-protected document".into(),
            ));
        }

        let decryptor = age::Decryptor::new(ciphertext)
            .map_err(|e| EphemeraError::Decryption(e.to_string()))?;
        let identity = age::scrypt::Identity::new(self.passphrase.clone());

        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|e| EphemeraError::Decryption(e.to_string()))?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| EphemeraError::Decryption(e.to_string()))?;

        debug!(plaintext_len = plaintext.len(), "decryption complete");
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(secret: &str) -> PassphraseCipher {
        PassphraseCipher::new(&Password::new(secret)).unwrap()
    }

    #[test]
    fn round_trip() {
        let cipher = cipher("correct-horse-battery-staple");
        let plaintext = b"%PDF-1.7 quarterly report";

        let ciphertext = cipher.encrypt(plaintext).unwrap();
        assert!(is_age_envelope(&ciphertext));
        assert_ne!(&ciphertext[..], plaintext);

        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn wrong_passphrase_is_a_decryption_error() {
        let ciphertext = cipher("alpha").encrypt(b"secret").unwrap();
        let result = cipher("beta").decrypt(&ciphertext);
        assert!(matches!(result, Err(EphemeraError::Decryption(_))));
    }

    #[test]
    fn plain_input_is_unsupported() {
        let result = cipher("alpha").decrypt(b"%PDF-1.4\n");
        assert!(matches!(result, Err(EphemeraError::UnsupportedFormat(_))));
    }

    #[test]
    fn empty_passphrase_rejected() {
        assert!(matches!(
            PassphraseCipher::new(&Password::new("")),
            Err(EphemeraError::Validation(_))
        ));
    }
}
