//! At-rest content encryption.
//!
//! XChaCha20-Poly1305 with a key derived from the configured secret by
//! SHA-256. Stored form is `hex(nonce):hex(ciphertext)` with a fresh random
//! 24-byte nonce per message.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const NONCE_SIZE: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("malformed ciphertext")]
    Malformed,
}

/// Symmetric cipher for message content of encrypted types.
#[derive(Clone)]
pub struct ContentCipher {
    cipher: XChaCha20Poly1305,
}

impl ContentCipher {
    pub fn new(secret: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Encrypt to the stored `nonce:ciphertext` form.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(format!("{}:{}", hex::encode(nonce_bytes), hex::encode(ciphertext)))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let (nonce_hex, body_hex) = stored.split_once(':').ok_or(CryptoError::Malformed)?;
        let nonce_bytes = hex::decode(nonce_hex).map_err(|_| CryptoError::Malformed)?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CryptoError::Malformed);
        }
        let body = hex::decode(body_hex).map_err(|_| CryptoError::Malformed)?;

        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(&nonce_bytes), body.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Malformed)
    }

    /// Decrypt, or return the stored value unchanged when it is not a valid
    /// ciphertext under this key. Rows written before encryption was enabled
    /// are plain text.
    pub fn decrypt_or_raw(&self, stored: &str) -> String {
        match self.decrypt(stored) {
            Ok(plain) => plain,
            Err(e) => {
                tracing::trace!(error = %e, "Returning stored content as-is");
                stored.to_string()
            }
        }
    }
}

impl std::fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCipher").finish_non_exhaustive()
    }
}
