//! Per-field XChaCha20-Poly1305 encryption/decryption
//!
//! Encrypted field format (before base64):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD = placeholder_id (UTF-8)
//! ```
//!
//! The AAD binds each ciphertext to its placeholder, so moving a ciphertext
//! to another mapping entry fails authentication.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::SessionKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Encrypt a single field value under the session key.
///
/// Returns `base64([24-byte nonce][ciphertext][16-byte tag])`.
pub fn encrypt_value(
    key: &SessionKey,
    placeholder_id: &str,
    plaintext: &str,
) -> CryptoResult<String> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: placeholder_id.as_bytes(),
            },
        )
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(&sealed))
}

/// Decrypt a single field value produced by [`encrypt_value`].
///
/// Malformed encoding, truncation, a wrong key, a wrong placeholder id and
/// tampering all map to [`CryptoError::InvalidPasskeyOrCorruptedData`].
pub fn decrypt_value(key: &SessionKey, placeholder_id: &str, encoded: &str) -> CryptoResult<String> {
    let sealed = STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::InvalidPasskeyOrCorruptedData)?;

    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::InvalidPasskeyOrCorruptedData);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: placeholder_id.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::InvalidPasskeyOrCorruptedData)?;

    String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        CryptoError::InvalidPasskeyOrCorruptedData
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;

    fn key(b: u8) -> SessionKey {
        SessionKey::from_bytes([b; KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let k = key(42);
        let sealed = encrypt_value(&k, "FIELD-001", "123-45-6789").unwrap();
        let opened = decrypt_value(&k, "FIELD-001", &sealed).unwrap();
        assert_eq!(opened, "123-45-6789");
    }

    #[test]
    fn test_sealed_never_contains_plaintext() {
        let k = key(42);
        let sealed = encrypt_value(&k, "FIELD-001", "alice@example.com").unwrap();
        assert!(!sealed.contains("alice"));
    }

    #[test]
    fn test_random_nonce_per_call() {
        let k = key(42);
        let a = encrypt_value(&k, "FIELD-001", "same").unwrap();
        let b = encrypt_value(&k, "FIELD-001", "same").unwrap();
        assert_ne!(a, b, "nonce must not repeat under the same key");
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let sealed = encrypt_value(&key(1), "FIELD-001", "secret").unwrap();
        let result = decrypt_value(&key(2), "FIELD-001", &sealed);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidPasskeyOrCorruptedData)
        ));
    }

    #[test]
    fn test_decrypt_wrong_placeholder() {
        let k = key(1);
        let sealed = encrypt_value(&k, "FIELD-001", "secret").unwrap();
        let result = decrypt_value(&k, "FIELD-002", &sealed);
        assert!(
            matches!(result, Err(CryptoError::InvalidPasskeyOrCorruptedData)),
            "AAD mismatch must fail"
        );
    }

    #[test]
    fn test_tampered_ciphertext() {
        let k = key(1);
        let sealed = encrypt_value(&k, "FIELD-001", "secret data").unwrap();
        let mut raw = STANDARD.decode(&sealed).unwrap();
        raw[NONCE_SIZE + 1] ^= 0xFF;
        let tampered = STANDARD.encode(&raw);

        let result = decrypt_value(&k, "FIELD-001", &tampered);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidPasskeyOrCorruptedData)
        ));
    }

    #[test]
    fn test_malformed_inputs() {
        let k = key(1);
        for bad in ["", "not base64 !!", "AAAA"] {
            assert!(matches!(
                decrypt_value(&k, "FIELD-001", bad),
                Err(CryptoError::InvalidPasskeyOrCorruptedData)
            ));
        }
    }

    #[test]
    fn test_sealed_size() {
        let k = key(1);
        let sealed = encrypt_value(&k, "FIELD-001", "0123456789").unwrap();
        let raw = STANDARD.decode(&sealed).unwrap();
        // nonce (24) + plaintext (10) + tag (16) = 50
        assert_eq!(raw.len(), NONCE_SIZE + 10 + TAG_SIZE);
    }
}
