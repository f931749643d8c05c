//! Encryption metadata format
//!
//! One instance per redaction session:
//! - salt (base64, fresh per session)
//! - method identifier + KDF parameters
//! - field mapping: placeholder id → ciphertext and audit data
//!
//! The mapping is the only place ciphertext is stored. The metadata is never
//! modified after creation; a re-redaction produces a new instance.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rdx_core::types::FieldLocation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CryptoError, CryptoResult};
use crate::fields::placeholder_marker;
use crate::kdf::KdfParams;
use crate::SALT_SIZE;

/// Current metadata format version
pub const METADATA_VERSION: u32 = 1;

/// Key-derivation + cipher scheme identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "argon2id-xchacha20poly1305-v1")]
    Argon2idXChaCha20Poly1305V1,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Argon2idXChaCha20Poly1305V1 => f.write_str("argon2id-xchacha20poly1305-v1"),
        }
    }
}

/// One encrypted field. Carries the audit data of the source field, never
/// a plaintext copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedFieldRecord {
    /// base64(nonce || ciphertext || tag)
    pub ciphertext: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub location: FieldLocation,
    pub masked_preview: String,
    pub confidence: f32,
    pub detection_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    /// Metadata format version
    pub version: u32,
    pub method: Method,
    /// KDF salt (base64)
    pub salt: String,
    pub kdf: KdfParams,
    /// placeholder id → encrypted field
    pub field_mapping: BTreeMap<String, EncryptedFieldRecord>,
}

impl EncryptionMetadata {
    pub(crate) fn new(
        salt: &[u8; SALT_SIZE],
        kdf: KdfParams,
        field_mapping: BTreeMap<String, EncryptedFieldRecord>,
    ) -> Self {
        Self {
            version: METADATA_VERSION,
            method: Method::Argon2idXChaCha20Poly1305V1,
            salt: STANDARD.encode(salt),
            kdf,
            field_mapping,
        }
    }

    /// Decode the session salt.
    pub fn salt_bytes(&self) -> CryptoResult<[u8; SALT_SIZE]> {
        let raw = STANDARD
            .decode(&self.salt)
            .map_err(|_| CryptoError::InvalidPasskeyOrCorruptedData)?;
        raw.try_into()
            .map_err(|_| CryptoError::InvalidPasskeyOrCorruptedData)
    }

    pub fn len(&self) -> usize {
        self.field_mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_mapping.is_empty()
    }

    /// Marker text for a placeholder, e.g. `[FIELD-001:ssn]`.
    pub fn marker(&self, placeholder_id: &str) -> Option<String> {
        self.field_mapping
            .get(placeholder_id)
            .map(|rec| placeholder_marker(placeholder_id, &rec.field_type))
    }

    /// Serialize to pretty JSON bytes
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CryptoError::Encrypt(format!("metadata serialization: {e}")))
    }

    /// Deserialize from JSON bytes. Anything unreadable counts as corrupted.
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        let meta: Self =
            serde_json::from_slice(data).map_err(|_| CryptoError::InvalidPasskeyOrCorruptedData)?;
        if meta.version != METADATA_VERSION {
            return Err(CryptoError::InvalidPasskeyOrCorruptedData);
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptionMetadata {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            "FIELD-001".to_string(),
            EncryptedFieldRecord {
                ciphertext: "AAAA".into(),
                field_type: "ssn".into(),
                location: FieldLocation {
                    page: 1,
                    start: 0,
                    end: 11,
                    bbox: None,
                },
                masked_preview: "***-**-6789".into(),
                confidence: 0.95,
                detection_method: "regex_pattern".into(),
            },
        );
        EncryptionMetadata::new(&[9u8; SALT_SIZE], KdfParams::default(), mapping)
    }

    #[test]
    fn test_metadata_roundtrip() {
        let meta = sample();
        let bytes = meta.to_bytes().unwrap();
        let restored = EncryptionMetadata::from_bytes(&bytes).unwrap();

        assert_eq!(restored, meta);
        assert_eq!(restored.salt_bytes().unwrap(), [9u8; SALT_SIZE]);
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn test_method_wire_name() {
        let json = String::from_utf8(sample().to_bytes().unwrap()).unwrap();
        assert!(json.contains("\"argon2id-xchacha20poly1305-v1\""));
        assert!(json.contains("\"type\": \"ssn\""));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let json = String::from_utf8(sample().to_bytes().unwrap())
            .unwrap()
            .replace("argon2id-xchacha20poly1305-v1", "fernet-fixed-salt");
        assert!(matches!(
            EncryptionMetadata::from_bytes(json.as_bytes()),
            Err(CryptoError::InvalidPasskeyOrCorruptedData)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            EncryptionMetadata::from_bytes(b"{ not json"),
            Err(CryptoError::InvalidPasskeyOrCorruptedData)
        ));
    }

    #[test]
    fn test_bad_salt() {
        let mut meta = sample();
        meta.salt = STANDARD.encode([1u8; 8]);
        assert!(meta.salt_bytes().is_err());
    }

    #[test]
    fn test_marker_lookup() {
        let meta = sample();
        assert_eq!(meta.marker("FIELD-001").as_deref(), Some("[FIELD-001:ssn]"));
        assert!(meta.marker("FIELD-404").is_none());
    }
}
