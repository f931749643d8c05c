//! Field cipher: placeholder assignment + per-field encryption for a session

use rdx_core::types::SensitiveField;
use secrecy::SecretString;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::cipher::{decrypt_value, encrypt_value};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key, KdfLimits, KdfParams};
use crate::metadata::{EncryptedFieldRecord, EncryptionMetadata};

/// Every marker starts with this text; documents containing it cannot be
/// redacted safely.
pub const MARKER_PREFIX: &str = "[FIELD-";

/// Placeholder id for the field at zero-based `index`: `FIELD-001`, `FIELD-002`, ...
///
/// Indices past 999 widen (`FIELD-1000`) and stay unique.
pub fn placeholder_id(index: usize) -> String {
    format!("FIELD-{:03}", index + 1)
}

/// Marker text inserted into a document in place of a value: `[FIELD-001:ssn]`.
///
/// `[`, `]` and `:` in the type are replaced by `_`, so a marker contains
/// exactly one opening and one closing bracket and never needs escaping.
pub fn placeholder_marker(placeholder_id: &str, field_type: &str) -> String {
    let field_type: String = field_type
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' => '_',
            c => c,
        })
        .collect();
    format!("[{placeholder_id}:{field_type}]")
}

/// Encrypt every field under a key derived from `passkey` and a fresh salt.
///
/// Placeholders are assigned in input order. The output mapping has exactly
/// one entry per input field, duplicates included.
pub fn encrypt_fields(
    fields: &[SensitiveField],
    passkey: &SecretString,
    params: &KdfParams,
) -> CryptoResult<EncryptionMetadata> {
    if let Some(pos) = fields.iter().position(|f| f.original_value.is_empty()) {
        return Err(CryptoError::InvalidField(format!(
            "field {} has an empty value",
            placeholder_id(pos)
        )));
    }

    let (key, salt) = derive_key(passkey, None, params)?;

    let mut mapping = BTreeMap::new();
    for (i, field) in fields.iter().enumerate() {
        let id = placeholder_id(i);
        let ciphertext = encrypt_value(&key, &id, &field.original_value)?;
        debug!(placeholder = %id, field_type = %field.field_type, "field encrypted");
        mapping.insert(
            id,
            EncryptedFieldRecord {
                ciphertext,
                field_type: field.field_type.clone(),
                location: field.location.clone(),
                masked_preview: field.masked_preview.clone(),
                confidence: field.confidence,
                detection_method: field.detection_method.clone(),
            },
        );
    }

    info!(fields = mapping.len(), "encrypted sensitive fields");
    Ok(EncryptionMetadata::new(&salt, params.clone(), mapping))
}

/// Decrypt every field of `metadata` with a key rederived from `passkey`.
///
/// All-or-nothing: the first authentication failure aborts with
/// [`CryptoError::InvalidPasskeyOrCorruptedData`], whether one field or all
/// of them are bad. KDF parameters outside `limits`, or ones Argon2id
/// refuses, count as corrupted metadata.
pub fn decrypt_fields(
    metadata: &EncryptionMetadata,
    passkey: &SecretString,
    limits: &KdfLimits,
) -> CryptoResult<BTreeMap<String, String>> {
    if !limits.admits(&metadata.kdf) {
        warn!(kdf = ?metadata.kdf, "metadata KDF parameters exceed limits");
        return Err(CryptoError::InvalidPasskeyOrCorruptedData);
    }
    let salt = metadata.salt_bytes()?;
    let (key, _) = derive_key(passkey, Some(salt), &metadata.kdf).map_err(|e| {
        warn!(error = %e, "metadata KDF parameters rejected");
        CryptoError::InvalidPasskeyOrCorruptedData
    })?;

    let mut decrypted = BTreeMap::new();
    for (id, record) in &metadata.field_mapping {
        match decrypt_value(&key, id, &record.ciphertext) {
            Ok(value) => {
                decrypted.insert(id.clone(), value);
            }
            Err(e) => {
                warn!(placeholder = %id, "field decryption failed");
                return Err(e);
            }
        }
    }

    info!(fields = decrypted.len(), "decrypted sensitive fields");
    Ok(decrypted)
}
