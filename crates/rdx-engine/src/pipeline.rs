//! Synchronous redact/restore over document bytes
//!
//! These are the CPU-bound halves of the orchestrator operations (key
//! derivation, encryption, substitution). They touch no files; callers run
//! them off the async runtime and persist the result afterwards.

use rdx_core::types::SensitiveField;
use rdx_core::{RdxError, RdxResult};
use rdx_crypto::{
    decrypt_fields, encrypt_fields, EncryptionMetadata, KdfLimits, KdfParams, MARKER_PREFIX,
};
use secrecy::SecretString;
use tracing::info;

use crate::backend::DocumentBackend;
use crate::substitute::{redact_targets, restore_targets, substitute, SubstitutionReport};

#[derive(Debug)]
pub struct RedactOutput {
    pub artifact: Vec<u8>,
    pub metadata: EncryptionMetadata,
    pub report: SubstitutionReport,
}

/// Encrypt `fields` and replace every value in `source` with its marker.
pub fn redact_bytes(
    backend: &dyn DocumentBackend,
    source: &[u8],
    fields: &[SensitiveField],
    passkey: &SecretString,
    params: &KdfParams,
) -> RdxResult<RedactOutput> {
    if fields.is_empty() {
        return Err(RdxError::Validation(
            "no sensitive fields to redact".to_string(),
        ));
    }

    let doc = backend.open(source)?;
    if !doc.find_occurrences(MARKER_PREFIX).is_empty() {
        return Err(RdxError::Validation(format!(
            "document already contains placeholder markers ({MARKER_PREFIX})"
        )));
    }

    let metadata = encrypt_fields(fields, passkey, params)?;
    let (artifact, report) = substitute(doc, &redact_targets(fields))?;

    info!(
        fields = metadata.len(),
        replacements = report.total(),
        unmatched = report.unmatched.len(),
        "document redacted"
    );
    Ok(RedactOutput {
        artifact,
        metadata,
        report,
    })
}

/// Decrypt `metadata` and put every value back in place of its marker.
///
/// Authentication is checked before the artifact is parsed; `limits` bounds
/// the KDF work the metadata may ask for.
pub fn restore_bytes(
    backend: &dyn DocumentBackend,
    artifact: &[u8],
    metadata: &EncryptionMetadata,
    passkey: &SecretString,
    limits: &KdfLimits,
) -> RdxResult<(Vec<u8>, SubstitutionReport)> {
    let decrypted = decrypt_fields(metadata, passkey, limits)?;
    let targets = restore_targets(metadata, &decrypted)?;

    let doc = backend.open(artifact)?;
    let (restored, report) = substitute(doc, &targets)?;

    info!(
        fields = decrypted.len(),
        replacements = report.total(),
        unmatched = report.unmatched.len(),
        "document restored"
    );
    Ok((restored, report))
}
