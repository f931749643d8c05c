//! Metadata store: sidecar files next to redacted artifacts
//!
//! `redacted_form.pdf` → `redacted_form.pdf.rdxmeta.json`
//!
//! The sidecar is located purely from the artifact path. It also pins the
//! artifact's BLAKE3 hash, so an artifact swapped or edited after redaction
//! is refused on restore.

use anyhow::Context;
use rdx_core::{RdxError, RdxResult};
use rdx_crypto::EncryptionMetadata;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SIDECAR_SUFFIX: &str = ".rdxmeta.json";

/// Sidecar path for an artifact: same directory, artifact file name + suffix.
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(SIDECAR_SUFFIX);
    artifact.with_file_name(name)
}

fn tmp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarRecord {
    /// BLAKE3 of the redacted artifact (hex)
    pub artifact_blake3: String,
    pub metadata: EncryptionMetadata,
}

impl SidecarRecord {
    pub fn new(artifact: &[u8], metadata: EncryptionMetadata) -> Self {
        Self {
            artifact_blake3: blake3::hash(artifact).to_hex().to_string(),
            metadata,
        }
    }

    /// Check that `artifact` is the document this sidecar was written for.
    pub fn verify(&self, artifact: &[u8]) -> RdxResult<()> {
        if blake3::hash(artifact).to_hex().as_str() != self.artifact_blake3 {
            warn!("artifact hash does not match its sidecar");
            return Err(RdxError::InvalidPasskeyOrCorruptedData);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> RdxResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self).context("serializing sidecar")?)
    }

    /// Anything unreadable counts as corrupted.
    pub fn from_bytes(data: &[u8]) -> RdxResult<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(|_| RdxError::InvalidPasskeyOrCorruptedData)?;
        let artifact_blake3 = value
            .get("artifact_blake3")
            .and_then(|v| v.as_str())
            .ok_or(RdxError::InvalidPasskeyOrCorruptedData)?
            .to_string();
        let metadata = value
            .get("metadata")
            .ok_or(RdxError::InvalidPasskeyOrCorruptedData)?;
        // Route through the metadata parser for its version check.
        let metadata = EncryptionMetadata::from_bytes(metadata.to_string().as_bytes())?;
        Ok(Self {
            artifact_blake3,
            metadata,
        })
    }
}

/// Load the sidecar for `artifact`.
///
/// `NotFound` if there is none; this is the only precondition for restore
/// besides the passkey.
pub async fn load(artifact: &Path) -> RdxResult<SidecarRecord> {
    let path = sidecar_path(artifact);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RdxError::NotFound(format!(
                "no metadata sidecar for {}",
                display_name(artifact)
            )));
        }
        Err(e) => return Err(e.into()),
    };
    debug!(path = %path.display(), "sidecar loaded");
    SidecarRecord::from_bytes(&data)
}

/// Write `record` as the sidecar of `artifact`.
pub async fn save(artifact: &Path, record: &SidecarRecord) -> RdxResult<PathBuf> {
    let path = sidecar_path(artifact);
    write_atomic(&path, &record.to_bytes()?).await?;
    Ok(path)
}

/// Write to a temp file next to `path`, then rename over it.
pub async fn write_atomic(path: &Path, data: &[u8]) -> RdxResult<()> {
    let tmp = tmp_path(path);
    let result = async {
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Persist a redacted artifact together with its sidecar.
///
/// Order: both temp files, move the old sidecar aside, rename the artifact,
/// rename the sidecar. Until the last rename there is no sidecar, and
/// restore reports not-found as if the redaction never happened. If the
/// artifact cannot be put in place, the old sidecar is moved back.
pub async fn commit_artifact(
    artifact_path: &Path,
    artifact: &[u8],
    metadata: EncryptionMetadata,
) -> RdxResult<PathBuf> {
    let side_path = sidecar_path(artifact_path);
    let artifact_tmp = tmp_path(artifact_path);
    let side_tmp = tmp_path(&side_path);
    let side_old = with_suffix(&side_path, ".old");

    let record = SidecarRecord::new(artifact, metadata);
    let staged = async {
        tokio::fs::write(&artifact_tmp, artifact).await?;
        tokio::fs::write(&side_tmp, record.to_bytes()?).await?;
        Ok::<(), RdxError>(())
    }
    .await;
    if let Err(e) = staged {
        discard(&[&artifact_tmp, &side_tmp]).await;
        return Err(e);
    }

    let had_old = match tokio::fs::rename(&side_path, &side_old).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            discard(&[&artifact_tmp, &side_tmp]).await;
            return Err(e.into());
        }
    };

    if let Err(e) = tokio::fs::rename(&artifact_tmp, artifact_path).await {
        if had_old {
            if let Err(back) = tokio::fs::rename(&side_old, &side_path).await {
                warn!(error = %back, "could not put the previous sidecar back");
            }
        }
        discard(&[&artifact_tmp, &side_tmp]).await;
        return Err(e.into());
    }

    // The old sidecar no longer matches the artifact on disk.
    if had_old {
        discard(&[&side_old]).await;
    }
    if let Err(e) = tokio::fs::rename(&side_tmp, &side_path).await {
        discard(&[&side_tmp]).await;
        return Err(e.into());
    }

    info!(
        artifact = %artifact_path.display(),
        fields = record.metadata.len(),
        "artifact and sidecar committed"
    );
    Ok(side_path)
}

async fn discard(paths: &[&PathBuf]) {
    for path in paths {
        let _ = tokio::fs::remove_file(path).await;
    }
}

/// Read a redacted artifact and its metadata, verifying they belong together.
pub async fn open_artifact(artifact_path: &Path) -> RdxResult<(Vec<u8>, EncryptionMetadata)> {
    let record = load(artifact_path).await?;
    let artifact = match tokio::fs::read(artifact_path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RdxError::NotFound(format!(
                "redacted artifact {} is missing",
                display_name(artifact_path)
            )));
        }
        Err(e) => return Err(e.into()),
    };
    record.verify(&artifact)?;
    Ok((artifact, record.metadata))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdx_core::types::{FieldLocation, SensitiveField};
    use rdx_crypto::{encrypt_fields, KdfParams};
    use secrecy::SecretString;

    fn metadata() -> EncryptionMetadata {
        let fields = vec![SensitiveField {
            field_type: "ssn".into(),
            original_value: "555-12-3456".into(),
            masked_preview: "***-**-3456".into(),
            confidence: 0.95,
            location: FieldLocation {
                page: 1,
                start: 4,
                end: 15,
                bbox: None,
            },
            detection_method: "regex_pattern".into(),
        }];
        let params = KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        };
        encrypt_fields(&fields, &SecretString::from("passkey-123"), &params).unwrap()
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/data/x/redacted_form.pdf")),
            PathBuf::from("/data/x/redacted_form.pdf.rdxmeta.json")
        );
    }

    #[tokio::test]
    async fn test_commit_and_open() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact_path = tmp.path().join("redacted_a.txt");
        let meta = metadata();

        let side = commit_artifact(&artifact_path, b"SSN [FIELD-001:ssn]", meta.clone())
            .await
            .unwrap();
        assert!(side.exists());
        assert!(!tmp_path(&artifact_path).exists());
        assert!(!tmp_path(&side).exists());

        let (artifact, loaded) = open_artifact(&artifact_path).await.unwrap();
        assert_eq!(artifact, b"SSN [FIELD-001:ssn]");
        assert_eq!(loaded, meta);

        let raw = std::fs::read_to_string(&side).unwrap();
        assert!(!raw.contains("555-12-3456"));
    }

    #[tokio::test]
    async fn test_missing_sidecar_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact_path = tmp.path().join("redacted_a.txt");
        std::fs::write(&artifact_path, b"whatever").unwrap();

        assert!(matches!(
            open_artifact(&artifact_path).await,
            Err(RdxError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tampered_artifact_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact_path = tmp.path().join("redacted_a.txt");
        commit_artifact(&artifact_path, b"SSN [FIELD-001:ssn]", metadata())
            .await
            .unwrap();
        std::fs::write(&artifact_path, b"SSN [FIELD-001:ssn]!").unwrap();

        assert!(matches!(
            open_artifact(&artifact_path).await,
            Err(RdxError::InvalidPasskeyOrCorruptedData)
        ));
    }

    #[tokio::test]
    async fn test_garbage_sidecar_is_corrupted() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact_path = tmp.path().join("redacted_a.txt");
        std::fs::write(&artifact_path, b"x").unwrap();
        std::fs::write(sidecar_path(&artifact_path), b"{\"artifact_blake3\": 7}").unwrap();

        assert!(matches!(
            load(&artifact_path).await,
            Err(RdxError::InvalidPasskeyOrCorruptedData)
        ));
    }

    #[tokio::test]
    async fn test_recommit_replaces_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact_path = tmp.path().join("redacted_a.txt");
        let first = metadata();
        let second = metadata();
        commit_artifact(&artifact_path, b"one", first).await.unwrap();
        commit_artifact(&artifact_path, b"two", second.clone())
            .await
            .unwrap();

        let (artifact, loaded) = open_artifact(&artifact_path).await.unwrap();
        assert_eq!(artifact, b"two");
        assert_eq!(loaded.salt, second.salt);
    }

    #[tokio::test]
    async fn test_failed_recommit_keeps_previous_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact_path = tmp.path().join("redacted_a.txt");
        let first = metadata();
        commit_artifact(&artifact_path, b"one", first.clone())
            .await
            .unwrap();

        // A non-empty directory where the artifact was: the rename must fail.
        std::fs::remove_file(&artifact_path).unwrap();
        std::fs::create_dir(&artifact_path).unwrap();
        std::fs::write(artifact_path.join("blocker"), b"x").unwrap();

        let result = commit_artifact(&artifact_path, b"two", metadata()).await;
        assert!(result.is_err());

        let kept = load(&artifact_path).await.unwrap();
        assert_eq!(kept.metadata.salt, first.salt);
        assert_eq!(kept.artifact_blake3, blake3::hash(b"one").to_hex().to_string());
        assert!(!with_suffix(&sidecar_path(&artifact_path), ".old").exists());
        assert!(!tmp_path(&artifact_path).exists());
        assert!(!tmp_path(&sidecar_path(&artifact_path)).exists());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact_path = tmp.path().join("redacted_b.txt");
        let record = SidecarRecord::new(b"body", metadata());
        save(&artifact_path, &record).await.unwrap();
        assert_eq!(load(&artifact_path).await.unwrap(), record);
    }
}
