//! Redaction orchestrator
//!
//! Drives a document through its lifecycle:
//! ```text
//! upload → Uploaded → analyze → Analyzed → redact → Redacted ⇄ restore → Restored
//!                 any failure → Failed { cause, last }
//! ```
//! Every operation holds the document's lease for its whole duration and
//! writes the record back on success and on failure. Key derivation and
//! substitution run on the blocking pool under the operation timeout; files
//! are written only once that work has succeeded.

use rdx_core::config::RdxConfig;
use rdx_core::types::{DocumentId, DocumentRecord, DocumentState, SensitiveField};
use rdx_core::{RdxError, RdxResult};
use rdx_crypto::{KdfLimits, KdfParams};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::backend::{backend_for_media_type, media_type_for_filename};
use crate::extract::FieldExtractor;
use crate::pipeline::{redact_bytes, restore_bytes};
use crate::policy::PasskeyPolicy;
use crate::registry::{DocumentLease, DocumentRegistry};
use crate::sidecar::{commit_artifact, open_artifact, write_atomic};
use crate::substitute::SubstitutionReport;

#[derive(Debug, Clone)]
pub struct RedactorSettings {
    pub upload_dir: PathBuf,
    pub policy: PasskeyPolicy,
    pub kdf: KdfParams,
    /// Bounds for KDF parameters read back from sidecars
    pub kdf_limits: KdfLimits,
    pub operation_timeout: Duration,
}

impl From<&RdxConfig> for RedactorSettings {
    fn from(config: &RdxConfig) -> Self {
        Self {
            upload_dir: config.storage.upload_dir.clone(),
            policy: PasskeyPolicy::new(config.policy.min_passkey_len),
            kdf: KdfParams::from(&config.kdf),
            kdf_limits: KdfLimits::from(&config.kdf),
            operation_timeout: Duration::from_secs(config.daemon.operation_timeout_secs),
        }
    }
}

/// A committed redaction.
#[derive(Debug)]
pub struct Redaction {
    pub record: DocumentRecord,
    pub artifact: Vec<u8>,
    pub report: SubstitutionReport,
}

/// A completed restore.
#[derive(Debug)]
pub struct Restoration {
    pub record: DocumentRecord,
    pub document: Vec<u8>,
    pub report: SubstitutionReport,
}

pub struct Redactor {
    registry: Arc<DocumentRegistry>,
    extractor: Arc<dyn FieldExtractor>,
    settings: RedactorSettings,
}

impl Redactor {
    pub fn new(settings: RedactorSettings, extractor: Arc<dyn FieldExtractor>) -> Self {
        Self {
            registry: Arc::new(DocumentRegistry::new()),
            extractor,
            settings,
        }
    }

    pub fn settings(&self) -> &RedactorSettings {
        &self.settings
    }

    pub async fn get(&self, id: &DocumentId) -> RdxResult<DocumentRecord> {
        self.registry.get(id).await
    }

    pub async fn list(&self) -> Vec<DocumentRecord> {
        self.registry.list().await
    }

    /// Store an uploaded document under `<upload_dir>/<id>/` and register it.
    pub async fn upload(&self, filename: &str, content: &[u8]) -> RdxResult<DocumentRecord> {
        let filename = sanitize_filename(filename)?;
        let media_type = media_type_for_filename(&filename).ok_or_else(|| {
            RdxError::Validation(format!(
                "unsupported file type: {filename} (expected .pdf or .txt)"
            ))
        })?;
        if content.is_empty() {
            return Err(RdxError::Validation("uploaded document is empty".into()));
        }

        let id = DocumentId::new();
        let dir = self.settings.upload_dir.join(id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        let source_path = dir.join(&filename);
        write_atomic(&source_path, content).await?;

        let record = DocumentRecord::new(id, filename, source_path, media_type.to_string());
        info!(
            document = %id,
            media_type,
            bytes = content.len(),
            "document uploaded"
        );
        self.registry.insert(record.clone()).await;
        Ok(record)
    }

    /// Run field extraction and record the detected fields.
    pub async fn analyze(&self, id: &DocumentId) -> RdxResult<DocumentRecord> {
        let mut lease = self.registry.acquire(id).await?;
        // Re-analysis would drop the artifact path restore depends on.
        if lease.record.state.redacted_path().is_some() {
            return Err(RdxError::Validation(
                "document is already redacted; upload it again to re-analyze".into(),
            ));
        }

        let run = async {
            let source = tokio::fs::read(&lease.record.source_path).await?;
            let media_type = lease.record.media_type.clone();
            let extractor = self.extractor.clone();
            let fields = self
                .run_blocking(move || {
                    let backend = backend_for_media_type(&media_type)?;
                    let doc = backend.open(&source)?;
                    extractor.extract(&doc.segments())
                })
                .await?;
            Ok::<_, RdxError>(fields)
        };

        match run.await {
            Ok(fields) => {
                info!(document = %id, fields = fields.len(), "document analyzed");
                lease.record.state = DocumentState::Analyzed { fields };
                self.registry.persist(&lease).await?;
                Ok(lease.record.clone())
            }
            Err(e) => Err(self.record_failure(&mut lease, "analyze", e).await),
        }
    }

    /// Encrypt the detected fields, substitute markers and commit the
    /// redacted artifact together with its metadata sidecar.
    pub async fn redact(&self, id: &DocumentId, passkey: SecretString) -> RdxResult<Redaction> {
        let mut lease = self.registry.acquire(id).await?;

        let run = async {
            let fields = redactable_fields(&lease.record)?;
            self.settings.policy.check(&passkey)?;

            let source = tokio::fs::read(&lease.record.source_path).await?;
            let media_type = lease.record.media_type.clone();
            let params = self.settings.kdf.clone();
            let out = self
                .run_blocking(move || {
                    let backend = backend_for_media_type(&media_type)?;
                    redact_bytes(backend.as_ref(), &source, &fields, &passkey, &params)
                })
                .await?;

            let artifact_path = artifact_path(&lease.record, "redacted");
            commit_artifact(&artifact_path, &out.artifact, out.metadata).await?;
            Ok::<_, RdxError>((artifact_path, out.artifact, out.report))
        };

        match run.await {
            Ok((artifact_path, artifact, report)) => {
                let next = lease
                    .record
                    .state
                    .to_redacted(artifact_path)
                    .ok_or_else(|| RdxError::Validation("document has not been analyzed".into()))?;
                lease.record.state = next;
                self.registry.persist(&lease).await?;
                info!(
                    document = %id,
                    replacements = report.total(),
                    unmatched = report.unmatched.len(),
                    "redaction committed"
                );
                Ok(Redaction {
                    record: lease.record.clone(),
                    artifact,
                    report,
                })
            }
            Err(e) => Err(self.record_failure(&mut lease, "redact", e).await),
        }
    }

    /// Decrypt the sidecar of the redacted artifact and put every value back.
    ///
    /// The passkey policy is not applied: the passkey is only ever compared
    /// through decryption.
    pub async fn restore(&self, id: &DocumentId, passkey: SecretString) -> RdxResult<Restoration> {
        let mut lease = self.registry.acquire(id).await?;

        let run = async {
            let redacted_path = lease
                .record
                .state
                .redacted_path()
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    RdxError::NotFound(format!("document {id} has no redacted artifact"))
                })?;
            let (artifact, metadata) = open_artifact(&redacted_path).await?;

            let media_type = lease.record.media_type.clone();
            let limits = self.settings.kdf_limits.clone();
            let (document, report) = self
                .run_blocking(move || {
                    let backend = backend_for_media_type(&media_type)?;
                    restore_bytes(backend.as_ref(), &artifact, &metadata, &passkey, &limits)
                })
                .await?;

            let restored_path = artifact_path(&lease.record, "restored");
            write_atomic(&restored_path, &document).await?;
            Ok::<_, RdxError>((restored_path, document, report))
        };

        match run.await {
            Ok((restored_path, document, report)) => {
                let next = lease.record.state.to_restored(restored_path).ok_or_else(|| {
                    RdxError::NotFound(format!("document {id} has no redacted artifact"))
                })?;
                lease.record.state = next;
                self.registry.persist(&lease).await?;
                info!(
                    document = %id,
                    replacements = report.total(),
                    "restore complete"
                );
                Ok(Restoration {
                    record: lease.record.clone(),
                    document,
                    report,
                })
            }
            Err(e) => Err(self.record_failure(&mut lease, "restore", e).await),
        }
    }

    async fn run_blocking<T, F>(&self, work: F) -> RdxResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> RdxResult<T> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(work);
        match tokio::time::timeout(self.settings.operation_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(RdxError::Other(anyhow::anyhow!(
                "worker task failed: {join}"
            ))),
            Err(_) => Err(RdxError::Dependency(format!(
                "operation timed out after {}s",
                self.settings.operation_timeout.as_secs()
            ))),
        }
    }

    /// Mark the leased document failed and hand the error back.
    async fn record_failure(
        &self,
        lease: &mut DocumentLease,
        operation: &str,
        err: RdxError,
    ) -> RdxError {
        warn!(
            document = %lease.record.id,
            operation,
            error = %err,
            "operation failed"
        );
        lease.record.fail(err.to_string());
        if let Err(e) = self.registry.persist(lease).await {
            error!(document = %lease.record.id, error = %e, "failed to persist failed state");
        }
        err
    }
}

fn redactable_fields(record: &DocumentRecord) -> RdxResult<Vec<SensitiveField>> {
    match record.state.fields() {
        None => Err(RdxError::Validation(
            "document has not been analyzed".into(),
        )),
        Some([]) => Err(RdxError::Validation(
            "no sensitive fields detected; nothing to redact".into(),
        )),
        Some(fields) => Ok(fields.to_vec()),
    }
}

/// `<source dir>/<prefix>_<filename>`
fn artifact_path(record: &DocumentRecord, prefix: &str) -> PathBuf {
    let dir = record
        .source_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    dir.join(format!("{prefix}_{}", record.filename))
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(filename: &str) -> RdxResult<String> {
    let normalized = filename.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| RdxError::Validation("upload has no usable filename".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("form.pdf").unwrap(), "form.pdf");
        assert_eq!(sanitize_filename("../../etc/x.txt").unwrap(), "x.txt");
        assert_eq!(sanitize_filename("C:\\Users\\jo\\a.txt").unwrap(), "a.txt");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("dir/..").is_err());
    }

    #[test]
    fn test_artifact_path() {
        let rec = DocumentRecord::new(
            DocumentId::new(),
            "form.pdf".into(),
            PathBuf::from("/u/1234/form.pdf"),
            "application/pdf".into(),
        );
        assert_eq!(
            artifact_path(&rec, "redacted"),
            PathBuf::from("/u/1234/redacted_form.pdf")
        );
    }

    #[test]
    fn test_settings_from_config() {
        let config = RdxConfig::default();
        let settings = RedactorSettings::from(&config);
        assert_eq!(settings.policy.min_len, 8);
        assert_eq!(settings.kdf, KdfParams::default());
        assert_eq!(settings.kdf_limits, KdfLimits::default());
        assert_eq!(settings.operation_timeout, Duration::from_secs(120));
    }
}
