use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Optional bounding box for spans sourced from image OCR: `[x0, y0, x1, y1]`
pub type BoundingBox = [f32; 4];

/// Where a sensitive span was detected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLocation {
    /// 1-based page number
    pub page: u32,
    /// Start offset (chars) within the page text
    pub start: usize,
    /// End offset (chars, exclusive)
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// A sensitive span reported by the extraction collaborator.
///
/// `Debug` never prints `original_value`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveField {
    /// Category tag, e.g. "ssn", "email"
    #[serde(rename = "type")]
    pub field_type: String,
    /// The literal substring as it appears in the document
    pub original_value: String,
    /// Display-safe partial rendering, never the full value
    pub masked_preview: String,
    /// Detection confidence in [0, 1]
    pub confidence: f32,
    pub location: FieldLocation,
    /// Provenance tag, audit only
    pub detection_method: String,
}

impl fmt::Debug for SensitiveField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensitiveField")
            .field("field_type", &self.field_type)
            .field("original_value", &"[REDACTED]")
            .field("masked_preview", &self.masked_preview)
            .field("confidence", &self.confidence)
            .field("location", &self.location)
            .field("detection_method", &self.detection_method)
            .finish()
    }
}

/// Opaque document identifier (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a document.
///
/// Each variant carries exactly the data that exists at that stage, so a
/// redacted document without detected fields cannot be expressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentState {
    Uploaded,
    Analyzed {
        fields: Vec<SensitiveField>,
    },
    Redacted {
        fields: Vec<SensitiveField>,
        redacted_path: PathBuf,
    },
    Restored {
        fields: Vec<SensitiveField>,
        redacted_path: PathBuf,
        restored_path: PathBuf,
    },
    Failed {
        cause: String,
        /// Last non-failed state; retries resume from here
        last: Box<DocumentState>,
    },
}

impl DocumentState {
    pub fn status(&self) -> &'static str {
        match self {
            DocumentState::Uploaded => "uploaded",
            DocumentState::Analyzed { .. } => "analyzed",
            DocumentState::Redacted { .. } => "redacted",
            DocumentState::Restored { .. } => "restored",
            DocumentState::Failed { .. } => "failed",
        }
    }

    /// The state a retry starts from: `self`, or the state before a failure.
    pub fn settled(&self) -> &DocumentState {
        match self {
            DocumentState::Failed { last, .. } => last,
            other => other,
        }
    }

    pub fn fields(&self) -> Option<&[SensitiveField]> {
        match self.settled() {
            DocumentState::Analyzed { fields }
            | DocumentState::Redacted { fields, .. }
            | DocumentState::Restored { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn redacted_path(&self) -> Option<&Path> {
        match self.settled() {
            DocumentState::Redacted { redacted_path, .. }
            | DocumentState::Restored { redacted_path, .. } => Some(redacted_path),
            _ => None,
        }
    }

    pub fn restored_path(&self) -> Option<&Path> {
        match self.settled() {
            DocumentState::Restored { restored_path, .. } => Some(restored_path),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            DocumentState::Failed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Transition to `Redacted`. `None` if no fields were ever detected.
    pub fn to_redacted(&self, redacted_path: PathBuf) -> Option<DocumentState> {
        let fields = self.fields()?.to_vec();
        Some(DocumentState::Redacted {
            fields,
            redacted_path,
        })
    }

    /// Transition to `Restored`. `None` if the document was never redacted.
    pub fn to_restored(&self, restored_path: PathBuf) -> Option<DocumentState> {
        let fields = self.fields()?.to_vec();
        let redacted_path = self.redacted_path()?.to_path_buf();
        Some(DocumentState::Restored {
            fields,
            redacted_path,
            restored_path,
        })
    }

    /// Transition to `Failed`, keeping the last settled state.
    pub fn to_failed(&self, cause: impl Into<String>) -> DocumentState {
        DocumentState::Failed {
            cause: cause.into(),
            last: Box::new(self.settled().clone()),
        }
    }
}

/// A document tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub filename: String,
    pub source_path: PathBuf,
    pub media_type: String,
    pub state: DocumentState,
}

impl DocumentRecord {
    pub fn new(id: DocumentId, filename: String, source_path: PathBuf, media_type: String) -> Self {
        Self {
            id,
            filename,
            source_path,
            media_type,
            state: DocumentState::Uploaded,
        }
    }

    pub fn status(&self) -> &'static str {
        self.state.status()
    }

    pub fn fail(&mut self, cause: impl Into<String>) {
        self.state = self.state.to_failed(cause);
    }

    /// Caller-facing view: masked previews only, no values.
    pub fn view(&self) -> DocumentView {
        DocumentView {
            id: self.id,
            filename: self.filename.clone(),
            media_type: self.media_type.clone(),
            status: self.status(),
            detected_fields: self
                .state
                .fields()
                .map(|fields| fields.iter().map(FieldView::from).collect()),
            redacted_path: self.state.redacted_path().map(Path::to_path_buf),
            restored_path: self.state.restored_path().map(Path::to_path_buf),
            error: self.state.cause().map(str::to_string),
        }
    }
}

/// Serializable summary of a detected field without its value
#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    #[serde(rename = "type")]
    pub field_type: String,
    pub masked_preview: String,
    pub confidence: f32,
    pub location: FieldLocation,
    pub detection_method: String,
}

impl From<&SensitiveField> for FieldView {
    fn from(field: &SensitiveField) -> Self {
        Self {
            field_type: field.field_type.clone(),
            masked_preview: field.masked_preview.clone(),
            confidence: field.confidence,
            location: field.location.clone(),
            detection_method: field.detection_method.clone(),
        }
    }
}

/// Serializable summary of a document record
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: DocumentId,
    pub filename: String,
    pub media_type: String,
    pub status: &'static str,
    pub detected_fields: Option<Vec<FieldView>>,
    pub redacted_path: Option<PathBuf>,
    pub restored_path: Option<PathBuf>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssn_field() -> SensitiveField {
        SensitiveField {
            field_type: "ssn".into(),
            original_value: "123-45-6789".into(),
            masked_preview: "***-**-6789".into(),
            confidence: 0.95,
            location: FieldLocation {
                page: 1,
                start: 10,
                end: 21,
                bbox: None,
            },
            detection_method: "regex_pattern".into(),
        }
    }

    fn record() -> DocumentRecord {
        DocumentRecord::new(
            DocumentId::new(),
            "form.txt".into(),
            PathBuf::from("/tmp/form.txt"),
            "text/plain".into(),
        )
    }

    #[test]
    fn test_debug_hides_value() {
        let dbg = format!("{:?}", ssn_field());
        assert!(!dbg.contains("123-45-6789"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn test_field_serde_uses_type_key() {
        let json = serde_json::to_value(ssn_field()).unwrap();
        assert_eq!(json["type"], "ssn");
        assert!(json["location"].get("bbox").is_none());

        let parsed: SensitiveField = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, ssn_field());
    }

    #[test]
    fn test_redact_requires_fields() {
        let state = DocumentState::Uploaded;
        assert!(state.to_redacted(PathBuf::from("/tmp/r.txt")).is_none());

        let analyzed = DocumentState::Analyzed {
            fields: vec![ssn_field()],
        };
        let redacted = analyzed.to_redacted(PathBuf::from("/tmp/r.txt")).unwrap();
        assert_eq!(redacted.status(), "redacted");
        assert_eq!(redacted.redacted_path(), Some(Path::new("/tmp/r.txt")));
    }

    #[test]
    fn test_restore_requires_redaction() {
        let analyzed = DocumentState::Analyzed {
            fields: vec![ssn_field()],
        };
        assert!(analyzed.to_restored(PathBuf::from("/tmp/o.txt")).is_none());

        let redacted = analyzed.to_redacted(PathBuf::from("/tmp/r.txt")).unwrap();
        let restored = redacted.to_restored(PathBuf::from("/tmp/o.txt")).unwrap();
        assert_eq!(restored.status(), "restored");
        // Restoring keeps the redacted artifact reference
        assert_eq!(restored.redacted_path(), Some(Path::new("/tmp/r.txt")));

        // Restored is reusable
        assert!(restored.to_restored(PathBuf::from("/tmp/o2.txt")).is_some());
    }

    #[test]
    fn test_failed_keeps_last_settled_state() {
        let redacted = DocumentState::Redacted {
            fields: vec![ssn_field()],
            redacted_path: PathBuf::from("/tmp/r.txt"),
        };
        let failed = redacted.to_failed("invalid passkey or corrupted data");
        assert_eq!(failed.status(), "failed");
        assert_eq!(failed.cause(), Some("invalid passkey or corrupted data"));
        assert_eq!(failed.redacted_path(), Some(Path::new("/tmp/r.txt")));

        // Failing twice does not nest
        let twice = failed.to_failed("timeout");
        match twice {
            DocumentState::Failed { last, .. } => assert_eq!(*last, redacted),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_view_has_no_values() {
        let mut rec = record();
        rec.state = DocumentState::Analyzed {
            fields: vec![ssn_field()],
        };
        let json = serde_json::to_string(&rec.view()).unwrap();
        assert!(!json.contains("123-45-6789"));
        assert!(json.contains("***-**-6789"));
        assert!(json.contains("\"status\":\"analyzed\""));
    }

    #[test]
    fn test_record_fail() {
        let mut rec = record();
        rec.fail("extraction failed");
        assert_eq!(rec.status(), "failed");
        assert_eq!(rec.view().error.as_deref(), Some("extraction failed"));
    }

    #[test]
    fn test_document_id_parse() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<DocumentId>().is_err());
    }
}
