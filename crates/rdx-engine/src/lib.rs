//! rdx-engine: reversible document redaction
//!
//! Redact:  fields → encrypt (rdx-crypto) → substitute values with markers → commit artifact + sidecar
//! Restore: sidecar → decrypt → substitute markers with values → restored document
//!
//! The rendering backend is a seam ([`backend::DocumentBackend`]); plain text
//! and PDF implementations ship here.

pub mod backend;
pub mod extract;
pub mod pdf;
pub mod pipeline;
pub mod policy;
pub mod redactor;
pub mod registry;
pub mod sidecar;
pub mod substitute;
pub mod text;

pub use backend::{backend_for_media_type, media_type_for_filename, DocumentBackend};
pub use extract::{FieldExtractor, PatternExtractor};
pub use pipeline::{redact_bytes, restore_bytes, RedactOutput};
pub use policy::PasskeyPolicy;
pub use redactor::{Redaction, Redactor, RedactorSettings, Restoration};
pub use registry::DocumentRegistry;
pub use substitute::{Substitution, SubstitutionReport};
