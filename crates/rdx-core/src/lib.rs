pub mod config;
pub mod error;
pub mod types;

pub use error::{RdxError, RdxResult};
pub use types::{DocumentId, DocumentRecord, DocumentState, FieldLocation, SensitiveField};
