use thiserror::Error;

pub type RdxResult<T> = Result<T, RdxError>;

/// Error taxonomy shared by every rdx crate.
///
/// Messages never carry a field value, plaintext or ciphertext.
#[derive(Debug, Error)]
pub enum RdxError {
    /// Bad input shape, unsupported upload, weak passkey.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown document id or missing metadata sidecar.
    #[error("not found: {0}")]
    NotFound(String),

    /// Wrong passkey or tampered metadata. The two are never told apart.
    #[error("invalid passkey or corrupted data")]
    InvalidPasskeyOrCorruptedData,

    /// Extraction or rendering backend failure.
    #[error("dependency failure: {0}")]
    Dependency(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse error category, used by outer surfaces to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authentication,
    Internal,
}

impl RdxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RdxError::Validation(_) => ErrorKind::Validation,
            RdxError::NotFound(_) => ErrorKind::NotFound,
            RdxError::InvalidPasskeyOrCorruptedData => ErrorKind::Authentication,
            RdxError::Dependency(_)
            | RdxError::Config(_)
            | RdxError::Io(_)
            | RdxError::Other(_) => ErrorKind::Internal,
        }
    }
}
