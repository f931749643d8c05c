use rdx_core::RdxError;
use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Authentication failed. Wrong passkey and tampered data look the same.
    #[error("invalid passkey or corrupted data")]
    InvalidPasskeyOrCorruptedData,

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("field encryption failed: {0}")]
    Encrypt(String),

    #[error("invalid field: {0}")]
    InvalidField(String),
}

impl From<CryptoError> for RdxError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidPasskeyOrCorruptedData => RdxError::InvalidPasskeyOrCorruptedData,
            CryptoError::InvalidField(msg) => RdxError::Validation(msg),
            other => RdxError::Other(anyhow::anyhow!(other)),
        }
    }
}
