use rdx_core::{RdxError, RdxResult};
use secrecy::{ExposeSecret, SecretString};

/// Passkey strength policy, checked before any key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasskeyPolicy {
    /// Minimum length in characters
    pub min_len: usize,
}

impl Default for PasskeyPolicy {
    fn default() -> Self {
        Self { min_len: 8 }
    }
}

impl PasskeyPolicy {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }

    pub fn check(&self, passkey: &SecretString) -> RdxResult<()> {
        if passkey.expose_secret().chars().count() < self.min_len {
            return Err(RdxError::Validation(format!(
                "passkey must be at least {} characters",
                self.min_len
            )));
        }
        Ok(())
    }
}
