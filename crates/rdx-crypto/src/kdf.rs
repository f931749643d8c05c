//! Key derivation: Argon2id passkey + salt → session key

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from a passkey for one redaction session.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters for KDF.
///
/// Recorded in the metadata sidecar so a restore rederives with the exact
/// parameters the session was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl From<&rdx_core::config::KdfConfig> for KdfParams {
    fn from(cfg: &rdx_core::config::KdfConfig) -> Self {
        Self {
            mem_cost_kib: cfg.argon2_mem_cost_kib,
            time_cost: cfg.argon2_time_cost,
            parallelism: cfg.argon2_parallelism,
        }
    }
}

/// Upper bounds for parameters read back from metadata.
///
/// Sidecar contents are not authenticated until decryption succeeds, so the
/// cost of rederiving a key is capped before any work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfLimits {
    pub max_mem_cost_kib: u32,
    pub max_time_cost: u32,
    pub max_parallelism: u32,
}

impl Default for KdfLimits {
    fn default() -> Self {
        Self {
            max_mem_cost_kib: 1024 * 1024,
            max_time_cost: 16,
            max_parallelism: 16,
        }
    }
}

impl From<&rdx_core::config::KdfConfig> for KdfLimits {
    fn from(cfg: &rdx_core::config::KdfConfig) -> Self {
        Self {
            max_mem_cost_kib: cfg.max_mem_cost_kib,
            max_time_cost: cfg.max_time_cost,
            max_parallelism: cfg.max_parallelism,
        }
    }
}

impl KdfLimits {
    pub fn admits(&self, params: &KdfParams) -> bool {
        params.mem_cost_kib <= self.max_mem_cost_kib
            && params.time_cost <= self.max_time_cost
            && params.parallelism <= self.max_parallelism
    }
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit session key from a passkey using Argon2id.
///
/// With `salt = None` a fresh random salt is generated. The salt is returned
/// alongside the key and must be persisted; it does not need to be secret.
/// Deterministic for identical `(passkey, salt, params)`.
pub fn derive_key(
    passkey: &SecretString,
    salt: Option<[u8; SALT_SIZE]>,
    params: &KdfParams,
) -> CryptoResult<(SessionKey, [u8; SALT_SIZE])> {
    let salt = salt.unwrap_or_else(generate_salt);

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Kdf(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passkey.expose_secret().as_bytes(), &salt, &mut key)
        .map_err(|e| CryptoError::Kdf(format!("Argon2id KDF failed: {e}")))?;

    Ok((SessionKey::from_bytes(key), salt))
}

#[cfg(test)]
pub(crate) fn test_params() -> KdfParams {
    KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}
