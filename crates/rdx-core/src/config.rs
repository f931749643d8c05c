use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from rdx.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RdxConfig {
    pub daemon: DaemonConfig,
    pub storage: StorageConfig,
    pub policy: PolicyConfig,
    pub kdf: KdfConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listen address (default: 127.0.0.1:8400)
    pub listen: String,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
    /// Upper bound for a single redact/restore, in seconds
    pub operation_timeout_secs: u64,
    /// Maximum accepted upload size in MiB
    pub max_upload_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded sources and produced artifacts
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Minimum passkey length, in characters
    pub min_passkey_len: usize,
}

/// Argon2id parameters used for new redaction sessions.
///
/// Restore always uses the parameters recorded in the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// Highest memory cost accepted from a sidecar on restore (default: 1 GiB)
    pub max_mem_cost_kib: u32,
    /// Highest time cost accepted from a sidecar on restore (default: 16)
    pub max_time_cost: u32,
    /// Highest parallelism accepted from a sidecar on restore (default: 16)
    pub max_parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Detected fields below this confidence are discarded
    pub min_confidence: f32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8400".into(),
            log_level: "info".into(),
            log_format: "json".into(),
            operation_timeout_secs: 120,
            max_upload_mb: 50,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("/var/lib/rdx/uploads"),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { min_passkey_len: 8 }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            max_mem_cost_kib: 1024 * 1024,
            max_time_cost: 16,
            max_parallelism: 16,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
        }
    }
}
