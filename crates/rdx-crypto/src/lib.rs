//! rdx-crypto: reversible field encryption for document redaction
//!
//! Session layout:
//! ```text
//! Session Key (256-bit, Argon2id from passkey + fresh 16-byte salt)
//!   └── Field AEAD: XChaCha20-Poly1305 (key=session_key, nonce=random_192bit, AAD=placeholder_id)
//! ```
//!
//! Every redaction session gets its own salt. The salt, the KDF parameters and
//! the per-field ciphertexts form the [`EncryptionMetadata`] sidecar; the
//! passkey is never stored.

pub mod cipher;
pub mod error;
pub mod fields;
pub mod kdf;
pub mod metadata;

pub use cipher::{decrypt_value, encrypt_value};
pub use error::{CryptoError, CryptoResult};
pub use fields::{
    decrypt_fields, encrypt_fields, placeholder_id, placeholder_marker, MARKER_PREFIX,
};
pub use kdf::{derive_key, KdfLimits, KdfParams, SessionKey};
pub use metadata::{EncryptedFieldRecord, EncryptionMetadata, Method};

/// Size of a session key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a KDF salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
