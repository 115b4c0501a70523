//! Security envelope applied to persisted events.
//!
//! Three independent features, applied in a fixed order when wrapping:
//! 1. Redaction rewrites sensitive `token: value` pairs in the serialized
//!    event before anything else sees it.
//! 2. Encryption seals the (possibly redacted) serialization with AES-GCM
//!    and clears the plaintext location fields from the stored envelope.
//! 3. Integrity computes an HMAC-SHA256 over what is actually stored, so
//!    the tag covers ciphertext when encryption is on.
//!
//! Unwrapping verifies the HMAC first, always before decrypting.

use crate::event::Event;
use aes_gcm::aead::Aead;
use aes_gcm::aes::Aes192;
use aes_gcm::{AesGcm, Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type Aes192Gcm = AesGcm<Aes192, aes_gcm::aead::consts::U12>;
type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

/// Default tokens whose values are redacted.
pub const DEFAULT_REDACTION_PATTERNS: [&str; 5] =
    ["password", "token", "secret", "key", "credential"];

/// Default marker substituted for redacted values.
pub const DEFAULT_REDACTION_REPLACEMENT: &str = "***REDACTED***";

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("encryption key must be 16, 24, or 32 bytes long, got {0}")]
    InvalidKeyLength(usize),

    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed: ciphertext rejected")]
    DecryptFailed,

    #[error("HMAC verification failed: data may have been tampered with")]
    Tampered,

    #[error("encrypted event but no encryption key configured")]
    MissingKey,

    #[error("envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Redaction configuration: which tokens to look for and what to put in
/// place of their values.
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub patterns: Vec<String>,
    pub replacement: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_REDACTION_PATTERNS.iter().map(|s| s.to_string()).collect(),
            replacement: DEFAULT_REDACTION_REPLACEMENT.to_string(),
        }
    }
}

/// Security features for a recorder. All off by default.
///
/// Keys are caller-owned for the lifetime of the recorder; the options only
/// borrow copies.
#[derive(Debug, Clone, Default)]
pub struct SecurityOptions {
    pub encryption_key: Option<Vec<u8>>,
    pub redaction: Option<RedactionConfig>,
    pub integrity_key: Option<Vec<u8>>,
}

impl SecurityOptions {
    /// Enable AES-GCM encryption. The key length is validated at wrap time.
    pub fn with_encryption(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    /// Enable redaction with explicit token patterns. An empty replacement
    /// keeps the default marker.
    pub fn with_redaction(mut self, patterns: &[&str], replacement: &str) -> Self {
        let mut config = RedactionConfig {
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            ..RedactionConfig::default()
        };
        if !replacement.is_empty() {
            config.replacement = replacement.to_string();
        }
        self.redaction = Some(config);
        self
    }

    /// Enable redaction with the default token set and marker.
    pub fn with_default_redaction(mut self) -> Self {
        self.redaction = Some(RedactionConfig::default());
        self
    }

    /// Enable HMAC-SHA256 integrity tags.
    pub fn with_integrity(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.integrity_key = Some(key.into());
        self
    }

    /// True when any feature is enabled.
    pub fn any_enabled(&self) -> bool {
        self.encryption_key.is_some() || self.redaction.is_some() || self.integrity_key.is_some()
    }
}

enum EventCipher {
    Aes128(Box<Aes128Gcm>),
    Aes192(Box<Aes192Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl EventCipher {
    fn new(key: &[u8]) -> SecurityResult<Self> {
        match key.len() {
            16 => Ok(Self::Aes128(Box::new(
                Aes128Gcm::new_from_slice(key).map_err(|_| SecurityError::InvalidKeyLength(16))?,
            ))),
            24 => Ok(Self::Aes192(Box::new(
                Aes192Gcm::new_from_slice(key).map_err(|_| SecurityError::InvalidKeyLength(24))?,
            ))),
            32 => Ok(Self::Aes256(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(|_| SecurityError::InvalidKeyLength(32))?,
            ))),
            n => Err(SecurityError::InvalidKeyLength(n)),
        }
    }

    fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> SecurityResult<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        let result = match self {
            Self::Aes128(c) => c.encrypt(nonce, plaintext),
            Self::Aes192(c) => c.encrypt(nonce, plaintext),
            Self::Aes256(c) => c.encrypt(nonce, plaintext),
        };
        result.map_err(|_| SecurityError::EncryptFailed)
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> SecurityResult<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        let result = match self {
            Self::Aes128(c) => c.decrypt(nonce, ciphertext),
            Self::Aes192(c) => c.decrypt(nonce, ciphertext),
            Self::Aes256(c) => c.decrypt(nonce, ciphertext),
        };
        result.map_err(|_| SecurityError::DecryptFailed)
    }
}

/// AES-GCM encrypt with a fresh random 96-bit nonce prepended to the result.
pub fn encrypt_data(data: &[u8], key: &[u8]) -> SecurityResult<Vec<u8>> {
    let cipher = EventCipher::new(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher.encrypt(&nonce, data)?;

    let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Inverse of [`encrypt_data`]. Fails when the authentication tag does not
/// match, including under a wrong key.
pub fn decrypt_data(data: &[u8], key: &[u8]) -> SecurityResult<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(SecurityError::DecryptFailed);
    }
    let cipher = EventCipher::new(key)?;
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    cipher.decrypt(nonce, ciphertext)
}

/// Replace the value of every `token: value` / `token=value` pair whose
/// token matches one of the configured patterns, case-insensitively.
pub fn redact_data(data: &str, config: &RedactionConfig) -> String {
    let mut result = data.to_string();
    for pattern in &config.patterns {
        let expr = format!(
            r#"(?i)(["']?{}["']?\s*[:=]\s*["']?)([^"'}}\s]+)"#,
            regex::escape(pattern)
        );
        let re = match Regex::new(&expr) {
            Ok(re) => re,
            Err(err) => {
                tracing::warn!(pattern = %pattern, error = %err, "skipping invalid redaction pattern");
                continue;
            }
        };
        result = re
            .replace_all(&result, |caps: &regex::Captures<'_>| {
                format!("{}{}", &caps[1], config.replacement)
            })
            .into_owned();
    }
    result
}

/// Hex-encoded HMAC-SHA256 tag over `data`.
pub fn calculate_hmac(data: &[u8], key: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a hex-encoded HMAC-SHA256 tag.
pub fn verify_hmac(data: &[u8], key: &[u8], expected: &str) -> bool {
    let expected_bytes = match hex::decode(expected) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.verify_slice(&expected_bytes).is_ok()
}

/// Persistence envelope around an [`Event`].
///
/// When `encrypted`, the inner event's `Details` holds the base64 ciphertext
/// and the location triple is cleared so no plaintext leaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureEvent {
    pub event: Event,
    pub encrypted: bool,
    #[serde(default)]
    pub hmac: String,
    #[serde(rename = "is_redacted", default)]
    pub redacted: bool,
}

impl SecureEvent {
    /// Apply the configured security features to `event`.
    pub fn wrap(event: &Event, opts: &SecurityOptions) -> SecurityResult<Self> {
        let mut envelope_event = event.clone();
        let mut redacted = false;
        let mut encrypted = false;

        // Redaction rewrites the canonical serialization, then reparses so
        // the envelope carries a well-formed event.
        let mut payload = serde_json::to_vec(&envelope_event)?;
        if let Some(config) = &opts.redaction {
            let redacted_json = redact_data(&String::from_utf8_lossy(&payload), config);
            envelope_event = serde_json::from_str(&redacted_json)?;
            payload = serde_json::to_vec(&envelope_event)?;
            redacted = true;
        }

        if let Some(key) = &opts.encryption_key {
            let ciphertext = encrypt_data(&payload, key)?;
            envelope_event = Event {
                id: event.id,
                timestamp: event.timestamp,
                kind: event.kind,
                details: BASE64.encode(ciphertext),
                file: String::new(),
                line: 0,
                func_name: String::new(),
            };
            payload = serde_json::to_vec(&envelope_event)?;
            encrypted = true;
        }

        let hmac = match &opts.integrity_key {
            Some(key) => calculate_hmac(&payload, key),
            None => String::new(),
        };

        Ok(Self {
            event: envelope_event,
            encrypted,
            hmac,
            redacted,
        })
    }

    /// Recover the stored event, verifying integrity before decrypting.
    pub fn unwrap(&self, opts: &SecurityOptions) -> SecurityResult<Event> {
        if let Some(key) = &opts.integrity_key {
            if !self.hmac.is_empty() {
                let payload = serde_json::to_vec(&self.event)?;
                if !verify_hmac(&payload, key, &self.hmac) {
                    return Err(SecurityError::Tampered);
                }
            }
        }

        if !self.encrypted {
            return Ok(self.event.clone());
        }

        let key = opts.encryption_key.as_ref().ok_or(SecurityError::MissingKey)?;
        let ciphertext = BASE64
            .decode(&self.event.details)
            .map_err(|_| SecurityError::DecryptFailed)?;
        let plaintext = decrypt_data(&ciphertext, key)?;
        let event = serde_json::from_slice(&plaintext)?;
        Ok(event)
    }

    /// Verify the integrity tag against what is stored, without decrypting.
    pub fn verify_integrity(&self, key: &[u8]) -> SecurityResult<bool> {
        if self.hmac.is_empty() {
            return Ok(true);
        }
        let payload = serde_json::to_vec(&self.event)?;
        Ok(verify_hmac(&payload, key, &self.hmac))
    }
}
