//! Content fingerprints.
//!
//! A [`Digest`] is the SHA-1 of a content's significant bytes. The
//! [`Digest::INVALID`] sentinel marks unreadable content and never compares
//! equal to a digest produced by [`Digest::hash`] or [`DigestHasher`].

use std::fmt;
use std::io;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest as _, Sha1};

use crate::error::CoreError;

/// Length of a SHA-1 digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// A 160-bit content fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest {
    bytes: [u8; DIGEST_LEN],
    valid: bool,
}

impl Digest {
    /// Sentinel for content that could not be read.
    pub const INVALID: Self = Self {
        bytes: [0u8; DIGEST_LEN],
        valid: false,
    };

    /// Compute the digest of the given data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = DigestHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self { bytes, valid: true }
    }

    /// Get the raw bytes. All zeros for the invalid sentinel.
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.bytes
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// True only if both digests are valid and identical.
    pub fn matches(&self, other: &Digest) -> bool {
        self.valid && other.valid && self.bytes == other.bytes
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Standard base64, as stored in archive manifests.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    /// Parse the manifest base64 form.
    pub fn from_base64(s: &str) -> Result<Self, CoreError> {
        let decoded = STANDARD
            .decode(s.trim())
            .map_err(|e| CoreError::InvalidDigest(e.to_string()))?;
        let bytes: [u8; DIGEST_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidDigest(format!("expected {DIGEST_LEN} bytes, got {}", decoded.len())))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "Digest({})", &self.to_hex()[..16])
        } else {
            write!(f, "Digest(INVALID)")
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "{}", &self.to_hex()[..16])
        } else {
            write!(f, "invalid")
        }
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Incremental digest computation, usable as an `io::Write` sink.
#[derive(Clone, Default)]
pub struct DigestHasher {
    inner: Sha1,
}

impl DigestHasher {
    pub fn new() -> Self {
        Self { inner: Sha1::new() }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> Digest {
        Digest::from_bytes(self.inner.finalize().into())
    }
}

impl io::Write for DigestHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
