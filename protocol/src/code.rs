//! Opaque references to the vault's executable logic.
//!
//! The vault never interprets code. It stores a blob while a code upgrade
//! is pending and swaps it in on finalization; callers compare blobs by
//! their BLAKE3 digest.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest code blob the wire codec accepts.
pub const MAX_CODE_SIZE: usize = 64 * 1024;

/// A blob of executable logic. The empty blob is the neutral placeholder
/// of an idle code slot.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeCell(Vec<u8>);

impl CodeCell {
    /// Wraps raw code bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw code bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for the neutral placeholder.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// BLAKE3 digest of the blob.
    pub fn hash(&self) -> [u8; 32] {
        *blake3::hash(&self.0).as_bytes()
    }

    /// Hex-encoded BLAKE3 digest, for logs and operator output.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

impl fmt::Display for CodeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code:{}", self.hash_hex())
    }
}

impl fmt::Debug for CodeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeCell({} bytes, {})", self.0.len(), self.hash_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty_placeholder() {
        let code = CodeCell::default();
        assert!(code.is_empty());
        assert_eq!(code.hash(), *blake3::hash(b"").as_bytes());
    }

    #[test]
    fn hash_tracks_content() {
        let a = CodeCell::new(b"v1".to_vec());
        let b = CodeCell::new(b"v2".to_vec());
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash_hex().len(), 64);
        assert!(a.to_string().starts_with("code:"));
    }
}
