//! Fast content hashing for change detection.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::{xxh64, Xxh64};

use crate::errors::{EntwineError, Result};

/// A 64-bit non-cryptographic digest. Used only to notice that content changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FastHash(pub u64);

impl FastHash {
    /// Hex form, 16 lowercase digits.
    pub fn to_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Display for FastHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hashes raw bytes.
pub fn fast_hash(bytes: &[u8]) -> FastHash {
    FastHash(xxh64(bytes, 0))
}

/// Hashes a string's UTF-8 bytes.
pub fn fast_hash_str(content: &str) -> FastHash {
    fast_hash(content.as_bytes())
}

/// Hashes a file's content without loading it at once.
pub fn hash_file(path: &Path) -> Result<FastHash> {
    let mut file = fs::File::open(path).map_err(|e| EntwineError::unreadable(path, e))?;
    let mut hasher = Xxh64::new(0);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| EntwineError::unreadable(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(FastHash(hasher.digest()))
}

/// Reads a tracked file, mapping failures to per-file errors.
pub fn read_tracked(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| EntwineError::unreadable(path, e))
}
