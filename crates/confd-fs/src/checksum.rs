//! Content checksums
//!
//! Snapshots are compared by checksum, never byte by byte. The canonical form
//! is `sha256:<lowercase hex>`.

use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

/// Checksum of raw content in canonical form.
pub fn compute_checksum(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("{PREFIX}{digest:x}")
}
