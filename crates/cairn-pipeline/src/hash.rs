use sha2::{Digest, Sha256};

/// Compute the SHA-256 content hash of a byte slice.
///
/// Rendered as `sha256:<hex>` so stored hashes are self-describing.
pub fn content_hash(bytes: &[u8]) -> String {
  format!("sha256:{:x}", Sha256::digest(bytes))
}
