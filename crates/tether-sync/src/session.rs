//! Stable session identifiers for host contexts.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Prefix of every derived session identifier.
pub const SESSION_ID_PREFIX: &str = "ws_";

/// Hex characters of the digest kept in the identifier.
const SESSION_DIGEST_CHARS: usize = 16;

/// Derive the session identifier for a host context directory.
///
/// The path is canonicalized when possible so `./repo` and `/abs/repo`
/// map to the same session; otherwise it is hashed as given.
pub fn session_id_for(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    let mut hasher = Sha256::new();
    hasher.update(resolved.as_os_str().as_encoded_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{}{}", SESSION_ID_PREFIX, &digest[..SESSION_DIGEST_CHARS])
}
