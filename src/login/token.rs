//! Session id generation.
//!
//! Ids are bearer secrets: anyone holding a pending id can confirm that
//! login. They are drawn from the OS CSPRNG only. If the OS source fails,
//! generation fails; there is no weaker fallback.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;

use super::LoginError;

/// Length of every session id, in characters.
pub const SESSION_ID_LEN: usize = 32;

/// Bytes of entropy drawn per id (encodes to 43 base64 chars before truncation).
const ENTROPY_BYTES: usize = 32;

/// Generate a 32-char session id over the URL-safe alphabet `[A-Za-z0-9_-]`.
pub fn generate_session_id() -> Result<String, LoginError> {
    let mut bytes = [0u8; ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| LoginError::Entropy(e.to_string()))?;

    let mut id = URL_SAFE_NO_PAD.encode(bytes);
    id.truncate(SESSION_ID_LEN);
    Ok(id)
}

/// Whether `s` has the shape of a session id. Cheap pre-filter for
/// caller-supplied input; lookups stay correct without it.
pub fn looks_like_session_id(s: &str) -> bool {
    s.len() == SESSION_ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Short, log-safe prefix of an id. Full ids never go to logs.
pub fn redact(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(8)
        .map_or(id.len(), |(idx, _)| idx);
    &id[..end]
}
