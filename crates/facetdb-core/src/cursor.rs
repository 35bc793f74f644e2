//! Opaque pagination cursors.
//!
//! A cursor is the store's resume point (`LastEvaluatedKey`) serialized as
//! tagged JSON and encoded with standard base64.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use facetdb_model::Key;

/// Errors produced by the cursor codec.
#[derive(Debug, thiserror::Error)]
pub enum CursorCodecError {
    /// The resume point could not be serialized.
    #[error("failed to encode cursor: {0}")]
    Encode(#[source] serde_json::Error),
    /// The cursor is not valid base64.
    #[error("cursor is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded cursor is not a valid resume point.
    #[error("cursor does not hold a valid resume point: {0}")]
    Json(#[source] serde_json::Error),
}

/// Encode a resume point. An empty map encodes to `""`.
pub fn encode(last_key: &Key) -> Result<String, CursorCodecError> {
    if last_key.is_empty() {
        return Ok(String::new());
    }
    let json = serde_json::to_vec(last_key).map_err(CursorCodecError::Encode)?;
    Ok(STANDARD.encode(json))
}

/// Decode a cursor. `""` decodes to an empty map.
pub fn decode(cursor: &str) -> Result<Key, CursorCodecError> {
    if cursor.is_empty() {
        return Ok(Key::new());
    }
    let bytes = STANDARD.decode(cursor)?;
    serde_json::from_slice(&bytes).map_err(CursorCodecError::Json)
}
