// Key Encoding
//
// Bit-exact mapping between log indices and store keys. Existing
// on-disk data depends on this layout, so it must never change.

use super::{Index, LogError};

/// Reserved key holding the decimal tail index.
///
/// Contains non-digit characters, so it can never collide with an entry key.
pub const MARKER_KEY: &str = "lastIndex";

/// Store key for the entry at `index`: base-10 ASCII, no padding.
pub fn entry_key(index: Index) -> String {
    index.to_string()
}

/// Encode a tail index as the marker value.
pub fn encode_marker(index: Index) -> Vec<u8> {
    index.to_string().into_bytes()
}

/// Decode a marker value written by [`encode_marker`].
pub fn decode_marker(raw: &[u8]) -> Result<Index, LogError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<Index>().ok())
        .filter(|i| *i >= super::EMPTY_INDEX)
        .ok_or_else(|| LogError::CorruptMarker {
            value: String::from_utf8_lossy(raw).into_owned(),
        })
}
