//! Chunker — splits a transaction hex string into fixed-size fragments
//! for transmission over the mesh's ~200-character text messages.

/// Default fragment size in characters. The server does not negotiate
/// this — it is a purely client-side parameter and never appears on the
/// wire (see SPEC_FULL.md Open Questions).
pub const CHUNK_SIZE: usize = 170;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkerError {
    #[error("transaction hex is empty")]
    EmptyInput,
    #[error("transaction hex is not valid hex of even length")]
    InvalidHex,
}

/// Split `hex` into ordered fragments of at most `chunk_size` characters
/// each. The final fragment may be shorter but is always non-empty.
/// Concatenating the result in order reproduces `hex` exactly.
pub fn chunk(hex: &str, chunk_size: usize) -> Result<Vec<String>, ChunkerError> {
    if hex.is_empty() {
        return Err(ChunkerError::EmptyInput);
    }
    if !is_valid_hex(hex) {
        return Err(ChunkerError::InvalidHex);
    }

    let bytes = hex.as_bytes();
    let mut fragments = Vec::with_capacity(bytes.len().div_ceil(chunk_size));
    for piece in bytes.chunks(chunk_size) {
        fragments.push(String::from_utf8(piece.to_vec()).expect("hex is ASCII"));
    }
    Ok(fragments)
}

fn is_valid_hex(s: &str) -> bool {
    s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
