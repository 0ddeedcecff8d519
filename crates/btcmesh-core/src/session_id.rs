//! Session identifier — a short opaque token binding all chunks and ACKs
//! of one transaction send.
//!
//! Generated from a cryptographic random source, never from wall-clock
//! state. Uniqueness is probabilistic; collisions within the server's
//! active window are caught by the `total_chunks`/sender-pinning checks
//! in the reassembly table, not prevented here.

use std::fmt;

use rand::RngCore;

/// Number of hex nibbles in the wire token.
const SESSION_ID_NIBBLES: usize = 5;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; SESSION_ID_NIBBLES]);

impl SessionId {
    /// Generate a new session id from a cryptographic random source.
    ///
    /// Each nibble is drawn independently from a full random byte and
    /// masked down to 4 bits, rather than hex-encoding whole random
    /// bytes, so the token is exactly 5 hex characters as the wire
    /// format requires.
    pub fn generate() -> Self {
        let mut raw = [0u8; SESSION_ID_NIBBLES];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        let mut nibbles = [0u8; SESSION_ID_NIBBLES];
        for (n, b) in nibbles.iter_mut().zip(raw.iter()) {
            *n = b & 0x0f;
        }
        Self(nibbles)
    }

    /// Parse a session id from its on-wire hex representation.
    pub fn parse(text: &str) -> Option<Self> {
        if text.len() != SESSION_ID_NIBBLES {
            return None;
        }
        let mut nibbles = [0u8; SESSION_ID_NIBBLES];
        for (n, c) in nibbles.iter_mut().zip(text.bytes()) {
            *n = (c as char).to_digit(16)? as u8;
            if !c.is_ascii_digit() && !c.is_ascii_lowercase() {
                return None;
            }
        }
        Some(Self(nibbles))
    }

    /// On-wire hex representation.
    pub fn as_hex(&self) -> String {
        self.0
            .iter()
            .map(|&n| HEX_DIGITS[n as usize] as char)
            .collect()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}
