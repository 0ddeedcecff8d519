//! btcmesh wire format — the four message kinds exchanged between the
//! client and the relay over the mesh's short text messages.
//!
//! All four kinds are 7-bit ASCII, `|`-delimited, with no escaping: none
//! of the fields may themselves contain `|` except the NACK detail, which
//! is rejoined from everything after the third `|`. The codec performs no
//! I/O — it only serializes/parses strings already delivered by a
//! transport adapter.

use crate::session_id::SessionId;

/// Chunk message: one fragment of a transaction hex string.
pub const KIND_CHUNK: &str = "BTC_TX";
/// Per-chunk ACK: acknowledges one chunk and requests the next.
pub const KIND_CHUNK_ACK: &str = "BTC_CHUNK_ACK";
/// Terminal success: the relay broadcast the transaction.
pub const KIND_ACK: &str = "BTC_ACK";
/// Terminal failure: the relay could not complete the session.
pub const KIND_NACK: &str = "BTC_NACK";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// `BTC_TX|<sid>|<n>/<total>|<payload>`
    Chunk {
        sid: SessionId,
        n: u32,
        total: u32,
        payload: String,
    },
    /// `BTC_CHUNK_ACK|<sid>|<n>|OK|REQUEST_CHUNK|<next>`
    ChunkAck { sid: SessionId, n: u32, next: u32 },
    /// `BTC_ACK|<sid>|SUCCESS|TXID:<txid>`
    Ack { sid: SessionId, txid: String },
    /// `BTC_NACK|<sid>|ERROR|<detail>`
    Nack { sid: SessionId, detail: String },
}

/// Parse failures collapse to a single kind — the codec never tells the
/// peer *why* a message was malformed, to avoid giving crafted input an
/// oracle into the parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed message: {0}")]
pub struct MalformedMessage(pub String);

impl WireMessage {
    /// Format this message for transmission.
    pub fn to_wire(&self) -> String {
        match self {
            WireMessage::Chunk {
                sid,
                n,
                total,
                payload,
            } => format!("{KIND_CHUNK}|{sid}|{n}/{total}|{payload}"),
            WireMessage::ChunkAck { sid, n, next } => {
                format!("{KIND_CHUNK_ACK}|{sid}|{n}|OK|REQUEST_CHUNK|{next}")
            }
            WireMessage::Ack { sid, txid } => {
                format!("{KIND_ACK}|{sid}|SUCCESS|TXID:{txid}")
            }
            WireMessage::Nack { sid, detail } => {
                format!("{KIND_NACK}|{sid}|ERROR|{detail}")
            }
        }
    }

    /// Parse a message from its wire text.
    pub fn parse(text: &str) -> Result<WireMessage, MalformedMessage> {
        let kind = text
            .split('|')
            .next()
            .ok_or_else(|| malformed(text, "empty message"))?;

        match kind {
            KIND_CHUNK => parse_chunk(text),
            KIND_CHUNK_ACK => parse_chunk_ack(text),
            KIND_ACK => parse_ack(text),
            KIND_NACK => parse_nack(text),
            other => Err(malformed(text, &format!("unknown kind {other}"))),
        }
    }
}

fn malformed(text: &str, reason: &str) -> MalformedMessage {
    MalformedMessage(format!("{reason} (raw: {text:.80})"))
}

fn parse_chunk(text: &str) -> Result<WireMessage, MalformedMessage> {
    let parts: Vec<&str> = text.splitn(4, '|').collect();
    let [_kind, sid, n_total, payload] = parts.as_slice() else {
        return Err(malformed(text, "chunk message needs 4 fields"));
    };

    let sid = parse_sid(sid, text)?;
    let (n_str, total_str) = n_total
        .split_once('/')
        .ok_or_else(|| malformed(text, "missing n/total separator"))?;
    let n = parse_decimal(n_str, text)?;
    let total = parse_decimal(total_str, text)?;

    if n > total {
        return Err(malformed(text, "chunk number out of range"));
    }
    if !is_hex_even(payload) {
        return Err(malformed(text, "payload is not even-length lowercase hex"));
    }

    Ok(WireMessage::Chunk {
        sid,
        n,
        total,
        payload: payload.to_string(),
    })
}

fn parse_chunk_ack(text: &str) -> Result<WireMessage, MalformedMessage> {
    let parts: Vec<&str> = text.splitn(6, '|').collect();
    let [_kind, sid, n, ok, request, next] = parts.as_slice() else {
        return Err(malformed(text, "chunk ack needs 6 fields"));
    };

    if *ok != "OK" || *request != "REQUEST_CHUNK" {
        return Err(malformed(text, "chunk ack missing OK/REQUEST_CHUNK literals"));
    }

    let sid = parse_sid(sid, text)?;
    let n = parse_decimal(n, text)?;
    let next = parse_decimal(next, text)?;

    Ok(WireMessage::ChunkAck { sid, n, next })
}

fn parse_ack(text: &str) -> Result<WireMessage, MalformedMessage> {
    let parts: Vec<&str> = text.splitn(4, '|').collect();
    let [_kind, sid, status, txid_field] = parts.as_slice() else {
        return Err(malformed(text, "ack needs 4 fields"));
    };

    if *status != "SUCCESS" {
        return Err(malformed(text, "ack missing SUCCESS literal"));
    }

    let txid = txid_field
        .strip_prefix("TXID:")
        .ok_or_else(|| malformed(text, "ack missing TXID: prefix"))?;
    if txid.is_empty() || !is_hex(txid) {
        return Err(malformed(text, "ack txid is not hex"));
    }

    let sid = parse_sid(sid, text)?;
    Ok(WireMessage::Ack {
        sid,
        txid: txid.to_string(),
    })
}

fn parse_nack(text: &str) -> Result<WireMessage, MalformedMessage> {
    let parts: Vec<&str> = text.splitn(4, '|').collect();
    let [_kind, sid, status, detail] = parts.as_slice() else {
        return Err(malformed(text, "nack needs 4 fields"));
    };

    if *status != "ERROR" {
        return Err(malformed(text, "nack missing ERROR literal"));
    }

    let sid = parse_sid(sid, text)?;
    Ok(WireMessage::Nack {
        sid,
        detail: detail.to_string(),
    })
}

fn parse_sid(field: &str, text: &str) -> Result<SessionId, MalformedMessage> {
    SessionId::parse(field).ok_or_else(|| malformed(text, "invalid session id"))
}

/// Decimal positive integer, no leading zeros.
fn parse_decimal(field: &str, text: &str) -> Result<u32, MalformedMessage> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(text, "not a decimal integer"));
    }
    if field.len() > 1 && field.starts_with('0') {
        return Err(malformed(text, "leading zero in integer field"));
    }
    let value: u32 = field
        .parse()
        .map_err(|_| malformed(text, "integer out of range"))?;
    if value == 0 {
        return Err(malformed(text, "integer field must be positive"));
    }
    Ok(value)
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_hex_even(s: &str) -> bool {
    is_hex(s) && s.len() % 2 == 0 && s.bytes().all(|b| !b.is_ascii_uppercase())
}
