// Opaque pagination cursor over the compound key `(updated_at, id)`.
//
// The id breaks ties between identical timestamps, so the key is a
// total order. Physically the cursor is url-safe base64 over
// `<timestamp_micros>|<id>`; decode accepts only strings produced by
// encode and returns `None` for everything else.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};

/// Decoded pagination position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub updated_at: DateTime<Utc>,
    pub id: String,
}

impl PageCursor {
    pub fn new(updated_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self { updated_at, id: id.into() }
    }

    /// Ordering key for descending `(updated_at, id)` traversal: `other`
    /// belongs on a later page iff it sorts strictly before this cursor.
    pub fn precedes(&self, updated_at: DateTime<Utc>, id: &str) -> bool {
        (updated_at, id) < (self.updated_at, self.id.as_str())
    }
}

/// Serialize a compound key into an opaque transport-safe string.
pub fn encode_cursor(updated_at: DateTime<Utc>, id: &str) -> String {
    let payload = format!("{}|{id}", updated_at.timestamp_micros());
    URL_SAFE_NO_PAD.encode(payload.as_bytes())
}

/// Exact inverse of `encode_cursor`. Malformed input — bad base64,
/// missing separator, unparsable timestamp, empty id — yields `None`,
/// never a panic and never a substituted default.
pub fn decode_cursor(value: &str) -> Option<PageCursor> {
    let decoded = URL_SAFE_NO_PAD.decode(value.as_bytes()).ok()?;
    let payload = String::from_utf8(decoded).ok()?;

    let (timestamp, id) = payload.split_once('|')?;
    if id.is_empty() {
        return None;
    }

    let timestamp = timestamp.parse::<i64>().ok()?;
    let updated_at = DateTime::<Utc>::from_timestamp_micros(timestamp)?;

    Some(PageCursor { updated_at, id: id.to_string() })
}
