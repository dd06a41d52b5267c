//! Reply parsing: pull the JSON array out of free-form model text.
//!
//! Models often wrap the array in prose or a code fence despite being told
//! not to. The parser takes everything from the first `[` to the last `]`
//! (across newlines) and parses that span as JSON.
//!
//! A reply holding two separate arrays (`[..] and [..]`) produces a span
//! that is not valid JSON. The page yields nothing and a warning is logged,
//! so the lost records are visible.

use crate::output::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static RE_JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Parse the JSON array embedded in `reply`.
///
/// Returns `None` when there is no `[`…`]` span or the span is not valid
/// JSON. `Some(vec![])` means the model returned an empty array. Element
/// contents are not validated.
pub fn parse_reply(reply: &str) -> Option<Vec<Record>> {
    let span = RE_JSON_ARRAY.find(reply)?;
    match serde_json::from_str::<Vec<Record>>(span.as_str()) {
        Ok(records) => Some(records),
        Err(e) => {
            if starts_with_complete_array(span.as_str()) {
                warn!("Reply holds more than one JSON array; none were used");
            } else {
                debug!("Bracketed span is not a JSON array: {}", e);
            }
            None
        }
    }
}

/// True when `span` opens with a complete JSON array followed by more text.
fn starts_with_complete_array(span: &str) -> bool {
    matches!(
        serde_json::Deserializer::from_str(span)
            .into_iter::<Vec<Record>>()
            .next(),
        Some(Ok(_))
    )
}
