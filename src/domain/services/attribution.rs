use serde::{Deserialize, Serialize};

pub const UNKNOWN_SOURCE: &str = "Unknown source";
const SOURCE_MARKER: &str = "from [";

/// Source label and body split out of a passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub source: String,
    pub body: String,
}

/// Splits `... from [SOURCE] REST` into `("SOURCE", "REST")`.
///
/// Only the first marker counts. Text without a marker, or with a marker that
/// is never closed, comes back unchanged under [`UNKNOWN_SOURCE`].
pub fn extract_attribution(text: &str) -> Attribution {
    let unknown = || Attribution {
        source: UNKNOWN_SOURCE.to_string(),
        body: text.to_string(),
    };

    let Some(marker) = text.find(SOURCE_MARKER) else {
        return unknown();
    };
    let label_start = marker + SOURCE_MARKER.len();

    let Some(label_len) = text[label_start..].find(']') else {
        return unknown();
    };
    let label_end = label_start + label_len;

    Attribution {
        source: text[label_start..label_end].to_string(),
        body: text[label_end + 1..].trim_start().to_string(),
    }
}
