//! Cleanup of raw completion text into a candidate JSON payload.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Fenced code-block delimiter: three or more backticks plus an optional language tag.
    static ref CODE_FENCE: Regex = Regex::new(r"`{3,}[\w+\-]*").unwrap();
}

/// Isolate the JSON payload embedded in a raw completion.
///
/// Fence delimiters are removed first; the result is the span from the first
/// `{` to the last `}`. Without such a span the trimmed text is returned
/// unchanged. Never fails, and `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(raw: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(raw, "");

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => unfenced[start..=end].to_string(),
        _ => unfenced.trim().to_string(),
    }
}
