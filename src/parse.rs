//! Extraction of a JSON document from CLI output.
//!
//! gt may print banner or log lines before its `--json` payload. The first line
//! that opens an array or object starts the document; everything from there to
//! the end must parse as one value.

use serde_json::Value;

/// Parse the JSON payload in `raw`, skipping any leading non-JSON lines.
///
/// Returns `None` when no JSON can be parsed. Output without a recognizable
/// start line is tried as a whole, so compact payloads like `[]` or `null`
/// still parse.
pub fn extract_json(raw: &str) -> Option<Value> {
    let start = raw.lines().position(is_json_start);

    let candidate = match start {
        Some(idx) => raw.lines().skip(idx).collect::<Vec<_>>().join("\n"),
        None => raw.trim().to_string(),
    };

    serde_json::from_str(&candidate).ok()
}

fn is_json_start(line: &str) -> bool {
    let line = line.trim();
    line == "[" || line == "{" || line.starts_with("[{") || line.starts_with("{\"")
}
