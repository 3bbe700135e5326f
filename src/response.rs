use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("valid fence regex"));
static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid fence regex"));

/// Strip a single surrounding Markdown code fence, if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = match OPENING_FENCE.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    };
    let without_close = match CLOSING_FENCE.find(without_open) {
        Some(m) => &without_open[..m.start()],
        None => without_open,
    };
    without_close.trim()
}

/// Recover a JSON object from noisy model output.
///
/// Strategy: strip code fences, try a direct decode, then fall back to the
/// first balanced `{…}` substring (brace scan, quote-aware). Model text with
/// no decodable object yields `None` — the caller turns that into a
/// response-contract failure, not a provider outage.
pub fn recover_json(raw: &str) -> Option<Value> {
    let cleaned = strip_code_fences(raw);

    if let Ok(value) = serde_json::from_str::<Value>(cleaned)
        && value.is_object()
    {
        return Some(value);
    }

    let candidate = first_balanced_object(cleaned)?;
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

/// First balanced top-level `{…}` span, skipping braces inside JSON strings.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract `target_field` from recovered model output as a string value.
pub fn extract_field(raw: &str, target_field: &str) -> Result<String, String> {
    let value =
        recover_json(raw).ok_or_else(|| "no decodable JSON object in response".to_string())?;
    match value.get(target_field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(format!("field {target_field} is not a JSON string")),
        None => Err(format!("response object is missing field {target_field}")),
    }
}

// ─── Sanitizer ──────────────────────────────────────────────────────────────

/// Char-safe truncation: never cuts inside a multi-byte character.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Sanitize a single-line field: collapse all whitespace runs (including
/// newlines) to single spaces, then truncate. Idempotent.
pub fn sanitize_line(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_chars).trim_end().to_string()
}

/// Sanitize a multi-line field: normalize line endings and trim, but keep the
/// internal structure. Idempotent.
pub fn sanitize_block(value: &str, max_chars: usize) -> String {
    let normalized = value.replace("\r\n", "\n").replace('\r', "\n");
    truncate_chars(normalized.trim(), max_chars)
        .trim_end()
        .to_string()
}

/// Field-aware dispatch used by the generation pipeline.
pub fn sanitize_field(field: &str, value: &str, max_chars: usize) -> String {
    if crate::prompt::GenerationContext::is_single_line_field(field) {
        sanitize_line(value, max_chars)
    } else {
        sanitize_block(value, max_chars)
    }
}
