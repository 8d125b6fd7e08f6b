use regex::Regex;

use crate::errors::ScaffoldError;
use crate::wire::GenerateResponse;

/// Turn the model's text into a file set.
///
/// Strict parse first; then the body of a ```json fence; then the first
/// balanced `{...}` object in the text.
pub fn decode_response(content: &str) -> Result<GenerateResponse, ScaffoldError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ScaffoldError::EmptyResponse);
    }

    let first_err = match serde_json::from_str::<GenerateResponse>(trimmed) {
        Ok(resp) => return non_empty(resp),
        Err(e) => e,
    };

    if let Some(inner) = strip_code_fence(trimmed) {
        if let Ok(resp) = serde_json::from_str::<GenerateResponse>(&inner) {
            return non_empty(resp);
        }
    }

    if let Some(obj) = extract_first_json_object(trimmed) {
        if let Ok(resp) = serde_json::from_str::<GenerateResponse>(&obj) {
            return non_empty(resp);
        }
    }

    Err(ScaffoldError::Malformed(first_err.to_string()))
}

fn non_empty(resp: GenerateResponse) -> Result<GenerateResponse, ScaffoldError> {
    if resp.files.is_empty() {
        Err(ScaffoldError::EmptyResponse)
    } else {
        Ok(resp)
    }
}

fn strip_code_fence(s: &str) -> Option<String> {
    let re = Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*\n(.*?)\n?```").ok()?;
    re.captures(s).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Extracts the first top-level JSON object substring from a string.
/// Braces inside JSON strings are ignored.
pub(crate) fn extract_first_json_object(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if start.is_some() => in_string = true,
            b'{' => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(st) = start {
                        return Some(s[st..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }
    None
}
