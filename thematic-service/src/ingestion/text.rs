//! Plain text decoding and paragraph splitting.

use serde_json::{Value, json};

use crate::error::{ServiceError, ServiceResult};

/// Decode UTF-8 bytes, dropping a leading byte-order mark and normalizing line endings
pub fn decode_utf8(bytes: &[u8]) -> ServiceResult<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ServiceError::validation(format!("File is not valid UTF-8 text: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Ok(text.replace("\r\n", "\n"))
}

/// Split text into paragraphs on blank lines
pub fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

pub fn structure(text: &str) -> Value {
    json!({
        "text": text,
        "paragraphs": paragraphs(text),
    })
}
