//! JSONL segment codec
//!
//! One `SerializableEvent` per line, UTF-8, `\n` terminated. Decoding is
//! strict: a line that fails to parse is reported with its 1-based number.

use serde_json::Error as JsonError;

use crate::types::SerializableEvent;

/// Encode events as JSONL bytes
pub fn write_segment(events: &[SerializableEvent]) -> Result<Vec<u8>, JsonError> {
    let mut buffer = Vec::new();
    for event in events {
        serde_json::to_writer(&mut buffer, event)?;
        buffer.push(b'\n');
    }
    Ok(buffer)
}

/// Decode JSONL bytes; empty input yields no events
pub fn read_segment(data: &[u8]) -> Result<Vec<SerializableEvent>, (usize, JsonError)> {
    let data = data.strip_suffix(b"\n").unwrap_or(data);
    if data.is_empty() {
        return Ok(Vec::new());
    }

    data.split(|b| *b == b'\n')
        .enumerate()
        .map(|(index, line)| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            serde_json::from_slice(line).map_err(|e| (index + 1, e))
        })
        .collect()
}
