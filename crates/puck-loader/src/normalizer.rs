//! JSON file to COPY text normalization
//!
//! A source file becomes one line per logical entity:
//!
//! ```text
//! <escaped compact json>\t<escaped source filename>\n
//! ```
//!
//! which is exactly what `COPY ... FROM STDIN WITH (FORMAT text)` expects for a
//! `(payload, source_filename)` column list. The whole file is buffered; source
//! files are bounded API responses.

use crate::error::{LoadError, LoadResult};
use serde_json::Value;
use std::path::Path;

/// Entities of one source file, serialized for COPY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBatch {
    source_filename: String,
    buffer: String,
    record_count: usize,
}

impl NormalizedBatch {
    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Raw COPY text, ready to send
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Lines without their trailing newline
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.buffer.lines()
    }
}

/// Read `path` and turn it into COPY lines tagged with `source_filename`
///
/// Fails with [`LoadError::MalformedInput`] when the file cannot be read, is not
/// JSON, or is an object lacking a list under `array_unwrap_key`.
pub fn normalize(path: &Path, array_unwrap_key: Option<&str>, source_filename: &str) -> LoadResult<NormalizedBatch> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::malformed(path, e))?;
    let document: Value = serde_json::from_str(&content).map_err(|e| LoadError::malformed(path, e))?;
    normalize_value(path, document, array_unwrap_key, source_filename)
}

/// Same as [`normalize`] for an already parsed document
pub fn normalize_value(
    path: &Path,
    document: Value,
    array_unwrap_key: Option<&str>,
    source_filename: &str,
) -> LoadResult<NormalizedBatch> {
    let entities = unwrap_entities(path, document, array_unwrap_key)?;
    let tag = escape_copy_text(source_filename);

    let mut buffer = String::new();
    for (index, entity) in entities.iter().enumerate() {
        let json = serde_json::to_string(entity).map_err(|e| LoadError::malformed_record(path, index, e))?;

        let parsed_back: Value =
            serde_json::from_str(&json).map_err(|e| LoadError::malformed_record(path, index, e))?;
        if &parsed_back != entity {
            return Err(LoadError::malformed_record(
                path,
                index,
                "entity does not survive a serialization round-trip",
            ));
        }

        buffer.push_str(&escape_copy_text(&json));
        buffer.push('\t');
        buffer.push_str(&tag);
        buffer.push('\n');
    }

    Ok(NormalizedBatch {
        source_filename: source_filename.to_string(),
        buffer,
        record_count: entities.len(),
    })
}

fn unwrap_entities(path: &Path, document: Value, array_unwrap_key: Option<&str>) -> LoadResult<Vec<Value>> {
    match (document, array_unwrap_key) {
        (Value::Array(items), _) => Ok(items),
        (Value::Object(mut map), Some(key)) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(LoadError::malformed(
                path,
                format!("array unwrap key '{}' maps to {}, not a list", key, kind_of(&other)),
            )),
            None => Err(LoadError::malformed(
                path,
                format!("array unwrap key '{}' not found", key),
            )),
        },
        (single, _) => Ok(vec![single]),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Escape text for a COPY text-format field
///
/// Backslash is doubled before any other escape is introduced, so the output
/// never contains a raw tab, newline or carriage return.
pub fn escape_copy_text(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Inverse of [`escape_copy_text`]
pub fn unescape_copy_text(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            },
            None => out.push('\\'),
        }
    }

    out
}
