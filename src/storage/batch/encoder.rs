//! Encoding of record properties into the `data` column.

use serde_json::Value;

use crate::error_handling::SerializationError;
use crate::storage::models::Record;

/// Serializes `properties` to JSON and enforces what the store can hold.
///
/// Keys are emitted in sorted order, so equal maps always encode to the same
/// bytes. Numbers and strings pass through unchanged.
#[derive(Debug, Clone)]
pub struct PropertyEncoder {
    max_document_bytes: usize,
}

impl PropertyEncoder {
    pub fn new(max_document_bytes: usize) -> Self {
        PropertyEncoder { max_document_bytes }
    }

    /// Encodes one record's properties.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if a key or string contains NUL (JSONB
    /// stores reject `\u0000`), or if the document exceeds the size limit.
    pub fn encode(&self, record: &Record) -> Result<String, SerializationError> {
        let reject = |reason: String| SerializationError {
            uid: record.uid.clone(),
            reason,
        };

        for (key, value) in &record.properties {
            if key.contains('\0') || contains_nul(value) {
                return Err(reject(format!("NUL character in property {:?}", key)));
            }
        }

        let document =
            serde_json::to_string(&record.properties).map_err(|e| reject(e.to_string()))?;

        if document.len() > self.max_document_bytes {
            return Err(reject(format!(
                "encoded document is {} bytes, limit is {}",
                document.len(),
                self.max_document_bytes
            )));
        }

        Ok(document)
    }
}

fn contains_nul(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains('\0'),
        Value::Array(items) => items.iter().any(contains_nul),
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| key.contains('\0') || contains_nul(value)),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}
