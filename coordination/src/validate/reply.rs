//! Turning raw model text into a JSON object with typed field access.
//!
//! Models are told to answer with a bare JSON object, but some still wrap
//! it in a ```json fence or add a sentence around it. The object is
//! extracted from either form; everything past that point is strict.

use serde_json::{Map, Value};

use super::error::{ValidationError, ValidationResult};

/// A parsed reply object.
#[derive(Debug, Clone)]
pub struct ReplyObject {
    fields: Map<String, Value>,
}

impl ReplyObject {
    /// Parse raw model output into a JSON object.
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::format("empty reply"));
        }

        let value = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            Err(first_err) => {
                let block = extract_json_block(trimmed).ok_or_else(|| {
                    ValidationError::format(format!("reply is not JSON: {first_err}"))
                })?;
                tracing::debug!(
                    raw_len = trimmed.len(),
                    block_len = block.len(),
                    "Extracted JSON object from wrapped reply"
                );
                serde_json::from_str::<Value>(block).map_err(|e| {
                    ValidationError::format(format!("reply is not JSON: {e}"))
                })?
            }
        };

        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ValidationError::format(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Fail with the full list of absent keys, in the order given.
    pub fn require_keys(&self, keys: &[&str]) -> ValidationResult<()> {
        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|k| self.fields.get(*k).map_or(true, Value::is_null))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::format(format!(
                "missing required keys: {}",
                missing.join(", ")
            )))
        }
    }

    fn get(&self, key: &str) -> ValidationResult<&Value> {
        self.fields
            .get(key)
            .ok_or_else(|| ValidationError::format(format!("missing required keys: {key}")))
    }

    pub fn string(&self, key: &str) -> ValidationResult<String> {
        match self.get(key)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(wrong_type(key, "string", other)),
        }
    }

    pub fn number(&self, key: &str) -> ValidationResult<f64> {
        match self.get(key)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ValidationError::format(format!("{key} is not a finite number"))),
            other => Err(wrong_type(key, "number", other)),
        }
    }

    pub fn boolean(&self, key: &str) -> ValidationResult<bool> {
        match self.get(key)? {
            Value::Bool(b) => Ok(*b),
            other => Err(wrong_type(key, "boolean", other)),
        }
    }

    pub fn string_list(&self, key: &str) -> ValidationResult<Vec<String>> {
        match self.get(key)? {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(wrong_type(key, "array of strings", other)),
                })
                .collect(),
            other => Err(wrong_type(key, "array of strings", other)),
        }
    }
}

fn wrong_type(key: &str, expected: &str, got: &Value) -> ValidationError {
    ValidationError::format(format!(
        "{key} must be a {expected}, got {}",
        json_type_name(got)
    ))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Find a JSON object inside text that may have a fence or prose around it.
pub fn extract_json_block(text: &str) -> Option<&str> {
    // ```json ... ``` fenced block
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Some(text[json_start..json_start + end].trim());
        }
    }

    // First { to last }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
