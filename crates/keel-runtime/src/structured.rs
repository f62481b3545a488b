//! Structured-output validation.
//!
//! Validates the model's final payload against the session's configured
//! JSON Schema (draft-07 subset: `type`, `properties`, `required`,
//! `items`, `enum`, numeric bounds, string/array lengths,
//! `additionalProperties`). Validation failures are collected as paths so
//! the re-prompt can tell the model exactly what to fix.

use serde_json::Value;

/// Validate `value` against `schema`.
///
/// Returns the list of violations (empty = valid), each prefixed with a
/// JSON-pointer-style path.
#[must_use]
pub fn validate(schema: &Value, value: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    validate_at(schema, value, "$", &mut errors);
    errors
}

/// Parse the final assistant text as JSON and validate it.
///
/// The payload must be a single JSON document (leading/trailing prose is
/// a validation failure).
pub fn parse_and_validate(schema: &Value, text: &str) -> Result<Value, Vec<String>> {
    let payload: Value = serde_json::from_str(text.trim())
        .map_err(|e| vec![format!("$: payload is not valid JSON: {e}")])?;
    let errors = validate(schema, &payload);
    if errors.is_empty() {
        Ok(payload)
    } else {
        Err(errors)
    }
}

fn validate_at(schema: &Value, value: &Value, path: &str, errors: &mut Vec<String>) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema_obj.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            errors.push(format!(
                "{path}: expected type '{expected}', got '{}'",
                type_name(value)
            ));
            return;
        }
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(format!("{path}: value not in enum"));
            return;
        }
    }

    match value {
        Value::Object(map) => {
            if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(name) {
                        errors.push(format!("{path}: missing required property '{name}'"));
                    }
                }
            }
            let properties = schema_obj.get("properties").and_then(Value::as_object);
            if let Some(properties) = properties {
                for (name, prop_schema) in properties {
                    if let Some(prop_value) = map.get(name) {
                        validate_at(prop_schema, prop_value, &format!("{path}.{name}"), errors);
                    }
                }
            }
            if schema_obj.get("additionalProperties").and_then(Value::as_bool) == Some(false) {
                if let Some(properties) = properties {
                    for name in map.keys() {
                        if !properties.contains_key(name) {
                            errors.push(format!("{path}: unexpected property '{name}'"));
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(min) = schema_obj.get("minItems").and_then(Value::as_u64) {
                if (items.len() as u64) < min {
                    errors.push(format!("{path}: fewer than {min} items"));
                }
            }
            if let Some(max) = schema_obj.get("maxItems").and_then(Value::as_u64) {
                if items.len() as u64 > max {
                    errors.push(format!("{path}: more than {max} items"));
                }
            }
            if let Some(item_schema) = schema_obj.get("items") {
                for (index, item) in items.iter().enumerate() {
                    validate_at(item_schema, item, &format!("{path}[{index}]"), errors);
                }
            }
        }
        Value::Number(n) => {
            if let Some(number) = n.as_f64() {
                if let Some(min) = schema_obj.get("minimum").and_then(Value::as_f64) {
                    if number < min {
                        errors.push(format!("{path}: {number} below minimum {min}"));
                    }
                }
                if let Some(max) = schema_obj.get("maximum").and_then(Value::as_f64) {
                    if number > max {
                        errors.push(format!("{path}: {number} above maximum {max}"));
                    }
                }
            }
        }
        Value::String(s) => {
            if let Some(min) = schema_obj.get("minLength").and_then(Value::as_u64) {
                if (s.chars().count() as u64) < min {
                    errors.push(format!("{path}: shorter than minLength {min}"));
                }
            }
            if let Some(max) = schema_obj.get("maxLength").and_then(Value::as_u64) {
                if s.chars().count() as u64 > max {
                    errors.push(format!("{path}: longer than maxLength {max}"));
                }
            }
        }
        _ => {}
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
