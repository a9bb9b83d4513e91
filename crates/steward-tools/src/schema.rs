// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parameter validation against the JSON Schema subset the catalog uses.
//!
//! Supported keywords: `type` (object, string, integer, number, boolean),
//! `properties`, `required`, `enum`, `minimum`, `maximum`. The first
//! violation found is reported with its property path.

use serde_json::Value;

/// Validates a parameter object against a tool's input schema.
///
/// Returns the human-readable violation detail on failure; the engine wraps
/// it in `BadParams` so the LLM can correct itself.
pub fn validate_params(schema: &Value, params: &Value) -> Result<(), String> {
    if !params.is_object() {
        return Err(format!(
            "parameters must be a JSON object, got {}",
            type_name(params)
        ));
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required {
            let name = field.as_str().unwrap_or_default();
            if params.get(name).map_or(true, Value::is_null) {
                return Err(format!("missing required parameter: {name}"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, value) in params.as_object().into_iter().flatten() {
        let Some(prop_schema) = properties.get(name) else {
            return Err(format!("unknown parameter: {name}"));
        };
        if value.is_null() {
            continue;
        }
        validate_value(name, prop_schema, value)?;
    }

    Ok(())
}

fn validate_value(name: &str, schema: &Value, value: &Value) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        let ok = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        if !ok {
            return Err(format!(
                "{name}: expected {expected}, got {}",
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let options: Vec<String> = allowed.iter().map(render_scalar).collect();
            return Err(format!(
                "{name}: {} is not one of [{}]",
                render_scalar(value),
                options.join(", ")
            ));
        }
    }

    if let Some(minimum) = schema.get("minimum").and_then(Value::as_f64) {
        if let Some(actual) = value.as_f64() {
            if actual < minimum {
                return Err(format!("{name}: {actual} below minimum {minimum}"));
            }
        }
    }

    if let Some(maximum) = schema.get("maximum").and_then(Value::as_f64) {
        if let Some(actual) = value.as_f64() {
            if actual > maximum {
                return Err(format!("{name}: {actual} above maximum {maximum}"));
            }
        }
    }

    Ok(())
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

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scale_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "deployment_name": {"type": "string"},
                "namespace": {"type": "string"},
                "replicas": {"type": "integer", "minimum": 0, "maximum": 50}
            },
            "required": ["deployment_name", "namespace", "replicas"]
        })
    }

    #[test]
    fn accepts_valid_params() {
        let params = json!({"deployment_name": "frontend", "namespace": "production", "replicas": 5});
        assert!(validate_params(&scale_schema(), &params).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let params = json!({"deployment_name": "frontend", "namespace": "production"});
        let err = validate_params(&scale_schema(), &params).unwrap_err();
        assert!(err.contains("replicas"), "got: {err}");
    }

    #[test]
    fn rejects_negative_replicas() {
        let params = json!({"deployment_name": "frontend", "namespace": "production", "replicas": -3});
        let err = validate_params(&scale_schema(), &params).unwrap_err();
        assert!(err.contains("below minimum"), "got: {err}");
    }

    #[test]
    fn rejects_replicas_above_bound() {
        let params = json!({"deployment_name": "frontend", "namespace": "production", "replicas": 51});
        let err = validate_params(&scale_schema(), &params).unwrap_err();
        assert!(err.contains("above maximum"), "got: {err}");
    }

    #[test]
    fn rejects_wrong_type() {
        let params = json!({"deployment_name": "frontend", "namespace": "production", "replicas": "five"});
        let err = validate_params(&scale_schema(), &params).unwrap_err();
        assert!(err.contains("expected integer"), "got: {err}");
    }

    #[test]
    fn rejects_unknown_parameter() {
        let params = json!({"deployment_name": "f", "namespace": "p", "replicas": 1, "force": true});
        let err = validate_params(&scale_schema(), &params).unwrap_err();
        assert!(err.contains("unknown parameter: force"), "got: {err}");
    }

    #[test]
    fn rejects_enum_violation() {
        let schema = json!({
            "type": "object",
            "properties": {
                "shell": {"type": "string", "enum": ["sh", "cmd", "powershell"]}
            }
        });
        let err = validate_params(&schema, &json!({"shell": "fish"})).unwrap_err();
        assert!(err.contains("fish is not one of"), "got: {err}");
    }

    #[test]
    fn rejects_non_object_params() {
        let err = validate_params(&scale_schema(), &json!([1, 2])).unwrap_err();
        assert!(err.contains("must be a JSON object"), "got: {err}");
    }

    #[test]
    fn optional_fields_may_be_absent_or_null() {
        let schema = json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"},
                "limit": {"type": "integer", "minimum": 1}
            }
        });
        assert!(validate_params(&schema, &json!({})).is_ok());
        assert!(validate_params(&schema, &json!({"namespace": null})).is_ok());
    }
}
