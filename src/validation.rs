//! Plan validation against a resource [`Schema`].
//!
//! ```
//! use p0_provider::schema::{Attribute, Schema};
//! use p0_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0().with_attribute("id", Attribute::required_string());
//!
//! assert!(validate(&schema, &json!({"id": "123456789012"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"id": 42}));
//! assert_eq!(diagnostics[0].attribute, Some("id".to_string()));
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};

/// Validate a JSON value against a schema.
///
/// Required attributes must be present and non-null, types must match, and
/// keys the schema does not declare are rejected. Computed-only attributes
/// are not checked since P0 owns them.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        other => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(other))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }

    for key in obj.keys() {
        if !schema.attributes.contains_key(key) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", key)).with_attribute(key),
            );
        }
    }

    diagnostics
}

/// Validate, returning `Err` with the diagnostics when any are found.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String if !value.is_string() => {
            diagnostics.push(type_error(path, "string", value));
        },
        AttributeType::Int64 if !(value.is_i64() || value.is_u64()) => {
            diagnostics.push(type_error(path, "int64", value));
        },
        AttributeType::Bool if !value.is_boolean() => {
            diagnostics.push(type_error(path, "bool", value));
        },
        AttributeType::List(element_type) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_type(element_type, item, &format!("{}.{}", path, i), diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "list", value)),
        },
        AttributeType::Map(value_type) => match value.as_object() {
            Some(entries) => {
                for (key, entry) in entries {
                    validate_type(value_type, entry, &format!("{}.{}", path, key), diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "map", value)),
        },
        AttributeType::Object(fields) => match value.as_object() {
            Some(obj) => validate_object(fields, obj, path, diagnostics),
            None => diagnostics.push(type_error(path, "object", value)),
        },
        _ => {},
    }
}

fn validate_object(
    fields: &BTreeMap<String, AttributeType>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, field_type) in fields {
        // Object fields carry no presence flags; null means unset.
        if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
            validate_type(field_type, value, &format!("{}.{}", path, name), diagnostics);
        }
    }
}

fn type_error(path: &str, expected: &str, value: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(value)))
        .with_attribute(path)
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
