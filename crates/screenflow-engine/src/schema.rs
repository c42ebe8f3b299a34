//! OpenAPI-subset schema validation for screen parameters.
//!
//! Deliberately minimal — screens declare their contracts in a small,
//! well-understood subset:
//! - `type`: object / array / string / number / integer / boolean
//! - `properties`, `required`, `items`, `enum`, `nullable`
//! - string `format`, including the custom trusted-reference formats
//!   ([`CustomFormat`])
//!
//! Anything outside the subset is ignored rather than rejected, so
//! definitions written against a fuller validator degrade gracefully.

use serde_json::Value;

use crate::types::CustomFormat;

/// Validate `value` against `schema`.
///
/// Returns `Ok(())` or a list of human-readable errors, one per
/// violation, with dotted paths.
pub fn validate(schema: &Value, value: &Value) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    check(schema, value, "$", &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check(schema: &Value, value: &Value, at: &str, errors: &mut Vec<String>) {
    if value.is_null() {
        if schema.get("nullable").and_then(Value::as_bool) != Some(true) {
            errors.push(format!("{at}: null not allowed"));
        }
        return;
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(format!("{at}: value not in enum"));
            return;
        }
    }

    let Some(ty) = schema.get("type").and_then(Value::as_str) else {
        return; // untyped schema accepts anything
    };

    match ty {
        "object" => {
            let Some(obj) = value.as_object() else {
                errors.push(format!("{at}: expected object"));
                return;
            };
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for key in required.iter().filter_map(Value::as_str) {
                    if !obj.contains_key(key) {
                        errors.push(format!("{at}.{key}: required property missing"));
                    }
                }
            }
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (key, sub) in props {
                    if let Some(v) = obj.get(key) {
                        check(sub, v, &format!("{at}.{key}"), errors);
                    }
                }
            }
        }
        "array" => {
            let Some(arr) = value.as_array() else {
                errors.push(format!("{at}: expected array"));
                return;
            };
            if let Some(items) = schema.get("items") {
                for (i, v) in arr.iter().enumerate() {
                    check(items, v, &format!("{at}[{i}]"), errors);
                }
            }
        }
        "string" => {
            // Custom-format fields are strings (uids) before realization
            // and reference objects after — both shapes are legal.
            if !value.is_string() && !is_realized_reference(schema, value) {
                errors.push(format!("{at}: expected string"));
            }
        }
        "number" => {
            if !value.is_number() {
                errors.push(format!("{at}: expected number"));
            }
        }
        "integer" => {
            if !value.is_i64() && !value.is_u64() {
                errors.push(format!("{at}: expected integer"));
            }
        }
        "boolean" => {
            if !value.is_boolean() {
                errors.push(format!("{at}: expected boolean"));
            }
        }
        other => {
            errors.push(format!("{at}: unknown schema type {other}"));
        }
    }
}

/// A custom-format field that was already exchanged for a dereferenced
/// object (e.g. by an `extract` substitution) validates as that object.
fn is_realized_reference(schema: &Value, value: &Value) -> bool {
    declared_format(schema).is_some() && value.is_object()
}

/// The custom format declared directly on a schema node, if any.
pub fn declared_format(schema: &Value) -> Option<CustomFormat> {
    schema
        .get("format")
        .and_then(Value::as_str)
        .and_then(CustomFormat::from_name)
}

/// Walk `properties` along `path` and return the schema node there.
pub fn schema_at<'a>(schema: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = schema;
    for segment in path {
        current = current.get("properties")?.get(segment)?;
    }
    Some(current)
}

/// The custom format declared at `path`, checking prefixes shortest
/// first — a placeholder like `journey.title` resolves to the format on
/// `journey`. Returns the matched prefix length alongside the format.
pub fn format_at_prefix(schema: &Value, path: &[String]) -> Option<(usize, CustomFormat)> {
    for len in 1..=path.len() {
        if let Some(node) = schema_at(schema, &path[..len]) {
            if let Some(format) = declared_format(node) {
                return Some((len, format));
            }
        }
    }
    None
}

/// Collect every `(path, format)` pair declared in a screen schema.
/// Does not descend past a custom-format node.
pub fn custom_format_paths(schema: &Value) -> Vec<(Vec<String>, CustomFormat)> {
    let mut out = Vec::new();
    collect(schema, &mut Vec::new(), &mut out);
    out
}

fn collect(schema: &Value, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, CustomFormat)>) {
    if let Some(format) = declared_format(schema) {
        out.push((path.clone(), format));
        return;
    }
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (key, sub) in props {
            path.push(key.clone());
            collect(sub, path, out);
            path.pop();
        }
    }
}

/// Whether a substitution writing to `output_path` would touch a
/// custom-format field: either the path lands at or under a declared
/// format node, or it overwrites an ancestor of one.
pub fn writes_custom_format(schema: &Value, output_path: &[String]) -> bool {
    custom_format_paths(schema)
        .iter()
        .any(|(declared, _)| declared.starts_with(output_path) || output_path.starts_with(declared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn screen_schema() -> Value {
        json!({
            "type": "object",
            "required": ["header"],
            "properties": {
                "header": {"type": "string"},
                "count": {"type": "integer"},
                "image": {"type": "string", "format": "image_uid"},
                "nested": {
                    "type": "object",
                    "properties": {
                        "journey": {"type": "string", "format": "journey_uid"}
                    }
                }
            }
        })
    }

    #[test]
    fn accepts_valid_object() {
        let value = json!({"header": "hi", "count": 3});
        assert!(validate(&screen_schema(), &value).is_ok());
    }

    #[test]
    fn reports_missing_required_and_bad_types() {
        let value = json!({"count": "three"});
        let errors = validate(&screen_schema(), &value).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("header")));
        assert!(errors.iter().any(|e| e.contains("count")));
    }

    #[test]
    fn custom_format_field_accepts_uid_or_object() {
        let as_uid = json!({"header": "h", "image": "im_123"});
        assert!(validate(&screen_schema(), &as_uid).is_ok());

        let as_ref = json!({"header": "h", "image": {"uid": "im_123", "jwt": "x"}});
        assert!(validate(&screen_schema(), &as_ref).is_ok());

        let as_num = json!({"header": "h", "image": 3});
        assert!(validate(&screen_schema(), &as_num).is_err());
    }

    #[test]
    fn enum_constrains_value() {
        let schema = json!({"type": "string", "enum": ["a", "b"]});
        assert!(validate(&schema, &json!("a")).is_ok());
        assert!(validate(&schema, &json!("c")).is_err());
    }

    #[test]
    fn nullable_permits_null() {
        let schema = json!({"type": "string", "nullable": true});
        assert!(validate(&schema, &json!(null)).is_ok());
        assert!(validate(&json!({"type": "string"}), &json!(null)).is_err());
    }

    #[test]
    fn format_lookup_matches_prefix() {
        let schema = screen_schema();
        let path = vec!["nested".to_string(), "journey".to_string(), "title".to_string()];
        let (len, format) = format_at_prefix(&schema, &path).unwrap();
        assert_eq!(len, 2);
        assert_eq!(format, CustomFormat::JourneyUid);
        assert!(format_at_prefix(&schema, &["header".to_string()]).is_none());
    }

    #[test]
    fn collects_all_custom_format_paths() {
        let mut paths = custom_format_paths(&screen_schema());
        paths.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            paths,
            vec![
                (vec!["image".to_string()], CustomFormat::ImageUid),
                (
                    vec!["nested".to_string(), "journey".to_string()],
                    CustomFormat::JourneyUid
                ),
            ]
        );
    }

    #[test]
    fn detects_writes_into_trusted_fields() {
        let schema = screen_schema();
        let path = |parts: &[&str]| parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        assert!(writes_custom_format(&schema, &path(&["image"])));
        // Overwriting an ancestor of a trusted field counts too.
        assert!(writes_custom_format(&schema, &path(&["nested"])));
        assert!(writes_custom_format(&schema, &path(&["nested", "journey", "x"])));
        assert!(!writes_custom_format(&schema, &path(&["header"])));
    }
}
