//! JSON Schema for the detection result contract.
//!
//! UI consumers validate `ComponentInfo` payloads against this schema.
//! schemars emits draft 2020-12; many validators in browser tooling still
//! expect draft-07, so the schema is rewritten:
//! - `$defs` becomes `definitions`, with `$ref`s updated
//! - optional values (`anyOf [X, null]`, `type: [X, "null"]`) collapse to `X`

use pinpoint_core::ComponentInfo;
use serde_json::{Map, Value};

const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Draft-07 schema for [`ComponentInfo`].
pub fn component_info_schema() -> serde_json::Result<Value> {
    let schema = serde_json::to_value(schemars::schema_for!(ComponentInfo))?;
    Ok(to_draft07(schema))
}

/// Rewrite a schemars schema as draft-07.
pub fn to_draft07(mut schema: Value) -> Value {
    if let Some(root) = schema.as_object_mut() {
        if let Some(defs) = root.remove("$defs") {
            root.insert("definitions".to_string(), defs);
        }
        root.insert("$schema".to_string(), Value::String(DRAFT_07.to_string()));
    }
    rewrite(&mut schema);
    schema
}

fn rewrite(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            collapse_nullable(obj);
            rewrite_ref(obj);
            for child in obj.values_mut() {
                rewrite(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite),
        _ => {}
    }
}

fn rewrite_ref(obj: &mut Map<String, Value>) {
    if let Some(Value::String(target)) = obj.get_mut("$ref") {
        if let Some(name) = target.strip_prefix("#/$defs/") {
            *target = format!("#/definitions/{name}");
        }
    }
}

fn collapse_nullable(obj: &mut Map<String, Value>) {
    let single_type = match obj.get("type") {
        Some(Value::Array(types)) if types.len() == 2 => {
            let mut non_null = types.iter().filter(|t| *t != "null");
            match (non_null.next(), non_null.next()) {
                (Some(only), None) => Some(only.clone()),
                _ => None,
            }
        }
        _ => None,
    };
    if let Some(only) = single_type {
        obj.insert("type".to_string(), only);
    }

    let replacement = match obj.get("anyOf") {
        Some(Value::Array(variants)) if variants.len() == 2 => {
            match (is_bare_null(&variants[0]), is_bare_null(&variants[1])) {
                (false, true) => variants[0].as_object().cloned(),
                (true, false) => variants[1].as_object().cloned(),
                _ => None,
            }
        }
        _ => None,
    };
    if let Some(inner) = replacement {
        obj.remove("anyOf");
        obj.extend(inner);
    }
}

fn is_bare_null(schema: &Value) -> bool {
    schema
        .as_object()
        .is_some_and(|o| o.len() == 1 && o.get("type").is_some_and(|t| t == "null"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defs_become_definitions() {
        let result = to_draft07(json!({
            "$defs": { "SourceLocation": { "type": "object" } },
            "properties": { "source": { "$ref": "#/$defs/SourceLocation" } }
        }));

        assert!(result.get("$defs").is_none());
        assert!(result["definitions"]["SourceLocation"].is_object());
        assert_eq!(
            result["properties"]["source"]["$ref"],
            "#/definitions/SourceLocation"
        );
        assert_eq!(result["$schema"], DRAFT_07);
    }

    #[test]
    fn test_nullable_forms_collapse() {
        let result = to_draft07(json!({
            "properties": {
                "line": { "type": ["integer", "null"], "format": "uint32" },
                "source": { "anyOf": [{ "$ref": "#/$defs/SourceLocation" }, { "type": "null" }] },
                "mixed": { "anyOf": [{ "type": "string" }, { "type": "integer" }] }
            }
        }));

        let props = &result["properties"];
        assert_eq!(props["line"]["type"], "integer");
        assert!(props["source"].get("anyOf").is_none());
        assert_eq!(props["source"]["$ref"], "#/definitions/SourceLocation");
        assert!(props["mixed"]["anyOf"].is_array());
    }

    #[test]
    fn test_component_info_schema() {
        let schema = component_info_schema().unwrap();
        let props = &schema["properties"];
        assert!(props["name"].is_object());
        assert!(props["detectionMethod"].is_object());
        assert!(props["treePath"].is_object());
        assert!(schema.get("$defs").is_none());
    }
}
