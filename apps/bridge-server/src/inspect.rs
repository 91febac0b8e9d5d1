// [[CRAFTLINK]]/apps/bridge-server/src/inspect.rs
// Purpose: Read-only introspection of live bot state through allow-listed dotted paths.
// Architecture: Domain Logic Layer
// Dependencies: serde_json

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::InspectError;

pub const INSPECTABLE: [&str; 10] = [
    "username",
    "position",
    "health",
    "food",
    "inventory",
    "selectedSlot",
    "heldItem",
    "yaw",
    "pitch",
    "entities",
];
pub const MAX_DEPTH: usize = 4;
const MAX_LISTED_KEYS: usize = 10;

pub fn inspect<T: Serialize + ?Sized>(state: &T, property: &str) -> Result<Value, InspectError> {
    let root = serde_json::to_value(state).map_err(|e| InspectError::Encoding(e.to_string()))?;
    inspect_value(&root, property)
}

/// Walks `property` (e.g. `position.x`, `inventory.0.name`) through `root`.
/// Failures name the segment that broke and list what was available instead.
pub fn inspect_value(root: &Value, property: &str) -> Result<Value, InspectError> {
    let property = property.trim();
    let segments: Vec<&str> = property.split('.').collect();
    if property.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(InspectError::EmptyPath);
    }
    if segments.len() > MAX_DEPTH {
        return Err(InspectError::TooDeep {
            path: property.to_string(),
            max: MAX_DEPTH,
        });
    }
    if !INSPECTABLE.contains(&segments[0]) {
        return Err(InspectError::NotAllowed {
            property: segments[0].to_string(),
            allowed: INSPECTABLE.join(", "),
        });
    }

    let mut value = root;
    let mut path = String::new();
    for segment in segments {
        let parent = if path.is_empty() { "bot".to_string() } else { path.clone() };
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(segment);

        value = match value {
            Value::Object(map) => map.get(segment).ok_or_else(|| InspectError::NotFound {
                parent: parent.clone(),
                segment: segment.to_string(),
                available: list_keys(map),
            })?,
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .ok_or_else(|| InspectError::NotFound {
                    parent: parent.clone(),
                    segment: segment.to_string(),
                    available: if items.is_empty() {
                        "(empty list)".to_string()
                    } else {
                        format!("indices 0..{}", items.len() - 1)
                    },
                })?,
            Value::Null => {
                return Err(InspectError::NullValue {
                    parent,
                    segment: segment.to_string(),
                    path: property.to_string(),
                })
            }
            other => {
                return Err(InspectError::NotAnObject {
                    parent,
                    kind: kind_name(other),
                    segment: segment.to_string(),
                    path: property.to_string(),
                })
            }
        };
    }

    Ok(value.clone())
}

fn list_keys(map: &Map<String, Value>) -> String {
    let keys: Vec<&str> = map.keys().take(MAX_LISTED_KEYS).map(|k| k.as_str()).collect();
    let mut listed = keys.join(", ");
    if map.len() > MAX_LISTED_KEYS {
        listed.push_str("...");
    }
    listed
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
